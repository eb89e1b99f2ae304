/// Core error types for the ASL shader compiler.
use std::fmt;

/// A specialized Result type for ASL operations.
pub type AslResult<T> = Result<T, AslError>;

/// Constructs the code generator refuses to translate.
///
/// Each variant names one family of authoring-language features that has no
/// faithful GLSL rendition. The `Display` text is what authors see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Construct {
    Exceptions,
    Lambdas,
    Queries,
    TypeTests,
    TypeOf,
    SizeOf,
    Pointers,
    Unsafe,
    Fixed,
    StackAlloc,
    Goto,
    Labels,
    Iterators,
    Null,
    AnonymousTypes,
    NamedArguments,
    DefaultArguments,
    Attributes,
    Lock,
    Using,
    Foreach,
    BaseAccess,
    Strings,
    Recursion,
}

impl Construct {
    pub fn description(self) -> &'static str {
        match self {
            Construct::Exceptions => "exceptions",
            Construct::Lambdas => "lambda expressions",
            Construct::Queries => "LINQ query expressions",
            Construct::TypeTests => "type tests (is/as)",
            Construct::TypeOf => "typeof",
            Construct::SizeOf => "sizeof",
            Construct::Pointers => "pointers",
            Construct::Unsafe => "unsafe code",
            Construct::Fixed => "fixed statements",
            Construct::StackAlloc => "stackalloc",
            Construct::Goto => "goto",
            Construct::Labels => "labels",
            Construct::Iterators => "iterators (yield)",
            Construct::Null => "null references",
            Construct::AnonymousTypes => "anonymous types",
            Construct::NamedArguments => "named arguments",
            Construct::DefaultArguments => "default-value arguments",
            Construct::Attributes => "attributes in method bodies",
            Construct::Lock => "lock statements",
            Construct::Using => "using statements",
            Construct::Foreach => "foreach iteration",
            Construct::BaseAccess => "base access",
            Construct::Strings => "string literals",
            Construct::Recursion => "recursion",
        }
    }
}

impl fmt::Display for Construct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Top-level error type encompassing every compiler phase.
#[derive(Debug, thiserror::Error)]
pub enum AslError {
    #[error("parse error: {message} at {file}:{line}:{column}")]
    Parse {
        message: String,
        file: String,
        line: usize,
        column: usize,
    },

    #[error("unknown type: '{0}' has no GLSL equivalent")]
    UnknownType(String),

    #[error("interface block error: {0}")]
    InterfaceBlock(String),

    #[error("recovery error: {0}")]
    Recovery(String),

    #[error("unsupported construct: {construct} cannot be translated to GLSL ({context})")]
    UnsupportedConstruct { construct: Construct, context: String },

    #[error("unsupported member: {0}")]
    UnsupportedMember(String),

    #[error("missing attribute location: {0}")]
    MissingAttributeLocation(String),

    #[error("layout error: {0}")]
    Layout(String),

    #[error("missing array size: {0}")]
    MissingArraySize(String),

    #[error("attribute error: {0}")]
    Attribute(String),

    #[error("unresolved dependency: {0}")]
    UnresolvedDependency(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AslError {
    /// Create a parse error with source location.
    pub fn parse(
        message: impl Into<String>,
        file: impl Into<String>,
        line: usize,
        column: usize,
    ) -> Self {
        AslError::Parse {
            message: message.into(),
            file: file.into(),
            line,
            column,
        }
    }

    /// Create an unsupported-construct error.
    pub fn unsupported(construct: Construct, context: impl Into<String>) -> Self {
        AslError::UnsupportedConstruct {
            construct,
            context: context.into(),
        }
    }

    /// The rejected construct, if this is an unsupported-construct error.
    pub fn construct(&self) -> Option<Construct> {
        match self {
            AslError::UnsupportedConstruct { construct, .. } => Some(*construct),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let err = AslError::parse("unexpected token", "basic.asl", 10, 5);
        assert_eq!(
            err.to_string(),
            "parse error: unexpected token at basic.asl:10:5"
        );
    }

    #[test]
    fn test_unsupported_names_construct() {
        let err = AslError::unsupported(Construct::Exceptions, "Basic.main");
        assert!(err.to_string().contains("exceptions"));
        assert!(err.to_string().contains("Basic.main"));
        assert_eq!(err.construct(), Some(Construct::Exceptions));
    }

    #[test]
    fn test_construct_descriptions_are_distinct() {
        let all = [
            Construct::Exceptions,
            Construct::Lambdas,
            Construct::Queries,
            Construct::TypeTests,
            Construct::TypeOf,
            Construct::SizeOf,
            Construct::Pointers,
            Construct::Unsafe,
            Construct::Fixed,
            Construct::StackAlloc,
            Construct::Goto,
            Construct::Labels,
            Construct::Iterators,
            Construct::Null,
            Construct::AnonymousTypes,
            Construct::NamedArguments,
            Construct::DefaultArguments,
            Construct::Attributes,
            Construct::Lock,
            Construct::Using,
            Construct::Foreach,
            Construct::BaseAccess,
            Construct::Strings,
            Construct::Recursion,
        ];
        let unique: std::collections::HashSet<_> = all.iter().map(|c| c.description()).collect();
        assert_eq!(unique.len(), all.len());
    }
}
