//! # asl-lang
//!
//! ASL front end: lexer, syntax tree, recursive-descent parser and a
//! builder for assembling shader classes in code.

pub mod ast;
pub mod builder;
pub mod lexer;
pub mod parser;

pub use ast::{ClassDecl, ClassKind, SourceFile};
pub use builder::{ClassBuilder, MethodBuilder};

use asl_core::AslError;

/// Parse ASL source text into a syntax tree.
pub fn parse_source(src: &str, file: &str) -> Result<SourceFile, AslError> {
    let mut lexer = lexer::Lexer::new(src, file);
    let tokens = lexer.tokenize()?;
    let mut parser = parser::Parser::new(tokens, file);
    let source = parser.parse()?;
    tracing::debug!(file, classes = source.classes.len(), "parsed ASL source");
    Ok(source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_source_reports_position() {
        let err = parse_source("class A : VertexShader {\n  void main() { x = ; }\n}", "bad.asl").unwrap_err();
        match err {
            AslError::Parse { file, line, .. } => {
                assert_eq!(file, "bad.asl");
                assert_eq!(line, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_source_multiple_classes() {
        let source = parse_source(
            "static class Lib { static float twice(float x) { return x * 2.0; } }\n\
             class Frag : FragmentShader { [Out, Layout(location = 0)] vec4 color; void main() { } }",
            "two.asl",
        )
        .unwrap();
        assert_eq!(source.libraries().count(), 1);
        assert_eq!(source.shaders().count(), 1);
    }
}
