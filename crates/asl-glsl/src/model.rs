//! Reflected shader interface: units, variables, structs and dependencies.

use std::fmt;

use asl_core::Stage;
use serde::Serialize;

/// Role a field plays in the shader interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Qualifier {
    Uniform,
    Input,
    Output,
    BuiltIn,
}

impl Qualifier {
    /// Map an ASL attribute name to a qualifier.
    pub fn from_attribute(name: &str) -> Option<Self> {
        match name {
            "Uniform" => Some(Qualifier::Uniform),
            "In" => Some(Qualifier::Input),
            "Out" => Some(Qualifier::Output),
            "BuiltIn" => Some(Qualifier::BuiltIn),
            _ => None,
        }
    }

    /// GLSL storage keyword. A redeclared built-in is an input.
    pub fn keyword(self) -> &'static str {
        match self {
            Qualifier::Uniform => "uniform",
            Qualifier::Input | Qualifier::BuiltIn => "in",
            Qualifier::Output => "out",
        }
    }
}

impl fmt::Display for Qualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Qualifier::Uniform => "uniform",
            Qualifier::Input => "input",
            Qualifier::Output => "output",
            Qualifier::BuiltIn => "built-in",
        };
        f.write_str(name)
    }
}

/// One `key` or `key = value` entry of a layout qualifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutParam {
    pub key: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Layout {
    pub params: Vec<LayoutParam>,
}

impl Layout {
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&LayoutParam> {
        self.params.iter().find(|p| p.key == key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn push(&mut self, key: impl Into<String>, value: Option<String>) {
        self.params.push(LayoutParam {
            key: key.into(),
            value,
        });
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("layout(")?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match &param.value {
                Some(value) => write!(f, "{} = {}", param.key, value)?,
                None => f.write_str(&param.key)?,
            }
        }
        f.write_str(")")
    }
}

/// A declared field participating in the shader text.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderVariable {
    /// GLSL type name.
    pub ty: String,
    pub name: String,
    /// Textual array size; may name a constant.
    pub array_size: Option<String>,
    pub qualifier: Option<Qualifier>,
    pub layout: Layout,
    pub comment: Option<String>,
    /// `Declaring.member`, present only in debug mode.
    pub debug_comment: Option<String>,
    pub initializer: Option<String>,
    pub is_const: bool,
}

impl ShaderVariable {
    pub fn new(ty: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            ty: ty.into(),
            name: name.into(),
            array_size: None,
            qualifier: None,
            layout: Layout::default(),
            comment: None,
            debug_comment: None,
            initializer: None,
            is_const: false,
        }
    }

    pub fn is_array(&self) -> bool {
        self.array_size.is_some()
    }

    /// `name` or `name[size]`.
    pub fn declarator(&self) -> String {
        match &self.array_size {
            Some(size) => format!("{}[{}]", self.name, size),
            None => self.name.clone(),
        }
    }
}

/// A nested type: a plain struct or an interface block.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderStruct {
    pub name: String,
    /// Set only for interface blocks.
    pub block: Option<Qualifier>,
    pub instance_name: Option<String>,
    pub members: Vec<ShaderVariable>,
    pub layout: Layout,
    pub comment: Option<String>,
}

impl ShaderStruct {
    pub fn is_interface_block(&self) -> bool {
        self.block.is_some()
    }
}

/// Block instance name used when no `InstanceName` is given: `Camera` → `camera`.
pub fn default_instance_name(struct_name: &str) -> String {
    let mut chars = struct_name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Stage-specific layout pragmas.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StageLayout {
    #[default]
    None,
    Geometry {
        input: String,
        invocations: Option<u32>,
        output: String,
        max_vertices: Option<u32>,
    },
    TessControl {
        vertices: u32,
    },
    TessEvaluation {
        primitive: String,
        spacing: Option<String>,
        winding: Option<String>,
    },
}

/// One shader class compiled as one stage.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderUnit {
    pub name: String,
    pub stage: Stage,
    pub version: String,
    pub debug: bool,
    pub extensions: Vec<String>,
    pub stage_layout: StageLayout,
}

/// Everything the reflector extracts from a class, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShaderInterface {
    pub constants: Vec<ShaderVariable>,
    pub structs: Vec<ShaderStruct>,
    pub uniforms: Vec<ShaderVariable>,
    pub inputs: Vec<ShaderVariable>,
    pub outputs: Vec<ShaderVariable>,
    pub globals: Vec<ShaderVariable>,
}

/// A non-intrinsic function a shader calls and the embedder must supply.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FunctionDependency {
    /// `Library.function`, or the bare name when unqualified.
    pub qualified_name: String,
    pub name: String,
    pub arity: usize,
}

impl FunctionDependency {
    pub fn new(qualified_name: impl Into<String>, name: impl Into<String>, arity: usize) -> Self {
        Self {
            qualified_name: qualified_name.into(),
            name: name.into(),
            arity,
        }
    }

    /// The library class the dependency is qualified with, if any.
    pub fn owner(&self) -> Option<&str> {
        self.qualified_name
            .rsplit_once('.')
            .map(|(owner, _)| owner)
    }

    /// `name/arity`, the GLSL overload key.
    pub fn signature(&self) -> String {
        format!("{}/{}", self.name, self.arity)
    }
}

impl fmt::Display for FunctionDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.qualified_name, self.arity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_renders_flags_and_pairs() {
        let mut layout = Layout::default();
        layout.push("std140", None);
        layout.push("binding", Some("2".into()));
        assert_eq!(layout.to_string(), "layout(std140, binding = 2)");
    }

    #[test]
    fn test_array_declarator() {
        let mut var = ShaderVariable::new("vec3", "lights");
        assert_eq!(var.declarator(), "lights");
        var.array_size = Some("MAX_LIGHTS".into());
        assert_eq!(var.declarator(), "lights[MAX_LIGHTS]");
    }

    #[test]
    fn test_default_instance_name() {
        assert_eq!(default_instance_name("Camera"), "camera");
        assert_eq!(default_instance_name("LightBlock"), "lightBlock");
    }

    #[test]
    fn test_dependency_owner_and_signature() {
        let dep = FunctionDependency::new("Lighting.lambert", "lambert", 2);
        assert_eq!(dep.owner(), Some("Lighting"));
        assert_eq!(dep.signature(), "lambert/2");
        assert_eq!(FunctionDependency::new("helper", "helper", 0).owner(), None);
    }
}
