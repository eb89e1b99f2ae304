//! The fixed type vocabulary shared by ASL and GLSL.
//!
//! Every type name an ASL program may mention maps to exactly one GLSL type
//! name. Vector, matrix and sampler names are spelled the same in both
//! languages; scalars also accept their .NET-style aliases (`Single`,
//! `Int32`, ...), which translate to the canonical GLSL spelling.

use crate::error::{AslError, AslResult};

/// Component kind of a scalar, vector, matrix or sampler type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Bool,
    Int,
    Uint,
    Float,
    Double,
}

impl ScalarKind {
    pub fn is_integral(self) -> bool {
        matches!(self, ScalarKind::Int | ScalarKind::Uint)
    }

    /// GLSL name of the scalar type itself.
    pub fn scalar_name(self) -> &'static str {
        match self {
            ScalarKind::Bool => "bool",
            ScalarKind::Int => "int",
            ScalarKind::Uint => "uint",
            ScalarKind::Float => "float",
            ScalarKind::Double => "double",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeShape {
    Void,
    Scalar,
    Vector(u8),
    Matrix { columns: u8, rows: u8 },
    Sampler,
}

/// One entry of the vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinType {
    pub name: &'static str,
    pub kind: Option<ScalarKind>,
    pub shape: TypeShape,
}

impl BuiltinType {
    pub fn is_vector(&self) -> bool {
        matches!(self.shape, TypeShape::Vector(_))
    }

    pub fn is_matrix(&self) -> bool {
        matches!(self.shape, TypeShape::Matrix { .. })
    }

    pub fn is_sampler(&self) -> bool {
        self.shape == TypeShape::Sampler
    }
}

const fn void() -> BuiltinType {
    BuiltinType { name: "void", kind: None, shape: TypeShape::Void }
}

const fn scalar(name: &'static str, kind: ScalarKind) -> BuiltinType {
    BuiltinType { name, kind: Some(kind), shape: TypeShape::Scalar }
}

const fn vector(name: &'static str, kind: ScalarKind, size: u8) -> BuiltinType {
    BuiltinType { name, kind: Some(kind), shape: TypeShape::Vector(size) }
}

const fn matrix(name: &'static str, kind: ScalarKind, columns: u8, rows: u8) -> BuiltinType {
    BuiltinType { name, kind: Some(kind), shape: TypeShape::Matrix { columns, rows } }
}

const fn sampler(name: &'static str, kind: ScalarKind) -> BuiltinType {
    BuiltinType { name, kind: Some(kind), shape: TypeShape::Sampler }
}

use ScalarKind::{Bool, Double, Float, Int, Uint};

static VOCABULARY: &[BuiltinType] = &[
    void(),
    scalar("bool", Bool),
    scalar("int", Int),
    scalar("uint", Uint),
    scalar("float", Float),
    scalar("double", Double),
    vector("vec2", Float, 2),
    vector("vec3", Float, 3),
    vector("vec4", Float, 4),
    vector("dvec2", Double, 2),
    vector("dvec3", Double, 3),
    vector("dvec4", Double, 4),
    vector("ivec2", Int, 2),
    vector("ivec3", Int, 3),
    vector("ivec4", Int, 4),
    vector("uvec2", Uint, 2),
    vector("uvec3", Uint, 3),
    vector("uvec4", Uint, 4),
    vector("bvec2", Bool, 2),
    vector("bvec3", Bool, 3),
    vector("bvec4", Bool, 4),
    matrix("mat2", Float, 2, 2),
    matrix("mat3", Float, 3, 3),
    matrix("mat4", Float, 4, 4),
    matrix("mat2x2", Float, 2, 2),
    matrix("mat2x3", Float, 2, 3),
    matrix("mat2x4", Float, 2, 4),
    matrix("mat3x2", Float, 3, 2),
    matrix("mat3x3", Float, 3, 3),
    matrix("mat3x4", Float, 3, 4),
    matrix("mat4x2", Float, 4, 2),
    matrix("mat4x3", Float, 4, 3),
    matrix("mat4x4", Float, 4, 4),
    matrix("dmat2", Double, 2, 2),
    matrix("dmat3", Double, 3, 3),
    matrix("dmat4", Double, 4, 4),
    sampler("sampler1D", Float),
    sampler("sampler2D", Float),
    sampler("sampler3D", Float),
    sampler("samplerCube", Float),
    sampler("sampler2DRect", Float),
    sampler("sampler1DArray", Float),
    sampler("sampler2DArray", Float),
    sampler("samplerCubeArray", Float),
    sampler("samplerBuffer", Float),
    sampler("sampler2DMS", Float),
    sampler("sampler2DMSArray", Float),
    sampler("sampler1DShadow", Float),
    sampler("sampler2DShadow", Float),
    sampler("samplerCubeShadow", Float),
    sampler("sampler2DRectShadow", Float),
    sampler("sampler1DArrayShadow", Float),
    sampler("sampler2DArrayShadow", Float),
    sampler("samplerCubeArrayShadow", Float),
    sampler("isampler1D", Int),
    sampler("isampler2D", Int),
    sampler("isampler3D", Int),
    sampler("isamplerCube", Int),
    sampler("isampler2DArray", Int),
    sampler("isamplerBuffer", Int),
    sampler("usampler1D", Uint),
    sampler("usampler2D", Uint),
    sampler("usampler3D", Uint),
    sampler("usamplerCube", Uint),
    sampler("usampler2DArray", Uint),
    sampler("usamplerBuffer", Uint),
];

/// ASL-only spellings and the vocabulary entry they stand for.
static ALIASES: &[(&str, &str)] = &[
    ("Void", "void"),
    ("Boolean", "bool"),
    ("Int32", "int"),
    ("UInt32", "uint"),
    ("Single", "float"),
    ("Double", "double"),
];

/// The full vocabulary, in declaration order.
pub fn vocabulary() -> &'static [BuiltinType] {
    VOCABULARY
}

/// Look up an ASL type name, following aliases.
pub fn lookup(name: &str) -> Option<&'static BuiltinType> {
    let canonical = ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map(|(_, target)| *target)
        .unwrap_or(name);
    VOCABULARY.iter().find(|t| t.name == canonical)
}

/// Whether `name` is a translatable ASL type name.
pub fn is_builtin_type(name: &str) -> bool {
    lookup(name).is_some()
}

/// Translate an ASL type name into its GLSL spelling.
pub fn to_target_type(name: &str) -> AslResult<&'static str> {
    lookup(name)
        .map(|t| t.name)
        .ok_or_else(|| AslError::UnknownType(name.to_string()))
}

/// Translate a GLSL type name back into its canonical ASL spelling.
pub fn from_target_type(name: &str) -> AslResult<&'static str> {
    VOCABULARY
        .iter()
        .find(|t| t.name == name)
        .map(|t| t.name)
        .ok_or_else(|| AslError::UnknownType(name.to_string()))
}

/// Scalar kind for a GLSL type name (`vec3` → `Float`, `uint` → `Uint`).
pub fn scalar_kind(name: &str) -> Option<ScalarKind> {
    lookup(name).and_then(|t| t.kind)
}

/// Vector type of `size` components of `kind` (`size == 1` gives the scalar).
pub fn vector_of(kind: ScalarKind, size: usize) -> Option<&'static str> {
    if size == 1 {
        return Some(kind.scalar_name());
    }
    VOCABULARY
        .iter()
        .find(|t| t.kind == Some(kind) && t.shape == TypeShape::Vector(size as u8))
        .map(|t| t.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vectors_and_matrices_translate_verbatim() {
        assert_eq!(to_target_type("vec3").unwrap(), "vec3");
        assert_eq!(to_target_type("mat4").unwrap(), "mat4");
        assert_eq!(to_target_type("sampler2DShadow").unwrap(), "sampler2DShadow");
    }

    #[test]
    fn test_aliases_translate_to_glsl_scalars() {
        assert_eq!(to_target_type("Single").unwrap(), "float");
        assert_eq!(to_target_type("UInt32").unwrap(), "uint");
        assert_eq!(from_target_type("float").unwrap(), "float");
    }

    #[test]
    fn test_unknown_type_fails() {
        let err = to_target_type("Vector3").unwrap_err();
        assert!(matches!(err, AslError::UnknownType(ref n) if n == "Vector3"));
        assert!(from_target_type("Single").is_err());
    }

    #[test]
    fn test_scalar_kinds() {
        assert_eq!(scalar_kind("ivec3"), Some(ScalarKind::Int));
        assert_eq!(scalar_kind("usampler2D"), Some(ScalarKind::Uint));
        assert_eq!(scalar_kind("void"), None);
        assert!(ScalarKind::Uint.is_integral());
        assert!(!ScalarKind::Double.is_integral());
    }

    #[test]
    fn test_vector_of() {
        assert_eq!(vector_of(ScalarKind::Float, 3), Some("vec3"));
        assert_eq!(vector_of(ScalarKind::Int, 1), Some("int"));
        assert_eq!(vector_of(ScalarKind::Bool, 5), None);
    }
}
