//! Programmatic construction of shader classes.
//!
//! Produces the same [`ClassDecl`] the parser does, for embedders that
//! assemble shaders in code instead of source text.

use asl_core::Stage;

use crate::ast::*;
use crate::lexer::Span;

impl Attribute {
    /// An attribute without arguments, e.g. `[Uniform]`.
    pub fn flag(name: &str) -> Self {
        Self {
            name: name.to_string(),
            args: Vec::new(),
            span: Span::synthetic(),
        }
    }

    pub fn with_args(name: &str, args: Vec<AttributeArg>) -> Self {
        Self {
            name: name.to_string(),
            args,
            span: Span::synthetic(),
        }
    }

    /// `[Layout(location = n)]`
    pub fn location(n: i64) -> Self {
        Self::with_args(
            "Layout",
            vec![AttributeArg::Named("location".into(), AttrValue::Int(n))],
        )
    }

    /// `[ArraySize(n)]`
    pub fn array_size(n: i64) -> Self {
        Self::with_args("ArraySize", vec![AttributeArg::Positional(AttrValue::Int(n))])
    }
}

/// Builder for a shader or library class.
pub struct ClassBuilder {
    class: ClassDecl,
}

impl ClassBuilder {
    pub fn shader(name: &str, stage: Stage) -> Self {
        Self::with_kind(name, ClassKind::Shader(stage))
    }

    pub fn library(name: &str) -> Self {
        Self::with_kind(name, ClassKind::Library)
    }

    fn with_kind(name: &str, kind: ClassKind) -> Self {
        Self {
            class: ClassDecl {
                name: name.to_string(),
                kind,
                attributes: Vec::new(),
                fields: Vec::new(),
                structs: Vec::new(),
                methods: Vec::new(),
                span: Span::synthetic(),
            },
        }
    }

    pub fn version(self, version: &str) -> Self {
        self.attribute(Attribute::with_args(
            "Version",
            vec![AttributeArg::Positional(AttrValue::Str(version.to_string()))],
        ))
    }

    pub fn debug(self) -> Self {
        self.attribute(Attribute::flag("Debug"))
    }

    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.class.attributes.push(attribute);
        self
    }

    /// A field with arbitrary attributes.
    pub fn field(mut self, attributes: Vec<Attribute>, ty: TypeRef, name: &str) -> Self {
        self.class.fields.push(FieldDecl {
            attributes,
            is_const: false,
            ty,
            name: name.to_string(),
            init: None,
            span: Span::synthetic(),
        });
        self
    }

    pub fn uniform(self, ty: &str, name: &str) -> Self {
        self.field(vec![Attribute::flag("Uniform")], TypeRef::named(ty), name)
    }

    pub fn input(self, ty: &str, name: &str, location: Option<i64>) -> Self {
        let mut attributes = vec![Attribute::flag("In")];
        attributes.extend(location.map(Attribute::location));
        self.field(attributes, TypeRef::named(ty), name)
    }

    pub fn output(self, ty: &str, name: &str, location: Option<i64>) -> Self {
        let mut attributes = vec![Attribute::flag("Out")];
        attributes.extend(location.map(Attribute::location));
        self.field(attributes, TypeRef::named(ty), name)
    }

    pub fn constant(mut self, ty: &str, name: &str, value: Expr) -> Self {
        self.class.fields.push(FieldDecl {
            attributes: Vec::new(),
            is_const: true,
            ty: TypeRef::named(ty),
            name: name.to_string(),
            init: Some(value),
            span: Span::synthetic(),
        });
        self
    }

    pub fn structure(mut self, decl: StructDecl) -> Self {
        self.class.structs.push(decl);
        self
    }

    pub fn method(mut self, method: MethodDecl) -> Self {
        self.class.methods.push(method);
        self
    }

    pub fn build(self) -> ClassDecl {
        self.class
    }
}

/// Builder for a method, constructor or entry point.
pub struct MethodBuilder {
    method: MethodDecl,
}

impl MethodBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            method: MethodDecl {
                attributes: Vec::new(),
                return_attributes: Vec::new(),
                is_static: false,
                return_type: Some(TypeRef::named("void")),
                name: name.to_string(),
                params: Vec::new(),
                body: Some(Block::default()),
                is_constructor: false,
                span: Span::synthetic(),
            },
        }
    }

    /// The `void main()` entry point.
    pub fn entry_point() -> Self {
        Self::new("main")
    }

    pub fn constructor(class_name: &str) -> Self {
        let mut builder = Self::new(class_name);
        builder.method.return_type = None;
        builder.method.is_constructor = true;
        builder
    }

    pub fn returns(mut self, ty: TypeRef) -> Self {
        self.method.return_type = Some(ty);
        self
    }

    pub fn is_static(mut self) -> Self {
        self.method.is_static = true;
        self
    }

    pub fn return_attribute(mut self, attribute: Attribute) -> Self {
        self.method.return_attributes.push(attribute);
        self
    }

    pub fn param(self, ty: &str, name: &str) -> Self {
        self.param_with(ParamModifier::None, TypeRef::named(ty), name)
    }

    pub fn param_with(mut self, modifier: ParamModifier, ty: TypeRef, name: &str) -> Self {
        self.method.params.push(Param {
            attributes: Vec::new(),
            modifier,
            ty,
            name: name.to_string(),
            default: None,
            span: Span::synthetic(),
        });
        self
    }

    pub fn stmt(mut self, stmt: Stmt) -> Self {
        if let Some(body) = self.method.body.as_mut() {
            body.stmts.push(stmt);
        }
        self
    }

    /// Drop the body, leaving a bare declaration.
    pub fn without_body(mut self) -> Self {
        self.method.body = None;
        self
    }

    pub fn build(self) -> MethodDecl {
        self.method
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::build::*;

    #[test]
    fn test_builds_vertex_shader() {
        let class = ClassBuilder::shader("Basic", Stage::Vertex)
            .version("330")
            .uniform("mat4", "viewProjection")
            .input("vec3", "position", Some(0))
            .method(
                MethodBuilder::entry_point()
                    .stmt(expr_stmt(assign(
                        ident("gl_Position"),
                        binary(
                            BinaryOp::Mul,
                            ident("viewProjection"),
                            new_object("vec4", vec![ident("position"), float(1.0)]),
                        ),
                    )))
                    .build(),
            )
            .build();

        assert_eq!(class.stage(), Some(Stage::Vertex));
        assert_eq!(class.fields.len(), 2);
        assert_eq!(class.fields[1].attributes[1].named("location"), Some(&AttrValue::Int(0)));
        assert_eq!(class.method("main").and_then(|m| m.body.as_ref()).map(|b| b.stmts.len()), Some(1));
    }

    #[test]
    fn test_constructor_and_bodyless_methods() {
        let ctor = MethodBuilder::constructor("Basic").build();
        assert!(ctor.is_constructor);
        assert!(ctor.return_type.is_none());

        let decl = MethodBuilder::new("helper").without_body().build();
        assert!(decl.body.is_none());
    }
}
