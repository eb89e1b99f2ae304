//! Light type inference over method bodies.
//!
//! Only as much typing as code generation needs: whether a remainder has
//! integral operands, whether an expression is an array, and which literal
//! suffix a bare integer constant takes in a floating context.

use std::collections::HashMap;

use asl_core::types::{self, TypeShape};
use asl_core::{AslError, AslResult, ScalarKind, Stage};
use asl_lang::ast::{find_attribute, ClassDecl, Expr, Literal, TypeRef, UnaryOp};

use crate::intrinsics::{self, ReturnRule};
use crate::model::{default_instance_name, Qualifier};

/// A type as far as inference tracks it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueType {
    /// Canonical GLSL spelling for vocabulary types, else the struct name.
    pub name: String,
    pub array: bool,
}

impl ValueType {
    pub fn named(name: &str) -> Self {
        let name = types::lookup(name).map(|t| t.name).unwrap_or(name);
        Self {
            name: name.to_string(),
            array: false,
        }
    }

    pub fn from_type_ref(ty: &TypeRef) -> Self {
        Self {
            array: ty.array,
            ..Self::named(&ty.name)
        }
    }

    pub fn array_of(name: &str) -> Self {
        Self {
            array: true,
            ..Self::named(name)
        }
    }

    fn shape(&self) -> Option<TypeShape> {
        if self.array {
            return None;
        }
        types::lookup(&self.name).map(|t| t.shape)
    }

    /// Component kind of a non-array scalar, vector or matrix.
    pub fn kind(&self) -> Option<ScalarKind> {
        match self.shape()? {
            TypeShape::Void | TypeShape::Sampler => None,
            _ => types::scalar_kind(&self.name),
        }
    }

    /// Component kind ignoring arrayness (`float[]` → `Float`).
    pub fn element_kind(&self) -> Option<ScalarKind> {
        Self::named(&self.name).kind()
    }

    pub fn is_integral(&self) -> bool {
        self.kind().is_some_and(ScalarKind::is_integral)
    }

    /// Type of `self[i]`.
    pub fn index(&self) -> Option<ValueType> {
        if self.array {
            return Some(Self::named(&self.name));
        }
        let kind = types::scalar_kind(&self.name)?;
        match self.shape()? {
            TypeShape::Vector(_) => Some(Self::named(kind.scalar_name())),
            TypeShape::Matrix { rows, .. } => {
                types::vector_of(kind, rows as usize).map(Self::named)
            }
            _ => None,
        }
    }
}

/// Kinds a bare integer literal adopts from its context.
pub fn literal_hint(ty: Option<&ValueType>) -> Option<ScalarKind> {
    match ty.and_then(ValueType::element_kind) {
        Some(kind @ (ScalarKind::Float | ScalarKind::Double | ScalarKind::Uint)) => Some(kind),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodSig {
    pub return_type: Option<ValueType>,
    pub params: Vec<ValueType>,
}

/// What a class declares, for resolving names inside its method bodies.
#[derive(Debug, Clone, Default)]
pub struct ClassContext {
    pub class_name: String,
    pub stage: Option<Stage>,
    /// Method name → every overload, in declaration order.
    pub methods: HashMap<String, Vec<MethodSig>>,
    /// Struct name → members in declaration order.
    pub structs: HashMap<String, Vec<(String, ValueType)>>,
    /// Fields and interface-block instance names.
    pub globals: HashMap<String, ValueType>,
}

impl ClassContext {
    pub fn from_class(class: &ClassDecl) -> Self {
        let mut ctx = ClassContext {
            class_name: class.name.clone(),
            stage: class.stage(),
            ..Default::default()
        };

        for decl in &class.structs {
            let members = decl
                .fields
                .iter()
                .map(|f| (f.name.clone(), ValueType::from_type_ref(&f.ty)))
                .collect();
            ctx.structs.insert(decl.name.clone(), members);

            let is_block = decl
                .attributes
                .iter()
                .any(|a| matches!(Qualifier::from_attribute(&a.name), Some(q) if q != Qualifier::BuiltIn));
            if is_block {
                let instance = find_attribute(&decl.attributes, "InstanceName")
                    .and_then(|a| a.positional().next())
                    .map(|v| v.to_text())
                    .unwrap_or_else(|| default_instance_name(&decl.name));
                ctx.globals.insert(instance, ValueType::named(&decl.name));
            }
        }

        for field in &class.fields {
            ctx.globals
                .insert(field.name.clone(), ValueType::from_type_ref(&field.ty));
        }

        for method in class.methods.iter().filter(|m| !m.is_constructor) {
            let sig = MethodSig {
                return_type: method
                    .return_type
                    .as_ref()
                    .filter(|t| t.name != "void")
                    .map(ValueType::from_type_ref),
                params: method
                    .params
                    .iter()
                    .map(|p| ValueType::from_type_ref(&p.ty))
                    .collect(),
            };
            ctx.methods.entry(method.name.clone()).or_default().push(sig);
        }
        ctx
    }

    /// The overload of `name` a call with these argument types selects:
    /// the only one with a matching arity, or else the only one whose
    /// parameters agree with every argument type that is known.
    pub fn select_overload(&self, name: &str, args: &[Option<ValueType>]) -> Option<&MethodSig> {
        let candidates: Vec<&MethodSig> = self
            .methods
            .get(name)?
            .iter()
            .filter(|sig| sig.params.len() == args.len())
            .collect();
        if let [only] = candidates.as_slice() {
            return Some(only);
        }
        let matching: Vec<&MethodSig> = candidates
            .into_iter()
            .filter(|sig| {
                sig.params
                    .iter()
                    .zip(args)
                    .all(|(param, arg)| arg.as_ref().map_or(true, |arg| arg == param))
            })
            .collect();
        match matching.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }

    pub fn is_struct(&self, name: &str) -> bool {
        self.structs.contains_key(name)
    }

    /// GLSL spelling of a declared type: vocabulary types translate, struct
    /// names of this class pass through, anything else is unknown.
    pub fn resolve_type(&self, name: &str) -> AslResult<String> {
        if self.is_struct(name) {
            return Ok(name.to_string());
        }
        types::to_target_type(name)
            .map(str::to_string)
            .map_err(|_| AslError::UnknownType(name.to_string()))
    }
}

/// Scoped local types layered over a [`ClassContext`].
pub struct TypeEnv<'a> {
    ctx: &'a ClassContext,
    scopes: Vec<HashMap<String, ValueType>>,
}

impl<'a> TypeEnv<'a> {
    pub fn new(ctx: &'a ClassContext) -> Self {
        Self {
            ctx,
            scopes: vec![HashMap::new()],
        }
    }

    pub fn push(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn pop(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    pub fn bind(&mut self, name: &str, ty: ValueType) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), ty);
        }
    }

    pub fn is_local(&self, name: &str) -> bool {
        self.scopes.iter().any(|s| s.contains_key(name))
    }

    pub fn lookup(&self, name: &str) -> Option<ValueType> {
        self.scopes
            .iter()
            .rev()
            .find_map(|s| s.get(name))
            .or_else(|| self.ctx.globals.get(name))
            .cloned()
    }

    /// Best-effort static type of `expr`; `None` when unknown.
    pub fn infer(&self, expr: &Expr) -> Option<ValueType> {
        match expr {
            Expr::Literal(lit) => match lit {
                Literal::Bool(_) => Some(ValueType::named("bool")),
                Literal::Int(_) => Some(ValueType::named("int")),
                Literal::Uint(_) => Some(ValueType::named("uint")),
                Literal::Float(_) => Some(ValueType::named("float")),
                Literal::Double(_) => Some(ValueType::named("double")),
                Literal::Str(_) => None,
            },
            Expr::Ident(name) => self.lookup(name),
            Expr::Member { target, member } => {
                if matches!(target.as_ref(), Expr::This) {
                    return self.ctx.globals.get(member).cloned();
                }
                let target = self.infer(target)?;
                if target.array {
                    return (member == "Length").then(|| ValueType::named("int"));
                }
                if let Some(members) = self.ctx.structs.get(&target.name) {
                    return members
                        .iter()
                        .find(|(name, _)| name == member)
                        .map(|(_, ty)| ty.clone());
                }
                let kind = target.kind()?;
                swizzle_len(member)
                    .and_then(|len| types::vector_of(kind, len))
                    .map(ValueType::named)
            }
            Expr::Index { target, .. } => self.infer(target)?.index(),
            Expr::Call {
                receiver,
                name,
                args,
            } => {
                let own = receiver.is_none() || matches!(receiver.as_deref(), Some(Expr::This));
                if !own {
                    return None;
                }
                if self.ctx.methods.contains_key(name) {
                    let arg_types: Vec<_> = args.iter().map(|a| self.infer(&a.value)).collect();
                    return self
                        .ctx
                        .select_overload(name, &arg_types)
                        .and_then(|sig| sig.return_type.clone());
                }
                if types::is_builtin_type(name) || self.ctx.is_struct(name) {
                    return Some(ValueType::named(name));
                }
                match intrinsics::return_rule(name) {
                    ReturnRule::FirstArg => self.infer(&args.first()?.value),
                    ReturnRule::ScalarOfFirst => {
                        let kind = self.infer(&args.first()?.value)?.kind()?;
                        Some(ValueType::named(kind.scalar_name()))
                    }
                    ReturnRule::Fixed(name) => Some(ValueType::named(name)),
                    ReturnRule::Unknown => None,
                }
            }
            Expr::New { ty, .. } | Expr::Cast { ty, .. } => Some(ValueType::from_type_ref(ty)),
            Expr::NewArray { element, .. } => Some(ValueType::array_of(&element.name)),
            Expr::Binary { op, lhs, rhs } => {
                if op.is_comparison() {
                    return Some(ValueType::named("bool"));
                }
                let lhs = self.infer(lhs)?;
                let rhs = self.infer(rhs)?;
                Some(combine(lhs, rhs))
            }
            Expr::Unary { op, operand } => match op {
                UnaryOp::Not => Some(ValueType::named("bool")),
                _ => self.infer(operand),
            },
            Expr::Conditional {
                then_expr,
                else_expr,
                ..
            } => self.infer(then_expr).or_else(|| self.infer(else_expr)),
            Expr::Assign { target, .. } => self.infer(target),
            _ => None,
        }
    }
}

/// Number of components a swizzle selects, if `member` is one.
fn swizzle_len(member: &str) -> Option<usize> {
    let len = member.len();
    if !(1..=4).contains(&len) {
        return None;
    }
    let sets = ["xyzw", "rgba", "stpq"];
    sets.iter()
        .any(|set| member.chars().all(|c| set.contains(c)))
        .then_some(len)
}

fn rank(kind: ScalarKind) -> u8 {
    match kind {
        ScalarKind::Bool => 0,
        ScalarKind::Int => 1,
        ScalarKind::Uint => 2,
        ScalarKind::Float => 3,
        ScalarKind::Double => 4,
    }
}

/// Result type of an arithmetic binary operation.
fn combine(lhs: ValueType, rhs: ValueType) -> ValueType {
    if lhs == rhs {
        return lhs;
    }
    match (lhs.shape(), rhs.shape()) {
        (Some(TypeShape::Matrix { .. }), Some(TypeShape::Vector(_))) => rhs,
        (Some(TypeShape::Vector(_)), Some(TypeShape::Matrix { .. })) => lhs,
        (Some(TypeShape::Scalar), Some(TypeShape::Scalar)) => {
            match (lhs.kind(), rhs.kind()) {
                (Some(l), Some(r)) if rank(r) > rank(l) => rhs,
                _ => lhs,
            }
        }
        (Some(TypeShape::Scalar), _) => rhs,
        _ => lhs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asl_lang::ast::build::*;
    use asl_lang::ast::BinaryOp;
    use asl_lang::parse_source;

    fn context() -> ClassContext {
        let source = parse_source(
            r#"class T : FragmentShader {
                [Uniform] int count;
                [Uniform] vec3 tint;
                [Uniform, ArraySize(4)] float[] weights;
                [Uniform] struct Material { vec4 albedo; float roughness; }
                float shade(vec3 n) { return 0.0; }
                void main() { }
            }"#,
            "t.asl",
        )
        .unwrap();
        ClassContext::from_class(&source.classes[0])
    }

    #[test]
    fn test_infers_fields_swizzles_and_blocks() {
        let ctx = context();
        let env = TypeEnv::new(&ctx);
        assert_eq!(env.infer(&ident("count")), Some(ValueType::named("int")));
        assert_eq!(env.infer(&member(ident("tint"), "xy")), Some(ValueType::named("vec2")));
        assert_eq!(
            env.infer(&member(ident("material"), "roughness")),
            Some(ValueType::named("float"))
        );
        assert!(env.infer(&ident("weights")).unwrap().array);
    }

    #[test]
    fn test_integral_remainder_operands() {
        let ctx = context();
        let mut env = TypeEnv::new(&ctx);
        env.bind("i", ValueType::named("Int32"));
        let sum = binary(BinaryOp::Add, ident("i"), ident("count"));
        assert!(env.infer(&sum).unwrap().is_integral());
        let mixed = binary(BinaryOp::Mul, ident("i"), float(2.0));
        assert_eq!(env.infer(&mixed), Some(ValueType::named("float")));
    }

    #[test]
    fn test_calls_and_matrix_products() {
        let ctx = context();
        let mut env = TypeEnv::new(&ctx);
        assert_eq!(env.infer(&call("shade", vec![ident("tint")])), Some(ValueType::named("float")));
        assert_eq!(env.infer(&call("dot", vec![ident("tint"), ident("tint")])), Some(ValueType::named("float")));
        env.bind("m", ValueType::named("mat4"));
        env.bind("v", ValueType::named("vec4"));
        let product = binary(BinaryOp::Mul, ident("m"), ident("v"));
        assert_eq!(env.infer(&product), Some(ValueType::named("vec4")));
        assert_eq!(env.infer(&call("unknownFn", vec![])), None);
    }

    #[test]
    fn test_overloads_selected_by_argument_types() {
        let source = parse_source(
            r#"class T : FragmentShader {
                float f(float a) { return a; }
                int f(int a) { return a; }
                vec3 g(vec3 v, float s) { return v * s; }
                void main() { }
            }"#,
            "t.asl",
        )
        .unwrap();
        let ctx = ClassContext::from_class(&source.classes[0]);
        assert_eq!(ctx.methods["f"].len(), 2);

        let env = TypeEnv::new(&ctx);
        assert_eq!(env.infer(&call("f", vec![int(1)])), Some(ValueType::named("int")));
        assert_eq!(env.infer(&call("f", vec![float(1.0)])), Some(ValueType::named("float")));
        assert_eq!(env.infer(&call("f", vec![ident("unknown")])), None);
        assert_eq!(
            env.infer(&call("g", vec![ident("unknown"), int(2)])),
            Some(ValueType::named("vec3"))
        );
    }

    #[test]
    fn test_literal_hint() {
        assert_eq!(literal_hint(Some(&ValueType::named("vec3"))), Some(ScalarKind::Float));
        assert_eq!(literal_hint(Some(&ValueType::named("uint"))), Some(ScalarKind::Uint));
        assert_eq!(literal_hint(Some(&ValueType::named("int"))), None);
        assert_eq!(literal_hint(None), None);
    }
}
