//! ASL syntax tree.
//!
//! The tree is a closed set of tagged unions. Constructs that cannot be
//! translated to GLSL still get their own variants so the back end can
//! reject them by name instead of failing to parse.

use asl_core::Stage;

use crate::lexer::Span;

/// A parsed source file: one or more classes.
#[derive(Debug, Clone, Default)]
pub struct SourceFile {
    pub classes: Vec<ClassDecl>,
}

impl SourceFile {
    pub fn class(&self, name: &str) -> Option<&ClassDecl> {
        self.classes.iter().find(|c| c.name == name)
    }

    pub fn shaders(&self) -> impl Iterator<Item = &ClassDecl> {
        self.classes.iter().filter(|c| c.stage().is_some())
    }

    pub fn libraries(&self) -> impl Iterator<Item = &ClassDecl> {
        self.classes.iter().filter(|c| c.kind == ClassKind::Library)
    }
}

/// `[Name(arg, key = value)]`
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub args: Vec<AttributeArg>,
    pub span: Span,
}

impl Attribute {
    pub fn positional(&self) -> impl Iterator<Item = &AttrValue> {
        self.args.iter().filter_map(|a| match a {
            AttributeArg::Positional(v) => Some(v),
            AttributeArg::Named(..) => None,
        })
    }

    pub fn named(&self, key: &str) -> Option<&AttrValue> {
        self.args.iter().find_map(|a| match a {
            AttributeArg::Named(k, v) if k.eq_ignore_ascii_case(key) => Some(v),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeArg {
    Positional(AttrValue),
    Named(String, AttrValue),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    Bool(bool),
}

impl AttrValue {
    /// Textual form used when the value lands in GLSL source.
    pub fn to_text(&self) -> String {
        match self {
            AttrValue::Int(v) => v.to_string(),
            AttrValue::Float(v) => v.to_string(),
            AttrValue::Str(s) | AttrValue::Ident(s) => s.clone(),
            AttrValue::Bool(b) => b.to_string(),
        }
    }
}

/// Find an attribute by name in a declaration's attribute list.
pub fn find_attribute<'a>(attributes: &'a [Attribute], name: &str) -> Option<&'a Attribute> {
    attributes.iter().find(|a| a.name == name)
}

/// A type mention: `vec3`, `float[]`, `float*`.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeRef {
    pub name: String,
    pub array: bool,
    pub pointer: bool,
    pub span: Span,
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            array: false,
            pointer: false,
            span: Span::synthetic(),
        }
    }

    pub fn array_of(name: impl Into<String>) -> Self {
        Self {
            array: true,
            ..Self::named(name)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    Shader(Stage),
    /// A `static class` whose static methods are dependency functions.
    Library,
}

#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub name: String,
    pub kind: ClassKind,
    pub attributes: Vec<Attribute>,
    pub fields: Vec<FieldDecl>,
    pub structs: Vec<StructDecl>,
    pub methods: Vec<MethodDecl>,
    pub span: Span,
}

impl ClassDecl {
    pub fn stage(&self) -> Option<Stage> {
        match self.kind {
            ClassKind::Shader(stage) => Some(stage),
            ClassKind::Library => None,
        }
    }

    pub fn method(&self, name: &str) -> Option<&MethodDecl> {
        self.methods.iter().find(|m| m.name == name)
    }
}

#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub attributes: Vec<Attribute>,
    pub is_const: bool,
    pub ty: TypeRef,
    pub name: String,
    pub init: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct StructDecl {
    pub attributes: Vec<Attribute>,
    pub name: String,
    pub fields: Vec<FieldDecl>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct MethodDecl {
    pub attributes: Vec<Attribute>,
    /// Attributes written with the `return:` target.
    pub return_attributes: Vec<Attribute>,
    pub is_static: bool,
    /// `None` for constructors.
    pub return_type: Option<TypeRef>,
    pub name: String,
    pub params: Vec<Param>,
    /// `None` when the method is declared without a body.
    pub body: Option<Block>,
    pub is_constructor: bool,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamModifier {
    None,
    In,
    Out,
    Ref,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub attributes: Vec<Attribute>,
    pub modifier: ParamModifier,
    pub ty: TypeRef,
    pub name: String,
    pub default: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    pub stmts: Vec<Stmt>,
}

impl Block {
    pub fn new(stmts: Vec<Stmt>) -> Self {
        Self { stmts }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Declarator {
    pub name: String,
    pub init: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CaseLabel {
    Case(Expr),
    Default,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchSection {
    pub labels: Vec<CaseLabel>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    pub ty: Option<TypeRef>,
    pub name: Option<String>,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GotoTarget {
    Label(String),
    Case(Expr),
    Default,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Block(Block),
    Empty,
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    DoWhile {
        body: Box<Stmt>,
        cond: Expr,
    },
    For {
        init: Vec<Stmt>,
        cond: Option<Expr>,
        step: Vec<Expr>,
        body: Box<Stmt>,
    },
    Switch {
        scrutinee: Expr,
        sections: Vec<SwitchSection>,
    },
    Return(Option<Expr>),
    Break,
    Continue,
    Discard,
    VarDecl {
        is_const: bool,
        ty: TypeRef,
        declarators: Vec<Declarator>,
    },
    Expr(Expr),

    // Parsed but never translated.
    Try {
        body: Block,
        catches: Vec<CatchClause>,
        finally: Option<Block>,
        span: Span,
    },
    Throw(Option<Expr>, Span),
    Foreach {
        ty: TypeRef,
        name: String,
        iterable: Expr,
        body: Box<Stmt>,
        span: Span,
    },
    Lock {
        target: Expr,
        body: Box<Stmt>,
        span: Span,
    },
    Using {
        resource: Box<Stmt>,
        body: Box<Stmt>,
        span: Span,
    },
    Goto(GotoTarget, Span),
    Labeled {
        label: String,
        stmt: Box<Stmt>,
        span: Span,
    },
    Yield(Option<Expr>, Span),
    Unsafe(Block, Span),
    Fixed {
        decl: Box<Stmt>,
        body: Box<Stmt>,
        span: Span,
    },
    Attributed {
        attributes: Vec<Attribute>,
        stmt: Box<Stmt>,
        span: Span,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl AssignOp {
    pub fn symbol(self) -> &'static str {
        match self {
            AssignOp::Assign => "=",
            AssignOp::Add => "+=",
            AssignOp::Sub => "-=",
            AssignOp::Mul => "*=",
            AssignOp::Div => "/=",
            AssignOp::Rem => "%=",
            AssignOp::BitAnd => "&=",
            AssignOp::BitOr => "|=",
            AssignOp::BitXor => "^=",
            AssignOp::Shl => "<<=",
            AssignOp::Shr => ">>=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    BitOr,
    BitXor,
    BitAnd,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Shl,
    Shr,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::BitAnd => "&",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
        }
    }

    /// Binding strength; higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Or => 3,
            BinaryOp::And => 4,
            BinaryOp::BitOr => 5,
            BinaryOp::BitXor => 6,
            BinaryOp::BitAnd => 7,
            BinaryOp::Eq | BinaryOp::Ne => 8,
            BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge => 9,
            BinaryOp::Shl | BinaryOp::Shr => 10,
            BinaryOp::Add | BinaryOp::Sub => 11,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => 12,
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::Ne
                | BinaryOp::Lt
                | BinaryOp::Gt
                | BinaryOp::Le
                | BinaryOp::Ge
                | BinaryOp::Or
                | BinaryOp::And
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
    BitNot,
    PreInc,
    PreDec,
    PostInc,
    PostDec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTestOp {
    Is,
    As,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Bool(bool),
    Int(u64),
    Uint(u64),
    Float(f64),
    Double(f64),
    Str(String),
}

/// A call argument; `name` is set for `name: value` arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    pub name: Option<String>,
    pub value: Expr,
}

impl Arg {
    pub fn positional(value: Expr) -> Self {
        Self { name: None, value }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LambdaBody {
    Expr(Box<Expr>),
    Block(Block),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Assign {
        op: AssignOp,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    /// `name(args)` or `receiver.name(args)`.
    Call {
        receiver: Option<Box<Expr>>,
        name: String,
        args: Vec<Arg>,
    },
    Member {
        target: Box<Expr>,
        member: String,
    },
    /// `new T(args)`
    New {
        ty: TypeRef,
        args: Vec<Arg>,
    },
    /// `new T[n]`, `new T[] { ... }`
    NewArray {
        element: TypeRef,
        size: Option<Box<Expr>>,
        init: Option<Vec<Expr>>,
    },
    /// Bare `{ a, b }` array initializer.
    ArrayInit(Vec<Expr>),
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    Cast {
        ty: TypeRef,
        expr: Box<Expr>,
    },
    Conditional {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
    Ident(String),
    This,
    Literal(Literal),

    // Parsed but never translated.
    Base(Span),
    Null(Span),
    Lambda {
        params: Vec<String>,
        body: LambdaBody,
        span: Span,
    },
    Query(Span),
    TypeTest {
        op: TypeTestOp,
        expr: Box<Expr>,
        ty: TypeRef,
        span: Span,
    },
    TypeOf(TypeRef, Span),
    SizeOf(TypeRef, Span),
    Deref(Box<Expr>, Span),
    AddressOf(Box<Expr>, Span),
    PointerMember {
        target: Box<Expr>,
        member: String,
        span: Span,
    },
    StackAlloc {
        ty: TypeRef,
        size: Box<Expr>,
        span: Span,
    },
    AnonymousObject(Vec<(String, Expr)>, Span),
}

/// Shorthand constructors for assembling trees by hand.
pub mod build {
    use super::*;

    pub fn ident(name: &str) -> Expr {
        Expr::Ident(name.to_string())
    }

    pub fn float(value: f64) -> Expr {
        Expr::Literal(Literal::Float(value))
    }

    pub fn int(value: u64) -> Expr {
        Expr::Literal(Literal::Int(value))
    }

    pub fn uint(value: u64) -> Expr {
        Expr::Literal(Literal::Uint(value))
    }

    pub fn boolean(value: bool) -> Expr {
        Expr::Literal(Literal::Bool(value))
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn assign(target: Expr, value: Expr) -> Expr {
        Expr::Assign {
            op: AssignOp::Assign,
            target: Box::new(target),
            value: Box::new(value),
        }
    }

    pub fn call(name: &str, args: Vec<Expr>) -> Expr {
        Expr::Call {
            receiver: None,
            name: name.to_string(),
            args: args.into_iter().map(Arg::positional).collect(),
        }
    }

    pub fn static_call(receiver: &str, name: &str, args: Vec<Expr>) -> Expr {
        Expr::Call {
            receiver: Some(Box::new(ident(receiver))),
            name: name.to_string(),
            args: args.into_iter().map(Arg::positional).collect(),
        }
    }

    pub fn new_object(ty: &str, args: Vec<Expr>) -> Expr {
        Expr::New {
            ty: TypeRef::named(ty),
            args: args.into_iter().map(Arg::positional).collect(),
        }
    }

    pub fn member(target: Expr, member: &str) -> Expr {
        Expr::Member {
            target: Box::new(target),
            member: member.to_string(),
        }
    }

    pub fn local(ty: &str, name: &str, init: Option<Expr>) -> Stmt {
        Stmt::VarDecl {
            is_const: false,
            ty: TypeRef::named(ty),
            declarators: vec![Declarator {
                name: name.to_string(),
                init,
            }],
        }
    }

    pub fn expr_stmt(expr: Expr) -> Stmt {
        Stmt::Expr(expr)
    }

    pub fn ret(expr: Option<Expr>) -> Stmt {
        Stmt::Return(expr)
    }
}
