//! GLSL code generation: syntax tree → function text.
//!
//! One match arm per node kind. Constructs outside the translatable subset
//! fail with [`AslError::UnsupportedConstruct`] naming the construct; nothing
//! is emitted for a function that fails.

use asl_core::{types, AslError, AslResult, Construct, ScalarKind, Stage};
use asl_lang::ast::*;
use asl_lang::lexer::Span;

use crate::intrinsics::{self, ReturnRule};
use crate::model::FunctionDependency;
use crate::recover::SyntaxTree;
use crate::typing::{literal_hint, ClassContext, TypeEnv, ValueType};

const PREC_ASSIGN: u8 = 1;
const PREC_CONDITIONAL: u8 = 2;
const PREC_UNARY: u8 = 14;
const PREC_POSTFIX: u8 = 15;

/// Generated text for one function.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedFunction {
    pub name: String,
    pub is_entry_point: bool,
    pub arity: usize,
    pub text: String,
    /// Non-intrinsic functions outside this class, in first-use order.
    pub dependencies: Vec<FunctionDependency>,
    /// Methods of the same class this function calls, in first-use order.
    pub calls: Vec<String>,
}

/// Generate the GLSL function for a normalized syntax tree.
pub fn generate(tree: &SyntaxTree, ctx: &ClassContext, indent: &str) -> AslResult<GeneratedFunction> {
    let mut gen = Generator::new(ctx, indent, &tree.method);
    gen.function(tree)?;
    tracing::trace!(
        method = %tree.method,
        dependencies = gen.dependencies.len(),
        "generated function"
    );
    Ok(GeneratedFunction {
        name: tree.method.clone(),
        is_entry_point: tree.is_entry_point(),
        arity: tree.params.len(),
        text: gen.out,
        dependencies: gen.dependencies,
        calls: gen.calls,
    })
}

/// Render a field initializer (constants and globals) for a field of type `ty`.
pub fn initializer(expr: &Expr, ty: &ValueType, ctx: &ClassContext, owner: &str) -> AslResult<String> {
    let mut gen = Generator::new(ctx, "", owner);
    let text = if ty.array {
        let glsl = ctx.resolve_type(&ty.name)?;
        let (_, init) = gen.array_parts(&glsl, literal_hint(Some(ty)), Some(expr), owner)?;
        init.unwrap_or_default()
    } else {
        gen.expr_hinted(expr, PREC_ASSIGN, literal_hint(Some(ty)))?
    };
    if let Some(dep) = gen.dependencies.first() {
        return Err(AslError::InvalidArgument(format!(
            "initializer of '{}' calls '{}'; only intrinsics are allowed in field initializers",
            owner, dep.qualified_name
        )));
    }
    Ok(text)
}

/// Element count of an array initializer, if it has one.
pub fn initializer_len(expr: &Expr) -> Option<usize> {
    match expr {
        Expr::ArrayInit(items) => Some(items.len()),
        Expr::NewArray { init: Some(items), .. } => Some(items.len()),
        Expr::NewArray {
            size: Some(size), ..
        } => match size.as_ref() {
            Expr::Literal(Literal::Int(n)) | Expr::Literal(Literal::Uint(n)) => Some(*n as usize),
            _ => None,
        },
        _ => None,
    }
}

struct Generator<'a> {
    ctx: &'a ClassContext,
    indent: &'a str,
    env: TypeEnv<'a>,
    method: String,
    return_type: Option<ValueType>,
    dependencies: Vec<FunctionDependency>,
    calls: Vec<String>,
    out: String,
    depth: usize,
}

impl<'a> Generator<'a> {
    fn new(ctx: &'a ClassContext, indent: &'a str, method: &str) -> Self {
        Self {
            ctx,
            indent,
            env: TypeEnv::new(ctx),
            method: method.to_string(),
            return_type: None,
            dependencies: Vec::new(),
            calls: Vec::new(),
            out: String::new(),
            depth: 0,
        }
    }

    fn context(&self) -> String {
        format!("in {}.{}", self.ctx.class_name, self.method)
    }

    fn at(&self, span: Span) -> String {
        format!("in {}.{} at line {}", self.ctx.class_name, self.method, span.line)
    }

    fn reject(&self, construct: Construct, span: Span) -> AslError {
        AslError::unsupported(construct, self.at(span))
    }

    fn reject_here(&self, construct: Construct) -> AslError {
        AslError::unsupported(construct, self.context())
    }

    fn line(&mut self, text: &str) {
        for _ in 0..self.depth {
            self.out.push_str(self.indent);
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    // ── Signature ───────────────────────────────────────────────────

    fn array_size_attr(&self, attributes: &[Attribute], what: &str) -> AslResult<Option<String>> {
        for attribute in attributes {
            if attribute.name != "ArraySize" {
                return Err(AslError::Attribute(format!(
                    "attribute '{}' is not valid on {} {}",
                    attribute.name,
                    what,
                    self.context()
                )));
            }
        }
        Ok(find_attribute(attributes, "ArraySize")
            .and_then(|a| a.positional().next())
            .map(AttrValue::to_text))
    }

    fn function(&mut self, tree: &SyntaxTree) -> AslResult<()> {
        let return_size = self.array_size_attr(&tree.return_attributes, "the return value")?;
        let return_text = match &tree.return_type {
            None => "void".to_string(),
            Some(ty) if ty.pointer => return Err(self.reject(Construct::Pointers, ty.span)),
            Some(ty) => {
                let glsl = self.ctx.resolve_type(&ty.name)?;
                match (ty.array, return_size) {
                    (true, Some(size)) => format!("{}[{}]", glsl, size),
                    (true, None) => {
                        return Err(AslError::MissingArraySize(format!(
                            "array return value of {} needs [return: ArraySize(n)]",
                            self.context()
                        )))
                    }
                    (false, _) => glsl,
                }
            }
        };
        self.return_type = tree
            .return_type
            .as_ref()
            .filter(|t| t.name != "void")
            .map(ValueType::from_type_ref);

        let mut params = Vec::new();
        for param in &tree.params {
            if param.default.is_some() {
                return Err(self.reject(Construct::DefaultArguments, param.span));
            }
            if param.ty.pointer {
                return Err(self.reject(Construct::Pointers, param.span));
            }
            let size = self.array_size_attr(&param.attributes, &format!("parameter '{}'", param.name))?;
            let glsl = self.ctx.resolve_type(&param.ty.name)?;
            let declarator = match (param.ty.array, size) {
                (true, Some(size)) => format!("{}[{}]", param.name, size),
                (true, None) => {
                    return Err(AslError::MissingArraySize(format!(
                        "array parameter '{}' {} needs [ArraySize(n)]",
                        param.name,
                        self.context()
                    )))
                }
                (false, _) => param.name.clone(),
            };
            let modifier = match param.modifier {
                ParamModifier::None => "",
                ParamModifier::In => "in ",
                ParamModifier::Out => "out ",
                ParamModifier::Ref => "inout ",
            };
            params.push(format!("{}{} {}", modifier, glsl, declarator));
            self.env.bind(&param.name, ValueType::from_type_ref(&param.ty));
        }

        self.line(&format!("{} {}({}) {{", return_text, tree.method, params.join(", ")));
        self.depth += 1;
        for stmt in &tree.body.stmts {
            self.stmt(stmt)?;
        }
        self.depth -= 1;
        self.line("}");
        Ok(())
    }

    // ── Statements ──────────────────────────────────────────────────

    /// Emit a nested statement inside its own scope, one level deeper.
    fn body(&mut self, stmt: &Stmt) -> AslResult<()> {
        self.depth += 1;
        self.env.push();
        match stmt {
            Stmt::Block(block) => {
                for s in &block.stmts {
                    self.stmt(s)?;
                }
            }
            other => self.stmt(other)?,
        }
        self.env.pop();
        self.depth -= 1;
        Ok(())
    }

    fn stmt(&mut self, stmt: &Stmt) -> AslResult<()> {
        match stmt {
            Stmt::Block(_) => {
                self.line("{");
                self.body(stmt)?;
                self.line("}");
            }
            Stmt::Empty => {}
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let cond = self.expr(cond, 0)?;
                self.line(&format!("if ({}) {{", cond));
                self.body(then_branch)?;
                let mut next = else_branch.as_deref();
                while let Some(branch) = next {
                    match branch {
                        Stmt::If {
                            cond,
                            then_branch,
                            else_branch,
                        } => {
                            let cond = self.expr(cond, 0)?;
                            self.line(&format!("}} else if ({}) {{", cond));
                            self.body(then_branch)?;
                            next = else_branch.as_deref();
                        }
                        other => {
                            self.line("} else {");
                            self.body(other)?;
                            next = None;
                        }
                    }
                }
                self.line("}");
            }
            Stmt::While { cond, body } => {
                let cond = self.expr(cond, 0)?;
                self.line(&format!("while ({}) {{", cond));
                self.body(body)?;
                self.line("}");
            }
            Stmt::DoWhile { body, cond } => {
                self.line("do {");
                self.body(body)?;
                let cond = self.expr(cond, 0)?;
                self.line(&format!("}} while ({});", cond));
            }
            Stmt::For {
                init,
                cond,
                step,
                body,
            } => {
                self.env.push();
                let mut init_parts = Vec::new();
                for s in init {
                    match s {
                        Stmt::VarDecl {
                            is_const,
                            ty,
                            declarators,
                        } => init_parts.push(self.declaration(*is_const, ty, declarators)?),
                        Stmt::Expr(e) => init_parts.push(self.expr(e, 0)?),
                        _ => {
                            return Err(AslError::InvalidArgument(format!(
                                "unsupported for-loop initializer {}",
                                self.context()
                            )))
                        }
                    }
                }
                let cond = match cond {
                    Some(c) => format!(" {}", self.expr(c, 0)?),
                    None => String::new(),
                };
                let mut steps = Vec::new();
                for e in step {
                    steps.push(self.expr(e, 0)?);
                }
                let step = if steps.is_empty() {
                    String::new()
                } else {
                    format!(" {}", steps.join(", "))
                };
                self.line(&format!("for ({};{};{}) {{", init_parts.join(", "), cond, step));
                self.body(body)?;
                self.line("}");
                self.env.pop();
            }
            Stmt::Switch {
                scrutinee,
                sections,
            } => {
                let scrutinee = self.expr(scrutinee, 0)?;
                self.line(&format!("switch ({}) {{", scrutinee));
                self.env.push();
                for section in sections {
                    for label in &section.labels {
                        match label {
                            CaseLabel::Case(e) => {
                                let value = self.expr(e, 0)?;
                                self.line(&format!("case {}:", value));
                            }
                            CaseLabel::Default => self.line("default:"),
                        }
                    }
                    self.depth += 1;
                    for s in &section.body {
                        self.stmt(s)?;
                    }
                    self.depth -= 1;
                }
                self.env.pop();
                self.line("}");
            }
            Stmt::Return(None) => self.line("return;"),
            Stmt::Return(Some(e)) => {
                let hint = literal_hint(self.return_type.as_ref());
                let value = self.expr_hinted(e, 0, hint)?;
                self.line(&format!("return {};", value));
            }
            Stmt::Break => self.line("break;"),
            Stmt::Continue => self.line("continue;"),
            Stmt::Discard => {
                if self.ctx.stage.is_some_and(|s| s != Stage::Fragment) {
                    return Err(AslError::InvalidArgument(format!(
                        "discard is only valid in fragment shaders ({})",
                        self.context()
                    )));
                }
                self.line("discard;");
            }
            Stmt::VarDecl {
                is_const,
                ty,
                declarators,
            } => {
                let decl = self.declaration(*is_const, ty, declarators)?;
                self.line(&format!("{};", decl));
            }
            Stmt::Expr(e) => {
                let text = self.expr(e, 0)?;
                let verbatim = text.ends_with(';') || text.ends_with('}');
                if is_passthrough(e) && verbatim {
                    self.line(&text);
                } else {
                    self.line(&format!("{};", text));
                }
            }

            Stmt::Try { span, .. } | Stmt::Throw(_, span) => {
                return Err(self.reject(Construct::Exceptions, *span))
            }
            Stmt::Foreach { span, .. } => return Err(self.reject(Construct::Foreach, *span)),
            Stmt::Lock { span, .. } => return Err(self.reject(Construct::Lock, *span)),
            Stmt::Using { span, .. } => return Err(self.reject(Construct::Using, *span)),
            Stmt::Goto(_, span) => return Err(self.reject(Construct::Goto, *span)),
            Stmt::Labeled { span, .. } => return Err(self.reject(Construct::Labels, *span)),
            Stmt::Yield(_, span) => return Err(self.reject(Construct::Iterators, *span)),
            Stmt::Unsafe(_, span) => return Err(self.reject(Construct::Unsafe, *span)),
            Stmt::Fixed { span, .. } => return Err(self.reject(Construct::Fixed, *span)),
            Stmt::Attributed { span, .. } => return Err(self.reject(Construct::Attributes, *span)),
        }
        Ok(())
    }

    /// `T a = x, b` without the trailing semicolon. Binds each name after
    /// its initializer is rendered.
    fn declaration(&mut self, is_const: bool, ty: &TypeRef, declarators: &[Declarator]) -> AslResult<String> {
        if ty.pointer {
            return Err(self.reject(Construct::Pointers, ty.span));
        }
        let value_type = if ty.name == "var" {
            let init = declarators.first().and_then(|d| d.init.as_ref());
            match init.and_then(|init| self.env.infer(init)) {
                Some(value_type) => value_type,
                None => {
                    // A rejected construct in the initializer is reported as itself.
                    if let Some(init) = init {
                        self.expr(init, 0)?;
                    }
                    return Err(AslError::UnknownType(format!(
                        "'var' with no inferable type {}",
                        self.context()
                    )));
                }
            }
        } else {
            ValueType::from_type_ref(ty)
        };
        let glsl = self.ctx.resolve_type(&value_type.name)?;
        let hint = literal_hint(Some(&value_type));

        let mut parts = Vec::new();
        for d in declarators {
            let is_array = value_type.array
                || matches!(d.init, Some(Expr::ArrayInit(_)) | Some(Expr::NewArray { .. }));
            if is_array {
                let (size, init) = self.array_parts(&glsl, hint, d.init.as_ref(), &d.name)?;
                let mut part = format!("{}[{}]", d.name, size);
                if let Some(init) = init {
                    part.push_str(" = ");
                    part.push_str(&init);
                }
                parts.push(part);
                self.env.bind(&d.name, ValueType::array_of(&value_type.name));
            } else {
                match &d.init {
                    Some(init) => {
                        let value = self.expr_hinted(init, PREC_ASSIGN, hint)?;
                        parts.push(format!("{} = {}", d.name, value));
                    }
                    None => parts.push(d.name.clone()),
                }
                self.env.bind(&d.name, value_type.clone());
            }
        }
        let prefix = if is_const { "const " } else { "" };
        Ok(format!("{}{} {}", prefix, glsl, parts.join(", ")))
    }

    /// Size token and optional `T[n](...)` initializer for an array declarator.
    fn array_parts(
        &mut self,
        element: &str,
        hint: Option<ScalarKind>,
        init: Option<&Expr>,
        name: &str,
    ) -> AslResult<(String, Option<String>)> {
        match init {
            Some(Expr::ArrayInit(items)) | Some(Expr::NewArray { init: Some(items), .. }) => {
                if items.is_empty() {
                    return Err(AslError::InvalidArgument(format!(
                        "array '{}' has an empty initializer {}",
                        name,
                        self.context()
                    )));
                }
                let size = items.len().to_string();
                let ctor = self.array_constructor(element, hint, items)?;
                Ok((size, Some(ctor)))
            }
            Some(Expr::NewArray {
                size: Some(size), ..
            }) => Ok((self.expr(size, 0)?, None)),
            // Sized implicitly by the initializer.
            Some(other) => Ok((String::new(), Some(self.expr(other, PREC_ASSIGN)?))),
            None => Err(AslError::MissingArraySize(format!(
                "local array '{}' {} has neither a size nor an initializer",
                name,
                self.context()
            ))),
        }
    }

    fn array_constructor(&mut self, element: &str, hint: Option<ScalarKind>, items: &[Expr]) -> AslResult<String> {
        let mut values = Vec::with_capacity(items.len());
        for item in items {
            values.push(self.expr_hinted(item, 0, hint)?);
        }
        Ok(format!("{}[{}]({})", element, items.len(), values.join(", ")))
    }

    // ── Expressions ─────────────────────────────────────────────────

    fn expr(&mut self, e: &Expr, prec: u8) -> AslResult<String> {
        self.expr_hinted(e, prec, None)
    }

    /// Render `e`, parenthesized if it binds looser than `prec`. `hint` is
    /// the scalar kind an integer literal should take in this position.
    fn expr_hinted(&mut self, e: &Expr, prec: u8, hint: Option<ScalarKind>) -> AslResult<String> {
        let (text, own) = self.render(e, hint)?;
        Ok(if own < prec { format!("({})", text) } else { text })
    }

    fn render(&mut self, e: &Expr, hint: Option<ScalarKind>) -> AslResult<(String, u8)> {
        let rendered = match e {
            Expr::Literal(lit) => (self.literal(lit, hint)?, PREC_POSTFIX),
            Expr::Ident(name) => (name.clone(), PREC_POSTFIX),
            Expr::This => {
                return Err(AslError::UnsupportedMember(format!(
                    "'this' can only be used to access members {}",
                    self.context()
                )))
            }
            Expr::Assign { op, target, value } => {
                let target_type = self.env.infer(target);
                let hint = literal_hint(target_type.as_ref());
                let lhs = self.expr(target, PREC_UNARY)?;
                if *op == AssignOp::Rem && !self.integral_pair(target, value) {
                    let rhs = self.expr_hinted(value, 0, hint)?;
                    (format!("{} = mod({}, {})", lhs, lhs, rhs), PREC_ASSIGN)
                } else {
                    let rhs = self.expr_hinted(value, PREC_ASSIGN, hint)?;
                    (format!("{} {} {}", lhs, op.symbol(), rhs), PREC_ASSIGN)
                }
            }
            Expr::Binary { op, lhs, rhs } => {
                let shift = matches!(op, BinaryOp::Shl | BinaryOp::Shr);
                let (lhs_hint, rhs_hint) = if shift {
                    (None, None)
                } else {
                    (
                        literal_hint(self.env.infer(rhs).as_ref()),
                        literal_hint(self.env.infer(lhs).as_ref()),
                    )
                };
                if *op == BinaryOp::Rem && !self.integral_pair(lhs, rhs) {
                    let l = self.expr_hinted(lhs, 0, lhs_hint)?;
                    let r = self.expr_hinted(rhs, 0, rhs_hint)?;
                    (format!("mod({}, {})", l, r), PREC_POSTFIX)
                } else {
                    let p = op.precedence();
                    let l = self.expr_hinted(lhs, p, lhs_hint)?;
                    let r = self.expr_hinted(rhs, p + 1, rhs_hint)?;
                    (format!("{} {} {}", l, op.symbol(), r), p)
                }
            }
            Expr::Unary { op, operand } => self.unary(*op, operand, hint)?,
            Expr::Conditional {
                cond,
                then_expr,
                else_expr,
            } => {
                let hint = hint
                    .or_else(|| literal_hint(self.env.infer(then_expr).as_ref()))
                    .or_else(|| literal_hint(self.env.infer(else_expr).as_ref()));
                let c = self.expr(cond, PREC_CONDITIONAL + 1)?;
                let a = self.expr_hinted(then_expr, PREC_CONDITIONAL, hint)?;
                let b = self.expr_hinted(else_expr, PREC_CONDITIONAL, hint)?;
                (format!("{} ? {} : {}", c, a, b), PREC_CONDITIONAL)
            }
            Expr::Call {
                receiver,
                name,
                args,
            } => (self.call(receiver.as_deref(), name, args)?, PREC_POSTFIX),
            Expr::Member { target, member } => (self.member(target, member)?, PREC_POSTFIX),
            Expr::New { ty, args } => (self.construct(ty, args)?, PREC_POSTFIX),
            Expr::NewArray { element, init, .. } => match init {
                Some(items) => {
                    let glsl = self.ctx.resolve_type(&element.name)?;
                    let hint = types::scalar_kind(&glsl).and_then(|k| {
                        literal_hint(Some(&ValueType::named(k.scalar_name())))
                    });
                    (self.array_constructor(&glsl, hint, items)?, PREC_POSTFIX)
                }
                None => {
                    return Err(AslError::InvalidArgument(format!(
                        "array creation without an initializer is only valid in a declaration {}",
                        self.context()
                    )))
                }
            },
            Expr::ArrayInit(_) => {
                return Err(AslError::InvalidArgument(format!(
                    "array initializer is only valid in a declaration {}",
                    self.context()
                )))
            }
            Expr::Index { target, index } => {
                let t = self.expr(target, PREC_POSTFIX)?;
                let i = self.expr(index, 0)?;
                (format!("{}[{}]", t, i), PREC_POSTFIX)
            }
            Expr::Cast { ty, expr } => {
                if ty.pointer {
                    return Err(self.reject(Construct::Pointers, ty.span));
                }
                let glsl = self.ctx.resolve_type(&ty.name)?;
                let hint = literal_hint(Some(&ValueType::named(&glsl)));
                let inner = self.expr_hinted(expr, 0, hint)?;
                (format!("{}({})", glsl, inner), PREC_POSTFIX)
            }

            Expr::Base(span) => return Err(self.reject(Construct::BaseAccess, *span)),
            Expr::Null(span) => return Err(self.reject(Construct::Null, *span)),
            Expr::Lambda { span, .. } => return Err(self.reject(Construct::Lambdas, *span)),
            Expr::Query(span) => return Err(self.reject(Construct::Queries, *span)),
            Expr::TypeTest { span, .. } => return Err(self.reject(Construct::TypeTests, *span)),
            Expr::TypeOf(_, span) => return Err(self.reject(Construct::TypeOf, *span)),
            Expr::SizeOf(_, span) => return Err(self.reject(Construct::SizeOf, *span)),
            Expr::Deref(_, span) | Expr::AddressOf(_, span) | Expr::PointerMember { span, .. } => {
                return Err(self.reject(Construct::Pointers, *span))
            }
            Expr::StackAlloc { span, .. } => return Err(self.reject(Construct::StackAlloc, *span)),
            Expr::AnonymousObject(_, span) => {
                return Err(self.reject(Construct::AnonymousTypes, *span))
            }
        };
        Ok(rendered)
    }

    fn integral_pair(&self, lhs: &Expr, rhs: &Expr) -> bool {
        let integral = |e: &Expr| self.env.infer(e).is_some_and(|t| t.is_integral());
        integral(lhs) && integral(rhs)
    }

    fn literal(&self, lit: &Literal, hint: Option<ScalarKind>) -> AslResult<String> {
        let text = match lit {
            Literal::Bool(b) => b.to_string(),
            Literal::Int(v) => match hint {
                Some(ScalarKind::Float) => self.float_text(*v as f64, "f")?,
                Some(ScalarKind::Double) => self.float_text(*v as f64, "lf")?,
                Some(ScalarKind::Uint) => format!("{}u", v),
                _ => v.to_string(),
            },
            Literal::Uint(v) => format!("{}u", v),
            Literal::Float(v) => match hint {
                Some(ScalarKind::Double) => self.float_text(*v, "lf")?,
                _ => self.float_text(*v, "f")?,
            },
            Literal::Double(v) => self.float_text(*v, "lf")?,
            Literal::Str(_) => return Err(self.reject_here(Construct::Strings)),
        };
        Ok(text)
    }

    /// Always carries a fractional part or exponent, then `suffix`.
    fn float_text(&self, value: f64, suffix: &str) -> AslResult<String> {
        if !value.is_finite() {
            return Err(AslError::InvalidArgument(format!(
                "non-finite literal {} {}",
                value,
                self.context()
            )));
        }
        let mut text = format!("{}", value);
        if !text.contains('.') && !text.contains('e') {
            text.push_str(".0");
        }
        text.push_str(suffix);
        Ok(text)
    }

    fn unary(&mut self, op: UnaryOp, operand: &Expr, hint: Option<ScalarKind>) -> AslResult<(String, u8)> {
        let rendered = match op {
            UnaryOp::PostInc | UnaryOp::PostDec => {
                let o = self.expr(operand, PREC_POSTFIX)?;
                let sym = if op == UnaryOp::PostInc { "++" } else { "--" };
                (format!("{}{}", o, sym), PREC_POSTFIX)
            }
            _ => {
                let (sym, hint) = match op {
                    UnaryOp::Neg => ("-", hint),
                    UnaryOp::Plus => ("+", hint),
                    UnaryOp::Not => ("!", None),
                    UnaryOp::BitNot => ("~", None),
                    UnaryOp::PreInc => ("++", None),
                    _ => ("--", None),
                };
                let mut o = self.expr_hinted(operand, PREC_UNARY, hint)?;
                // Keep `- -x` from fusing into `--x`.
                if o.starts_with(['-', '+']) {
                    o = format!("({})", o);
                }
                (format!("{}{}", sym, o), PREC_UNARY)
            }
        };
        Ok(rendered)
    }

    fn member(&mut self, target: &Expr, member: &str) -> AslResult<String> {
        if matches!(target, Expr::This) {
            return Ok(member.to_string());
        }
        let target_type = self.env.infer(target);
        let t = self.expr(target, PREC_POSTFIX)?;
        if target_type.is_some_and(|ty| ty.array) {
            return match member {
                "Length" | "LongLength" => Ok(format!("{}.length()", t)),
                _ => Err(AslError::UnsupportedMember(format!(
                    "'{}' on array '{}' {}; only Length is supported",
                    member,
                    t,
                    self.context()
                ))),
            };
        }
        Ok(format!("{}.{}", t, member))
    }

    fn args(&mut self, args: &[Arg], hints: &[Option<ScalarKind>]) -> AslResult<String> {
        let mut values = Vec::with_capacity(args.len());
        for (i, arg) in args.iter().enumerate() {
            let hint = hints.get(i).copied().flatten();
            values.push(self.expr_hinted(&arg.value, 0, hint)?);
        }
        Ok(values.join(", "))
    }

    /// `new T(args)` and `T(args)` for vocabulary types and structs.
    fn construct(&mut self, ty: &TypeRef, args: &[Arg]) -> AslResult<String> {
        if args.iter().any(|a| a.name.is_some()) {
            return Err(self.reject(Construct::NamedArguments, ty.span));
        }
        if let Some(members) = self.ctx.structs.get(&ty.name) {
            if args.is_empty() {
                return Err(AslError::InvalidArgument(format!(
                    "struct '{}' must be constructed with a value for every member {}",
                    ty.name,
                    self.context()
                )));
            }
            let hints: Vec<_> = members.iter().map(|(_, t)| literal_hint(Some(t))).collect();
            let values = self.args(args, &hints)?;
            return Ok(format!("{}({})", ty.name, values));
        }
        let builtin = types::lookup(&ty.name).ok_or_else(|| AslError::UnknownType(ty.name.clone()))?;
        if builtin.is_sampler() {
            return Err(AslError::InvalidArgument(format!(
                "sampler '{}' cannot be constructed {}",
                builtin.name,
                self.context()
            )));
        }
        let hint = literal_hint(Some(&ValueType::named(builtin.name)));
        if args.is_empty() {
            let zero = match builtin.kind {
                Some(ScalarKind::Bool) => "false".to_string(),
                Some(kind) => self.literal(&Literal::Int(0), literal_hint(Some(&ValueType::named(kind.scalar_name()))))?,
                None => {
                    return Err(AslError::UnknownType(format!("'{}' cannot be constructed", builtin.name)))
                }
            };
            return Ok(format!("{}({})", builtin.name, zero));
        }
        let values = self.args(args, &vec![hint; args.len()])?;
        Ok(format!("{}({})", builtin.name, values))
    }

    fn passthrough(&self, args: &[Arg]) -> AslResult<String> {
        match args {
            [Arg {
                name: None,
                value: Expr::Literal(Literal::Str(text)),
            }] => Ok(text.clone()),
            _ => Err(AslError::InvalidArgument(format!(
                "{}() takes a single string literal {}",
                intrinsics::PASSTHROUGH,
                self.context()
            ))),
        }
    }

    fn record_dependency(&mut self, dep: FunctionDependency) {
        if !self.dependencies.contains(&dep) {
            self.dependencies.push(dep);
        }
    }

    fn own_call(&mut self, name: &str, args: &[Arg]) -> AslResult<String> {
        if !self.calls.iter().any(|c| c == name) {
            self.calls.push(name.to_string());
        }
        let arg_types: Vec<_> = args.iter().map(|a| self.env.infer(&a.value)).collect();
        let hints: Vec<_> = self
            .ctx
            .select_overload(name, &arg_types)
            .map(|sig| sig.params.iter().map(|p| literal_hint(Some(p))).collect())
            .unwrap_or_default();
        let values = self.args(args, &hints)?;
        Ok(format!("{}({})", name, values))
    }

    fn intrinsic_call(&mut self, name: &str, args: &[Arg]) -> AslResult<String> {
        let hint = match intrinsics::return_rule(name) {
            ReturnRule::FirstArg | ReturnRule::ScalarOfFirst => args
                .iter()
                .find_map(|a| literal_hint(self.env.infer(&a.value).as_ref())),
            _ => None,
        };
        let integer = intrinsics::integer_params(name);
        let hints: Vec<_> = (0..args.len())
            .map(|i| if integer.contains(&i) { None } else { hint })
            .collect();
        let values = self.args(args, &hints)?;
        Ok(format!("{}({})", name, values))
    }

    /// Calls on the implicit receiver or the shader base class.
    fn unqualified_call(&mut self, name: &str, args: &[Arg]) -> AslResult<String> {
        if name == intrinsics::PASSTHROUGH {
            return self.passthrough(args);
        }
        if self.ctx.methods.contains_key(name) {
            return self.own_call(name, args);
        }
        if types::is_builtin_type(name) || self.ctx.is_struct(name) {
            return self.construct(&TypeRef::named(name), args);
        }
        if intrinsics::is_intrinsic(name) {
            return self.intrinsic_call(name, args);
        }
        let values = self.args(args, &[])?;
        self.record_dependency(FunctionDependency::new(name, name, args.len()));
        Ok(format!("{}({})", name, values))
    }

    fn call(&mut self, receiver: Option<&Expr>, name: &str, args: &[Arg]) -> AslResult<String> {
        if args.iter().any(|a| a.name.is_some()) {
            return Err(self.reject_here(Construct::NamedArguments));
        }
        let owner = match receiver {
            None | Some(Expr::This) => return self.unqualified_call(name, args),
            Some(Expr::Ident(owner)) if !self.env.is_local(owner) && !self.ctx.globals.contains_key(owner) => owner,
            Some(_) => {
                return Err(AslError::UnsupportedMember(format!(
                    "method call '{}' on a value has no GLSL equivalent {}",
                    name,
                    self.context()
                )))
            }
        };
        if Stage::from_base_class(owner).is_some() || *owner == self.ctx.class_name {
            if name == intrinsics::PASSTHROUGH
                || intrinsics::is_intrinsic(name)
                || self.ctx.methods.contains_key(name)
            {
                return self.unqualified_call(name, args);
            }
            return Err(AslError::UnsupportedMember(format!(
                "'{}.{}' is not a GLSL intrinsic {}",
                owner,
                name,
                self.context()
            )));
        }
        if types::is_builtin_type(owner) {
            return Err(AslError::UnsupportedMember(format!(
                "'{}.{}' has no GLSL equivalent {}",
                owner,
                name,
                self.context()
            )));
        }
        let values = self.args(args, &[])?;
        self.record_dependency(FunctionDependency::new(format!("{}.{}", owner, name), name, args.len()));
        Ok(format!("{}({})", name, values))
    }
}

fn is_passthrough(e: &Expr) -> bool {
    matches!(e, Expr::Call { name, .. } if name == intrinsics::PASSTHROUGH)
}
