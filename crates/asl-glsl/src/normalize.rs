//! Tree normalization.
//!
//! Two rewrites run over every recovered tree before generation: operator
//! canonicalization folds operator-method calls on vocabulary types back into
//! operator nodes, and local renaming gives every local a stable `localN` name.

use std::collections::{HashMap, HashSet};

use asl_core::types;
use asl_lang::ast::{BinaryOp, Block, CaseLabel, Expr, LambdaBody, Stmt, UnaryOp};

use crate::recover::SyntaxTree;

/// Apply both passes.
pub fn normalize(tree: &mut SyntaxTree) {
    canonicalize_operators(tree);
    rename_locals(tree);
}

// ── Operator canonicalization ──────────────────────────────────────

fn binary_for(name: &str) -> Option<BinaryOp> {
    let op = match name {
        "op_Addition" | "Add" => BinaryOp::Add,
        "op_Subtraction" | "Subtract" => BinaryOp::Sub,
        "op_Multiply" | "Multiply" => BinaryOp::Mul,
        "op_Division" | "Divide" => BinaryOp::Div,
        "op_Modulus" | "Remainder" | "Modulus" => BinaryOp::Rem,
        "op_Equality" => BinaryOp::Eq,
        "op_Inequality" => BinaryOp::Ne,
        "op_LessThan" => BinaryOp::Lt,
        "op_GreaterThan" => BinaryOp::Gt,
        "op_LessThanOrEqual" => BinaryOp::Le,
        "op_GreaterThanOrEqual" => BinaryOp::Ge,
        "op_BitwiseAnd" => BinaryOp::BitAnd,
        "op_BitwiseOr" => BinaryOp::BitOr,
        "op_ExclusiveOr" => BinaryOp::BitXor,
        "op_LeftShift" => BinaryOp::Shl,
        "op_RightShift" => BinaryOp::Shr,
        _ => return None,
    };
    Some(op)
}

fn unary_for(name: &str) -> Option<UnaryOp> {
    let op = match name {
        "op_UnaryNegation" | "Negate" => UnaryOp::Neg,
        "op_UnaryPlus" | "Plus" => UnaryOp::Plus,
        "op_LogicalNot" => UnaryOp::Not,
        "op_OnesComplement" => UnaryOp::BitNot,
        _ => return None,
    };
    Some(op)
}

/// Rewrite `vec3.op_Addition(a, b)` into `a + b`, `float.Negate(x)` into `-x`.
pub fn canonicalize_operators(tree: &mut SyntaxTree) {
    walk_block(&mut tree.body, &mut canonicalize);
}

fn canonicalize(expr: &mut Expr) {
    let Expr::Call {
        receiver: Some(receiver),
        name,
        args,
    } = expr
    else {
        return;
    };
    let on_vocabulary_type =
        matches!(receiver.as_ref(), Expr::Ident(owner) if types::is_builtin_type(owner));
    if !on_vocabulary_type || args.iter().any(|a| a.name.is_some()) {
        return;
    }
    let replacement = match args.len() {
        2 => binary_for(name).map(|op| {
            let rhs = args.pop().map(|a| a.value);
            let lhs = args.pop().map(|a| a.value);
            (op, lhs, rhs)
        }),
        _ => None,
    };
    if let Some((op, Some(lhs), Some(rhs))) = replacement {
        *expr = Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        };
        return;
    }
    if args.len() == 1 {
        if let Some(op) = unary_for(name) {
            if let Some(arg) = args.pop() {
                *expr = Expr::Unary {
                    op,
                    operand: Box::new(arg.value),
                };
            }
        }
    }
}

/// Post-order walk over every expression in a block.
fn walk_block(block: &mut Block, f: &mut impl FnMut(&mut Expr)) {
    for stmt in &mut block.stmts {
        walk_stmt(stmt, f);
    }
}

fn walk_stmt(stmt: &mut Stmt, f: &mut impl FnMut(&mut Expr)) {
    match stmt {
        Stmt::Block(block) => walk_block(block, f),
        Stmt::If {
            cond,
            then_branch,
            else_branch,
        } => {
            walk_expr(cond, f);
            walk_stmt(then_branch, f);
            if let Some(branch) = else_branch {
                walk_stmt(branch, f);
            }
        }
        Stmt::While { cond, body } | Stmt::DoWhile { body, cond } => {
            walk_expr(cond, f);
            walk_stmt(body, f);
        }
        Stmt::For {
            init,
            cond,
            step,
            body,
        } => {
            for s in init {
                walk_stmt(s, f);
            }
            if let Some(cond) = cond {
                walk_expr(cond, f);
            }
            for e in step {
                walk_expr(e, f);
            }
            walk_stmt(body, f);
        }
        Stmt::Switch {
            scrutinee,
            sections,
        } => {
            walk_expr(scrutinee, f);
            for section in sections {
                for label in &mut section.labels {
                    if let CaseLabel::Case(e) = label {
                        walk_expr(e, f);
                    }
                }
                for s in &mut section.body {
                    walk_stmt(s, f);
                }
            }
        }
        Stmt::Return(Some(e)) | Stmt::Expr(e) => walk_expr(e, f),
        Stmt::VarDecl { declarators, .. } => {
            for d in declarators {
                if let Some(init) = &mut d.init {
                    walk_expr(init, f);
                }
            }
        }
        _ => {}
    }
}

fn walk_expr(expr: &mut Expr, f: &mut impl FnMut(&mut Expr)) {
    match expr {
        Expr::Assign { target, value, .. } => {
            walk_expr(target, f);
            walk_expr(value, f);
        }
        Expr::Binary { lhs, rhs, .. } => {
            walk_expr(lhs, f);
            walk_expr(rhs, f);
        }
        Expr::Unary { operand, .. } => walk_expr(operand, f),
        Expr::Call { receiver, args, .. } => {
            if let Some(receiver) = receiver {
                walk_expr(receiver, f);
            }
            for arg in args {
                walk_expr(&mut arg.value, f);
            }
        }
        Expr::Member { target, .. } => walk_expr(target, f),
        Expr::New { args, .. } => {
            for arg in args {
                walk_expr(&mut arg.value, f);
            }
        }
        Expr::NewArray { size, init, .. } => {
            if let Some(size) = size {
                walk_expr(size, f);
            }
            for item in init.iter_mut().flatten() {
                walk_expr(item, f);
            }
        }
        Expr::ArrayInit(items) => {
            for item in items {
                walk_expr(item, f);
            }
        }
        Expr::Index { target, index } => {
            walk_expr(target, f);
            walk_expr(index, f);
        }
        Expr::Cast { expr: inner, .. } => walk_expr(inner, f),
        Expr::Conditional {
            cond,
            then_expr,
            else_expr,
        } => {
            walk_expr(cond, f);
            walk_expr(then_expr, f);
            walk_expr(else_expr, f);
        }
        Expr::Lambda {
            body: LambdaBody::Expr(inner),
            ..
        } => walk_expr(inner, f),
        _ => {}
    }
    f(expr);
}

// ── Local renaming ─────────────────────────────────────────────────

/// Rename every local binding to `localN`, numbered in declaration order.
///
/// Indices whose name the method already uses for something other than a
/// local (a field, block instance, parameter or function) are skipped.
pub fn rename_locals(tree: &mut SyntaxTree) {
    let mut renamer = Renamer {
        taken: taken_names(tree),
        ..Renamer::default()
    };
    renamer.push();
    for param in &tree.params {
        renamer.bind_as(&param.name, param.name.clone());
    }
    renamer.block(&mut tree.body);
    renamer.pop();
}

/// Names referenced in the method that no local declaration binds.
fn taken_names(tree: &mut SyntaxTree) -> HashSet<String> {
    let mut declared = HashSet::new();
    for stmt in &tree.body.stmts {
        collect_declared(stmt, &mut declared);
    }
    let mut used: HashSet<String> = tree.params.iter().map(|p| p.name.clone()).collect();
    walk_block(&mut tree.body, &mut |e| match e {
        Expr::Ident(name) => {
            used.insert(name.clone());
        }
        Expr::Call {
            receiver: None, name, ..
        } => {
            used.insert(name.clone());
        }
        _ => {}
    });
    used.retain(|name| !declared.contains(name));
    used
}

fn collect_declared(stmt: &Stmt, out: &mut HashSet<String>) {
    match stmt {
        Stmt::Block(block) => {
            for s in &block.stmts {
                collect_declared(s, out);
            }
        }
        Stmt::If {
            then_branch,
            else_branch,
            ..
        } => {
            collect_declared(then_branch, out);
            if let Some(branch) = else_branch {
                collect_declared(branch, out);
            }
        }
        Stmt::While { body, .. } | Stmt::DoWhile { body, .. } => collect_declared(body, out),
        Stmt::For { init, body, .. } => {
            for s in init {
                collect_declared(s, out);
            }
            collect_declared(body, out);
        }
        Stmt::Switch { sections, .. } => {
            for s in sections.iter().flat_map(|section| &section.body) {
                collect_declared(s, out);
            }
        }
        Stmt::VarDecl { declarators, .. } => {
            out.extend(declarators.iter().map(|d| d.name.clone()));
        }
        _ => {}
    }
}

#[derive(Default)]
struct Renamer {
    next: usize,
    taken: HashSet<String>,
    scopes: Vec<HashMap<String, String>>,
}

impl Renamer {
    fn push(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn pop(&mut self) {
        self.scopes.pop();
    }

    fn bind_as(&mut self, original: &str, renamed: String) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(original.to_string(), renamed);
        }
    }

    fn fresh(&mut self, original: &str) -> String {
        let mut name = format!("local{}", self.next);
        self.next += 1;
        while self.taken.contains(&name) {
            name = format!("local{}", self.next);
            self.next += 1;
        }
        self.bind_as(original, name.clone());
        name
    }

    fn resolve(&self, name: &str) -> Option<&String> {
        self.scopes.iter().rev().find_map(|s| s.get(name))
    }

    fn block(&mut self, block: &mut Block) {
        self.push();
        for stmt in &mut block.stmts {
            self.stmt(stmt);
        }
        self.pop();
    }

    fn scoped(&mut self, stmt: &mut Stmt) {
        self.push();
        self.stmt(stmt);
        self.pop();
    }

    fn stmt(&mut self, stmt: &mut Stmt) {
        match stmt {
            Stmt::Block(block) => self.block(block),
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.expr(cond);
                self.scoped(then_branch);
                if let Some(branch) = else_branch {
                    self.scoped(branch);
                }
            }
            Stmt::While { cond, body } => {
                self.expr(cond);
                self.scoped(body);
            }
            Stmt::DoWhile { body, cond } => {
                self.scoped(body);
                self.expr(cond);
            }
            Stmt::For {
                init,
                cond,
                step,
                body,
            } => {
                self.push();
                for s in init {
                    self.stmt(s);
                }
                if let Some(cond) = cond {
                    self.expr(cond);
                }
                for e in step {
                    self.expr(e);
                }
                self.scoped(body);
                self.pop();
            }
            Stmt::Switch {
                scrutinee,
                sections,
            } => {
                self.expr(scrutinee);
                // One scope spans every section of a switch.
                self.push();
                for section in sections {
                    for label in &mut section.labels {
                        if let CaseLabel::Case(e) = label {
                            self.expr(e);
                        }
                    }
                    for s in &mut section.body {
                        self.stmt(s);
                    }
                }
                self.pop();
            }
            Stmt::Return(Some(e)) | Stmt::Expr(e) => self.expr(e),
            Stmt::VarDecl { declarators, .. } => {
                for d in declarators {
                    if let Some(init) = &mut d.init {
                        self.expr(init);
                    }
                    d.name = self.fresh(&d.name);
                }
            }
            _ => {}
        }
    }

    fn expr(&mut self, expr: &mut Expr) {
        walk_expr(expr, &mut |e| {
            if let Expr::Ident(name) = e {
                if let Some(renamed) = self.resolve(name) {
                    *name = renamed.clone();
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recover::recover;
    use asl_lang::parse_source;

    fn tree(src: &str, method: &str) -> SyntaxTree {
        let source = parse_source(src, "n.asl").unwrap();
        let decl = source.classes[0].method(method).unwrap();
        let mut tree = recover(decl).unwrap();
        normalize(&mut tree);
        tree
    }

    #[test]
    fn test_operator_calls_become_operators() {
        let t = tree(
            "class A : FragmentShader { void main() { x = vec3.op_Addition(a, b); y = float.op_Modulus(c, d); z = vec2.op_UnaryNegation(e); } }",
            "main",
        );
        let values: Vec<&Expr> = t
            .body
            .stmts
            .iter()
            .filter_map(|s| match s {
                Stmt::Expr(Expr::Assign { value, .. }) => Some(value.as_ref()),
                _ => None,
            })
            .collect();
        assert!(matches!(values[0], Expr::Binary { op: BinaryOp::Add, .. }));
        assert!(matches!(values[1], Expr::Binary { op: BinaryOp::Rem, .. }));
        assert!(matches!(values[2], Expr::Unary { op: UnaryOp::Neg, .. }));
    }

    #[test]
    fn test_library_calls_are_left_alone() {
        let t = tree(
            "class A : FragmentShader { void main() { x = Lighting.Add(a, b); } }",
            "main",
        );
        assert!(matches!(
            &t.body.stmts[0],
            Stmt::Expr(Expr::Assign { value, .. }) if matches!(value.as_ref(), Expr::Call { .. })
        ));
    }

    #[test]
    fn test_locals_renamed_in_declaration_order() {
        let t = tree(
            "class A : FragmentShader { float f(float p) { float a = p; float b = a * 2.0; return a + b; } void main() { } }",
            "f",
        );
        let printed = format!("{:?}", t.body);
        assert!(printed.contains("\"local0\""));
        assert!(printed.contains("\"local1\""));
        assert!(!printed.contains("\"a\""));
        assert!(printed.contains("\"p\""));
    }

    #[test]
    fn test_shadowing_in_nested_scopes() {
        let t = tree(
            "class A : FragmentShader { void main() { float x = 1.0; { float x = 2.0; y = x; } z = x; } }",
            "main",
        );
        let Stmt::Block(inner) = &t.body.stmts[1] else {
            panic!("expected block");
        };
        assert!(format!("{:?}", inner.stmts[1]).contains("\"local1\""));
        assert!(format!("{:?}", t.body.stmts[2]).contains("\"local0\""));
    }

    #[test]
    fn test_renaming_skips_names_already_in_use() {
        let t = tree(
            "class A : FragmentShader { float local1(float x) { return x; } void main() { float a = 2.0; float b = local1(a); color = new vec4(local0 + a + b); } }",
            "main",
        );
        let printed = format!("{:?}", t.body);
        assert!(printed.contains("name: \"local2\""));
        assert!(printed.contains("name: \"local3\""));
        assert!(printed.contains("Ident(\"local0\")"));
        assert!(!printed.contains("name: \"local0\""));
    }

    #[test]
    fn test_member_and_call_names_untouched() {
        let t = tree(
            "class A : FragmentShader { void main() { float dot = 1.0; v = n.xyz; w = dot(n, n); } }",
            "main",
        );
        let printed = format!("{:?}", t.body.stmts[2]);
        assert!(printed.contains("name: \"dot\""));
        assert!(format!("{:?}", t.body.stmts[1]).contains("member: \"xyz\""));
    }

    #[test]
    fn test_renaming_is_deterministic() {
        let a = tree(
            "class A : FragmentShader { float f(float p) { float alpha = p * 2.0; return alpha; } void main() { } }",
            "f",
        );
        let b = tree(
            "class A : FragmentShader { float f(float p) { float beta = p * 2.0; return beta; } void main() { } }",
            "f",
        );
        assert_eq!(a.body, b.body);
    }
}
