//! Syntax recovery: method declaration → owned syntax tree.

use asl_core::{AslError, AslResult};
use asl_lang::ast::{Attribute, Block, MethodDecl, Param, Stmt, TypeRef};
use asl_lang::lexer::Span;

/// The recovered body of one method, plus the signature the generator needs.
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    pub method: String,
    pub is_constructor: bool,
    pub params: Vec<Param>,
    pub return_type: Option<TypeRef>,
    pub return_attributes: Vec<Attribute>,
    pub body: Block,
    pub span: Span,
}

impl SyntaxTree {
    pub fn is_entry_point(&self) -> bool {
        !self.is_constructor && self.method == "main"
    }

    /// A body with nothing but empty statements contributes nothing.
    pub fn is_trivial(&self) -> bool {
        self.body.stmts.iter().all(|s| matches!(s, Stmt::Empty))
    }

    /// Insert `stmts` before this tree's own statements, keeping their order.
    pub fn splice_front(&mut self, stmts: Vec<Stmt>) {
        let own = std::mem::take(&mut self.body.stmts);
        self.body.stmts = stmts;
        self.body.stmts.extend(own);
    }
}

/// Recover the syntax tree of `method`.
pub fn recover(method: &MethodDecl) -> AslResult<SyntaxTree> {
    let body = method.body.clone().ok_or_else(|| {
        AslError::Recovery(format!(
            "method '{}' (line {}) has no body to recover",
            method.name, method.span.line
        ))
    })?;
    if let Some(attribute) = method.attributes.first() {
        return Err(AslError::Attribute(format!(
            "attribute '{}' is not valid on method '{}'",
            attribute.name, method.name
        )));
    }
    tracing::trace!(method = %method.name, statements = body.stmts.len(), "recovered method body");
    Ok(SyntaxTree {
        method: method.name.clone(),
        is_constructor: method.is_constructor,
        params: method.params.clone(),
        return_type: method.return_type.clone(),
        return_attributes: method.return_attributes.clone(),
        body,
        span: method.span,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use asl_lang::ast::build::*;
    use asl_lang::MethodBuilder;

    #[test]
    fn test_missing_body_is_recovery_error() {
        let method = MethodBuilder::new("helper").without_body().build();
        assert!(matches!(recover(&method), Err(AslError::Recovery(_))));
    }

    #[test]
    fn test_trivial_constructor() {
        let ctor = MethodBuilder::constructor("Basic").stmt(Stmt::Empty).build();
        let tree = recover(&ctor).unwrap();
        assert!(tree.is_constructor);
        assert!(tree.is_trivial());
        assert!(!tree.is_entry_point());
    }

    #[test]
    fn test_splice_front_keeps_order() {
        let mut main = recover(
            &MethodBuilder::entry_point()
                .stmt(expr_stmt(assign(ident("c"), int(3))))
                .build(),
        )
        .unwrap();
        main.splice_front(vec![
            expr_stmt(assign(ident("a"), int(1))),
            expr_stmt(assign(ident("b"), int(2))),
        ]);
        let targets: Vec<_> = main
            .body
            .stmts
            .iter()
            .map(|s| match s {
                Stmt::Expr(asl_lang::ast::Expr::Assign { target, .. }) => format!("{:?}", target),
                other => format!("{:?}", other),
            })
            .collect();
        assert_eq!(targets.len(), 3);
        assert!(targets[0].contains("\"a\""));
        assert!(targets[2].contains("\"c\""));
    }
}
