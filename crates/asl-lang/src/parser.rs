//! ASL parser: tokens → syntax tree.

use asl_core::{types, AslError, Stage};

use crate::ast::*;
use crate::lexer::{Span, Token, TokenKind};

/// The ASL parser.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    file: String,
}

impl Parser {
    pub fn new(tokens: Vec<Token>, file: impl Into<String>) -> Self {
        Self {
            tokens,
            pos: 0,
            file: file.into(),
        }
    }

    /// Parse the token stream into a SourceFile.
    pub fn parse(&mut self) -> Result<SourceFile, AslError> {
        let mut classes = Vec::new();
        while self.peek() != &TokenKind::Eof {
            if self.peek() == &TokenKind::Using {
                // `using System;` directives carry no meaning for shaders.
                while !matches!(self.peek(), TokenKind::Semicolon | TokenKind::Eof) {
                    self.advance();
                }
                self.expect(&TokenKind::Semicolon)?;
                continue;
            }
            classes.push(self.parse_class()?);
        }
        Ok(SourceFile { classes })
    }

    fn peek(&self) -> &TokenKind {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> &TokenKind {
        self.tokens
            .get(self.pos + offset)
            .map(|t| &t.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    fn current_span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .map(|t| t.span)
            .unwrap_or(Span::new(0, 0, 0, 0))
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn check(&self, expected: &TokenKind) -> bool {
        std::mem::discriminant(self.peek()) == std::mem::discriminant(expected)
    }

    fn eat(&mut self, expected: &TokenKind) -> bool {
        if self.check(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &TokenKind) -> Result<Token, AslError> {
        if self.check(expected) {
            Ok(self.advance())
        } else {
            Err(self.error_here(format!("expected {}, got {}", expected, self.peek())))
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<String, AslError> {
        match self.peek().clone() {
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(self.error_here(format!("expected {}, got {}", what, other))),
        }
    }

    fn expect_word(&mut self, word: &str) -> Result<(), AslError> {
        match self.peek() {
            TokenKind::Identifier(name) if name == word => {
                self.advance();
                Ok(())
            }
            other => Err(self.error_here(format!("expected '{}', got {}", word, other))),
        }
    }

    fn error_here(&self, message: impl Into<String>) -> AslError {
        self.error_at(self.current_span(), message)
    }

    fn error_at(&self, span: Span, message: impl Into<String>) -> AslError {
        AslError::parse(message, &self.file, span.line, span.column)
    }

    fn skip_modifiers(&mut self) {
        while matches!(self.peek(), TokenKind::Modifier(_)) {
            self.advance();
        }
    }

    // ── Declarations ────────────────────────────────────────────────

    fn parse_class(&mut self) -> Result<ClassDecl, AslError> {
        let span = self.current_span();
        let attributes = self.parse_attributes()?;
        self.skip_modifiers();
        let is_static = self.eat(&TokenKind::Static);
        self.skip_modifiers();
        self.expect(&TokenKind::Class)?;
        let name = self.expect_ident("class name")?;

        let kind = if self.eat(&TokenKind::Colon) {
            let base_span = self.current_span();
            let base = self.expect_ident("base class")?;
            if is_static {
                return Err(self.error_at(base_span, format!("static class '{}' cannot derive from '{}'", name, base)));
            }
            match Stage::from_base_class(&base) {
                Some(stage) => ClassKind::Shader(stage),
                None => {
                    return Err(self.error_at(
                        base_span,
                        format!("unknown shader base class '{}' for '{}'", base, name),
                    ))
                }
            }
        } else if is_static {
            ClassKind::Library
        } else {
            return Err(self.error_at(
                span,
                format!(
                    "shader class '{}' must derive from a stage base class (VertexShader, FragmentShader, ...)",
                    name
                ),
            ));
        };

        let mut class = ClassDecl {
            name,
            kind,
            attributes,
            fields: Vec::new(),
            structs: Vec::new(),
            methods: Vec::new(),
            span,
        };

        self.expect(&TokenKind::LeftBrace)?;
        while !self.check(&TokenKind::RightBrace) && !self.check(&TokenKind::Eof) {
            self.parse_member(&mut class)?;
        }
        self.expect(&TokenKind::RightBrace)?;
        Ok(class)
    }

    fn parse_member(&mut self, class: &mut ClassDecl) -> Result<(), AslError> {
        let span = self.current_span();
        let (attributes, return_attributes) = self.parse_attribute_lists()?;
        self.skip_modifiers();
        let is_static = self.eat(&TokenKind::Static);
        self.skip_modifiers();

        if !return_attributes.is_empty() && self.check(&TokenKind::Struct) {
            return Err(self.error_at(span, "`return:` attributes are only valid on methods"));
        }

        match self.peek().clone() {
            TokenKind::Struct => {
                let decl = self.parse_struct(attributes, span)?;
                class.structs.push(decl);
            }
            TokenKind::Const => {
                self.advance();
                let ty = self.parse_type()?;
                let name = self.expect_ident("constant name")?;
                if !self.eat(&TokenKind::Equals) {
                    return Err(self.error_here(format!("constant '{}' requires an initializer", name)));
                }
                let init = self.parse_initializer()?;
                self.expect(&TokenKind::Semicolon)?;
                class.fields.push(FieldDecl {
                    attributes,
                    is_const: true,
                    ty,
                    name,
                    init: Some(init),
                    span,
                });
            }
            TokenKind::Identifier(ref name)
                if *name == class.name && self.peek_at(1) == &TokenKind::LeftParen =>
            {
                self.advance();
                let params = self.parse_params()?;
                if self.eat(&TokenKind::Colon) {
                    // `: base(...)` initializer; shaders have nothing to chain to.
                    self.expect(&TokenKind::Base)?;
                    self.parse_args()?;
                }
                let body = self.parse_method_body(false)?;
                class.methods.push(MethodDecl {
                    attributes,
                    return_attributes,
                    is_static,
                    return_type: None,
                    name: class.name.clone(),
                    params,
                    body,
                    is_constructor: true,
                    span,
                });
            }
            _ => {
                let ty = self.parse_type()?;
                let name = self.expect_ident("member name")?;
                if self.check(&TokenKind::LeftParen) {
                    let params = self.parse_params()?;
                    let returns_value = ty.name != "void";
                    let body = self.parse_method_body(returns_value)?;
                    class.methods.push(MethodDecl {
                        attributes,
                        return_attributes,
                        is_static,
                        return_type: Some(ty),
                        name,
                        params,
                        body,
                        is_constructor: false,
                        span,
                    });
                } else {
                    if !return_attributes.is_empty() {
                        return Err(self.error_at(span, "`return:` attributes are only valid on methods"));
                    }
                    let init = if self.eat(&TokenKind::Equals) {
                        Some(self.parse_initializer()?)
                    } else {
                        None
                    };
                    self.expect(&TokenKind::Semicolon)?;
                    class.fields.push(FieldDecl {
                        attributes,
                        is_const: false,
                        ty,
                        name,
                        init,
                        span,
                    });
                }
            }
        }
        Ok(())
    }

    /// Block body, `=> expr;` body, or `;` for a body-less declaration.
    fn parse_method_body(&mut self, returns_value: bool) -> Result<Option<Block>, AslError> {
        if self.eat(&TokenKind::Semicolon) {
            return Ok(None);
        }
        if self.eat(&TokenKind::FatArrow) {
            let expr = self.parse_expr()?;
            self.expect(&TokenKind::Semicolon)?;
            let stmt = if returns_value {
                Stmt::Return(Some(expr))
            } else {
                Stmt::Expr(expr)
            };
            return Ok(Some(Block::new(vec![stmt])));
        }
        Ok(Some(self.parse_block()?))
    }

    fn parse_struct(&mut self, attributes: Vec<Attribute>, span: Span) -> Result<StructDecl, AslError> {
        self.expect(&TokenKind::Struct)?;
        let name = self.expect_ident("struct name")?;
        self.expect(&TokenKind::LeftBrace)?;
        let mut fields = Vec::new();
        while !self.check(&TokenKind::RightBrace) && !self.check(&TokenKind::Eof) {
            let field_span = self.current_span();
            let field_attributes = self.parse_attributes()?;
            self.skip_modifiers();
            let ty = self.parse_type()?;
            let field_name = self.expect_ident("struct member name")?;
            let init = if self.eat(&TokenKind::Equals) {
                Some(self.parse_initializer()?)
            } else {
                None
            };
            self.expect(&TokenKind::Semicolon)?;
            fields.push(FieldDecl {
                attributes: field_attributes,
                is_const: false,
                ty,
                name: field_name,
                init,
                span: field_span,
            });
        }
        self.expect(&TokenKind::RightBrace)?;
        self.eat(&TokenKind::Semicolon);
        Ok(StructDecl {
            attributes,
            name,
            fields,
            span,
        })
    }

    fn parse_params(&mut self) -> Result<Vec<Param>, AslError> {
        self.expect(&TokenKind::LeftParen)?;
        let mut params = Vec::new();
        while !self.check(&TokenKind::RightParen) {
            let span = self.current_span();
            let attributes = self.parse_attributes()?;
            let modifier = match self.peek() {
                TokenKind::In => ParamModifier::In,
                TokenKind::Out => ParamModifier::Out,
                TokenKind::Ref => ParamModifier::Ref,
                _ => ParamModifier::None,
            };
            if modifier != ParamModifier::None {
                self.advance();
            }
            let ty = self.parse_type()?;
            let name = self.expect_ident("parameter name")?;
            let default = if self.eat(&TokenKind::Equals) {
                Some(self.parse_expr()?)
            } else {
                None
            };
            params.push(Param {
                attributes,
                modifier,
                ty,
                name,
                default,
                span,
            });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RightParen)?;
        Ok(params)
    }

    fn parse_type(&mut self) -> Result<TypeRef, AslError> {
        let span = self.current_span();
        let name = self.expect_ident("type name")?;
        let mut ty = TypeRef {
            name,
            array: false,
            pointer: false,
            span,
        };
        if self.check(&TokenKind::LeftBracket) && self.peek_at(1) == &TokenKind::RightBracket {
            self.advance();
            self.advance();
            ty.array = true;
        } else if self.check(&TokenKind::Star) {
            self.advance();
            ty.pointer = true;
        }
        Ok(ty)
    }

    fn parse_attributes(&mut self) -> Result<Vec<Attribute>, AslError> {
        let span = self.current_span();
        let (attributes, return_attributes) = self.parse_attribute_lists()?;
        if !return_attributes.is_empty() {
            return Err(self.error_at(span, "`return:` attributes are only valid on methods"));
        }
        Ok(attributes)
    }

    /// Zero or more `[...]` lists; the second vector holds `[return: ...]` entries.
    fn parse_attribute_lists(&mut self) -> Result<(Vec<Attribute>, Vec<Attribute>), AslError> {
        let mut attributes = Vec::new();
        let mut return_attributes = Vec::new();
        while self.eat(&TokenKind::LeftBracket) {
            let targets_return =
                self.peek() == &TokenKind::Return && self.peek_at(1) == &TokenKind::Colon;
            if targets_return {
                self.advance();
                self.advance();
            }
            loop {
                let attribute = self.parse_attribute()?;
                if targets_return {
                    return_attributes.push(attribute);
                } else {
                    attributes.push(attribute);
                }
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(&TokenKind::RightBracket)?;
        }
        Ok((attributes, return_attributes))
    }

    fn parse_attribute(&mut self) -> Result<Attribute, AslError> {
        let span = self.current_span();
        let name = self.expect_ident("attribute name")?;
        let mut args = Vec::new();
        if self.eat(&TokenKind::LeftParen) {
            while !self.check(&TokenKind::RightParen) {
                let named = matches!(self.peek(), TokenKind::Identifier(_))
                    && self.peek_at(1) == &TokenKind::Equals;
                if named {
                    let key = self.expect_ident("attribute parameter")?;
                    self.advance();
                    args.push(AttributeArg::Named(key, self.parse_attr_value()?));
                } else {
                    args.push(AttributeArg::Positional(self.parse_attr_value()?));
                }
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(&TokenKind::RightParen)?;
        }
        Ok(Attribute { name, args, span })
    }

    fn parse_attr_value(&mut self) -> Result<AttrValue, AslError> {
        let span = self.current_span();
        let negative = self.eat(&TokenKind::Minus);
        let token = self.advance();
        let value = match token.kind {
            TokenKind::IntLiteral(v) | TokenKind::UintLiteral(v) => {
                let v = v as i64;
                AttrValue::Int(if negative { -v } else { v })
            }
            TokenKind::FloatLiteral(v) | TokenKind::DoubleLiteral(v) => {
                AttrValue::Float(if negative { -v } else { v })
            }
            TokenKind::StringLiteral(s) if !negative => AttrValue::Str(s),
            TokenKind::Identifier(s) if !negative => AttrValue::Ident(s),
            TokenKind::True if !negative => AttrValue::Bool(true),
            TokenKind::False if !negative => AttrValue::Bool(false),
            other => {
                return Err(self.error_at(span, format!("invalid attribute value: {}", other)));
            }
        };
        Ok(value)
    }

    // ── Statements ──────────────────────────────────────────────────

    fn parse_block(&mut self) -> Result<Block, AslError> {
        self.expect(&TokenKind::LeftBrace)?;
        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RightBrace) && !self.check(&TokenKind::Eof) {
            stmts.push(self.parse_statement()?);
        }
        self.expect(&TokenKind::RightBrace)?;
        Ok(Block::new(stmts))
    }

    fn parse_embedded(&mut self) -> Result<Box<Stmt>, AslError> {
        Ok(Box::new(self.parse_statement()?))
    }

    fn parse_paren_expr(&mut self) -> Result<Expr, AslError> {
        self.expect(&TokenKind::LeftParen)?;
        let expr = self.parse_expr()?;
        self.expect(&TokenKind::RightParen)?;
        Ok(expr)
    }

    fn parse_statement(&mut self) -> Result<Stmt, AslError> {
        let span = self.current_span();
        let stmt = match self.peek().clone() {
            TokenKind::LeftBrace => Stmt::Block(self.parse_block()?),
            TokenKind::Semicolon => {
                self.advance();
                Stmt::Empty
            }
            TokenKind::If => {
                self.advance();
                let cond = self.parse_paren_expr()?;
                let then_branch = self.parse_embedded()?;
                let else_branch = if self.eat(&TokenKind::Else) {
                    Some(self.parse_embedded()?)
                } else {
                    None
                };
                Stmt::If {
                    cond,
                    then_branch,
                    else_branch,
                }
            }
            TokenKind::While => {
                self.advance();
                let cond = self.parse_paren_expr()?;
                let body = self.parse_embedded()?;
                Stmt::While { cond, body }
            }
            TokenKind::Do => {
                self.advance();
                let body = self.parse_embedded()?;
                self.expect(&TokenKind::While)?;
                let cond = self.parse_paren_expr()?;
                self.expect(&TokenKind::Semicolon)?;
                Stmt::DoWhile { body, cond }
            }
            TokenKind::For => self.parse_for()?,
            TokenKind::Foreach => {
                self.advance();
                self.expect(&TokenKind::LeftParen)?;
                let ty = self.parse_type()?;
                let name = self.expect_ident("loop variable")?;
                self.expect(&TokenKind::In)?;
                let iterable = self.parse_expr()?;
                self.expect(&TokenKind::RightParen)?;
                let body = self.parse_embedded()?;
                Stmt::Foreach {
                    ty,
                    name,
                    iterable,
                    body,
                    span,
                }
            }
            TokenKind::Switch => self.parse_switch()?,
            TokenKind::Return => {
                self.advance();
                let value = if self.check(&TokenKind::Semicolon) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect(&TokenKind::Semicolon)?;
                Stmt::Return(value)
            }
            TokenKind::Break => self.keyword_statement(Stmt::Break)?,
            TokenKind::Continue => self.keyword_statement(Stmt::Continue)?,
            TokenKind::Discard => self.keyword_statement(Stmt::Discard)?,
            TokenKind::Try => self.parse_try(span)?,
            TokenKind::Throw => {
                self.advance();
                let value = if self.check(&TokenKind::Semicolon) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect(&TokenKind::Semicolon)?;
                Stmt::Throw(value, span)
            }
            TokenKind::Goto => {
                self.advance();
                let target = if self.eat(&TokenKind::Case) {
                    GotoTarget::Case(self.parse_expr()?)
                } else if self.eat(&TokenKind::Default) {
                    GotoTarget::Default
                } else {
                    GotoTarget::Label(self.expect_ident("label")?)
                };
                self.expect(&TokenKind::Semicolon)?;
                Stmt::Goto(target, span)
            }
            TokenKind::Yield => {
                self.advance();
                let value = if self.eat(&TokenKind::Break) {
                    None
                } else {
                    self.expect(&TokenKind::Return)?;
                    Some(self.parse_expr()?)
                };
                self.expect(&TokenKind::Semicolon)?;
                Stmt::Yield(value, span)
            }
            TokenKind::Lock => {
                self.advance();
                let target = self.parse_paren_expr()?;
                let body = self.parse_embedded()?;
                Stmt::Lock { target, body, span }
            }
            TokenKind::Using => {
                self.advance();
                self.expect(&TokenKind::LeftParen)?;
                let resource = if self.is_declaration_start() {
                    self.parse_var_decl(false)?
                } else {
                    Stmt::Expr(self.parse_expr()?)
                };
                self.expect(&TokenKind::RightParen)?;
                let body = self.parse_embedded()?;
                Stmt::Using {
                    resource: Box::new(resource),
                    body,
                    span,
                }
            }
            TokenKind::Unsafe => {
                self.advance();
                Stmt::Unsafe(self.parse_block()?, span)
            }
            TokenKind::Fixed => {
                self.advance();
                self.expect(&TokenKind::LeftParen)?;
                let decl = self.parse_var_decl(false)?;
                self.expect(&TokenKind::RightParen)?;
                let body = self.parse_embedded()?;
                Stmt::Fixed {
                    decl: Box::new(decl),
                    body,
                    span,
                }
            }
            TokenKind::LeftBracket => {
                let attributes = self.parse_attributes()?;
                let stmt = self.parse_embedded()?;
                Stmt::Attributed {
                    attributes,
                    stmt,
                    span,
                }
            }
            TokenKind::Const => {
                self.advance();
                let decl = self.parse_var_decl(true)?;
                self.expect(&TokenKind::Semicolon)?;
                decl
            }
            TokenKind::Identifier(label) if self.peek_at(1) == &TokenKind::Colon => {
                self.advance();
                self.advance();
                let stmt = self.parse_embedded()?;
                Stmt::Labeled { label, stmt, span }
            }
            _ if self.is_declaration_start() => {
                let decl = self.parse_var_decl(false)?;
                self.expect(&TokenKind::Semicolon)?;
                decl
            }
            _ => {
                let expr = self.parse_expr()?;
                self.expect(&TokenKind::Semicolon)?;
                Stmt::Expr(expr)
            }
        };
        Ok(stmt)
    }

    fn keyword_statement(&mut self, stmt: Stmt) -> Result<Stmt, AslError> {
        self.advance();
        self.expect(&TokenKind::Semicolon)?;
        Ok(stmt)
    }

    /// `T x`, `T[] x` or `T* x =` at the cursor.
    fn is_declaration_start(&self) -> bool {
        let ident = |k: &TokenKind| matches!(k, TokenKind::Identifier(_));
        if !ident(self.peek_at(0)) {
            return false;
        }
        if ident(self.peek_at(1)) {
            return true;
        }
        if self.peek_at(1) == &TokenKind::LeftBracket
            && self.peek_at(2) == &TokenKind::RightBracket
            && ident(self.peek_at(3))
        {
            return true;
        }
        self.peek_at(1) == &TokenKind::Star
            && ident(self.peek_at(2))
            && matches!(
                self.peek_at(3),
                TokenKind::Equals | TokenKind::Semicolon | TokenKind::Comma
            )
    }

    fn parse_var_decl(&mut self, is_const: bool) -> Result<Stmt, AslError> {
        let ty = self.parse_type()?;
        let mut declarators = Vec::new();
        loop {
            let name = self.expect_ident("variable name")?;
            let init = if self.eat(&TokenKind::Equals) {
                Some(self.parse_initializer()?)
            } else {
                None
            };
            declarators.push(Declarator { name, init });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        Ok(Stmt::VarDecl {
            is_const,
            ty,
            declarators,
        })
    }

    fn parse_for(&mut self) -> Result<Stmt, AslError> {
        self.expect(&TokenKind::For)?;
        self.expect(&TokenKind::LeftParen)?;

        let mut init = Vec::new();
        if !self.check(&TokenKind::Semicolon) {
            if self.is_declaration_start() {
                init.push(self.parse_var_decl(false)?);
            } else {
                loop {
                    init.push(Stmt::Expr(self.parse_expr()?));
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
            }
        }
        self.expect(&TokenKind::Semicolon)?;

        let cond = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(&TokenKind::Semicolon)?;

        let mut step = Vec::new();
        if !self.check(&TokenKind::RightParen) {
            loop {
                step.push(self.parse_expr()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RightParen)?;

        let body = self.parse_embedded()?;
        Ok(Stmt::For {
            init,
            cond,
            step,
            body,
        })
    }

    fn parse_switch(&mut self) -> Result<Stmt, AslError> {
        self.expect(&TokenKind::Switch)?;
        let scrutinee = self.parse_paren_expr()?;
        self.expect(&TokenKind::LeftBrace)?;
        let mut sections = Vec::new();
        while !self.check(&TokenKind::RightBrace) && !self.check(&TokenKind::Eof) {
            let mut labels = Vec::new();
            loop {
                if self.eat(&TokenKind::Case) {
                    labels.push(CaseLabel::Case(self.parse_expr()?));
                } else if self.eat(&TokenKind::Default) {
                    labels.push(CaseLabel::Default);
                } else {
                    break;
                }
                self.expect(&TokenKind::Colon)?;
            }
            if labels.is_empty() {
                return Err(self.error_here(format!("expected case or default, got {}", self.peek())));
            }
            let mut body = Vec::new();
            while !matches!(
                self.peek(),
                TokenKind::Case | TokenKind::Default | TokenKind::RightBrace | TokenKind::Eof
            ) {
                body.push(self.parse_statement()?);
            }
            sections.push(SwitchSection { labels, body });
        }
        self.expect(&TokenKind::RightBrace)?;
        Ok(Stmt::Switch {
            scrutinee,
            sections,
        })
    }

    fn parse_try(&mut self, span: Span) -> Result<Stmt, AslError> {
        self.expect(&TokenKind::Try)?;
        let body = self.parse_block()?;
        let mut catches = Vec::new();
        while self.eat(&TokenKind::Catch) {
            let (mut ty, mut name) = (None, None);
            if self.eat(&TokenKind::LeftParen) {
                ty = Some(self.parse_type()?);
                if let TokenKind::Identifier(n) = self.peek().clone() {
                    self.advance();
                    name = Some(n);
                }
                self.expect(&TokenKind::RightParen)?;
            }
            let body = self.parse_block()?;
            catches.push(CatchClause { ty, name, body });
        }
        let finally = if self.eat(&TokenKind::Finally) {
            Some(self.parse_block()?)
        } else {
            None
        };
        if catches.is_empty() && finally.is_none() {
            return Err(self.error_at(span, "try block requires a catch or finally clause"));
        }
        Ok(Stmt::Try {
            body,
            catches,
            finally,
            span,
        })
    }

    // ── Expressions ─────────────────────────────────────────────────

    pub fn parse_expr(&mut self) -> Result<Expr, AslError> {
        self.parse_assignment()
    }

    fn parse_initializer(&mut self) -> Result<Expr, AslError> {
        if self.check(&TokenKind::LeftBrace) {
            Ok(Expr::ArrayInit(self.parse_brace_list()?))
        } else {
            self.parse_expr()
        }
    }

    fn parse_brace_list(&mut self) -> Result<Vec<Expr>, AslError> {
        self.expect(&TokenKind::LeftBrace)?;
        let mut items = Vec::new();
        while !self.check(&TokenKind::RightBrace) {
            items.push(self.parse_initializer()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RightBrace)?;
        Ok(items)
    }

    fn parse_assignment(&mut self) -> Result<Expr, AslError> {
        if self.is_lambda_start() {
            return self.parse_lambda();
        }
        let target = self.parse_conditional()?;
        let op = match self.peek() {
            TokenKind::Equals => AssignOp::Assign,
            TokenKind::PlusEq => AssignOp::Add,
            TokenKind::MinusEq => AssignOp::Sub,
            TokenKind::StarEq => AssignOp::Mul,
            TokenKind::SlashEq => AssignOp::Div,
            TokenKind::PercentEq => AssignOp::Rem,
            TokenKind::AmpEq => AssignOp::BitAnd,
            TokenKind::PipeEq => AssignOp::BitOr,
            TokenKind::CaretEq => AssignOp::BitXor,
            TokenKind::ShlEq => AssignOp::Shl,
            TokenKind::ShrEq => AssignOp::Shr,
            _ => return Ok(target),
        };
        self.advance();
        let value = self.parse_assignment()?;
        Ok(Expr::Assign {
            op,
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    fn is_lambda_start(&self) -> bool {
        match self.peek() {
            TokenKind::Delegate => true,
            TokenKind::Identifier(_) => self.peek_at(1) == &TokenKind::FatArrow,
            TokenKind::LeftParen => {
                let mut depth = 0usize;
                let mut offset = 0;
                loop {
                    match self.peek_at(offset) {
                        TokenKind::LeftParen => depth += 1,
                        TokenKind::RightParen => {
                            depth -= 1;
                            if depth == 0 {
                                return self.peek_at(offset + 1) == &TokenKind::FatArrow;
                            }
                        }
                        TokenKind::Eof | TokenKind::Semicolon | TokenKind::LeftBrace => return false,
                        _ => {}
                    }
                    offset += 1;
                }
            }
            _ => false,
        }
    }

    fn parse_lambda(&mut self) -> Result<Expr, AslError> {
        let span = self.current_span();
        if self.eat(&TokenKind::Delegate) {
            let params = if self.check(&TokenKind::LeftParen) {
                self.parse_params()?.into_iter().map(|p| p.name).collect()
            } else {
                Vec::new()
            };
            let body = LambdaBody::Block(self.parse_block()?);
            return Ok(Expr::Lambda { params, body, span });
        }

        let mut params = Vec::new();
        if self.eat(&TokenKind::LeftParen) {
            let mut last = None;
            while !self.check(&TokenKind::RightParen) && !self.check(&TokenKind::Eof) {
                match self.advance().kind {
                    TokenKind::Identifier(name) => last = Some(name),
                    TokenKind::Comma => params.extend(last.take()),
                    _ => {}
                }
            }
            params.extend(last);
            self.expect(&TokenKind::RightParen)?;
        } else {
            params.push(self.expect_ident("lambda parameter")?);
        }
        self.expect(&TokenKind::FatArrow)?;
        let body = if self.check(&TokenKind::LeftBrace) {
            LambdaBody::Block(self.parse_block()?)
        } else {
            LambdaBody::Expr(Box::new(self.parse_expr()?))
        };
        Ok(Expr::Lambda { params, body, span })
    }

    fn parse_conditional(&mut self) -> Result<Expr, AslError> {
        let cond = self.parse_binary(0)?;
        if !self.eat(&TokenKind::Question) {
            return Ok(cond);
        }
        let then_expr = self.parse_expr()?;
        self.expect(&TokenKind::Colon)?;
        let else_expr = self.parse_conditional()?;
        Ok(Expr::Conditional {
            cond: Box::new(cond),
            then_expr: Box::new(then_expr),
            else_expr: Box::new(else_expr),
        })
    }

    fn binary_op(&self) -> Option<BinaryOp> {
        let op = match self.peek() {
            TokenKind::PipePipe => BinaryOp::Or,
            TokenKind::AmpAmp => BinaryOp::And,
            TokenKind::Pipe => BinaryOp::BitOr,
            TokenKind::Caret => BinaryOp::BitXor,
            TokenKind::Amp => BinaryOp::BitAnd,
            TokenKind::EqEq => BinaryOp::Eq,
            TokenKind::BangEq => BinaryOp::Ne,
            TokenKind::Lt => BinaryOp::Lt,
            TokenKind::Gt => BinaryOp::Gt,
            TokenKind::LtEq => BinaryOp::Le,
            TokenKind::GtEq => BinaryOp::Ge,
            TokenKind::Shl => BinaryOp::Shl,
            TokenKind::Shr => BinaryOp::Shr,
            TokenKind::Plus => BinaryOp::Add,
            TokenKind::Minus => BinaryOp::Sub,
            TokenKind::Star => BinaryOp::Mul,
            TokenKind::Slash => BinaryOp::Div,
            TokenKind::Percent => BinaryOp::Rem,
            _ => return None,
        };
        Some(op)
    }

    /// Precedence climbing over the binary operators; `is`/`as` bind at
    /// relational strength.
    fn parse_binary(&mut self, min_prec: u8) -> Result<Expr, AslError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let relational = BinaryOp::Lt.precedence();
            if matches!(self.peek(), TokenKind::Is | TokenKind::As) && relational >= min_prec {
                let span = self.current_span();
                let op = if self.advance().kind == TokenKind::Is {
                    TypeTestOp::Is
                } else {
                    TypeTestOp::As
                };
                let ty = self.parse_type()?;
                lhs = Expr::TypeTest {
                    op,
                    expr: Box::new(lhs),
                    ty,
                    span,
                };
                continue;
            }
            let op = match self.binary_op() {
                Some(op) if op.precedence() >= min_prec => op,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_binary(op.precedence() + 1)?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, AslError> {
        let span = self.current_span();
        let op = match self.peek() {
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Plus => Some(UnaryOp::Plus),
            TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::Tilde => Some(UnaryOp::BitNot),
            TokenKind::PlusPlus => Some(UnaryOp::PreInc),
            TokenKind::MinusMinus => Some(UnaryOp::PreDec),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary {
                op,
                operand: Box::new(operand),
            });
        }
        match self.peek() {
            TokenKind::Star => {
                self.advance();
                Ok(Expr::Deref(Box::new(self.parse_unary()?), span))
            }
            TokenKind::Amp => {
                self.advance();
                Ok(Expr::AddressOf(Box::new(self.parse_unary()?), span))
            }
            TokenKind::LeftParen if self.is_cast() => {
                self.advance();
                let ty = self.parse_type()?;
                self.expect(&TokenKind::RightParen)?;
                let expr = self.parse_unary()?;
                Ok(Expr::Cast {
                    ty,
                    expr: Box::new(expr),
                })
            }
            _ => self.parse_postfix(),
        }
    }

    /// `(T)x` is a cast when `T` names a vocabulary type and an operand
    /// follows, or when the token after `)` can only start an operand.
    fn is_cast(&self) -> bool {
        let name = match self.peek_at(1) {
            TokenKind::Identifier(name) => name,
            _ => return false,
        };
        let after = match self.peek_at(2) {
            TokenKind::RightParen => self.peek_at(3),
            TokenKind::Star if self.peek_at(3) == &TokenKind::RightParen => self.peek_at(4),
            _ => return false,
        };
        let starts_primary = matches!(
            after,
            TokenKind::Identifier(_)
                | TokenKind::IntLiteral(_)
                | TokenKind::UintLiteral(_)
                | TokenKind::FloatLiteral(_)
                | TokenKind::DoubleLiteral(_)
                | TokenKind::StringLiteral(_)
                | TokenKind::LeftParen
                | TokenKind::Tilde
                | TokenKind::Bang
                | TokenKind::New
                | TokenKind::This
                | TokenKind::Base
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Null
                | TokenKind::Typeof
                | TokenKind::Sizeof
        );
        if types::is_builtin_type(name) {
            starts_primary
                || matches!(
                    after,
                    TokenKind::Minus | TokenKind::Plus | TokenKind::PlusPlus | TokenKind::MinusMinus
                )
        } else {
            starts_primary
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr, AslError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                TokenKind::Dot => {
                    self.advance();
                    let member = self.expect_ident("member name")?;
                    if self.check(&TokenKind::LeftParen) {
                        let args = self.parse_args()?;
                        expr = Expr::Call {
                            receiver: Some(Box::new(expr)),
                            name: member,
                            args,
                        };
                    } else {
                        expr = Expr::Member {
                            target: Box::new(expr),
                            member,
                        };
                    }
                }
                TokenKind::Arrow => {
                    let span = self.current_span();
                    self.advance();
                    let member = self.expect_ident("member name")?;
                    expr = Expr::PointerMember {
                        target: Box::new(expr),
                        member,
                        span,
                    };
                }
                TokenKind::LeftParen => {
                    let name = match expr {
                        Expr::Ident(ref name) => name.clone(),
                        _ => return Err(self.error_here("expression is not callable")),
                    };
                    let args = self.parse_args()?;
                    expr = Expr::Call {
                        receiver: None,
                        name,
                        args,
                    };
                }
                TokenKind::LeftBracket => {
                    self.advance();
                    let index = self.parse_expr()?;
                    self.expect(&TokenKind::RightBracket)?;
                    expr = Expr::Index {
                        target: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                TokenKind::PlusPlus | TokenKind::MinusMinus => {
                    let op = if self.advance().kind == TokenKind::PlusPlus {
                        UnaryOp::PostInc
                    } else {
                        UnaryOp::PostDec
                    };
                    expr = Expr::Unary {
                        op,
                        operand: Box::new(expr),
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_args(&mut self) -> Result<Vec<Arg>, AslError> {
        self.expect(&TokenKind::LeftParen)?;
        let mut args = Vec::new();
        while !self.check(&TokenKind::RightParen) {
            let named = matches!(self.peek(), TokenKind::Identifier(_))
                && self.peek_at(1) == &TokenKind::Colon;
            let name = if named {
                let name = self.expect_ident("argument name")?;
                self.advance();
                Some(name)
            } else {
                None
            };
            // Call-site `ref`/`out` markers mirror the parameter declaration.
            if matches!(self.peek(), TokenKind::Ref | TokenKind::Out | TokenKind::In) {
                self.advance();
            }
            let value = self.parse_expr()?;
            args.push(Arg { name, value });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RightParen)?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr, AslError> {
        let span = self.current_span();
        let token = self.advance();
        let expr = match token.kind {
            TokenKind::IntLiteral(v) => Expr::Literal(Literal::Int(v)),
            TokenKind::UintLiteral(v) => Expr::Literal(Literal::Uint(v)),
            TokenKind::FloatLiteral(v) => Expr::Literal(Literal::Float(v)),
            TokenKind::DoubleLiteral(v) => Expr::Literal(Literal::Double(v)),
            TokenKind::StringLiteral(s) => Expr::Literal(Literal::Str(s)),
            TokenKind::True => Expr::Literal(Literal::Bool(true)),
            TokenKind::False => Expr::Literal(Literal::Bool(false)),
            TokenKind::Null => Expr::Null(span),
            TokenKind::This => Expr::This,
            TokenKind::Base => Expr::Base(span),
            TokenKind::Identifier(name) => {
                let is_query = name == "from"
                    && matches!(self.peek(), TokenKind::Identifier(_))
                    && self.peek_at(1) == &TokenKind::In;
                if is_query {
                    self.parse_query(span)?
                } else {
                    Expr::Ident(name)
                }
            }
            TokenKind::LeftParen => {
                let expr = self.parse_expr()?;
                self.expect(&TokenKind::RightParen)?;
                expr
            }
            TokenKind::New => self.parse_new(span)?,
            TokenKind::Typeof => {
                self.expect(&TokenKind::LeftParen)?;
                let ty = self.parse_type()?;
                self.expect(&TokenKind::RightParen)?;
                Expr::TypeOf(ty, span)
            }
            TokenKind::Sizeof => {
                self.expect(&TokenKind::LeftParen)?;
                let ty = self.parse_type()?;
                self.expect(&TokenKind::RightParen)?;
                Expr::SizeOf(ty, span)
            }
            TokenKind::Stackalloc => {
                let ty_span = self.current_span();
                let name = self.expect_ident("element type")?;
                self.expect(&TokenKind::LeftBracket)?;
                let size = self.parse_expr()?;
                self.expect(&TokenKind::RightBracket)?;
                Expr::StackAlloc {
                    ty: TypeRef {
                        name,
                        array: false,
                        pointer: false,
                        span: ty_span,
                    },
                    size: Box::new(size),
                    span,
                }
            }
            other => {
                return Err(self.error_at(span, format!("unexpected token: {}", other)));
            }
        };
        Ok(expr)
    }

    fn parse_new(&mut self, span: Span) -> Result<Expr, AslError> {
        if self.eat(&TokenKind::LeftBrace) {
            let mut members = Vec::new();
            while !self.check(&TokenKind::RightBrace) {
                let name = self.expect_ident("member name")?;
                let value = if self.eat(&TokenKind::Equals) {
                    self.parse_expr()?
                } else {
                    Expr::Ident(name.clone())
                };
                members.push((name, value));
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(&TokenKind::RightBrace)?;
            return Ok(Expr::AnonymousObject(members, span));
        }

        let ty_span = self.current_span();
        let name = self.expect_ident("type name after new")?;
        let element = TypeRef {
            name,
            array: false,
            pointer: false,
            span: ty_span,
        };
        if self.eat(&TokenKind::LeftBracket) {
            let size = if self.check(&TokenKind::RightBracket) {
                None
            } else {
                Some(Box::new(self.parse_expr()?))
            };
            self.expect(&TokenKind::RightBracket)?;
            let init = if self.check(&TokenKind::LeftBrace) {
                Some(self.parse_brace_list()?)
            } else {
                None
            };
            if size.is_none() && init.is_none() {
                return Err(self.error_at(span, "array creation requires a size or an initializer"));
            }
            return Ok(Expr::NewArray { element, size, init });
        }
        let args = self.parse_args()?;
        Ok(Expr::New { ty: element, args })
    }

    fn parse_query(&mut self, span: Span) -> Result<Expr, AslError> {
        self.expect_ident("range variable")?;
        self.expect(&TokenKind::In)?;
        self.parse_conditional()?;
        loop {
            let clause = match self.peek() {
                TokenKind::Identifier(word) => word.clone(),
                _ => break,
            };
            match clause.as_str() {
                "where" | "select" | "orderby" => {
                    self.advance();
                    loop {
                        self.parse_conditional()?;
                        if let TokenKind::Identifier(dir) = self.peek() {
                            if dir == "ascending" || dir == "descending" {
                                self.advance();
                            }
                        }
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                "let" => {
                    self.advance();
                    self.expect_ident("range variable")?;
                    self.expect(&TokenKind::Equals)?;
                    self.parse_conditional()?;
                }
                "from" => {
                    self.advance();
                    self.expect_ident("range variable")?;
                    self.expect(&TokenKind::In)?;
                    self.parse_conditional()?;
                }
                "join" => {
                    self.advance();
                    self.expect_ident("range variable")?;
                    self.expect(&TokenKind::In)?;
                    self.parse_conditional()?;
                    self.expect_word("on")?;
                    self.parse_conditional()?;
                    self.expect_word("equals")?;
                    self.parse_conditional()?;
                }
                "group" => {
                    self.advance();
                    self.parse_conditional()?;
                    self.expect_word("by")?;
                    self.parse_conditional()?;
                }
                "into" => {
                    self.advance();
                    self.expect_ident("continuation name")?;
                }
                _ => break,
            }
        }
        Ok(Expr::Query(span))
    }
}
