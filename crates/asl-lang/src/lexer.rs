use std::fmt;

use asl_core::AslError;

/// Source location for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

impl Span {
    pub fn new(start: usize, end: usize, line: usize, column: usize) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }

    /// Span for nodes assembled through the builder API rather than parsed.
    pub fn synthetic() -> Self {
        Self::new(0, 0, 0, 0)
    }
}

/// Token kinds in ASL.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Keywords
    Class,
    Struct,
    Static,
    Const,
    New,
    Return,
    If,
    Else,
    While,
    Do,
    For,
    Foreach,
    In,
    Out,
    Ref,
    Switch,
    Case,
    Default,
    Break,
    Continue,
    Discard,
    This,
    Base,
    True,
    False,
    Null,
    Try,
    Catch,
    Finally,
    Throw,
    Goto,
    Yield,
    Lock,
    Using,
    Unsafe,
    Fixed,
    Stackalloc,
    Typeof,
    Sizeof,
    Is,
    As,
    Delegate,
    /// Access and inheritance modifiers; accepted and ignored.
    Modifier(String),

    // Literals
    Identifier(String),
    IntLiteral(u64),
    UintLiteral(u64),
    FloatLiteral(f64),
    DoubleLiteral(f64),
    StringLiteral(String),

    // Punctuation
    LeftBrace,
    RightBrace,
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    Semicolon,
    Comma,
    Dot,
    Colon,
    Question,
    FatArrow,
    Arrow,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Amp,
    Pipe,
    Caret,
    Tilde,
    Bang,
    Equals,
    EqEq,
    BangEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    AmpAmp,
    PipePipe,
    Shl,
    Shr,
    PlusPlus,
    MinusMinus,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    PercentEq,
    AmpEq,
    PipeEq,
    CaretEq,
    ShlEq,
    ShrEq,

    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenKind::Class => "class",
            TokenKind::Struct => "struct",
            TokenKind::Static => "static",
            TokenKind::Const => "const",
            TokenKind::New => "new",
            TokenKind::Return => "return",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::While => "while",
            TokenKind::Do => "do",
            TokenKind::For => "for",
            TokenKind::Foreach => "foreach",
            TokenKind::In => "in",
            TokenKind::Out => "out",
            TokenKind::Ref => "ref",
            TokenKind::Switch => "switch",
            TokenKind::Case => "case",
            TokenKind::Default => "default",
            TokenKind::Break => "break",
            TokenKind::Continue => "continue",
            TokenKind::Discard => "discard",
            TokenKind::This => "this",
            TokenKind::Base => "base",
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::Null => "null",
            TokenKind::Try => "try",
            TokenKind::Catch => "catch",
            TokenKind::Finally => "finally",
            TokenKind::Throw => "throw",
            TokenKind::Goto => "goto",
            TokenKind::Yield => "yield",
            TokenKind::Lock => "lock",
            TokenKind::Using => "using",
            TokenKind::Unsafe => "unsafe",
            TokenKind::Fixed => "fixed",
            TokenKind::Stackalloc => "stackalloc",
            TokenKind::Typeof => "typeof",
            TokenKind::Sizeof => "sizeof",
            TokenKind::Is => "is",
            TokenKind::As => "as",
            TokenKind::Delegate => "delegate",
            TokenKind::Modifier(s) => return write!(f, "{}", s),
            TokenKind::Identifier(s) => return write!(f, "{}", s),
            TokenKind::IntLiteral(n) => return write!(f, "{}", n),
            TokenKind::UintLiteral(n) => return write!(f, "{}u", n),
            TokenKind::FloatLiteral(n) => return write!(f, "{}f", n),
            TokenKind::DoubleLiteral(n) => return write!(f, "{}d", n),
            TokenKind::StringLiteral(s) => return write!(f, "\"{}\"", s),
            TokenKind::LeftBrace => "{",
            TokenKind::RightBrace => "}",
            TokenKind::LeftParen => "(",
            TokenKind::RightParen => ")",
            TokenKind::LeftBracket => "[",
            TokenKind::RightBracket => "]",
            TokenKind::Semicolon => ";",
            TokenKind::Comma => ",",
            TokenKind::Dot => ".",
            TokenKind::Colon => ":",
            TokenKind::Question => "?",
            TokenKind::FatArrow => "=>",
            TokenKind::Arrow => "->",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Amp => "&",
            TokenKind::Pipe => "|",
            TokenKind::Caret => "^",
            TokenKind::Tilde => "~",
            TokenKind::Bang => "!",
            TokenKind::Equals => "=",
            TokenKind::EqEq => "==",
            TokenKind::BangEq => "!=",
            TokenKind::Lt => "<",
            TokenKind::Gt => ">",
            TokenKind::LtEq => "<=",
            TokenKind::GtEq => ">=",
            TokenKind::AmpAmp => "&&",
            TokenKind::PipePipe => "||",
            TokenKind::Shl => "<<",
            TokenKind::Shr => ">>",
            TokenKind::PlusPlus => "++",
            TokenKind::MinusMinus => "--",
            TokenKind::PlusEq => "+=",
            TokenKind::MinusEq => "-=",
            TokenKind::StarEq => "*=",
            TokenKind::SlashEq => "/=",
            TokenKind::PercentEq => "%=",
            TokenKind::AmpEq => "&=",
            TokenKind::PipeEq => "|=",
            TokenKind::CaretEq => "^=",
            TokenKind::ShlEq => "<<=",
            TokenKind::ShrEq => ">>=",
            TokenKind::Eof => "EOF",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

fn keyword(ident: &str) -> Option<TokenKind> {
    let kind = match ident {
        "class" => TokenKind::Class,
        "struct" => TokenKind::Struct,
        "static" => TokenKind::Static,
        "const" => TokenKind::Const,
        "new" => TokenKind::New,
        "return" => TokenKind::Return,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "while" => TokenKind::While,
        "do" => TokenKind::Do,
        "for" => TokenKind::For,
        "foreach" => TokenKind::Foreach,
        "in" => TokenKind::In,
        "out" => TokenKind::Out,
        "ref" => TokenKind::Ref,
        "switch" => TokenKind::Switch,
        "case" => TokenKind::Case,
        "default" => TokenKind::Default,
        "break" => TokenKind::Break,
        "continue" => TokenKind::Continue,
        "discard" => TokenKind::Discard,
        "this" => TokenKind::This,
        "base" => TokenKind::Base,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "null" => TokenKind::Null,
        "try" => TokenKind::Try,
        "catch" => TokenKind::Catch,
        "finally" => TokenKind::Finally,
        "throw" => TokenKind::Throw,
        "goto" => TokenKind::Goto,
        "yield" => TokenKind::Yield,
        "lock" => TokenKind::Lock,
        "using" => TokenKind::Using,
        "unsafe" => TokenKind::Unsafe,
        "fixed" => TokenKind::Fixed,
        "stackalloc" => TokenKind::Stackalloc,
        "typeof" => TokenKind::Typeof,
        "sizeof" => TokenKind::Sizeof,
        "is" => TokenKind::Is,
        "as" => TokenKind::As,
        "delegate" => TokenKind::Delegate,
        "public" | "private" | "protected" | "internal" | "readonly" | "override"
        | "virtual" | "sealed" | "partial" => TokenKind::Modifier(ident.to_string()),
        _ => return None,
    };
    Some(kind)
}

pub struct Lexer {
    source: Vec<char>,
    file: String,
    pos: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    pub fn new(source: &str, file: impl Into<String>) -> Self {
        Self {
            source: source.chars().collect(),
            file: file.into(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>, AslError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }

    fn error(&self, message: impl Into<String>, line: usize, column: usize) -> AslError {
        AslError::parse(message, &self.file, line, column)
    }

    fn peek(&self) -> Option<char> {
        self.source.get(self.pos).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.source.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.source.get(self.pos).copied()?;
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<(), AslError> {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else if ch == '/' && self.peek_next() == Some('/') {
                while let Some(c) = self.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.advance();
                }
            } else if ch == '/' && self.peek_next() == Some('*') {
                let (line, column) = (self.line, self.column);
                self.advance();
                self.advance();
                loop {
                    match self.advance() {
                        Some('*') if self.peek() == Some('/') => {
                            self.advance();
                            break;
                        }
                        Some(_) => {}
                        None => return Err(self.error("unterminated block comment", line, column)),
                    }
                }
            } else {
                break;
            }
        }
        Ok(())
    }

    fn next_token(&mut self) -> Result<Token, AslError> {
        self.skip_whitespace_and_comments()?;

        let start = self.pos;
        let line = self.line;
        let column = self.column;

        let ch = match self.peek() {
            Some(ch) => ch,
            None => {
                return Ok(Token::new(
                    TokenKind::Eof,
                    Span::new(start, start, line, column),
                ));
            }
        };

        let kind = match ch {
            '{' => self.single(TokenKind::LeftBrace),
            '}' => self.single(TokenKind::RightBrace),
            '(' => self.single(TokenKind::LeftParen),
            ')' => self.single(TokenKind::RightParen),
            '[' => self.single(TokenKind::LeftBracket),
            ']' => self.single(TokenKind::RightBracket),
            ';' => self.single(TokenKind::Semicolon),
            ',' => self.single(TokenKind::Comma),
            ':' => self.single(TokenKind::Colon),
            '?' => self.single(TokenKind::Question),
            '~' => self.single(TokenKind::Tilde),
            '.' if !self.peek_next().is_some_and(|c| c.is_ascii_digit()) => {
                self.single(TokenKind::Dot)
            }
            '+' => {
                self.advance();
                if self.eat('+') {
                    TokenKind::PlusPlus
                } else if self.eat('=') {
                    TokenKind::PlusEq
                } else {
                    TokenKind::Plus
                }
            }
            '-' => {
                self.advance();
                if self.eat('-') {
                    TokenKind::MinusMinus
                } else if self.eat('=') {
                    TokenKind::MinusEq
                } else if self.eat('>') {
                    TokenKind::Arrow
                } else {
                    TokenKind::Minus
                }
            }
            '*' => self.with_assign(TokenKind::Star, TokenKind::StarEq),
            '/' => self.with_assign(TokenKind::Slash, TokenKind::SlashEq),
            '%' => self.with_assign(TokenKind::Percent, TokenKind::PercentEq),
            '^' => self.with_assign(TokenKind::Caret, TokenKind::CaretEq),
            '!' => self.with_assign(TokenKind::Bang, TokenKind::BangEq),
            '=' => {
                self.advance();
                if self.eat('=') {
                    TokenKind::EqEq
                } else if self.eat('>') {
                    TokenKind::FatArrow
                } else {
                    TokenKind::Equals
                }
            }
            '&' => {
                self.advance();
                if self.eat('&') {
                    TokenKind::AmpAmp
                } else if self.eat('=') {
                    TokenKind::AmpEq
                } else {
                    TokenKind::Amp
                }
            }
            '|' => {
                self.advance();
                if self.eat('|') {
                    TokenKind::PipePipe
                } else if self.eat('=') {
                    TokenKind::PipeEq
                } else {
                    TokenKind::Pipe
                }
            }
            '<' => {
                self.advance();
                if self.eat('<') {
                    if self.eat('=') {
                        TokenKind::ShlEq
                    } else {
                        TokenKind::Shl
                    }
                } else if self.eat('=') {
                    TokenKind::LtEq
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                self.advance();
                if self.eat('>') {
                    if self.eat('=') {
                        TokenKind::ShrEq
                    } else {
                        TokenKind::Shr
                    }
                } else if self.eat('=') {
                    TokenKind::GtEq
                } else {
                    TokenKind::Gt
                }
            }
            '"' => {
                self.advance();
                let mut s = String::new();
                loop {
                    match self.advance() {
                        Some('"') => break,
                        Some('\\') => match self.advance() {
                            Some('n') => s.push('\n'),
                            Some('t') => s.push('\t'),
                            Some(c) => s.push(c),
                            None => return Err(self.error("unterminated string literal", line, column)),
                        },
                        Some(c) => s.push(c),
                        None => return Err(self.error("unterminated string literal", line, column)),
                    }
                }
                TokenKind::StringLiteral(s)
            }
            c if c.is_ascii_digit() || c == '.' => self.read_number(line, column)?,
            c if c.is_alphabetic() || c == '_' || c == '@' => {
                // `@` is the verbatim-identifier prefix.
                if c == '@' {
                    self.advance();
                }
                let ident = self.read_while(|c| c.is_alphanumeric() || c == '_');
                if c == '@' {
                    TokenKind::Identifier(ident)
                } else {
                    keyword(&ident).unwrap_or(TokenKind::Identifier(ident))
                }
            }
            _ => {
                return Err(self.error(format!("unexpected character: '{}'", ch), line, column));
            }
        };

        Ok(Token::new(kind, Span::new(start, self.pos, line, column)))
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.advance();
        kind
    }

    fn with_assign(&mut self, plain: TokenKind, assign: TokenKind) -> TokenKind {
        self.advance();
        if self.eat('=') {
            assign
        } else {
            plain
        }
    }

    /// Numeric literal. Unsuffixed literals with a fraction or exponent are
    /// single precision; `d`/`lf` selects double, `u` unsigned, `f` float.
    fn read_number(&mut self, line: usize, column: usize) -> Result<TokenKind, AslError> {
        if self.peek() == Some('0') && matches!(self.peek_next(), Some('x') | Some('X')) {
            self.advance();
            self.advance();
            let digits = self.read_while(|c| c.is_ascii_hexdigit());
            let value = u64::from_str_radix(&digits, 16)
                .map_err(|_| self.error(format!("invalid hex literal: 0x{}", digits), line, column))?;
            return Ok(if self.eat('u') || self.eat('U') {
                TokenKind::UintLiteral(value)
            } else {
                TokenKind::IntLiteral(value)
            });
        }

        let mut text = self.read_while(|c| c.is_ascii_digit());
        let mut fractional = false;
        if self.peek() == Some('.') && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
            text.push('.');
            text.push_str(&self.read_while(|c| c.is_ascii_digit()));
            fractional = true;
        } else if self.peek() == Some('.')
            && !self.peek_next().is_some_and(|c| c.is_alphabetic() || c == '_')
        {
            // `1.` is a complete float literal.
            self.advance();
            fractional = true;
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            let sign_or_digit = self.peek_next();
            if sign_or_digit.is_some_and(|c| c.is_ascii_digit() || c == '+' || c == '-') {
                self.advance();
                text.push('e');
                if let Some(sign) = self.peek().filter(|c| *c == '+' || *c == '-') {
                    self.advance();
                    text.push(sign);
                }
                text.push_str(&self.read_while(|c| c.is_ascii_digit()));
                fractional = true;
            }
        }

        let invalid = |lexer: &Self| lexer.error(format!("invalid number: {}", text), line, column);
        let suffix = self.read_while(|c| c.is_ascii_alphabetic());
        let kind = match suffix.as_str() {
            "f" | "F" => TokenKind::FloatLiteral(text.parse().map_err(|_| invalid(self))?),
            "d" | "D" | "lf" | "LF" => TokenKind::DoubleLiteral(text.parse().map_err(|_| invalid(self))?),
            "u" | "U" if !fractional => TokenKind::UintLiteral(text.parse().map_err(|_| invalid(self))?),
            "" if fractional => TokenKind::FloatLiteral(text.parse().map_err(|_| invalid(self))?),
            "" => TokenKind::IntLiteral(text.parse().map_err(|_| invalid(self))?),
            other => {
                return Err(self.error(
                    format!("unsupported numeric suffix '{}' on {}", other, text),
                    line,
                    column,
                ))
            }
        };
        Ok(kind)
    }

    fn read_while(&mut self, predicate: impl Fn(char) -> bool) -> String {
        let mut result = String::new();
        while let Some(ch) = self.peek() {
            if predicate(ch) {
                result.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src, "test.asl")
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_numeric_literal_kinds() {
        assert_eq!(
            kinds("1 1.5 2f 3u 4d 0x10 1e3 2.5lf"),
            vec![
                TokenKind::IntLiteral(1),
                TokenKind::FloatLiteral(1.5),
                TokenKind::FloatLiteral(2.0),
                TokenKind::UintLiteral(3),
                TokenKind::DoubleLiteral(4.0),
                TokenKind::IntLiteral(16),
                TokenKind::FloatLiteral(1000.0),
                TokenKind::DoubleLiteral(2.5),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_compound_operators() {
        assert_eq!(
            kinds("a <<= b >> c => d -> e %= f"),
            vec![
                TokenKind::Identifier("a".into()),
                TokenKind::ShlEq,
                TokenKind::Identifier("b".into()),
                TokenKind::Shr,
                TokenKind::Identifier("c".into()),
                TokenKind::FatArrow,
                TokenKind::Identifier("d".into()),
                TokenKind::Arrow,
                TokenKind::Identifier("e".into()),
                TokenKind::PercentEq,
                TokenKind::Identifier("f".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comments_and_keywords() {
        assert_eq!(
            kinds("/* block */ public static class // trailing\n Foo"),
            vec![
                TokenKind::Modifier("public".into()),
                TokenKind::Static,
                TokenKind::Class,
                TokenKind::Identifier("Foo".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_member_access_on_literal_is_not_a_float() {
        assert_eq!(
            kinds("v.xy"),
            vec![
                TokenKind::Identifier("v".into()),
                TokenKind::Dot,
                TokenKind::Identifier("xy".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_unexpected_character_reports_location() {
        let err = Lexer::new("a\n  $", "bad.asl").tokenize().unwrap_err();
        assert_eq!(
            err.to_string(),
            "parse error: unexpected character: '$' at bad.asl:2:3"
        );
    }
}
