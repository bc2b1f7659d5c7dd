//! Guard/action expression language: lexer, AST, and parser.
//!
//! Guards are single boolean expressions; actions are sequences of
//! statements separated by newlines or `;`. The surface syntax is a small
//! Python-flavoured subset: literals, names, attribute access, calls,
//! arithmetic, comparisons, and boolean operators (`and`/`or`/`not` with
//! `&&`/`||`/`!` accepted as synonyms).

#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    None,
    Name(String),
    Attr(Box<Expr>, String),
    Call(Box<Expr>, Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AssignTarget {
    Name(String),
    /// Attribute path assignment (`obj.field = …`). Only meaningful when the
    /// base resolves to the absorbing sentinel; see the evaluator.
    Attr(Box<Expr>, String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Assign(AssignTarget, Expr),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    True,
    False,
    None,
    And,
    Or,
    Not,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Assign,
    Dot,
    Comma,
    LParen,
    RParen,
    Separator,
}

struct Lexer<'input> {
    input: &'input str,
    pos: usize,
}

impl<'input> Lexer<'input> {
    fn new(input: &'input str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.as_bytes().get(self.pos + offset).copied()
    }

    fn skip_ws(&mut self) {
        while let Some(b) = self.peek() {
            if b == b' ' || b == b'\t' || b == b'\r' {
                self.pos += 1;
                continue;
            }
            // Comments run to end of line; the newline itself is a separator.
            if b == b'#' {
                while let Some(c) = self.peek() {
                    if c == b'\n' {
                        break;
                    }
                    self.pos += 1;
                }
                continue;
            }
            break;
        }
    }

    fn lex_number(&mut self) -> Result<Tok, ParseError> {
        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
        let mut is_float = false;
        if self.peek() == Some(b'.') && self.peek_at(1).is_some_and(|b| b.is_ascii_digit()) {
            is_float = true;
            self.pos += 1;
            while self.peek().is_some_and(|b| b.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        let text = &self.input[start..self.pos];
        if is_float {
            text.parse::<f64>()
                .map(Tok::Float)
                .map_err(|_| ParseError::new(format!("invalid float literal: {text}")))
        } else {
            text.parse::<i64>()
                .map(Tok::Int)
                .map_err(|_| ParseError::new(format!("invalid integer literal: {text}")))
        }
    }

    fn lex_string(&mut self, quote: u8) -> Result<Tok, ParseError> {
        self.pos += 1;
        let mut out = String::new();
        loop {
            match self.peek() {
                Some(b) if b == quote => {
                    self.pos += 1;
                    return Ok(Tok::Str(out));
                }
                Some(b'\\') => {
                    self.pos += 1;
                    let escaped = match self.peek() {
                        Some(b'n') => '\n',
                        Some(b't') => '\t',
                        Some(b'\\') => '\\',
                        Some(b'\'') => '\'',
                        Some(b'"') => '"',
                        other => {
                            return Err(ParseError::new(format!(
                                "unsupported escape sequence: \\{}",
                                other.map(char::from).unwrap_or(' ')
                            )));
                        }
                    };
                    out.push(escaped);
                    self.pos += 1;
                }
                Some(_) => {
                    let ch_start = self.pos;
                    let rest = &self.input[ch_start..];
                    let ch = rest.chars().next().unwrap_or('\u{fffd}');
                    out.push(ch);
                    self.pos += ch.len_utf8();
                }
                None => return Err(ParseError::new("unterminated string literal")),
            }
        }
    }

    fn lex_ident(&mut self) -> Tok {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|b| b.is_ascii_alphanumeric() || b == b'_')
        {
            self.pos += 1;
        }
        match &self.input[start..self.pos] {
            "True" | "true" => Tok::True,
            "False" | "false" => Tok::False,
            "None" => Tok::None,
            "and" => Tok::And,
            "or" => Tok::Or,
            "not" => Tok::Not,
            ident => Tok::Ident(ident.to_string()),
        }
    }

    fn next_token(&mut self) -> Result<Option<Tok>, ParseError> {
        self.skip_ws();
        let Some(b) = self.peek() else {
            return Ok(None);
        };
        let tok = match b {
            b'\n' | b';' => {
                self.pos += 1;
                Tok::Separator
            }
            b'0'..=b'9' => return self.lex_number().map(Some),
            b'"' | b'\'' => return self.lex_string(b).map(Some),
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.lex_ident(),
            b'+' => {
                self.pos += 1;
                Tok::Plus
            }
            b'-' => {
                self.pos += 1;
                Tok::Minus
            }
            b'*' => {
                self.pos += 1;
                Tok::Star
            }
            b'/' => {
                self.pos += 1;
                Tok::Slash
            }
            b'%' => {
                self.pos += 1;
                Tok::Percent
            }
            b'.' => {
                self.pos += 1;
                Tok::Dot
            }
            b',' => {
                self.pos += 1;
                Tok::Comma
            }
            b'(' => {
                self.pos += 1;
                Tok::LParen
            }
            b')' => {
                self.pos += 1;
                Tok::RParen
            }
            b'=' => {
                self.pos += 1;
                if self.peek() == Some(b'=') {
                    self.pos += 1;
                    Tok::EqEq
                } else {
                    Tok::Assign
                }
            }
            b'!' => {
                self.pos += 1;
                if self.peek() == Some(b'=') {
                    self.pos += 1;
                    Tok::NotEq
                } else {
                    Tok::Not
                }
            }
            b'<' => {
                self.pos += 1;
                if self.peek() == Some(b'=') {
                    self.pos += 1;
                    Tok::Le
                } else {
                    Tok::Lt
                }
            }
            b'>' => {
                self.pos += 1;
                if self.peek() == Some(b'=') {
                    self.pos += 1;
                    Tok::Ge
                } else {
                    Tok::Gt
                }
            }
            b'&' => {
                if self.peek_at(1) == Some(b'&') {
                    self.pos += 2;
                    Tok::And
                } else {
                    return Err(ParseError::new("unexpected character: &"));
                }
            }
            b'|' => {
                if self.peek_at(1) == Some(b'|') {
                    self.pos += 2;
                    Tok::Or
                } else {
                    return Err(ParseError::new("unexpected character: |"));
                }
            }
            other => {
                return Err(ParseError::new(format!(
                    "unexpected character: {}",
                    char::from(other)
                )));
            }
        };
        Ok(Some(tok))
    }
}

fn tokenize(input: &str) -> Result<Vec<Tok>, ParseError> {
    let mut lexer = Lexer::new(input);
    let mut toks = Vec::new();
    while let Some(tok) = lexer.next_token()? {
        toks.push(tok);
    }
    Ok(toks)
}

struct Parser {
    toks: Vec<Tok>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn bump(&mut self) -> Option<Tok> {
        let tok = self.toks.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.peek() == Some(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: &Tok, context: &str) -> Result<(), ParseError> {
        if self.eat(tok) {
            Ok(())
        } else {
            Err(ParseError::new(format!(
                "expected {tok:?} {context}, found {:?}",
                self.peek()
            )))
        }
    }

    fn skip_separators(&mut self) {
        while self.eat(&Tok::Separator) {}
    }

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_and()?;
        while self.eat(&Tok::Or) {
            let rhs = self.parse_and()?;
            lhs = Expr::Binary(BinaryOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_not()?;
        while self.eat(&Tok::And) {
            let rhs = self.parse_not()?;
            lhs = Expr::Binary(BinaryOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expr, ParseError> {
        if self.eat(&Tok::Not) {
            let operand = self.parse_not()?;
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(operand)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let lhs = self.parse_additive()?;
        let op = match self.peek() {
            Some(Tok::EqEq) => BinaryOp::Eq,
            Some(Tok::NotEq) => BinaryOp::Ne,
            Some(Tok::Lt) => BinaryOp::Lt,
            Some(Tok::Le) => BinaryOp::Le,
            Some(Tok::Gt) => BinaryOp::Gt,
            Some(Tok::Ge) => BinaryOp::Ge,
            _ => return Ok(lhs),
        };
        self.pos += 1;
        let rhs = self.parse_additive()?;
        Ok(Expr::Binary(op, Box::new(lhs), Box::new(rhs)))
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Plus) => BinaryOp::Add,
                Some(Tok::Minus) => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Star) => BinaryOp::Mul,
                Some(Tok::Slash) => BinaryOp::Div,
                Some(Tok::Percent) => BinaryOp::Mod,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.eat(&Tok::Minus) {
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(operand)));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.eat(&Tok::Dot) {
                let Some(Tok::Ident(name)) = self.bump() else {
                    return Err(ParseError::new("expected attribute name after `.`"));
                };
                expr = Expr::Attr(Box::new(expr), name);
            } else if self.eat(&Tok::LParen) {
                let mut args = Vec::new();
                if self.peek() != Some(&Tok::RParen) {
                    loop {
                        args.push(self.parse_expr()?);
                        if !self.eat(&Tok::Comma) {
                            break;
                        }
                    }
                }
                self.expect(&Tok::RParen, "to close call arguments")?;
                expr = Expr::Call(Box::new(expr), args);
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.bump() {
            Some(Tok::Int(v)) => Ok(Expr::Int(v)),
            Some(Tok::Float(v)) => Ok(Expr::Float(v)),
            Some(Tok::Str(v)) => Ok(Expr::Str(v)),
            Some(Tok::True) => Ok(Expr::Bool(true)),
            Some(Tok::False) => Ok(Expr::Bool(false)),
            Some(Tok::None) => Ok(Expr::None),
            Some(Tok::Ident(name)) => Ok(Expr::Name(name)),
            Some(Tok::LParen) => {
                let inner = self.parse_expr()?;
                self.expect(&Tok::RParen, "to close a parenthesized expression")?;
                Ok(inner)
            }
            other => Err(ParseError::new(format!(
                "expected an expression, found {other:?}"
            ))),
        }
    }

    fn parse_statement(&mut self) -> Result<Stmt, ParseError> {
        let expr = self.parse_expr()?;
        if !self.eat(&Tok::Assign) {
            return Ok(Stmt::Expr(expr));
        }
        let target = match expr {
            Expr::Name(name) => AssignTarget::Name(name),
            Expr::Attr(base, name) => AssignTarget::Attr(base, name),
            other => {
                return Err(ParseError::new(format!(
                    "invalid assignment target: {other:?}"
                )));
            }
        };
        let value = self.parse_expr()?;
        Ok(Stmt::Assign(target, value))
    }
}

/// Parses a single guard expression.
pub fn parse_expression(src: &str) -> Result<Expr, ParseError> {
    let mut parser = Parser {
        toks: tokenize(src)?,
        pos: 0,
    };
    parser.skip_separators();
    let expr = parser.parse_expr()?;
    parser.skip_separators();
    if let Some(tok) = parser.peek() {
        return Err(ParseError::new(format!(
            "unexpected trailing input: {tok:?}"
        )));
    }
    Ok(expr)
}

/// Parses action code: statements separated by newlines or `;`.
pub fn parse_statements(src: &str) -> Result<Vec<Stmt>, ParseError> {
    let mut parser = Parser {
        toks: tokenize(src)?,
        pos: 0,
    };
    let mut stmts = Vec::new();
    loop {
        parser.skip_separators();
        if parser.peek().is_none() {
            return Ok(stmts);
        }
        stmts.push(parser.parse_statement()?);
        if parser.peek().is_some() && !parser.eat(&Tok::Separator) {
            return Err(ParseError::new(format!(
                "expected end of statement, found {:?}",
                parser.peek()
            )));
        }
    }
}
