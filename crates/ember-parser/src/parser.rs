// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Recursive-descent / precedence-climbing parser for Ember.

use ember_ast::decl::{Decl, DeclKind, FnDecl};
use ember_ast::expr::{BinOp, Expr, ExprKind, UnaryOp};
use ember_ast::stmt::{Block, SelectArm, Stmt, StmtKind};
use ember_ast::token::{Token, TokenKind};
use ember_ast::{NodeId, Span};

use crate::hints;

/// Maximum number of errors to collect before giving up on the whole parse.
const MAX_ERRORS: usize = 20;

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<ParseError>,
    next_node_id: u32,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            errors: Vec::new(),
            next_node_id: 0,
        }
    }

    pub fn parse(mut self) -> ParseResult {
        let mut decls = Vec::new();
        while !self.at_end() {
            match self.parse_decl() {
                Some(decl) => decls.push(decl),
                None => {
                    if self.errors.len() >= MAX_ERRORS {
                        break;
                    }
                    self.synchronize();
                }
            }
        }
        ParseResult {
            decls,
            errors: self.errors,
        }
    }

    fn next_id(&mut self) -> NodeId {
        let id = NodeId(self.next_node_id);
        self.next_node_id += 1;
        id
    }

    // --- token stream helpers -------------------------------------------

    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].kind
    }

    fn peek_span(&self) -> Span {
        self.tokens[self.pos.min(self.tokens.len() - 1)].span
    }

    fn at_end(&self) -> bool {
        matches!(self.peek(), TokenKind::Eof)
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(self.peek()) == std::mem::discriminant(kind)
    }

    /// True when the current token is an identifier directly followed by a
    /// bare `=` (not `==`), i.e. the start of an assignment statement.
    fn peek_ahead_is_assign(&self) -> bool {
        let next_pos = (self.pos + 1).min(self.tokens.len() - 1);
        matches!(self.tokens[next_pos].kind, TokenKind::Eq)
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.check(&kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        if self.check(&kind) {
            Ok(self.advance())
        } else {
            let hint = hints::for_expected(kind.display_name(), self.peek());
            let mut message = format!(
                "expected {}, found {}",
                kind.display_name(),
                self.peek().display_name()
            );
            if let Some(hint) = hint {
                message.push_str(" (");
                message.push_str(hint);
                message.push(')');
            }
            Err(self.error(message))
        }
    }

    fn expect_ident(&mut self) -> Result<String, ParseError> {
        match self.peek().clone() {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(name)
            }
            other => {
                let hint = hints::for_expected("a name", &other);
                let mut message = format!("expected a name, found {}", other.display_name());
                if let Some(hint) = hint {
                    message.push_str(" (");
                    message.push_str(hint);
                    message.push(')');
                }
                Err(self.error(message))
            }
        }
    }

    fn error(&mut self, message: impl Into<String>) -> ParseError {
        let err = ParseError {
            message: message.into(),
            span: self.peek_span(),
        };
        self.errors.push(err.clone());
        err
    }

    /// Skip tokens until the start of the next top-level declaration, so
    /// one bad function doesn't stop the rest of the file from parsing.
    fn synchronize(&mut self) {
        while !self.at_end() {
            if matches!(self.peek(), TokenKind::Func) {
                return;
            }
            self.advance();
        }
    }

    // --- declarations ------------------------------------------------------

    fn parse_decl(&mut self) -> Option<Decl> {
        let start = self.peek_span();
        self.expect(TokenKind::Func).ok()?;
        let name = self.expect_ident().ok()?;
        self.expect(TokenKind::LParen).ok()?;
        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                params.push(self.expect_ident().ok()?);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen).ok()?;
        let body = self.parse_block().ok()?;
        let end = self.peek_span();
        Some(Decl {
            id: self.next_id(),
            kind: DeclKind::Fn(FnDecl { name, params, body }),
            span: Span::new(start.start, end.start),
        })
    }

    // --- statements ----------------------------------------------------

    fn parse_block(&mut self) -> Result<Block, ParseError> {
        self.expect(TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.at_end() {
            match self.parse_stmt() {
                Ok(stmt) => stmts.push(stmt),
                Err(e) => {
                    if self.errors.len() >= MAX_ERRORS {
                        return Err(e);
                    }
                    // Resync to the next statement boundary within this block.
                    while !self.at_end()
                        && !self.check(&TokenKind::Semi)
                        && !self.check(&TokenKind::RBrace)
                    {
                        self.advance();
                    }
                    self.eat(TokenKind::Semi);
                }
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok(stmts)
    }

    fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        let start = self.peek_span();
        let kind = match self.peek().clone() {
            TokenKind::Let => {
                self.advance();
                if self.eat(TokenKind::LParen) {
                    let a = self.expect_ident()?;
                    self.expect(TokenKind::Comma)?;
                    let b = self.expect_ident()?;
                    self.expect(TokenKind::RParen)?;
                    self.expect(TokenKind::Eq)?;
                    let init = self.parse_expr()?;
                    self.expect(TokenKind::Semi)?;
                    StmtKind::LetTuple { names: (a, b), init }
                } else {
                    let name = self.expect_ident()?;
                    self.expect(TokenKind::Eq)?;
                    let init = self.parse_expr()?;
                    self.expect(TokenKind::Semi)?;
                    StmtKind::Let { name, init }
                }
            }
            TokenKind::Return => {
                self.advance();
                let value = if self.check(&TokenKind::Semi) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect(TokenKind::Semi)?;
                StmtKind::Return(value)
            }
            TokenKind::Yield => {
                self.advance();
                self.expect(TokenKind::Semi)?;
                StmtKind::Yield
            }
            TokenKind::If => {
                self.advance();
                let cond = self.parse_expr()?;
                let then_branch = self.parse_block()?;
                let else_branch = if self.eat(TokenKind::Else) {
                    Some(self.parse_block()?)
                } else {
                    None
                };
                StmtKind::If {
                    cond,
                    then_branch,
                    else_branch,
                }
            }
            TokenKind::While => {
                self.advance();
                let cond = self.parse_expr()?;
                let body = self.parse_block()?;
                StmtKind::While { cond, body }
            }
            TokenKind::Spawn => {
                let (priority, body) = self.parse_spawn_tail()?;
                StmtKind::Spawn { priority, body }
            }
            TokenKind::Select => {
                self.advance();
                let (arms, default) = self.parse_select_body()?;
                StmtKind::Select { arms, default }
            }
            TokenKind::Ident(name) if self.peek_ahead_is_assign() => {
                self.advance();
                self.expect(TokenKind::Eq)?;
                let value = self.parse_expr()?;
                self.expect(TokenKind::Semi)?;
                StmtKind::Assign { name, value }
            }
            _ => {
                let expr = self.parse_expr()?;
                self.expect(TokenKind::Semi)?;
                StmtKind::Expr(expr)
            }
        };
        let end = self.peek_span();
        Ok(Stmt {
            id: self.next_id(),
            kind,
            span: Span::new(start.start, end.start),
        })
    }

    /// Parses `spawn [priority-expr] { body }`, shared by the statement and
    /// expression forms.
    fn parse_spawn_tail(&mut self) -> Result<(Option<Expr>, Block), ParseError> {
        self.expect(TokenKind::Spawn)?;
        let priority = if self.check(&TokenKind::LBrace) {
            None
        } else {
            Some(self.parse_primary()?)
        };
        let body = self.parse_block()?;
        Ok((priority, body))
    }

    fn parse_select_body(&mut self) -> Result<(Vec<SelectArm>, Option<Block>), ParseError> {
        self.expect(TokenKind::LBrace)?;
        let mut arms = Vec::new();
        let mut default = None;
        while !self.check(&TokenKind::RBrace) && !self.at_end() {
            if self.eat(TokenKind::Default) {
                self.expect(TokenKind::FatArrow)?;
                default = Some(self.parse_block()?);
                continue;
            }
            let callee = self.expect_ident()?;
            self.expect(TokenKind::LParen)?;
            match callee.as_str() {
                "recv" => {
                    let chan = self.parse_expr()?;
                    self.expect(TokenKind::RParen)?;
                    let (bind, ok_bind) = self.parse_optional_bind_pair()?;
                    self.expect(TokenKind::FatArrow)?;
                    let body = self.parse_block()?;
                    arms.push(SelectArm::Recv {
                        chan,
                        bind,
                        ok_bind,
                        body,
                    });
                }
                "send" => {
                    let chan = self.parse_expr()?;
                    self.expect(TokenKind::Comma)?;
                    let value = self.parse_expr()?;
                    self.expect(TokenKind::RParen)?;
                    let (ok_bind, _) = self.parse_optional_bind_pair()?;
                    self.expect(TokenKind::FatArrow)?;
                    let body = self.parse_block()?;
                    arms.push(SelectArm::Send {
                        chan,
                        value,
                        ok_bind,
                        body,
                    });
                }
                other => {
                    return Err(self.error(format!(
                        "expected 'recv' or 'send' in select arm, found '{other}'"
                    )))
                }
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok((arms, default))
    }

    /// `as name` or `as (name, name)`, optional.
    fn parse_optional_bind_pair(&mut self) -> Result<(Option<String>, Option<String>), ParseError> {
        if !self.eat(TokenKind::As) {
            return Ok((None, None));
        }
        if self.eat(TokenKind::LParen) {
            let a = self.expect_ident()?;
            self.expect(TokenKind::Comma)?;
            let b = self.expect_ident()?;
            self.expect(TokenKind::RParen)?;
            Ok((Some(a), Some(b)))
        } else {
            let a = self.expect_ident()?;
            Ok((Some(a), None))
        }
    }

    // --- expressions (precedence climbing) ------------------------------

    pub fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;
        while self.eat(TokenKind::PipePipe) {
            let right = self.parse_and()?;
            left = self.binary(BinOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_equality()?;
        while self.eat(TokenKind::AmpAmp) {
            let right = self.parse_equality()?;
            left = self.binary(BinOp::And, left, right);
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_comparison()?;
        loop {
            let op = match self.peek() {
                TokenKind::EqEq => BinOp::Eq,
                TokenKind::BangEq => BinOp::Ne,
                _ => break,
            };
            self.advance();
            let right = self.parse_comparison()?;
            left = self.binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek() {
                TokenKind::Lt => BinOp::Lt,
                TokenKind::Gt => BinOp::Gt,
                TokenKind::LtEq => BinOp::Le,
                TokenKind::GtEq => BinOp::Ge,
                _ => break,
            };
            self.advance();
            let right = self.parse_term()?;
            left = self.binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_factor()?;
        loop {
            let op = match self.peek() {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_factor()?;
            left = self.binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_factor(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Percent => BinOp::Rem,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = self.binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let start = self.peek_span();
        let op = match self.peek() {
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Bang => Some(UnaryOp::Not),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_unary()?;
            let span = Span::new(start.start, operand.span.end);
            return Ok(Expr {
                id: self.next_id(),
                kind: ExprKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
                span,
            });
        }
        self.parse_call()
    }

    fn parse_call(&mut self) -> Result<Expr, ParseError> {
        let primary = self.parse_primary()?;
        if let ExprKind::Ident(name) = &primary.kind {
            if self.check(&TokenKind::LParen) {
                let name = name.clone();
                self.advance();
                let mut args = Vec::new();
                if !self.check(&TokenKind::RParen) {
                    loop {
                        args.push(self.parse_expr()?);
                        if !self.eat(TokenKind::Comma) {
                            break;
                        }
                    }
                }
                let end = self.expect(TokenKind::RParen)?;
                return Ok(Expr {
                    id: self.next_id(),
                    kind: ExprKind::Call { callee: name, args },
                    span: Span::new(primary.span.start, end.span.end),
                });
            }
        }
        Ok(primary)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let span = self.peek_span();
        match self.peek().clone() {
            TokenKind::Int(value) => {
                self.advance();
                Ok(self.lit(ExprKind::Int(value), span))
            }
            TokenKind::String(value) => {
                self.advance();
                Ok(self.lit(ExprKind::String(value), span))
            }
            TokenKind::Bool(value) => {
                self.advance();
                Ok(self.lit(ExprKind::Bool(value), span))
            }
            TokenKind::Ident(name) => {
                self.advance();
                Ok(self.lit(ExprKind::Ident(name), span))
            }
            TokenKind::Spawn => {
                let (priority, body) = self.parse_spawn_tail()?;
                Ok(self.lit(
                    ExprKind::Spawn {
                        priority: priority.map(Box::new),
                        body,
                    },
                    span,
                ))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            other => Err(self.error(format!("unexpected {}", other.display_name()))),
        }
    }

    fn binary(&mut self, op: BinOp, left: Expr, right: Expr) -> Expr {
        let span = Span::new(left.span.start, right.span.end);
        Expr {
            id: self.next_id(),
            kind: ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            span,
        }
    }

    fn lit(&mut self, kind: ExprKind, span: Span) -> Expr {
        Expr {
            id: self.next_id(),
            kind,
            span,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

pub struct ParseResult {
    pub decls: Vec<Decl>,
    pub errors: Vec<ParseError>,
}

impl ParseResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_lexer::Lexer;

    fn parse(src: &str) -> ParseResult {
        let lexed = Lexer::new(src).tokenize();
        assert!(lexed.is_ok(), "lex errors: {:?}", lexed.errors);
        Parser::new(lexed.tokens).parse()
    }

    #[test]
    fn parses_empty_function() {
        let r = parse("func main() {}");
        assert!(r.is_ok(), "{:?}", r.errors);
        assert_eq!(r.decls.len(), 1);
    }

    #[test]
    fn parses_let_and_arithmetic() {
        let r = parse("func main() { let x = 1 + 2 * 3; }");
        assert!(r.is_ok(), "{:?}", r.errors);
    }

    #[test]
    fn parses_spawn_with_priority_and_channel_ops() {
        let r = parse(
            r#"
            func main() {
                let ch = channel(1);
                spawn High {
                    send(ch, 1);
                    close(ch);
                }
                let (v, ok) = recv(ch);
            }
            "#,
        );
        assert!(r.is_ok(), "{:?}", r.errors);
    }

    #[test]
    fn parses_select_with_default() {
        let r = parse(
            r#"
            func main() {
                select {
                    recv(a) as (v, ok) => { yield; }
                    send(b, 1) => { yield; }
                    default => { yield; }
                }
            }
            "#,
        );
        assert!(r.is_ok(), "{:?}", r.errors);
    }

    #[test]
    fn parses_assignment_and_while_loop() {
        let r = parse(
            r#"
            func main() {
                let i = 0;
                while i < 10 {
                    i = i + 1;
                }
            }
            "#,
        );
        assert!(r.is_ok(), "{:?}", r.errors);
    }

    #[test]
    fn reports_error_on_missing_semicolon() {
        let r = parse("func main() { let x = 1 }");
        assert!(!r.is_ok());
    }

    #[test]
    fn recovers_after_error_in_one_function() {
        let r = parse("func broken() { let } func ok() { return 1; }");
        assert!(!r.is_ok());
        assert_eq!(r.decls.len(), 1);
        assert_eq!(r.decls[0].as_fn().name, "ok");
    }
}

#[cfg(test)]
impl Decl {
    fn as_fn(&self) -> &FnDecl {
        match &self.kind {
            DeclKind::Fn(f) => f,
        }
    }
}
