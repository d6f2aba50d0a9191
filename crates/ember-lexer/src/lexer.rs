// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! The lexer implementation using logos.

use logos::Logos;
use ember_ast::token::{Token, TokenKind};
use ember_ast::Span;

/// Raw token type for logos — string/number values are parsed in a second pass.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(skip r"//[^\n]*")]
enum RawToken {
    #[token("func")]
    Func,
    #[token("let")]
    Let,
    #[token("return")]
    Return,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("spawn")]
    Spawn,
    #[token("select")]
    Select,
    #[token("as")]
    As,
    #[token("default")]
    Default,
    #[token("yield")]
    Yield,
    #[token("true")]
    True,
    #[token("false")]
    False,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Ident,
    #[regex(r"[0-9]+")]
    Int,
    #[regex(r#""([^"\\]|\\.)*""#)]
    Str,

    #[token("&&")]
    AmpAmp,
    #[token("||")]
    PipePipe,
    #[token("==")]
    EqEq,
    #[token("!=")]
    BangEq,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,
    #[token("->")]
    Arrow,
    #[token("=>")]
    FatArrow,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("=")]
    Eq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("!")]
    Bang,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(":")]
    Colon,
    #[token(";")]
    Semi,
    #[token(",")]
    Comma,
}

/// Tokenize `source` in full, collecting every lexical error rather than
/// stopping at the first one — the parser's own error recovery (§`hints`
/// module upstream) needs the whole token stream regardless.
pub struct Lexer<'a> {
    source: &'a str,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self { source }
    }

    pub fn tokenize(&mut self) -> LexResult {
        let mut tokens = Vec::new();
        let mut errors = Vec::new();
        let mut lex = RawToken::lexer(self.source);

        while let Some(result) = lex.next() {
            let span = Span::new(lex.span().start, lex.span().end);
            match result {
                Ok(raw) => match convert(raw, lex.slice(), span) {
                    Ok(kind) => tokens.push(Token { kind, span }),
                    Err(e) => errors.push(e),
                },
                Err(()) => errors.push(LexError::unexpected_char(lex.slice(), span.start)),
            }
        }

        let eof_pos = self.source.len();
        tokens.push(Token {
            kind: TokenKind::Eof,
            span: Span::new(eof_pos, eof_pos),
        });

        LexResult { tokens, errors }
    }
}

fn convert(raw: RawToken, slice: &str, span: Span) -> Result<TokenKind, LexError> {
    Ok(match raw {
        RawToken::Func => TokenKind::Func,
        RawToken::Let => TokenKind::Let,
        RawToken::Return => TokenKind::Return,
        RawToken::If => TokenKind::If,
        RawToken::Else => TokenKind::Else,
        RawToken::While => TokenKind::While,
        RawToken::Spawn => TokenKind::Spawn,
        RawToken::Select => TokenKind::Select,
        RawToken::As => TokenKind::As,
        RawToken::Default => TokenKind::Default,
        RawToken::Yield => TokenKind::Yield,
        RawToken::True => TokenKind::Bool(true),
        RawToken::False => TokenKind::Bool(false),
        RawToken::Ident => TokenKind::Ident(slice.to_string()),
        RawToken::Int => {
            let value = slice
                .parse::<i64>()
                .map_err(|_| LexError::invalid_number(span.start))?;
            TokenKind::Int(value)
        }
        RawToken::Str => TokenKind::String(unescape(&slice[1..slice.len() - 1])),
        RawToken::AmpAmp => TokenKind::AmpAmp,
        RawToken::PipePipe => TokenKind::PipePipe,
        RawToken::EqEq => TokenKind::EqEq,
        RawToken::BangEq => TokenKind::BangEq,
        RawToken::LtEq => TokenKind::LtEq,
        RawToken::GtEq => TokenKind::GtEq,
        RawToken::Arrow => TokenKind::Arrow,
        RawToken::FatArrow => TokenKind::FatArrow,
        RawToken::Plus => TokenKind::Plus,
        RawToken::Minus => TokenKind::Minus,
        RawToken::Star => TokenKind::Star,
        RawToken::Slash => TokenKind::Slash,
        RawToken::Percent => TokenKind::Percent,
        RawToken::Eq => TokenKind::Eq,
        RawToken::Lt => TokenKind::Lt,
        RawToken::Gt => TokenKind::Gt,
        RawToken::Bang => TokenKind::Bang,
        RawToken::LBrace => TokenKind::LBrace,
        RawToken::RBrace => TokenKind::RBrace,
        RawToken::LParen => TokenKind::LParen,
        RawToken::RParen => TokenKind::RParen,
        RawToken::Colon => TokenKind::Colon,
        RawToken::Semi => TokenKind::Semi,
        RawToken::Comma => TokenKind::Comma,
    })
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('"') => out.push('"'),
                Some('\\') => out.push('\\'),
                Some(other) => out.push(other),
                None => {}
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Every token produced, plus any lexical errors encountered along the way.
pub struct LexResult {
    pub tokens: Vec<Token>,
    pub errors: Vec<LexError>,
}

impl LexResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct LexError {
    pub message: String,
    pub pos: usize,
}

impl LexError {
    fn unexpected_char(slice: &str, pos: usize) -> Self {
        Self {
            message: format!("unexpected character {slice:?}"),
            pos,
        }
    }

    fn invalid_number(pos: usize) -> Self {
        Self {
            message: "invalid integer literal".to_string(),
            pos,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src).tokenize().tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn tokenizes_function_header() {
        let k = kinds("func main() {}");
        assert_eq!(
            k,
            vec![
                TokenKind::Func,
                TokenKind::Ident("main".into()),
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::LBrace,
                TokenKind::RBrace,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn tokenizes_string_with_escapes() {
        let k = kinds(r#""a\nb""#);
        assert_eq!(k, vec![TokenKind::String("a\nb".into()), TokenKind::Eof]);
    }

    #[test]
    fn skips_line_comments() {
        let k = kinds("let x = 1; // trailing\nlet y = 2;");
        assert_eq!(k.len(), 11); // 5 tokens per statement + eof
    }

    #[test]
    fn reports_unexpected_character() {
        let result = Lexer::new("let x = 1 $ 2;").tokenize();
        assert_eq!(result.errors.len(), 1);
    }
}
