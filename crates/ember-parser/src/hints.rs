// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Error hints — suggestions attached to common "expected X" parse errors.
//!
//! Kept separate from the main parser to avoid clutter.

use ember_ast::token::TokenKind;

/// Get a hint for an "expected X" error based on context.
pub fn for_expected(expected: &str, found: &TokenKind) -> Option<&'static str> {
    match (expected, found) {
        ("';'", TokenKind::Eof) => Some("statement is missing its trailing ';'"),
        ("'{'", _) => Some("blocks start with '{'"),
        ("'}'", TokenKind::Eof) => Some("add '}' to close the block"),
        ("')'", TokenKind::Eof) => Some("add ')' to close the parenthesis"),
        ("a name", TokenKind::Int(_)) => Some("names can't start with a number"),
        ("a name", _) => Some("names start with a letter or '_'"),
        ("'recv' or 'send' in select arm", _) => {
            Some("select arms are 'recv(ch) => {...}', 'send(ch, v) => {...}', or 'default => {...}'")
        }
        _ => None,
    }
}
