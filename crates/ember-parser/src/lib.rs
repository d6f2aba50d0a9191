// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Parser for the Ember surface language.
//!
//! Turns a token stream into a flat list of function declarations.
//! Errors are collected rather than aborting on the first one, so a single
//! typo doesn't hide every other mistake in the file.

mod hints;
mod parser;

pub use parser::{ParseError, ParseResult, Parser};

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
    fn parses_producer_consumer_program() {
        let r = parse(
            r#"
            func producer(ch) {
                let i = 0;
                while i < 5 {
                    send(ch, i);
                    i = i + 1;
                }
                close(ch);
            }

            func main() {
                let ch = channel(2);
                spawn Normal {
                    producer(ch);
                }
                let (v, ok) = recv(ch);
                while ok {
                    print(v);
                }
            }
            "#,
        );
        assert!(r.is_ok(), "{:?}", r.errors);
        assert_eq!(r.decls.len(), 2);
    }

    #[test]
    fn collects_multiple_errors_without_stopping() {
        let r = parse("func a( { } func b( { } func ok() { return 1; }");
        assert!(!r.is_ok());
        assert!(r.errors.len() >= 2);
    }

    #[test]
    fn attaches_hint_to_missing_semicolon() {
        let r = parse("func main() { let x = 1 }");
        assert!(!r.is_ok());
        assert!(r.errors[0].message.contains("';'"));
    }
}
