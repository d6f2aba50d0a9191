// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Conversions from compiler error types to `Diagnostic`.
//!
//! Keeping these here (rather than in the lexer/parser/codegen crates
//! themselves) keeps those crates free of any dependency on terminal or
//! JSON formatting.

use ember_ast::Span;

use crate::{Diagnostic, ToDiagnostic};

impl ToDiagnostic for ember_lexer::LexError {
    fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error(&self.message)
            .with_code("E0001")
            .with_primary(Span::new(self.pos, self.pos + 1), "unexpected character")
    }
}

impl ToDiagnostic for ember_parser::ParseError {
    fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error(&self.message)
            .with_code("E0003")
            .with_primary(self.span, "here")
    }
}

impl ToDiagnostic for ember_codegen::EvalError {
    fn to_diagnostic(&self) -> Diagnostic {
        use ember_codegen::EvalError::*;
        match self {
            UnknownName(name) => Diagnostic::error(format!("unknown name '{name}'")).with_code("E0004"),
            UnknownFunction(name) => {
                Diagnostic::error(format!("unknown function '{name}'")).with_code("E0004")
            }
            Arity { name, expected, found } => Diagnostic::error(format!(
                "'{name}' expects {expected} argument(s), found {found}"
            ))
            .with_code("E0005"),
            Type(msg) => Diagnostic::error(format!("type error: {msg}")).with_code("E0006"),
            Runtime(err) => Diagnostic::error(format!("runtime error: {err}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lex_error_gets_code_and_span() {
        let err = ember_lexer::LexError {
            message: "unexpected character \"$\"".to_string(),
            pos: 4,
        };
        let d = err.to_diagnostic();
        assert_eq!(d.code.unwrap().0, "E0001");
        assert_eq!(d.primary_span(), Some(Span::new(4, 5)));
    }

    #[test]
    fn unknown_name_gets_code() {
        let err = ember_codegen::EvalError::UnknownName("x".to_string());
        let d = err.to_diagnostic();
        assert_eq!(d.code.unwrap().0, "E0004");
    }
}
