// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Front-to-back pipeline: source text in, a checked program or a
//! completed run out. `ember-cli` and anything else embedding Ember link
//! against this crate rather than wiring lexer/parser/codegen by hand.

use ember_ast::decl::Decl;
use ember_codegen::{EvalError, Interpreter, Value};
use ember_diagnostics::{Diagnostic, ToDiagnostic};
use ember_rt::{Priority, Scheduler};
use tracing::debug;

/// Lexes and parses `source`, collecting every diagnostic along the way
/// rather than stopping at the first error.
pub fn check(source: &str) -> CheckResult {
    let mut diagnostics = Vec::new();

    let lexed = ember_lexer::Lexer::new(source).tokenize();
    debug!(tokens = lexed.tokens.len(), errors = lexed.errors.len(), "lexed source");
    diagnostics.extend(lexed.errors.iter().map(ToDiagnostic::to_diagnostic));
    if !lexed.is_ok() {
        return CheckResult {
            decls: Vec::new(),
            diagnostics,
        };
    }

    let parsed = ember_parser::Parser::new(lexed.tokens).parse();
    debug!(decls = parsed.decls.len(), errors = parsed.errors.len(), "parsed tokens");
    diagnostics.extend(parsed.errors.iter().map(ToDiagnostic::to_diagnostic));

    CheckResult {
        decls: parsed.decls,
        diagnostics,
    }
}

pub struct CheckResult {
    pub decls: Vec<Decl>,
    pub diagnostics: Vec<Diagnostic>,
}

impl CheckResult {
    pub fn is_ok(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Runs `entry` (by default `main`) to completion on a fresh scheduler.
///
/// Any tick-scale concurrency the program spawns (channels, `select`,
/// sleeping tasks) plays out deterministically inside `Scheduler::run`
/// before this returns — there is no background runtime left alive
/// afterwards.
pub fn run(decls: &[Decl], entry: &str) -> Result<Value, RunError> {
    let interp = Interpreter::new(decls);
    if !interp.has_function(entry) {
        return Err(RunError::NoEntryPoint(entry.to_string()));
    }
    let scheduler = Scheduler::new();
    let entry_name = entry.to_string();
    let handle = scheduler.spawn(
        async move { interp.call(&entry_name, Vec::new()).await },
        Priority::Normal,
    );
    debug!(entry, "running scheduler to completion");
    scheduler.run().map_err(RunError::Runtime)?;
    handle
        .result()
        .ok_or(RunError::NeverCompleted)?
        .map_err(RunError::Eval)
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("no function named '{0}'")]
    NoEntryPoint(String),
    #[error("program did not complete: {0}")]
    Runtime(#[from] ember_rt::RuntimeError),
    #[error("entry point never scheduled to completion")]
    NeverCompleted,
    #[error(transparent)]
    Eval(#[from] EvalError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_reports_no_diagnostics_for_valid_source() {
        let result = check("func main() { return 1; }");
        assert!(result.is_ok());
        assert_eq!(result.decls.len(), 1);
    }

    #[test]
    fn check_collects_parse_errors_without_stopping() {
        let result = check("func a() { let x = } func b() { let y = }");
        assert!(!result.is_ok());
        assert!(result.diagnostics.len() >= 2);
    }

    #[test]
    fn run_executes_the_entry_point() {
        let result = check("func main() { return 6 * 7; }");
        assert!(result.is_ok());
        let value = run(&result.decls, "main").expect("run should succeed");
        assert_eq!(value.as_int(), Some(42));
    }

    #[test]
    fn run_reports_missing_entry_point() {
        let result = check("func not_main() { return 1; }");
        let err = run(&result.decls, "main").expect_err("main is not defined");
        assert!(matches!(err, RunError::NoEntryPoint(_)));
    }
}
