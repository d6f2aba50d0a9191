// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! JSON diagnostic output for machine consumption.
//!
//! Produces structured JSON that tools can parse to locate and fix errors,
//! enabled via `--format json` on any `ember` CLI command.

use serde::Serialize;

use ember_ast::LineMap;

use crate::{codes, Diagnostic};

/// A complete JSON diagnostic report for a compilation run.
#[derive(Debug, Serialize)]
pub struct DiagnosticReport {
    pub version: u32,
    pub file: String,
    pub success: bool,
    pub diagnostics: Vec<JsonDiagnostic>,
    pub error_count: usize,
    pub warning_count: usize,
}

#[derive(Debug, Serialize)]
pub struct JsonDiagnostic {
    pub severity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
}

impl DiagnosticReport {
    pub fn new(file: impl Into<String>, source: &str, diagnostics: &[Diagnostic]) -> Self {
        let line_map = LineMap::new(source);
        let error_count = diagnostics
            .iter()
            .filter(|d| matches!(d.severity, crate::Severity::Error))
            .count();
        let warning_count = diagnostics
            .iter()
            .filter(|d| matches!(d.severity, crate::Severity::Warning))
            .count();
        let json_diagnostics = diagnostics
            .iter()
            .map(|d| to_json(d, &line_map))
            .collect();
        Self {
            version: 1,
            file: file.into(),
            success: error_count == 0,
            diagnostics: json_diagnostics,
            error_count,
            warning_count,
        }
    }

    pub fn to_json_string(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn to_json(diagnostic: &Diagnostic, line_map: &LineMap) -> JsonDiagnostic {
    let severity = match diagnostic.severity {
        crate::Severity::Error => "error",
        crate::Severity::Warning => "warning",
        crate::Severity::Note => "note",
    }
    .to_string();

    let location = diagnostic.primary_span().map(|span| {
        let (line, column) = line_map.offset_to_line_col(span.start);
        SourceLocation { line, column }
    });

    JsonDiagnostic {
        severity,
        code: diagnostic.code.as_ref().map(|c| c.0.clone()),
        title: diagnostic
            .code
            .as_ref()
            .and_then(|c| codes::lookup(&c.0))
            .map(|info| info.title.to_string()),
        message: diagnostic.message.clone(),
        location,
        notes: diagnostic.notes.clone(),
        help: diagnostic.help.as_ref().map(|h| h.message.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_ast::Span;

    #[test]
    fn reports_success_with_no_errors() {
        let report = DiagnosticReport::new("main.em", "func main() {}", &[]);
        assert!(report.success);
        assert_eq!(report.error_count, 0);
    }

    #[test]
    fn includes_resolved_title_for_known_code() {
        let d = Diagnostic::error("bad token")
            .with_code("E0001")
            .with_primary(Span::new(0, 1), "here");
        let report = DiagnosticReport::new("main.em", "$", &[d]);
        assert!(!report.success);
        assert_eq!(report.diagnostics[0].title.as_deref(), Some("unexpected character"));
    }
}
