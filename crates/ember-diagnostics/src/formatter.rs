// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Rich terminal formatter for diagnostics.
//!
//! Produces multi-line, color-coded error output similar to rustc:
//!
//! ```text
//! error[E0003]: expected ';', found '}'
//!   --> main.em:3:21
//!    |
//!  3 |     let x = 1 }
//!    |                ^ here
//!    = note: statement is missing its trailing ';'
//! ```

use colored::Colorize;

use ember_ast::LineMap;

use crate::{Diagnostic, LabelStyle, Severity};

/// Formats diagnostics for terminal output.
pub struct DiagnosticFormatter<'a> {
    source: &'a str,
    file_name: Option<&'a str>,
    line_map: LineMap,
}

struct AnnotatedLine {
    line_num: usize,
    text: String,
    annotations: Vec<Annotation>,
}

struct Annotation {
    col: usize,
    style: LabelStyle,
    message: Option<String>,
}

impl<'a> DiagnosticFormatter<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            file_name: None,
            line_map: LineMap::new(source),
        }
    }

    pub fn with_file_name(mut self, name: &'a str) -> Self {
        self.file_name = Some(name);
        self
    }

    pub fn format(&self, diagnostic: &Diagnostic) -> String {
        let mut out = String::new();
        self.format_header(&mut out, diagnostic);

        if diagnostic.labels.is_empty() {
            self.format_footer(&mut out, diagnostic);
            return out;
        }

        let annotated = self.collect_annotated_lines(diagnostic);
        if annotated.is_empty() {
            self.format_footer(&mut out, diagnostic);
            return out;
        }

        let first = &annotated[0];
        let file = self.file_name.unwrap_or("<source>");
        let first_label = diagnostic.labels.first().unwrap();
        let (_, col) = self.line_map.offset_to_line_col(first_label.span.start);
        out.push_str(&format!(
            "  {} {}:{}:{}\n",
            "-->".blue(),
            file,
            first.line_num,
            col
        ));

        let max_line = annotated.last().map(|a| a.line_num).unwrap_or(1);
        let gutter_width = max_line.to_string().len().max(2);
        out.push_str(&format!("{} {}\n", " ".repeat(gutter_width + 1), "|".blue()));

        for line in &annotated {
            out.push_str(&format!(
                "{:>width$} {} {}\n",
                line.line_num.to_string().blue().bold(),
                "|".blue(),
                line.text,
                width = gutter_width,
            ));
            self.format_annotations(&mut out, line, gutter_width);
        }

        self.format_footer(&mut out, diagnostic);
        out
    }

    fn format_header(&self, out: &mut String, diagnostic: &Diagnostic) {
        let severity_str = match diagnostic.severity {
            Severity::Error => "error".red().bold(),
            Severity::Warning => "warning".yellow().bold(),
            Severity::Note => "note".blue().bold(),
        };
        if let Some(ref code) = diagnostic.code {
            out.push_str(&format!(
                "{}[{}]: {}\n",
                severity_str,
                code.0.clone().red().bold(),
                diagnostic.message.bold()
            ));
        } else {
            out.push_str(&format!("{}: {}\n", severity_str, diagnostic.message.bold()));
        }
    }

    fn format_footer(&self, out: &mut String, diagnostic: &Diagnostic) {
        for note in &diagnostic.notes {
            out.push_str(&format!("  {} {}: {}\n", "=".cyan(), "note".cyan().bold(), note));
        }
        if let Some(ref help) = diagnostic.help {
            out.push_str(&format!("  {} {}: {}\n", "=".cyan(), "help".cyan().bold(), help.message));
        }
    }

    fn format_annotations(&self, out: &mut String, line: &AnnotatedLine, gutter_width: usize) {
        if line.annotations.is_empty() {
            return;
        }
        let mut marks = vec![' '; line.text.len().max(1)];
        for ann in &line.annotations {
            let ch = match ann.style {
                LabelStyle::Primary => '^',
                LabelStyle::Secondary => '-',
            };
            if ann.col < marks.len() {
                marks[ann.col] = ch;
            }
        }
        let marks: String = marks.into_iter().collect();
        out.push_str(&format!(
            "{} {} {}",
            " ".repeat(gutter_width),
            "|".blue(),
            marks.trim_end()
        ));
        if let Some(msg) = line.annotations.iter().find_map(|a| a.message.as_deref()) {
            out.push_str(&format!(" {msg}"));
        }
        out.push('\n');
    }

    fn collect_annotated_lines(&self, diagnostic: &Diagnostic) -> Vec<AnnotatedLine> {
        let mut lines: std::collections::BTreeMap<usize, AnnotatedLine> = std::collections::BTreeMap::new();
        for label in &diagnostic.labels {
            let (line_num, col) = self.line_map.offset_to_line_col(label.span.start);
            let (line_num, col) = (line_num as usize, col as usize);
            let text = self
                .line_map
                .line_text(self.source, line_num as u32)
                .unwrap_or("")
                .to_string();
            let entry = lines.entry(line_num).or_insert_with(|| AnnotatedLine {
                line_num,
                text,
                annotations: Vec::new(),
            });
            entry.annotations.push(Annotation {
                col: col.saturating_sub(1),
                style: label.style,
                message: label.message.clone(),
            });
        }
        lines.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Diagnostic;
    use ember_ast::Span;

    #[test]
    fn formats_header_with_code() {
        let source = "let x = 1 }";
        let d = Diagnostic::error("expected ';'")
            .with_code("E0003")
            .with_primary(Span::new(10, 11), "here");
        let out = DiagnosticFormatter::new(source).with_file_name("main.em").format(&d);
        assert!(out.contains("E0003"));
        assert!(out.contains("main.em:1"));
    }
}
