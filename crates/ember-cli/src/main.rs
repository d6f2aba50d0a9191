// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Ember CLI - runs and checks Ember programs.

mod help;
mod output;

use colored::Colorize;
use ember_diagnostics::{formatter::DiagnosticFormatter, json::DiagnosticReport, Diagnostic};
use std::env;
use std::fs;
use std::process;

#[derive(Clone, Copy, PartialEq)]
enum Format {
    Human,
    Json,
}

fn show_diagnostics(diagnostics: &[Diagnostic], source: &str, file: &str, format: Format) {
    match format {
        Format::Human => {
            let formatter = DiagnosticFormatter::new(source).with_file_name(file);
            for d in diagnostics {
                eprintln!("{}", formatter.format(d));
            }
        }
        Format::Json => {
            let report = DiagnosticReport::new(file, source, diagnostics);
            match report.to_json_string() {
                Ok(s) => println!("{s}"),
                Err(e) => eprintln!("{}: {}", output::error_label(), e),
            }
        }
    }
}

fn read_source(path: &str) -> String {
    match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{}: reading {}: {}", output::error_label(), output::file_path(path), e);
            process::exit(1);
        }
    }
}

fn cmd_check(path: &str, format: Format) {
    let source = read_source(path);
    let result = ember_compiler::check(&source);
    if !result.diagnostics.is_empty() {
        show_diagnostics(&result.diagnostics, &source, path, format);
    }
    if !result.is_ok() {
        if format == Format::Human {
            eprintln!("\n{}", output::banner_fail("Check", result.diagnostics.len()));
        }
        process::exit(1);
    }
    if format == Format::Human {
        println!("{}", output::banner_ok("Check"));
    }
}

fn cmd_run(path: &str, format: Format) {
    let source = read_source(path);
    let result = ember_compiler::check(&source);
    if !result.is_ok() {
        show_diagnostics(&result.diagnostics, &source, path, format);
        if format == Format::Human {
            eprintln!("\n{}", output::banner_fail("Check", result.diagnostics.len()));
        }
        process::exit(1);
    }

    match ember_compiler::run(&result.decls, "main") {
        Ok(value) => {
            if format == Format::Human {
                println!("{value}");
            }
        }
        Err(err) => {
            eprintln!("{}: {}", output::error_label(), err);
            process::exit(1);
        }
    }
}

fn main() {
    output::init();
    let args: Vec<String> = env::args().collect();

    let format = if args.iter().any(|a| a == "--format=json" || a == "--json") {
        Format::Json
    } else {
        Format::Human
    };
    let cmd_args: Vec<&str> = args
        .iter()
        .filter(|a| a.as_str() != "--format=json" && a.as_str() != "--json")
        .map(|a| a.as_str())
        .collect();

    if cmd_args.len() < 2 {
        help::print_usage();
        return;
    }

    match cmd_args[1] {
        "check" => {
            if cmd_args.len() < 3 {
                eprintln!("{}: missing file argument", output::error_label());
                eprintln!("{}: {} {} {}", "Usage".yellow(), output::command("ember"), output::command("check"), output::arg("<file>"));
                process::exit(1);
            }
            cmd_check(cmd_args[2], format);
        }
        "run" => {
            if cmd_args.len() < 3 {
                eprintln!("{}: missing file argument", output::error_label());
                eprintln!("{}: {} {} {}", "Usage".yellow(), output::command("ember"), output::command("run"), output::arg("<file>"));
                process::exit(1);
            }
            cmd_run(cmd_args[2], format);
        }
        "help" | "--help" | "-h" => help::print_usage(),
        "version" | "--version" | "-V" => {
            println!("{} {}", output::title("ember"), output::version("0.1.0"));
        }
        other => {
            eprintln!("{}: unknown command '{}'", output::error_label(), other);
            help::print_usage();
            process::exit(1);
        }
    }
}
