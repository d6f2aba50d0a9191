// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Help text for CLI commands.

use crate::output;

pub fn print_usage() {
    println!("{} {} - a small cooperatively-scheduled language", output::title("ember"), output::version("0.1.0"));
    println!();
    println!(
        "{}: {} {} {}",
        output::section_header("Usage"),
        output::command("ember"),
        output::arg("<command>"),
        output::arg("[args]")
    );
    println!();
    println!("{}", output::section_header("Commands:"));
    println!(
        "  {} {}     Check a program for lex/parse errors",
        output::command("check"),
        output::arg("<file>")
    );
    println!(
        "  {} {}       Run a program's main() to completion",
        output::command("run"),
        output::arg("<file>")
    );
    println!("  {}             Show this help", output::command("help"));
    println!("  {}          Show version", output::command("version"));
    println!();
    println!("{}: --format json    emit machine-readable diagnostics", output::section_header("Flags"));
}
