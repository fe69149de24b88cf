//! Shared CLI helpers: response printing, banner, progress placeholder.

use colored::Colorize;

/// Print an agent response to stdout.
pub fn print_response(response: &str) {
    println!();
    println!("{}", "◆ Conduit".cyan().bold());
    println!("{response}");
    println!();
}

/// Note printed when the tool budget ran out before a final answer.
pub fn print_budget_note(tool_turns: usize) {
    println!(
        "{}",
        format!("(stopped after {tool_turns} tool rounds without a final answer)").dimmed()
    );
    println!();
}

/// Print the banner shown at REPL start.
pub fn print_banner() {
    let version = env!("CARGO_PKG_VERSION");
    println!();
    println!("{}  v{}", "◆ Conduit".cyan().bold(), version.dimmed());
    println!(
        "{}",
        "Each line is answered on its own. Type \"exit\" to quit.".dimmed()
    );
    println!();
}

/// Print a "thinking" placeholder while a query runs.
pub fn print_thinking() {
    eprint!("{}", "⠿ thinking...".dimmed());
}

/// Clear the "thinking" placeholder.
pub fn clear_thinking() {
    eprint!("\r{}\r", " ".repeat(40));
}

/// Green check or red marker, for status listings.
pub fn mark(ok: bool, missing: &str) -> String {
    if ok {
        "✓".green().to_string()
    } else {
        missing.red().to_string()
    }
}
