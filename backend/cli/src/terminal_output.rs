//! Terminal output: colored notes and the config report table.

use herald_config::ValidationReport;

pub const RESET: &str = "\x1b[0m";
pub const BOLD: &str = "\x1b[1m";
pub const DIM: &str = "\x1b[2m";
pub const RED: &str = "\x1b[31m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const CYAN: &str = "\x1b[36m";

/// Color unless `NO_COLOR` is set or the terminal is dumb.
pub fn supports_color() -> bool {
    std::env::var("NO_COLOR").is_err()
        && std::env::var("TERM").map(|t| t != "dumb").unwrap_or(false)
}

fn paint(color: &str, symbol: &str, plain: &str, msg: &str) -> String {
    if supports_color() {
        format!("{color}{BOLD}{symbol}{RESET} {msg}")
    } else {
        format!("{plain}: {msg}")
    }
}

pub fn note_info(msg: &str) {
    println!("{}", paint(CYAN, "ℹ", "INFO", msg));
}

pub fn note_warn(msg: &str) {
    println!("{}", paint(YELLOW, "⚠", "WARN", msg));
}

pub fn note_error(msg: &str) {
    eprintln!("{}", paint(RED, "✗", "ERROR", msg));
}

pub fn note_success(msg: &str) {
    println!("{}", paint(GREEN, "✓", "OK", msg));
}

/// A line of bot output in the console.
pub fn bot_line(channel: &str, text: &str) -> String {
    if supports_color() {
        format!("{BOLD}herald{RESET} {DIM}#{channel}{RESET} {text}")
    } else {
        format!("herald #{channel}: {text}")
    }
}

/// Two-column table of report entries: severity and path, then message.
pub fn render_report(report: &ValidationReport) -> String {
    let rows: Vec<(String, &str)> = report
        .errors
        .iter()
        .map(|e| (format!("error   {}", e.path), e.message.as_str()))
        .chain(
            report
                .warnings
                .iter()
                .map(|w| (format!("warning {}", w.path), w.message.as_str())),
        )
        .collect();
    let width = rows.iter().map(|(left, _)| left.chars().count()).max().unwrap_or(0);
    rows.iter()
        .map(|(left, message)| format!("  {left:<width$}  {message}\n"))
        .collect()
}
