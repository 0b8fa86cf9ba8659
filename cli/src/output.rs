//! CLI output helpers for consistent formatting.

use colored::Colorize;
use drizzle_liquibase::{ChangeEntry, Classification};

pub fn heading(text: &str) -> String {
    format!("{}", text.bright_cyan())
}

pub fn label(text: &str) -> String {
    format!("{}", text.bright_blue())
}

pub fn muted(text: &str) -> String {
    format!("{}", text.bright_black())
}

pub fn success(text: &str) -> String {
    format!("{}", text.bright_green())
}

pub fn warning(text: &str) -> String {
    format!("{}", text.yellow())
}

pub fn warn_line(text: &str) -> String {
    format!("[{}] {}", "Warning".yellow(), text)
}

pub fn err_line(text: &str) -> String {
    format!("{} {}", "Error:".red().bold(), text)
}

pub fn status_ok() -> String {
    format!("{}", "OK".green())
}

pub fn status_warning(text: &str) -> String {
    format!("{}", text.yellow())
}

/// One summary line per change entry
pub fn change_line(entry: &ChangeEntry) -> String {
    let (marker, text) = match entry.classification() {
        Classification::Additive => ("+".green().bold(), entry.to_string().normal()),
        Classification::Destructive => ("-".red().bold(), entry.to_string().red()),
        Classification::Ambiguous => ("~".yellow().bold(), entry.to_string().yellow()),
    };
    format!("  {marker} {text}")
}
