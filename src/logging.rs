//! Console message helpers for the command-line tools

use colored::Colorize;

/// Print an error line in the drivers' style.
pub fn error(message: &str) {
    eprintln!("{} {}", "error:".red().bold(), message);
}
