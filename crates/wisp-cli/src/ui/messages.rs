//! Status message functions for terminal output.

use owo_colors::OwoColorize;

use super::colors_enabled;

fn line(symbol: &str, styled: String, message: &str) -> String {
    if colors_enabled() {
        format!("{styled} {message}")
    } else {
        format!("{symbol} {message}")
    }
}

/// Print a success message to stderr.
pub fn success(message: &str) {
    eprintln!("{}", line("✓", "✓".green().bold().to_string(), message));
}

/// Print an informational message to stderr.
pub fn info(message: &str) {
    eprintln!("{}", line("ℹ", "ℹ".blue().bold().to_string(), message));
}

/// Print a warning to stderr.
pub fn warning(message: &str) {
    eprintln!("{}", line("⚠", "⚠".yellow().bold().to_string(), message));
}

/// Print an error to stderr.
///
/// Multi-line messages are indented under the first line.
pub fn error(message: &str) {
    let message = message.replace('\n', "\n  ");
    eprintln!("{}", line("✗", "✗".red().bold().to_string(), &message));
}

/// Print a debug message, only when `RUST_LOG` or `--verbose` asked for it.
pub fn debug(message: &str) {
    if tracing::enabled!(tracing::Level::DEBUG) {
        eprintln!("{}", line("◆", "◆".dimmed().to_string(), message));
    }
}
