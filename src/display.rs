//! Colored terminal messages from the wrapper itself.
//!
//! Checker output never goes through here; it is written verbatim by the
//! output sink. These helpers are for the wrapper's own diagnostics, which
//! always go to stderr so they cannot mix into the checker's stdout.

use std::fmt::Display;
use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;

/// Name printed in front of wrapper messages.
pub const PREFIX: &str = "hushcheck";

/// Format an error message, colored when `color` is set.
#[must_use]
pub fn format_error(message: impl Display, color: bool) -> String {
    if color {
        format!("{}: {} {message}", PREFIX.bold(), "error:".red().bold())
    } else {
        format!("{PREFIX}: error: {message}")
    }
}

/// Print an error message.
pub fn print_error(message: impl Display) {
    let color = io::stderr().is_terminal();
    let mut stderr = io::stderr().lock();
    let _ = writeln!(stderr, "{}", format_error(message, color));
    let _ = stderr.flush();
}
