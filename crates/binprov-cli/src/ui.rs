//! Console output helpers.

use crossterm::style::Stylize;

const SUCCESS: &str = "✓";
const WARNING: &str = "!";
const ERROR: &str = "✗";
const INFO: &str = "•";

/// Prints status lines with the CLI's icons and colors.
#[derive(Debug, Clone, Copy, Default)]
pub struct Output;

impl Output {
    pub fn new() -> Self {
        Self
    }

    pub fn info(&self, msg: &str) {
        println!("  {} {}", INFO.dark_grey(), msg);
    }

    pub fn success(&self, msg: &str) {
        println!("{} {}", SUCCESS.green(), msg.green());
    }

    pub fn warning(&self, msg: &str) {
        eprintln!("{} {}", WARNING.yellow(), msg.yellow());
    }

    pub fn error(&self, msg: &str) {
        eprintln!("{} {}", ERROR.red(), msg.red());
    }

    /// An indented detail line under a previous message.
    pub fn detail(&self, msg: &str) {
        println!("    {}", msg.dark_grey());
    }
}
