//! Boxed, colored banners for operator-facing progress messages.

use console::{Style, style};

/// Frame `message` in a `+---+` box.
fn framed(message: &str) -> String {
    let width = message.chars().count() + 2;
    let rule = format!("+{}+", "-".repeat(width));
    format!("{rule}\n| {message} |\n{rule}")
}

fn print(message: &str, color: Style) {
    println!();
    println!("{}", color.apply_to(framed(message)));
    println!();
}

pub fn status(message: &str) {
    print(message, Style::new().yellow().bold());
}

pub fn success(message: &str) {
    print(message, Style::new().green().bold());
}

pub fn failure(message: &str) {
    print(message, Style::new().red().bold());
}

/// Indented detail line under a banner.
pub fn detail(label: &str, value: impl std::fmt::Display) {
    println!("  {:<18} {}", style(label).dim(), value);
}
