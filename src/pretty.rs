//! # Terminal markdown rendering
//!
//! Replies and reports come back from the generation service as light markdown.
//! This module renders the subset they actually use:
//!
//! | Markdown | Terminal |
//! |----------|----------|
//! | `# Header` (1-3 levels) | bold cyan |
//! | `**bold**` | bold |
//! | `- item` / `* item` | `•` bullet |
//! | `---` | dim rule |
//!
//! Everything else is printed as-is. Rendering goes through any [`Write`] so the
//! output can be captured in tests.

use std::error::Error;
use std::io::{Write, stdout};

use crossterm::{
    QueueableCommand,
    style::{Attribute, Color, SetAttribute, SetForegroundColor},
};
use once_cell::sync::Lazy;
use regex::Regex;

static BOLD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*([^*]+)\*\*").expect("bold pattern is valid"));

/// Render `text` to stdout.
pub fn print_pretty(text: &str) -> Result<(), Box<dyn Error>> {
    let mut out = stdout();
    render_markdown(text, &mut out)?;
    out.flush()?;
    Ok(())
}

/// Print a dim label line, used to separate speakers in the chat loop.
pub fn print_label(label: &str) -> Result<(), Box<dyn Error>> {
    let mut out = stdout();
    out.queue(SetForegroundColor(Color::DarkGrey))?;
    writeln!(out, "{label}")?;
    out.queue(SetForegroundColor(Color::Reset))?;
    out.flush()?;
    Ok(())
}

pub fn render_markdown<W: Write>(text: &str, out: &mut W) -> Result<(), Box<dyn Error>> {
    for line in text.lines() {
        let trimmed = line.trim_start();

        if let Some(header) = header_text(trimmed) {
            out.queue(SetForegroundColor(Color::Cyan))?;
            out.queue(SetAttribute(Attribute::Bold))?;
            writeln!(out, "{header}")?;
            out.queue(SetAttribute(Attribute::Reset))?;
            out.queue(SetForegroundColor(Color::Reset))?;
        } else if trimmed == "---" {
            out.queue(SetAttribute(Attribute::Dim))?;
            writeln!(out, "{}", "─".repeat(40))?;
            out.queue(SetAttribute(Attribute::Reset))?;
        } else if let Some(item) = trimmed
            .strip_prefix("- ")
            .or_else(|| trimmed.strip_prefix("* "))
        {
            let indent = &line[..line.len() - trimmed.len()];
            write!(out, "{indent}• ")?;
            render_inline(item, out)?;
            writeln!(out)?;
        } else {
            render_inline(line, out)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

fn header_text(line: &str) -> Option<&str> {
    ["### ", "## ", "# "]
        .iter()
        .find_map(|prefix| line.strip_prefix(prefix))
}

fn render_inline<W: Write>(line: &str, out: &mut W) -> Result<(), Box<dyn Error>> {
    let mut last = 0;
    for cap in BOLD.captures_iter(line) {
        let (Some(whole), Some(inner)) = (cap.get(0), cap.get(1)) else {
            continue;
        };
        write!(out, "{}", &line[last..whole.start()])?;
        out.queue(SetAttribute(Attribute::Bold))?;
        write!(out, "{}", inner.as_str())?;
        out.queue(SetAttribute(Attribute::Reset))?;
        last = whole.end();
    }
    write!(out, "{}", &line[last..])?;
    Ok(())
}
