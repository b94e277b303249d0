//! Check-question extraction.
//!
//! Lines are tried against a fixed ladder: enumerated (`1.`, `2)`, `3-`),
//! then bulleted (`-`, `*`), then anything ending in `?`. Everything else is
//! dropped. When nothing survives, [`fallback_questions`] builds
//! "What is ...?" questions from the chunk titles.

use super::chunks::first_line;
use super::extract::strip_leading_think_block;

/// Extract questions from generated text.
///
/// # Examples
///
/// ```
/// use chunkbuddy::output_parser::parse_questions;
///
/// let text = "1. Why does X matter?\n2) What is Y?\n- Explain Z.";
/// assert_eq!(parse_questions(text), vec!["Why does X matter?", "What is Y?", "Explain Z."]);
/// ```
pub fn parse_questions(text: &str) -> Vec<String> {
    strip_leading_think_block(text)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            enumerated(line)
                .or_else(|| bulleted(line))
                .or_else(|| line.ends_with('?').then_some(line))
        })
        .map(String::from)
        .collect()
}

/// `<digits>[.)-]<optional whitespace><text>`
fn enumerated(line: &str) -> Option<&str> {
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    let rest = line[digits..].strip_prefix(&['.', ')', '-'][..])?;
    non_empty(rest.trim())
}

/// `[-*]<whitespace><text>`
fn bulleted(line: &str) -> Option<&str> {
    let rest = line.strip_prefix(&['-', '*'][..])?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    non_empty(rest.trim())
}

fn non_empty(s: &str) -> Option<&str> {
    (!s.is_empty()).then_some(s)
}

/// Title segment of a chunk: its first line with a leading `"Chunk "`
/// removed, then the text after the first `:` (the whole line if there is
/// no colon), trimmed.
///
/// ```
/// use chunkbuddy::output_parser::chunk_title;
///
/// assert_eq!(chunk_title("Chunk 3: Identity Verification\nBody."), "Identity Verification");
/// assert_eq!(chunk_title("Plain heading\nBody."), "Plain heading");
/// ```
pub fn chunk_title(chunk: &str) -> &str {
    let line = first_line(chunk);
    let line = line.strip_prefix("Chunk ").unwrap_or(line);
    match line.split_once(':') {
        Some((_, title)) => title.trim(),
        None => line.trim(),
    }
}

/// One `"What is <title>?"` question per chunk, for at most `cap` chunks.
///
/// Chunks whose title segment is empty are skipped, so the result can be
/// shorter than `min(chunks.len(), cap)`.
pub fn fallback_questions(chunks: &[String], cap: usize) -> Vec<String> {
    chunks
        .iter()
        .take(cap)
        .map(|chunk| chunk_title(chunk))
        .filter(|title| !title.is_empty())
        .map(|title| format!("What is {}?", title.to_lowercase()))
        .collect()
}
