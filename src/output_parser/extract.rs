//! Shared extraction helpers for model output.
//!
//! Used by the judge parser to dig a JSON object out of chatty replies and by
//! the line-oriented parsers to drop a leading reasoning block some models
//! emit.

/// Strip `<think>` blocks, then trim whitespace.
pub fn preprocess(text: &str) -> String {
    let stripped = strip_think_tags(text);
    stripped.trim().to_string()
}

/// Strip all `<think>...</think>` and `<thinking>...</thinking>` blocks from text.
///
/// Handles multiple sequential blocks. An open tag without a matching close
/// is left in place along with everything after it.
///
/// # Examples
///
/// ```
/// use chunkbuddy::output_parser::strip_think_tags;
///
/// assert_eq!(strip_think_tags("<think>reasoning</think>Summary: ok"), "Summary: ok");
/// assert_eq!(strip_think_tags("a <think> tag"), "a <think> tag");
/// ```
pub fn strip_think_tags(text: &str) -> String {
    let result = strip_tag_variant(text, "<think>", "</think>");
    strip_tag_variant(&result, "<thinking>", "</thinking>")
}

fn strip_tag_variant(text: &str, open: &str, close: &str) -> String {
    let mut result = text.to_string();
    let mut scan_from = 0;
    while let Some(offset) = result[scan_from..].find(open) {
        let start = scan_from + offset;
        let Some(end_offset) = result[start..].find(close) else {
            break;
        };
        let end = start + end_offset + close.len();
        result = format!("{}{}", &result[..start], &result[end..]);
        scan_from = start;
    }
    result
}

const THINK_TAGS: [(&str, &str); 2] = [("<think>", "</think>"), ("<thinking>", "</thinking>")];

/// Drop one complete reasoning block at the very start of a reply.
///
/// Only a reply that opens with `<think>` or `<thinking>` and later closes it
/// is affected. Tags anywhere else, or an opening tag that is never closed,
/// are content and come back untouched.
///
/// # Examples
///
/// ```
/// use chunkbuddy::output_parser::strip_leading_think_block;
///
/// assert_eq!(strip_leading_think_block("<think>plan</think>\n1. Why?"), "\n1. Why?");
/// assert_eq!(strip_leading_think_block("<think> is a tag"), "<think> is a tag");
/// assert_eq!(strip_leading_think_block("Use <think>x</think>"), "Use <think>x</think>");
/// ```
pub fn strip_leading_think_block(text: &str) -> &str {
    let trimmed = text.trim_start();
    for (open, close) in THINK_TAGS {
        if let Some(body) = trimmed.strip_prefix(open) {
            return match body.find(close) {
                Some(end) => &body[end + close.len()..],
                None => text,
            };
        }
    }
    text
}

/// Extract content from the first complete markdown code block.
///
/// Returns `(language_hint, content)` where hint is `None` for bare fences.
///
/// # Examples
///
/// ```
/// use chunkbuddy::output_parser::extract::extract_code_block;
///
/// let input = "Here you go:\n```json\n{\"score\": 4}\n```";
/// let (lang, content) = extract_code_block(input).unwrap();
/// assert_eq!(lang, Some("json"));
/// assert_eq!(content, "{\"score\": 4}");
/// ```
pub fn extract_code_block(text: &str) -> Option<(Option<&str>, &str)> {
    let fence_start = text.find("```")?;
    let after_backticks = fence_start + 3;

    let line_end = text[after_backticks..].find('\n')?;
    let lang_str = text[after_backticks..after_backticks + line_end].trim();
    let lang = if lang_str.is_empty() {
        None
    } else {
        Some(lang_str)
    };

    let content_start = after_backticks + line_end + 1;
    let close_offset = text[content_start..].find("```")?;
    Some((lang, text[content_start..content_start + close_offset].trim()))
}

/// Find a bracketed substring by matching open/close delimiters.
///
/// Handles nesting and ignores delimiters inside JSON strings. Prefers the
/// later of several top-level regions (more likely to be the actual answer).
///
/// # Examples
///
/// ```
/// use chunkbuddy::output_parser::extract::find_bracketed;
///
/// let input = r#"My rating: {"score": 5, "reason": "clear"}"#;
/// assert_eq!(find_bracketed(input, '{', '}'), Some(r#"{"score": 5, "reason": "clear"}"#));
/// ```
pub fn find_bracketed(text: &str, open: char, close: char) -> Option<&str> {
    let mut best: Option<&str> = None;
    let mut scan_from = 0;

    while scan_from < text.len() {
        let Some(offset) = text[scan_from..].find(open) else {
            break;
        };
        let start = scan_from + offset;
        let mut depth = 0;
        let mut in_string = false;
        let mut escape_next = false;
        let mut found_end = None;

        for (i, ch) in text[start..].char_indices() {
            if escape_next {
                escape_next = false;
                continue;
            }
            if ch == '\\' && in_string {
                escape_next = true;
                continue;
            }
            if ch == '"' {
                in_string = !in_string;
                continue;
            }
            if in_string {
                continue;
            }
            if ch == open {
                depth += 1;
            } else if ch == close {
                depth -= 1;
                if depth == 0 {
                    found_end = Some(start + i);
                    break;
                }
            }
        }

        match found_end {
            Some(end) => {
                best = Some(&text[start..=end]);
                scan_from = end + close.len_utf8();
            }
            None => break,
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_think_tags_complete() {
        assert_eq!(strip_think_tags("<think>hmm</think>1. Why?"), "1. Why?");
    }

    #[test]
    fn strip_think_tags_multiple_and_mixed() {
        let input = "<think>a</think>mid<thinking>b</thinking>end";
        assert_eq!(strip_think_tags(input), "midend");
    }

    #[test]
    fn strip_think_tags_no_tags() {
        assert_eq!(strip_think_tags("just plain text"), "just plain text");
    }

    #[test]
    fn unclosed_think_tag_is_kept() {
        let input = "A tag such as <think> is not standard HTML.\nMore text.";
        assert_eq!(strip_think_tags(input), input);
        assert_eq!(strip_think_tags("<think>a</think>x <thinking> y"), "x <thinking> y");
    }

    #[test]
    fn leading_block_only() {
        assert_eq!(strip_leading_think_block("  <thinking>a</thinking>rest"), "rest");
        assert_eq!(strip_leading_think_block("rest <think>a</think>"), "rest <think>a</think>");
        assert_eq!(strip_leading_think_block("<think>never closed\n1. Q?"), "<think>never closed\n1. Q?");
    }

    #[test]
    fn preprocess_strips_and_trims() {
        assert_eq!(preprocess("  <think>x</think>  Summary: y  "), "Summary: y");
    }

    #[test]
    fn extract_bare_code_block() {
        let (lang, content) = extract_code_block("```\n{\"score\": 2}\n```").unwrap();
        assert_eq!(lang, None);
        assert_eq!(content, "{\"score\": 2}");
    }

    #[test]
    fn extract_code_block_unterminated() {
        assert!(extract_code_block("```json\n{\"score\": 2}").is_none());
        assert!(extract_code_block("no fences").is_none());
    }

    #[test]
    fn find_bracketed_nested() {
        let input = r#"{"outer": {"inner": 1}}"#;
        assert_eq!(find_bracketed(input, '{', '}'), Some(input));
    }

    #[test]
    fn find_bracketed_prefers_later() {
        let input = r#"Example: {"score": 1} Actual: {"score": 4}"#;
        assert_eq!(find_bracketed(input, '{', '}'), Some(r#"{"score": 4}"#));
    }

    #[test]
    fn find_bracketed_ignores_braces_in_strings() {
        let input = r#"{"reason": "uses {curly} words"}"#;
        assert_eq!(find_bracketed(input, '{', '}'), Some(input));
    }

    #[test]
    fn find_bracketed_unbalanced() {
        assert!(find_bracketed(r#"{"score": 4"#, '{', '}').is_none());
    }
}
