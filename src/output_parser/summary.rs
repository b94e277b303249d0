//! `Summary:` line and learning-design bullet extraction.

use super::extract::strip_leading_think_block;

const SUMMARY_MARKER: &str = "Summary:";
const NOTE_MARKER: &str = "- ";

/// Result of [`parse_summary`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SummaryParse {
    /// Text after the first non-empty `Summary:` marker, if any.
    pub summary: Option<String>,
    /// Every `- ` bullet, in order.
    pub notes: Vec<String>,
}

impl SummaryParse {
    /// The parsed summary, or `"A short overview of <topic>."`.
    pub fn summary_or_fallback(&self, topic: &str) -> String {
        self.summary
            .clone()
            .unwrap_or_else(|| fallback_summary(topic))
    }
}

/// Templated summary used when the model produced no `Summary:` line.
pub fn fallback_summary(topic: &str) -> String {
    format!("A short overview of {}.", topic)
}

/// Parse the summarize stage's output.
///
/// # Examples
///
/// ```
/// use chunkbuddy::output_parser::parse_summary;
///
/// let parsed = parse_summary("Summary: X is a way to do Y.\n- Chunking reduces load.");
/// assert_eq!(parsed.summary.as_deref(), Some("X is a way to do Y."));
/// assert_eq!(parsed.notes, vec!["Chunking reduces load."]);
/// ```
pub fn parse_summary(text: &str) -> SummaryParse {
    let mut parsed = SummaryParse::default();

    for line in strip_leading_think_block(text).lines().map(str::trim) {
        if line.is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix(SUMMARY_MARKER) {
            let rest = rest.trim();
            if parsed.summary.is_none() && !rest.is_empty() {
                parsed.summary = Some(rest.to_string());
            }
            continue;
        }
        if let Some(note) = line.strip_prefix(NOTE_MARKER) {
            parsed.notes.push(note.trim().to_string());
        }
    }

    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_and_notes_scenario() {
        let parsed = parse_summary(
            "Summary: X is a way to do Y.\n- Chunking reduces load.\n- Questions reinforce memory.",
        );
        assert_eq!(parsed.summary.as_deref(), Some("X is a way to do Y."));
        assert_eq!(
            parsed.notes,
            vec!["Chunking reduces load.", "Questions reinforce memory."]
        );
    }

    #[test]
    fn first_summary_line_wins() {
        let parsed = parse_summary("Summary: first.\nSummary: second.");
        assert_eq!(parsed.summary.as_deref(), Some("first."));
    }

    #[test]
    fn empty_summary_marker_does_not_count() {
        let parsed = parse_summary("Summary:\nSummary: the real one.");
        assert_eq!(parsed.summary.as_deref(), Some("the real one."));
    }

    #[test]
    fn indented_lines_are_trimmed() {
        let parsed = parse_summary("   Summary:  Indented.  \n   - note one  ");
        assert_eq!(parsed.summary.as_deref(), Some("Indented."));
        assert_eq!(parsed.notes, vec!["note one"]);
    }

    #[test]
    fn notes_are_not_capped() {
        let text = (1..=6).map(|i| format!("- note {}", i)).collect::<Vec<_>>().join("\n");
        assert_eq!(parse_summary(&text).notes.len(), 6);
    }

    #[test]
    fn literal_thinking_tag_in_summary() {
        let parsed = parse_summary("Summary: Tags like <thinking> wrap content.\n- Chunking reduces load.");
        assert_eq!(parsed.summary.as_deref(), Some("Tags like <thinking> wrap content."));
        assert_eq!(parsed.notes, vec!["Chunking reduces load."]);
    }

    #[test]
    fn leading_reasoning_block_skipped() {
        let parsed = parse_summary("<think>- not a note</think>\nSummary: Real.\n- Real note.");
        assert_eq!(parsed.summary.as_deref(), Some("Real."));
        assert_eq!(parsed.notes, vec!["Real note."]);
    }

    #[test]
    fn fallback_when_marker_missing() {
        let parsed = parse_summary("TL;DR: something\n* star bullet\n-dash without space");
        assert_eq!(parsed.summary, None);
        assert!(parsed.notes.is_empty());
        assert_eq!(
            parsed.summary_or_fallback("Kafka partitions"),
            "A short overview of Kafka partitions."
        );
    }
}
