//! Error types for model output parsers.

/// Errors returned by the fallible parsers.
///
/// The pipeline's own parsers never fail (they degrade to fallbacks); only
/// the judge verdict parser reports errors, which the evaluator turns into a
/// zero score.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The model response was empty or whitespace-only.
    #[error("empty LLM response")]
    EmptyResponse,

    /// No extraction strategy found the expected format.
    #[error("could not parse {expected_format} from LLM response: {text}")]
    Unparseable {
        /// The format the parser was trying to extract.
        expected_format: &'static str,
        /// A truncated copy of the cleaned text (max 200 chars).
        text: String,
    },

    /// A JSON object was found but one of its fields has the wrong type.
    #[error("invalid `{field}` field: {reason}")]
    InvalidField {
        /// Name of the offending field.
        field: &'static str,
        /// What was wrong with it.
        reason: String,
    },
}

/// Truncate a string to at most `max_len` characters, appending "..." if truncated.
pub(crate) fn truncate(s: &str, max_len: usize) -> String {
    match s.char_indices().nth(max_len) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}...", &s[..cut]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_short_is_unchanged() {
        assert_eq!(truncate("abc", 5), "abc");
        assert_eq!(truncate("abcde", 5), "abcde");
    }

    #[test]
    fn truncate_long_appends_ellipsis() {
        assert_eq!(truncate("abcdefgh", 3), "abc...");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("ééééé", 2), "éé...");
    }

    #[test]
    fn display_messages() {
        let err = ParseError::Unparseable {
            expected_format: "JSON object",
            text: "nope".into(),
        };
        assert_eq!(
            err.to_string(),
            "could not parse JSON object from LLM response: nope"
        );
        assert_eq!(ParseError::EmptyResponse.to_string(), "empty LLM response");
    }
}
