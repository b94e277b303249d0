//! LLM-as-judge verdict parsing.
//!
//! The judge is asked for `{"score": <1-5>, "reason": "..."}`. Models often
//! wrap that in prose or a code fence, so extraction tries the whole text,
//! then a fenced block, then the last balanced `{...}` region.

use serde_json::Value;

use super::error::{truncate, ParseError};
use super::extract::{extract_code_block, find_bracketed, preprocess};

/// A parsed judge verdict.
#[derive(Debug, Clone, PartialEq)]
pub struct JudgeVerdict {
    pub score: f64,
    pub reason: String,
}

/// Parse a judge reply into a [`JudgeVerdict`].
///
/// A missing `score` counts as `0.0` and a missing `reason` as empty; a
/// `score` that is neither a number nor a numeric string is an error.
///
/// # Examples
///
/// ```
/// use chunkbuddy::output_parser::parse_judge_verdict;
///
/// let verdict = parse_judge_verdict("```json\n{\"score\": 4, \"reason\": \"clear\"}\n```").unwrap();
/// assert_eq!(verdict.score, 4.0);
/// assert_eq!(verdict.reason, "clear");
/// ```
pub fn parse_judge_verdict(text: &str) -> Result<JudgeVerdict, ParseError> {
    let cleaned = preprocess(text);
    if cleaned.is_empty() {
        return Err(ParseError::EmptyResponse);
    }

    let object = json_object(&cleaned).ok_or_else(|| ParseError::Unparseable {
        expected_format: "JSON object",
        text: truncate(&cleaned, 200),
    })?;

    let score = match object.get("score") {
        None | Some(Value::Null) => 0.0,
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().map_err(|e| ParseError::InvalidField {
            field: "score",
            reason: format!("{:?} is not a number: {}", s, e),
        })?,
        Some(other) => {
            return Err(ParseError::InvalidField {
                field: "score",
                reason: format!("expected a number, got {}", other),
            })
        }
    };

    let reason = match object.get("reason") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };

    Ok(JudgeVerdict { score, reason })
}

fn json_object(text: &str) -> Option<serde_json::Map<String, Value>> {
    let fenced = extract_code_block(text).map(|(_, content)| content);
    let bracketed = find_bracketed(text, '{', '}');

    [Some(text), fenced, bracketed]
        .into_iter()
        .flatten()
        .find_map(|candidate| match serde_json::from_str::<Value>(candidate) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        })
}
