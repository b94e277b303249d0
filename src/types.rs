use serde::{Deserialize, Serialize};

/// Default learner level when none is supplied.
pub const DEFAULT_LEVEL: &str = "beginner";

/// The record threaded through the four stages.
///
/// Every field except `topic` starts empty; an empty field means "not
/// produced (yet)" and is never an error for a downstream stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    #[serde(default)]
    pub topic: String,
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub raw_explanation: String,
    #[serde(default)]
    pub chunks: Vec<String>,
    #[serde(default)]
    pub check_questions: Vec<String>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub meta: Meta,
}

fn default_level() -> String {
    DEFAULT_LEVEL.to_string()
}

impl PipelineState {
    /// Fresh state for a run. A blank `level` falls back to `"beginner"`.
    pub fn new(topic: impl Into<String>, level: impl Into<String>) -> Self {
        let level = level.into();
        let level = if level.trim().is_empty() {
            default_level()
        } else {
            level
        };
        Self {
            topic: topic.into(),
            level,
            ..Default::default()
        }
    }

    /// Apply a stage's partial output. Only the fields the update names are
    /// overwritten.
    pub fn merge(&mut self, update: StageUpdate) {
        if let Some(raw_explanation) = update.raw_explanation {
            self.raw_explanation = raw_explanation;
        }
        if let Some(chunks) = update.chunks {
            self.chunks = chunks;
        }
        if let Some(check_questions) = update.check_questions {
            self.check_questions = check_questions;
        }
        if let Some(summary) = update.summary {
            self.summary = summary;
        }
        if let Some(meta) = update.meta {
            self.meta = meta;
        }
    }
}

/// Bookkeeping attached by the summarize stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    #[serde(default)]
    pub learning_design_notes: Vec<String>,
    #[serde(default)]
    pub num_chunks: usize,
    #[serde(default)]
    pub num_questions: usize,
}

/// Fields of [`PipelineState`] a stage may write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateField {
    RawExplanation,
    Chunks,
    CheckQuestions,
    Summary,
    Meta,
}

/// Partial output of one stage: `Some` fields are written, `None` fields are
/// left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_explanation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunks: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_questions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

impl StageUpdate {
    pub fn raw_explanation(text: impl Into<String>) -> Self {
        Self {
            raw_explanation: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn chunks(chunks: Vec<String>) -> Self {
        Self {
            chunks: Some(chunks),
            ..Default::default()
        }
    }

    pub fn check_questions(questions: Vec<String>) -> Self {
        Self {
            check_questions: Some(questions),
            ..Default::default()
        }
    }

    pub fn summary_and_meta(summary: impl Into<String>, meta: Meta) -> Self {
        Self {
            summary: Some(summary.into()),
            meta: Some(meta),
            ..Default::default()
        }
    }

    /// The fields this update writes, in declaration order.
    pub fn fields(&self) -> Vec<StateField> {
        let mut fields = Vec::new();
        if self.raw_explanation.is_some() {
            fields.push(StateField::RawExplanation);
        }
        if self.chunks.is_some() {
            fields.push(StateField::Chunks);
        }
        if self.check_questions.is_some() {
            fields.push(StateField::CheckQuestions);
        }
        if self.summary.is_some() {
            fields.push(StateField::Summary);
        }
        if self.meta.is_some() {
            fields.push(StateField::Meta);
        }
        fields
    }
}

/// Progress update emitted at the start of each stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineProgress {
    /// Current stage index (0-based).
    pub stage_index: usize,

    /// Total number of stages in the pipeline.
    pub total_stages: usize,

    /// Name of the current stage.
    pub stage_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_defaults() {
        let state = PipelineState::new("Kafka partitions", "");
        assert_eq!(state.topic, "Kafka partitions");
        assert_eq!(state.level, "beginner");
        assert!(state.raw_explanation.is_empty());
        assert!(state.chunks.is_empty());
        assert!(state.check_questions.is_empty());
        assert!(state.summary.is_empty());
        assert_eq!(state.meta, Meta::default());
    }

    #[test]
    fn test_merge_only_touches_named_fields() {
        let mut state = PipelineState::new("t", "advanced");
        state.merge(StageUpdate::raw_explanation("explained"));
        state.merge(StageUpdate::chunks(vec!["a".into()]));

        assert_eq!(state.raw_explanation, "explained");
        assert_eq!(state.chunks, vec!["a"]);
        assert_eq!(state.level, "advanced");
        assert!(state.check_questions.is_empty());
    }

    #[test]
    fn test_merge_empty_update_is_noop() {
        let mut state = PipelineState::new("t", "beginner");
        state.merge(StageUpdate::raw_explanation("kept"));
        let before = state.clone();
        state.merge(StageUpdate::default());
        assert_eq!(state, before);
    }

    #[test]
    fn test_update_fields() {
        let meta = Meta::default();
        assert_eq!(
            StageUpdate::summary_and_meta("s", meta).fields(),
            vec![StateField::Summary, StateField::Meta]
        );
        assert!(StageUpdate::default().fields().is_empty());
    }

    #[test]
    fn test_state_deserializes_with_missing_fields() {
        let state: PipelineState = serde_json::from_str(r#"{"topic": "TLS"}"#).unwrap();
        assert_eq!(state.topic, "TLS");
        assert_eq!(state.level, "beginner");
        assert!(state.chunks.is_empty());
    }

    #[test]
    fn test_update_serialization_skips_unset() {
        let json = serde_json::to_value(StageUpdate::chunks(vec!["x".into()])).unwrap();
        assert_eq!(json, serde_json::json!({"chunks": ["x"]}));
    }
}
