//! Stage 1: draft a level-appropriate explanation of the topic.

use super::{generate, or_default, BoxFut, Stage};
use crate::config::{LlmConfig, PipelineConfig};
use crate::error::Result;
use crate::exec_ctx::ExecCtx;
use crate::prompt::render;
use crate::types::{PipelineState, StageUpdate, StateField, DEFAULT_LEVEL};

const DEFAULT_TOPIC: &str = "a technical topic";

const TEMPLATE: &str = "You are a friendly technical learning assistant.

Explain the topic below to a {level} learner.

Topic: {topic}

Requirements:
- Use simple, clear language.
- Keep it to one coherent explanation ({ceiling}).
- Avoid unnecessary jargon, or explain it when you must use it.
- Include at least one analogy or metaphor that makes the concept relatable.
- Define technical terms the first time you use them.
- Aim to reduce cognitive load: focus on the core ideas first, details later.
";

/// Writes `raw_explanation`. Always calls the backend, even for a blank topic.
#[derive(Debug, Clone)]
pub struct DraftExplanation {
    ceiling: String,
    llm: LlmConfig,
}

impl DraftExplanation {
    pub const NAME: &'static str = "draft_explanation";

    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            ceiling: config.explanation_ceiling.clone(),
            llm: config.llm.clone(),
        }
    }

    fn prompt(&self, state: &PipelineState) -> String {
        render(
            TEMPLATE,
            &[
                ("topic", or_default(&state.topic, DEFAULT_TOPIC)),
                ("level", or_default(&state.level, DEFAULT_LEVEL)),
                ("ceiling", self.ceiling.as_str()),
            ],
        )
    }
}

impl Stage for DraftExplanation {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn owns(&self) -> &'static [StateField] {
        &[StateField::RawExplanation]
    }

    fn run<'a>(
        &'a self,
        ctx: &'a ExecCtx,
        state: &'a PipelineState,
    ) -> BoxFut<'a, Result<StageUpdate>> {
        Box::pin(async move {
            let response = generate(ctx, Self::NAME, self.prompt(state), &self.llm).await?;
            Ok(StageUpdate::raw_explanation(response.text))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use crate::stages::test_support::ctx_with_events;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_writes_verbatim_explanation() {
        let mock = Arc::new(MockBackend::fixed("  A partition is a slice.\n"));
        let (ctx, _) = ctx_with_events(mock.clone());
        let stage = DraftExplanation::new(&PipelineConfig::default());

        let update = stage
            .run(&ctx, &PipelineState::new("Kafka partitions", "intermediate"))
            .await
            .unwrap();

        assert_eq!(update, StageUpdate::raw_explanation("  A partition is a slice.\n"));
        let prompt = mock.requests()[0].last_user_content().unwrap().to_string();
        assert!(prompt.contains("Topic: Kafka partitions"));
        assert!(prompt.contains("to a intermediate learner"));
        assert!(prompt.contains("(around 2–4 short paragraphs)"));
        assert!(prompt.contains("analogy"));
    }

    #[tokio::test]
    async fn test_blank_topic_and_level_use_defaults() {
        let mock = Arc::new(MockBackend::fixed("x"));
        let (ctx, _) = ctx_with_events(mock.clone());
        let stage = DraftExplanation::new(&PipelineConfig::default());
        let state = PipelineState {
            level: String::new(),
            ..Default::default()
        };

        stage.run(&ctx, &state).await.unwrap();

        assert_eq!(mock.call_count(), 1);
        let prompt = mock.requests()[0].last_user_content().unwrap().to_string();
        assert!(prompt.contains("Topic: a technical topic"));
        assert!(prompt.contains("to a beginner learner"));
    }

    #[tokio::test]
    async fn test_request_uses_configured_model_and_llm_settings() {
        let mock = Arc::new(MockBackend::fixed("x"));
        let (ctx, _) = ctx_with_events(mock.clone());
        let config = PipelineConfig::default()
            .with_explanation_ceiling("at most 30 words")
            .with_llm(LlmConfig::default().with_temperature(0.0));
        let stage = DraftExplanation::new(&config);

        stage.run(&ctx, &PipelineState::new("DNS", "beginner")).await.unwrap();

        let request = &mock.requests()[0];
        assert_eq!(request.model, ctx.model);
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.config.temperature, 0.0);
        assert!(request.last_user_content().unwrap().contains("(at most 30 words)"));
    }
}
