//! Stage 4: one-sentence summary plus learning-design notes and counts.

use super::{generate, or_default, BoxFut, Stage};
use crate::config::{LlmConfig, PipelineConfig};
use crate::error::Result;
use crate::exec_ctx::ExecCtx;
use crate::output_parser::{first_line, parse_summary};
use crate::prompt::{bullet_list, render};
use crate::types::{Meta, PipelineState, StageUpdate, StateField};

const DEFAULT_TOPIC: &str = "this topic";
const EMPTY_LIST: &str = "- (none)";

const TEMPLATE: &str = "You are a learning scientist and technical explainer.

Context:
Topic: {topic}

Raw explanation:
{explanation}

Chunk titles:
{titles}

Check questions:
{questions}

Tasks:
1) Write a ONE-SENTENCE TL;DR summary of the topic. Begin the line with exactly: \"Summary:\".
2) Write 2–3 bullets explaining how the structure (chunking, analogy, retrieval practice, reduced cognitive load) supports learning. Each bullet must start with \"- \".

Return only the summary line and the bullets.
";

/// Writes `summary` and `meta`.
///
/// Always calls the backend, even when every upstream field is empty. The
/// counts in [`Meta`] come from the state, never from the reply.
#[derive(Debug, Clone)]
pub struct SummarizeAndMeta {
    max_titles: usize,
    max_questions: usize,
    llm: LlmConfig,
}

impl SummarizeAndMeta {
    pub const NAME: &'static str = "summarize_and_meta";

    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            max_titles: config.max_summary_chunk_titles,
            max_questions: config.max_summary_questions,
            llm: config.llm.clone(),
        }
    }

    fn prompt(&self, state: &PipelineState, topic: &str) -> String {
        let titles: Vec<&str> = state
            .chunks
            .iter()
            .take(self.max_titles)
            .map(|chunk| first_line(chunk))
            .collect();
        let questions: Vec<&String> = state
            .check_questions
            .iter()
            .take(self.max_questions)
            .collect();

        let titles = bullet_list(&titles, EMPTY_LIST);
        let questions = bullet_list(&questions, EMPTY_LIST);
        render(
            TEMPLATE,
            &[
                ("topic", topic),
                ("explanation", state.raw_explanation.trim()),
                ("titles", titles.as_str()),
                ("questions", questions.as_str()),
            ],
        )
    }
}

impl Stage for SummarizeAndMeta {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn owns(&self) -> &'static [StateField] {
        &[StateField::Summary, StateField::Meta]
    }

    fn run<'a>(
        &'a self,
        ctx: &'a ExecCtx,
        state: &'a PipelineState,
    ) -> BoxFut<'a, Result<StageUpdate>> {
        Box::pin(async move {
            let topic = or_default(&state.topic, DEFAULT_TOPIC);
            let response = generate(ctx, Self::NAME, self.prompt(state, topic), &self.llm).await?;

            let parsed = parse_summary(&response.text);
            let summary = parsed.summary_or_fallback(topic);
            let meta = Meta {
                learning_design_notes: parsed.notes,
                num_chunks: state.chunks.len(),
                num_questions: state.check_questions.len(),
            };
            Ok(StageUpdate::summary_and_meta(summary, meta))
        })
    }
}
