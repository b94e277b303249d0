//! Stage 3: retrieval-practice questions over the chunks.

use tracing::debug;

use super::{generate, skipped, BoxFut, Stage};
use crate::config::{LlmConfig, PipelineConfig};
use crate::error::Result;
use crate::exec_ctx::ExecCtx;
use crate::output_parser::{fallback_questions, parse_questions};
use crate::prompt::render;
use crate::types::{PipelineState, StageUpdate, StateField};

const TEMPLATE: &str = "You are a learning coach helping someone understand a technical topic.

You will be given several learning chunks that explain the topic step by step.

Your job is to create {question_target} SHORT, open-ended questions that help the learner check their understanding (retrieval practice).

Return the questions as a numbered list, one per line, with no extra commentary.

Learning chunks:
{chunks}
";

/// Writes `check_questions`.
///
/// Returns an empty list without calling the backend when `chunks` is empty.
/// When the reply contains no recognizable question line, one
/// `"What is <title>?"` question is synthesized per chunk title.
#[derive(Debug, Clone)]
pub struct GenerateCheckQuestions {
    question_target: String,
    max_fallback: usize,
    llm: LlmConfig,
}

impl GenerateCheckQuestions {
    pub const NAME: &'static str = "generate_check_questions";

    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            question_target: config.question_target.clone(),
            max_fallback: config.max_fallback_questions,
            llm: config.llm.clone(),
        }
    }

    fn prompt(&self, chunks: &[String]) -> String {
        let chunks_text = chunks.join("\n\n");
        render(
            TEMPLATE,
            &[
                ("question_target", self.question_target.as_str()),
                ("chunks", chunks_text.as_str()),
            ],
        )
    }
}

impl Stage for GenerateCheckQuestions {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn owns(&self) -> &'static [StateField] {
        &[StateField::CheckQuestions]
    }

    fn run<'a>(
        &'a self,
        ctx: &'a ExecCtx,
        state: &'a PipelineState,
    ) -> BoxFut<'a, Result<StageUpdate>> {
        Box::pin(async move {
            if state.chunks.is_empty() {
                skipped(ctx, Self::NAME, "chunks is empty");
                return Ok(StageUpdate::check_questions(Vec::new()));
            }

            let response =
                generate(ctx, Self::NAME, self.prompt(&state.chunks), &self.llm).await?;

            let mut questions = parse_questions(&response.text);
            if questions.is_empty() {
                questions = fallback_questions(&state.chunks, self.max_fallback);
                debug!(
                    stage = Self::NAME,
                    synthesized = questions.len(),
                    "no question lines in reply, using chunk titles"
                );
            }
            Ok(StageUpdate::check_questions(questions))
        })
    }
}
