//! Stage 2: split the explanation into short titled chunks.

use super::{generate, or_default, skipped, BoxFut, Stage};
use crate::config::{LlmConfig, PipelineConfig};
use crate::error::Result;
use crate::exec_ctx::ExecCtx;
use crate::output_parser::split_chunks;
use crate::prompt::render;
use crate::types::{PipelineState, StageUpdate, StateField, DEFAULT_LEVEL};

const TEMPLATE: &str = "You are a learning coach.

You will be given an explanation of a technical topic.

Your job is to break it into {chunk_target} SHORT learning chunks that are easy for a {level} learner to digest.

Rules:
- Each chunk should focus on ONE idea.
- Each chunk should be 2–4 sentences.
- Start each chunk with a title line like: \"Chunk 1: What a partition is\"
- Separate chunks with a blank line.
- Return ONLY the chunks, with no extra commentary.

Here is the explanation to chunk:
{explanation}
";

/// Writes `chunks`. Returns an empty list without calling the backend when
/// `raw_explanation` is blank.
#[derive(Debug, Clone)]
pub struct ChunkExplanation {
    chunk_target: String,
    llm: LlmConfig,
}

impl ChunkExplanation {
    pub const NAME: &'static str = "chunk_explanation";

    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            chunk_target: config.chunk_target.clone(),
            llm: config.llm.clone(),
        }
    }

    fn prompt(&self, state: &PipelineState) -> String {
        render(
            TEMPLATE,
            &[
                ("chunk_target", self.chunk_target.as_str()),
                ("level", or_default(&state.level, DEFAULT_LEVEL)),
                ("explanation", state.raw_explanation.trim()),
            ],
        )
    }
}

impl Stage for ChunkExplanation {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn owns(&self) -> &'static [StateField] {
        &[StateField::Chunks]
    }

    fn run<'a>(
        &'a self,
        ctx: &'a ExecCtx,
        state: &'a PipelineState,
    ) -> BoxFut<'a, Result<StageUpdate>> {
        Box::pin(async move {
            if state.raw_explanation.trim().is_empty() {
                skipped(ctx, Self::NAME, "raw_explanation is empty");
                return Ok(StageUpdate::chunks(Vec::new()));
            }

            let response = generate(ctx, Self::NAME, self.prompt(state), &self.llm).await?;
            Ok(StageUpdate::chunks(split_chunks(&response.text)))
        })
    }
}
