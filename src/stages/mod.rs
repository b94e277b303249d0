//! The four pipeline stages.
//!
//! Each stage reads the fields it needs from a borrowed [`PipelineState`],
//! makes at most one backend call, and returns a [`StageUpdate`] naming only
//! the fields it owns. Stages never mutate state themselves; the
//! [`Pipeline`](crate::Pipeline) merges their updates.

pub mod chunk;
pub mod draft;
pub mod questions;
pub mod summarize;

pub use chunk::ChunkExplanation;
pub use draft::DraftExplanation;
pub use questions::GenerateCheckQuestions;
pub use summarize::SummarizeAndMeta;

use std::future::Future;
use std::pin::Pin;

use tracing::debug;

use crate::backend::{LlmRequest, LlmResponse};
use crate::config::LlmConfig;
use crate::error::Result;
use crate::events::Event;
use crate::exec_ctx::ExecCtx;
use crate::types::{PipelineState, StageUpdate, StateField};

/// A boxed, pinned, Send future -- the return type of [`Stage::run`].
pub type BoxFut<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Object-safe trait for one transformation step.
///
/// Stages are stored as `Box<dyn Stage>` by the pipeline, which also checks
/// that every returned update only names fields listed in [`Stage::owns`].
pub trait Stage: Send + Sync {
    /// Stable identifier (e.g. `"chunk_explanation"`), used in logs and events.
    fn name(&self) -> &'static str;

    /// State fields this stage is allowed to write.
    fn owns(&self) -> &'static [StateField];

    /// Execute the stage against the current state.
    fn run<'a>(&'a self, ctx: &'a ExecCtx, state: &'a PipelineState)
        -> BoxFut<'a, Result<StageUpdate>>;
}

/// Send `prompt` as a single user message and report the call.
///
/// Backend errors are returned unchanged.
pub(crate) async fn generate(
    ctx: &ExecCtx,
    stage: &'static str,
    prompt: String,
    config: &LlmConfig,
) -> Result<LlmResponse> {
    let request = LlmRequest::user(&ctx.model, prompt, config.clone());
    dispatch(ctx, stage, &request).await
}

/// Send a prepared request through the context's backend, then log it and
/// emit [`Event::Generation`].
pub(crate) async fn dispatch(
    ctx: &ExecCtx,
    caller: &str,
    request: &LlmRequest,
) -> Result<LlmResponse> {
    let response = ctx
        .backend
        .complete(&ctx.client, &ctx.base_url, request)
        .await?;

    debug!(
        caller,
        model = %request.model,
        chars = response.text.len(),
        tool_calls = response.tool_calls.len(),
        input_tokens = response.usage.map(|u| u.input_tokens),
        output_tokens = response.usage.map(|u| u.output_tokens),
        "generation complete"
    );
    ctx.emit(Event::Generation {
        name: caller.to_string(),
        model: request.model.clone(),
        usage: response.usage,
    });

    Ok(response)
}

/// Record that a stage returned early without calling the backend.
pub(crate) fn skipped(ctx: &ExecCtx, stage: &'static str, reason: &str) {
    debug!(stage, reason, "skipping generation");
    ctx.emit(Event::StageSkipped {
        name: stage.to_string(),
        reason: reason.to_string(),
    });
}

/// `value`, or `default` when `value` is blank.
pub(crate) fn or_default<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.trim().is_empty() {
        default
    } else {
        value
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::{Arc, Mutex};

    use crate::backend::MockBackend;
    use crate::events::{Event, FnEventHandler};
    use crate::exec_ctx::ExecCtx;

    /// Context over `mock` that records every emitted event.
    pub fn ctx_with_events(mock: Arc<MockBackend>) -> (ExecCtx, Arc<Mutex<Vec<Event>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let ctx = ExecCtx::builder("http://unused")
            .backend(mock)
            .event_handler(Arc::new(FnEventHandler(move |e: Event| {
                sink.lock().unwrap().push(e)
            })))
            .build()
            .unwrap();
        (ctx, events)
    }
}
