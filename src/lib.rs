//! # ChunkBuddy
//!
//! A staged LLM pipeline that turns a topic into learner-friendly material:
//! a plain explanation, short titled chunks, a few check questions, and a
//! summary with notes on why the structure helps.
//!
//! ```text
//! draft_explanation ──► chunk_explanation ──► generate_check_questions ──► summarize_and_meta
//!   raw_explanation          chunks               check_questions          summary + meta
//! ```
//!
//! Each stage reads a [`PipelineState`], makes at most one call through the
//! injected [`Backend`](backend::Backend), and returns a partial update that
//! the [`Pipeline`] merges. Messy model output is handled by the tolerant
//! parsers in [`output_parser`]; nothing downstream fails because an earlier
//! stage produced nothing.
//!
//! Around the pipeline sit a few collaborators that reuse the same
//! [`ExecCtx`]: [`chat::ChatSession`] (multi-turn chat), [`rag::Rag`]
//! (answers grounded in local documents), [`agent::Agent`] (tool-calling
//! loop), [`evaluation`] (heuristic and LLM-as-judge scoring over a dataset)
//! and [`cost`] (token accounting).
//!
//! ## Quick Start
//!
//! ```
//! use chunkbuddy::{ExecCtx, MockBackend, Pipeline};
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let mock = MockBackend::new(vec![
//!     "Ownership gives every value a single owner.".into(),
//!     "Owners\nEach value has one owner.\n\nMoves\nAssignment moves ownership.".into(),
//!     "1. Who owns a value?\n2. What does assignment do?".into(),
//!     "Summary: One owner per value; assignment moves it.\n- Short chunks keep load low".into(),
//! ]);
//! let ctx = ExecCtx::builder("http://unused")
//!     .backend(Arc::new(mock))
//!     .build()?;
//!
//! let pipeline = Pipeline::builder(ctx).build()?;
//! let state = pipeline.run("Rust ownership", "beginner").await?;
//!
//! assert_eq!(state.chunks.len(), 2);
//! assert_eq!(state.meta.num_questions, 2);
//! # Ok::<(), chunkbuddy::PipelineError>(())
//! # }).unwrap();
//! ```

pub mod agent;
pub mod backend;
pub mod chat;
pub mod config;
pub mod cost;
pub mod error;
pub mod evaluation;
pub mod events;
pub mod exec_ctx;
pub mod output_parser;
pub mod pipeline;
pub mod prompt;
pub mod rag;
pub mod stages;
pub mod types;

pub use backend::{
    Backend, EmbeddingBackend, LlmRequest, LlmResponse, MockBackend, OpenAiBackend, TokenUsage,
};
pub use config::{LlmConfig, PipelineConfig, Settings};
pub use error::{PipelineError, Result};
pub use events::{Event, EventHandler};
pub use exec_ctx::{ExecCtx, ExecCtxBuilder};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use stages::{BoxFut, Stage};
pub use types::{Meta, PipelineProgress, PipelineState, StageUpdate, StateField};
