//! # Output parsers
//!
//! Pure functions that turn free-form model text into typed fields. Every
//! pipeline parser degrades to a fallback instead of failing, so a model that
//! drifts from the requested format produces an approximate result rather than
//! an error.
//!
//! | Parser | Stage | Fallback |
//! |--------|-------|----------|
//! | [`split_chunks`] | chunk | purely structural split |
//! | [`parse_questions`] | questions | [`fallback_questions`] |
//! | [`parse_summary`] | summarize | [`fallback_summary`] |
//! | [`parse_judge_verdict`] | evaluation | caller scores 0 |

pub mod chunks;
pub mod error;
pub mod extract;
pub mod judge;
pub mod questions;
pub mod summary;

pub use chunks::{first_line, is_chunk_title, split_chunks};
pub use error::ParseError;
pub use extract::{preprocess, strip_leading_think_block, strip_think_tags};
pub use judge::{parse_judge_verdict, JudgeVerdict};
pub use questions::{chunk_title, fallback_questions, parse_questions};
pub use summary::{fallback_summary, parse_summary, SummaryParse};
