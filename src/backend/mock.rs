//! Mock backend for testing without a live LLM.
//!
//! [`MockBackend`] returns pre-configured replies in order and records every
//! request it receives, so tests can assert both on what the pipeline sent
//! and on how many calls were made.
//!
//! # Example
//!
//! ```
//! use chunkbuddy::backend::MockBackend;
//!
//! let mock = MockBackend::new(vec!["Hello, world!".to_string()]);
//! assert_eq!(mock.call_count(), 0);
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use reqwest::Client;

use super::{Backend, EmbeddingBackend, LlmRequest, LlmResponse, TokenUsage, ToolCall};
use crate::error::Result;
use crate::PipelineError;

/// Width of the vectors produced by the mock embedder.
pub const MOCK_EMBEDDING_DIM: usize = 64;

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Return this text (with optional usage counters).
    Text {
        text: String,
        usage: Option<TokenUsage>,
    },
    /// Ask for tool calls instead of answering.
    ToolCalls {
        calls: Vec<ToolCall>,
        usage: Option<TokenUsage>,
    },
    /// Fail the call with an HTTP error.
    Error { status: u16, body: String },
}

impl MockReply {
    pub fn text(text: impl Into<String>) -> Self {
        MockReply::Text {
            text: text.into(),
            usage: None,
        }
    }

    pub fn text_with_usage(text: impl Into<String>, usage: TokenUsage) -> Self {
        MockReply::Text {
            text: text.into(),
            usage: Some(usage),
        }
    }

    pub fn tool_calls(calls: Vec<ToolCall>) -> Self {
        MockReply::ToolCalls { calls, usage: None }
    }

    pub fn error(status: u16, body: impl Into<String>) -> Self {
        MockReply::Error {
            status,
            body: body.into(),
        }
    }
}

/// A test backend that returns scripted replies in order.
///
/// Cycles back to the beginning when all replies have been consumed.
#[derive(Debug)]
pub struct MockBackend {
    replies: Vec<MockReply>,
    index: AtomicUsize,
    requests: Mutex<Vec<LlmRequest>>,
}

impl MockBackend {
    /// Create a mock backend with the given canned text responses.
    ///
    /// Responses are returned in order. When exhausted, cycles from the beginning.
    pub fn new(responses: Vec<String>) -> Self {
        Self::scripted(responses.into_iter().map(MockReply::text).collect())
    }

    /// Create a mock from an explicit script of replies.
    pub fn scripted(replies: Vec<MockReply>) -> Self {
        assert!(!replies.is_empty(), "MockBackend requires at least one reply");
        Self {
            replies,
            index: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock that always returns the same response.
    pub fn fixed(response: impl Into<String>) -> Self {
        Self::scripted(vec![MockReply::text(response)])
    }

    /// Create a mock whose every call fails with the given HTTP error.
    pub fn failing(status: u16, body: impl Into<String>) -> Self {
        Self::scripted(vec![MockReply::error(status, body)])
    }

    /// Number of generation calls received so far.
    pub fn call_count(&self) -> usize {
        self.lock_requests().len()
    }

    /// Copies of every generation request received, oldest first.
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.lock_requests().clone()
    }

    fn lock_requests(&self) -> MutexGuard<'_, Vec<LlmRequest>> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn next_reply(&self) -> MockReply {
        let idx = self.index.fetch_add(1, Ordering::Relaxed) % self.replies.len();
        self.replies[idx].clone()
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn complete(
        &self,
        _client: &Client,
        _base_url: &str,
        request: &LlmRequest,
    ) -> Result<LlmResponse> {
        self.lock_requests().push(request.clone());
        match self.next_reply() {
            MockReply::Text { text, usage } => Ok(LlmResponse {
                text,
                status: 200,
                usage,
                tool_calls: Vec::new(),
            }),
            MockReply::ToolCalls { calls, usage } => Ok(LlmResponse {
                text: String::new(),
                status: 200,
                usage,
                tool_calls: calls,
            }),
            MockReply::Error { status, body } => Err(PipelineError::HttpError { status, body }),
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Deterministic bag-of-words embedding: each lowercase alphanumeric word
/// increments one hashed bucket. Texts sharing words score higher under
/// cosine similarity.
#[async_trait]
impl EmbeddingBackend for MockBackend {
    async fn embed(
        &self,
        _client: &Client,
        _base_url: &str,
        _model: &str,
        inputs: &[String],
    ) -> Result<Vec<Vec<f32>>> {
        Ok(inputs.iter().map(|text| hashed_bag_of_words(text)).collect())
    }
}

fn hashed_bag_of_words(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; MOCK_EMBEDDING_DIM];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        // FNV-1a
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in word.to_lowercase().bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        vector[(hash % MOCK_EMBEDDING_DIM as u64) as usize] += 1.0;
    }
    vector
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmConfig;

    fn request(prompt: &str) -> LlmRequest {
        LlmRequest::user("test", prompt, LlmConfig::default())
    }

    #[tokio::test]
    async fn test_mock_fixed_response() {
        let mock = MockBackend::fixed("Hello!");
        let client = Client::new();
        let resp = mock.complete(&client, "http://unused", &request("hi")).await.unwrap();
        assert_eq!(resp.text, "Hello!");
        assert_eq!(resp.status, 200);
        assert!(resp.usage.is_none());
    }

    #[tokio::test]
    async fn test_mock_cycles_responses() {
        let mock = MockBackend::new(vec!["first".into(), "second".into()]);
        let client = Client::new();
        let r1 = mock.complete(&client, "http://unused", &request("a")).await.unwrap();
        let r2 = mock.complete(&client, "http://unused", &request("b")).await.unwrap();
        let r3 = mock.complete(&client, "http://unused", &request("c")).await.unwrap();
        assert_eq!(r1.text, "first");
        assert_eq!(r2.text, "second");
        assert_eq!(r3.text, "first"); // cycles
    }

    #[tokio::test]
    async fn test_mock_records_requests() {
        let mock = MockBackend::fixed("ok");
        let client = Client::new();
        assert_eq!(mock.call_count(), 0);
        mock.complete(&client, "http://unused", &request("one")).await.unwrap();
        mock.complete(&client, "http://unused", &request("two")).await.unwrap();

        let seen = mock.requests();
        assert_eq!(mock.call_count(), 2);
        assert_eq!(seen[0].last_user_content(), Some("one"));
        assert_eq!(seen[1].last_user_content(), Some("two"));
    }

    #[tokio::test]
    async fn test_mock_scripted_error() {
        let mock = MockBackend::scripted(vec![
            MockReply::text_with_usage("fine", TokenUsage::new(3, 1)),
            MockReply::error(503, "overloaded"),
        ]);
        let client = Client::new();
        let ok = mock.complete(&client, "http://unused", &request("a")).await.unwrap();
        assert_eq!(ok.usage, Some(TokenUsage::new(3, 1)));

        let err = mock.complete(&client, "http://unused", &request("b")).await.unwrap_err();
        match err {
            PipelineError::HttpError { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "overloaded");
            }
            other => panic!("Expected HttpError, got {:?}", other),
        }
        // failed calls are still recorded
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_mock_tool_call_reply() {
        let call = ToolCall::new("call_1", "calculator", r#"{"a":2,"b":3}"#);
        let mock = MockBackend::scripted(vec![
            MockReply::tool_calls(vec![call.clone()]),
            MockReply::text("5"),
        ]);
        let client = Client::new();
        let first = mock.complete(&client, "http://unused", &request("2 + 3?")).await.unwrap();
        assert_eq!(first.text, "");
        assert_eq!(first.tool_calls, vec![call]);

        let second = mock.complete(&client, "http://unused", &request("2 + 3?")).await.unwrap();
        assert_eq!(second.text, "5");
        assert!(second.tool_calls.is_empty());
    }

    #[tokio::test]
    async fn test_mock_embeddings_share_words() {
        let mock = MockBackend::fixed("unused");
        let client = Client::new();
        let vectors = mock
            .embed(
                &client,
                "http://unused",
                "m",
                &["kafka partitions".to_string(), "Kafka topics".to_string()],
            )
            .await
            .unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0].len(), MOCK_EMBEDDING_DIM);
        let dot: f32 = vectors[0].iter().zip(&vectors[1]).map(|(a, b)| a * b).sum();
        assert!(dot >= 1.0, "shared word 'kafka' should land in the same bucket");
        assert_eq!(mock.call_count(), 0, "embedding calls are not generation calls");
    }
}
