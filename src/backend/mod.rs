//! Text generation port: the [`Backend`] trait and normalized request/response types.
//!
//! The pipeline never talks HTTP itself. Every stage builds an [`LlmRequest`],
//! hands it to whatever [`Backend`] the caller injected through
//! [`ExecCtx`](crate::exec_ctx::ExecCtx), and reads back an [`LlmResponse`].
//!
//! ## Architecture
//!
//! ```text
//! Stage ──► LlmRequest ──► Backend::complete() ──► LlmResponse { text, usage, tool_calls }
//!                                  │
//!                       ┌──────────┴──────────┐
//!                 OpenAiBackend           MockBackend
//!           /v1/chat/completions      scripted replies,
//!           /v1/embeddings            recorded requests
//! ```

pub mod mock;
pub mod openai;

pub use mock::MockBackend;
pub use openai::OpenAiBackend;

use crate::config::LlmConfig;
use crate::error::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// A normalized, provider-agnostic LLM request.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmRequest {
    /// Model identifier (e.g. `"gpt-4o-mini"`).
    pub model: String,

    /// The conversation sent to the model, oldest first.
    pub messages: Vec<ChatMessage>,

    /// Sampling configuration.
    pub config: LlmConfig,

    /// Functions the model may call instead of answering. Empty for plain
    /// text generation.
    pub tools: Vec<ToolSpec>,
}

impl LlmRequest {
    /// A request carrying a single user-role message.
    pub fn user(model: impl Into<String>, prompt: impl Into<String>, config: LlmConfig) -> Self {
        Self {
            model: model.into(),
            messages: vec![ChatMessage::user(prompt)],
            config,
            tools: Vec::new(),
        }
    }

    /// Offer `tools` to the model on this request.
    pub fn with_tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.tools = tools;
        self
    }

    /// Content of the last user message, if any.
    pub fn last_user_content(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }
}

/// A single message in a chat conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The role of the message author.
    pub role: Role,
    /// The message content.
    pub content: String,
    /// Calls requested by an assistant turn.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// For [`Role::Tool`] messages, the call this result answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// An assistant turn that asked for tool calls instead of answering.
    pub fn assistant_tool_calls(content: impl Into<String>, calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: calls,
            ..Self::new(Role::Assistant, content)
        }
    }

    /// The result of running the call `call_id`.
    pub fn tool(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(call_id.into()),
            ..Self::new(Role::Tool, content)
        }
    }
}

/// A function the model may call, described by a JSON schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object.
    pub parameters: serde_json::Value,
}

/// A call the model asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned id, echoed back on the tool result.
    pub id: String,
    pub name: String,
    /// Arguments as the raw JSON string the model produced.
    pub arguments: String,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

/// The role of a chat message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions.
    System,
    /// User input.
    User,
    /// Assistant (model) response.
    Assistant,
    /// Result of a tool call.
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

/// Token counters reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

impl std::ops::AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: Self) {
        self.input_tokens += rhs.input_tokens;
        self.output_tokens += rhs.output_tokens;
    }
}

/// A normalized LLM response.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// The generated text content.
    pub text: String,

    /// HTTP status code (for diagnostics/logging).
    pub status: u16,

    /// Token counters, when the provider reports them.
    pub usage: Option<TokenUsage>,

    /// Tool calls the model asked for. When non-empty, `text` is usually empty.
    pub tool_calls: Vec<ToolCall>,
}

/// Abstraction over text generation providers.
///
/// Implementors translate between the normalized [`LlmRequest`]/[`LlmResponse`]
/// and the provider's HTTP API. A failure is returned as-is to the caller;
/// the pipeline does not retry.
///
/// # Object Safety
///
/// This trait is object-safe and designed to be used as `Arc<dyn Backend>`.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Execute a single-shot generation call.
    async fn complete(
        &self,
        client: &Client,
        base_url: &str,
        request: &LlmRequest,
    ) -> Result<LlmResponse>;

    /// Human-readable name for logging and diagnostics.
    fn name(&self) -> &'static str;
}

/// Abstraction over text embedding providers (used by [`rag`](crate::rag)).
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Embed each input, returning one vector per input in the same order.
    async fn embed(
        &self,
        client: &Client,
        base_url: &str,
        model: &str,
        inputs: &[String],
    ) -> Result<Vec<Vec<f32>>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_request_has_single_message() {
        let req = LlmRequest::user("gpt-4o-mini", "hello", LlmConfig::default());
        assert_eq!(req.messages.len(), 1);
        assert_eq!(req.messages[0].role, Role::User);
        assert_eq!(req.last_user_content(), Some("hello"));
    }

    #[test]
    fn test_last_user_content_skips_assistant() {
        let req = LlmRequest {
            model: "m".into(),
            messages: vec![
                ChatMessage::system("be nice"),
                ChatMessage::user("first"),
                ChatMessage::assistant("reply"),
                ChatMessage::user("second"),
                ChatMessage::assistant("reply 2"),
            ],
            config: LlmConfig::default(),
            tools: Vec::new(),
        };
        assert_eq!(req.last_user_content(), Some("second"));
    }

    #[test]
    fn test_usage_accumulates() {
        let mut usage = TokenUsage::new(10, 5);
        usage += TokenUsage::new(3, 2);
        assert_eq!(usage, TokenUsage::new(13, 7));
        assert_eq!(usage.total(), 20);
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_value(ChatMessage::assistant("hi")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "assistant", "content": "hi"}));
        assert_eq!(Role::System.as_str(), "system");
    }

    #[test]
    fn test_tool_messages_serialize_call_fields() {
        let call = ToolCall::new("call_1", "calculator", r#"{"a":2,"b":3}"#);
        let asked = serde_json::to_value(ChatMessage::assistant_tool_calls("", vec![call])).unwrap();
        assert_eq!(asked["tool_calls"][0]["name"], "calculator");
        assert!(asked.get("tool_call_id").is_none());

        let result = serde_json::to_value(ChatMessage::tool("call_1", "5")).unwrap();
        assert_eq!(
            result,
            serde_json::json!({"role": "tool", "content": "5", "tool_call_id": "call_1"})
        );
    }

    #[test]
    fn test_with_tools() {
        let spec = ToolSpec {
            name: "calculator".into(),
            description: "Add two numbers.".into(),
            parameters: serde_json::json!({"type": "object"}),
        };
        let req = LlmRequest::user("m", "2 + 3?", LlmConfig::default()).with_tools(vec![spec]);
        assert_eq!(req.tools.len(), 1);
        assert_eq!(req.tools[0].name, "calculator");
    }
}
