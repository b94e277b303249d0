//! Multi-turn chat that carries its history between calls.

use crate::backend::{ChatMessage, LlmRequest, LlmResponse};
use crate::config::LlmConfig;
use crate::error::Result;
use crate::exec_ctx::ExecCtx;
use crate::stages::dispatch;

/// A conversation with memory.
///
/// Every [`send`](ChatSession::send) replays the system prompt and the full
/// history, so the model sees earlier turns.
///
/// # Example
///
/// ```
/// use chunkbuddy::chat::ChatSession;
/// use chunkbuddy::{ExecCtx, MockBackend};
/// use std::sync::Arc;
///
/// # tokio_test::block_on(async {
/// let ctx = ExecCtx::builder("http://unused")
///     .backend(Arc::new(MockBackend::fixed("Hi!")))
///     .build()
///     .unwrap();
/// let mut chat = ChatSession::new(ctx).with_system("Be brief.");
/// let reply = chat.send("Hello").await.unwrap();
/// assert_eq!(reply.text, "Hi!");
/// assert_eq!(chat.history().len(), 2);
/// # });
/// ```
pub struct ChatSession {
    ctx: ExecCtx,
    llm: LlmConfig,
    system: Option<String>,
    history: Vec<ChatMessage>,
}

impl ChatSession {
    const NAME: &'static str = "chat";

    pub fn new(ctx: ExecCtx) -> Self {
        Self {
            ctx,
            llm: LlmConfig::default(),
            system: None,
            history: Vec::new(),
        }
    }

    pub fn with_system(mut self, prompt: impl Into<String>) -> Self {
        self.system = Some(prompt.into());
        self
    }

    pub fn with_config(mut self, llm: LlmConfig) -> Self {
        self.llm = llm;
        self
    }

    pub fn system(&self) -> Option<&str> {
        self.system.as_deref()
    }

    /// User and assistant turns so far (the system prompt is not included).
    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Forget all turns. The system prompt is kept.
    pub fn reset(&mut self) {
        self.history.clear();
    }

    /// Send one user turn and record the reply.
    ///
    /// On a backend error the history is left as it was before the call.
    pub async fn send(&mut self, text: &str) -> Result<LlmResponse> {
        let user = ChatMessage::user(text);

        let mut messages = Vec::with_capacity(self.history.len() + 2);
        if let Some(system) = &self.system {
            messages.push(ChatMessage::system(system.as_str()));
        }
        messages.extend(self.history.iter().cloned());
        messages.push(user.clone());

        let request = LlmRequest {
            model: self.ctx.model.clone(),
            messages,
            config: self.llm.clone(),
            tools: Vec::new(),
        };
        let response = dispatch(&self.ctx, Self::NAME, &request).await?;

        self.history.push(user);
        self.history
            .push(ChatMessage::assistant(response.text.as_str()));
        Ok(response)
    }
}
