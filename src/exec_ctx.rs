//! Execution context injected into the pipeline and its collaborators.
//!
//! [`ExecCtx`] carries the HTTP client, the text generation backend, the
//! endpoint, the model name, and an optional event handler. Build one per
//! independent caller; runs that share an `ExecCtx` share its backend handle.

use crate::backend::{Backend, OpenAiBackend};
use crate::config::{Settings, DEFAULT_MODEL};
use crate::error::Result;
use crate::events::{Event, EventHandler};
use crate::PipelineError;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

/// Shared execution context for stage invocations.
///
/// # Example
///
/// ```
/// use chunkbuddy::{ExecCtx, MockBackend};
/// use std::sync::Arc;
///
/// let ctx = ExecCtx::builder("http://unused")
///     .backend(Arc::new(MockBackend::fixed("hi")))
///     .model("gpt-4o-mini")
///     .build()
///     .unwrap();
/// assert_eq!(ctx.model, "gpt-4o-mini");
/// ```
pub struct ExecCtx {
    /// HTTP client (cheap to clone -- uses `Arc` internally).
    pub client: Client,
    /// Base URL for the LLM provider (e.g. `https://api.openai.com`).
    pub base_url: String,
    /// Text generation backend. Default: [`OpenAiBackend`] without a key.
    pub backend: Arc<dyn Backend>,
    /// Model identifier sent with every request.
    pub model: String,
    /// Optional event handler for lifecycle events.
    pub event_handler: Option<Arc<dyn EventHandler>>,
}

impl ExecCtx {
    /// Create a new builder.
    pub fn builder(base_url: impl Into<String>) -> ExecCtxBuilder {
        ExecCtxBuilder {
            client: None,
            base_url: base_url.into(),
            backend: None,
            model: None,
            event_handler: None,
            timeout: None,
        }
    }

    /// Context for the hosted OpenAI-compatible API described by `settings`.
    pub fn from_settings(settings: &Settings) -> Result<ExecCtx> {
        let key = settings.require_api_key()?;
        ExecCtx::builder(&settings.base_url)
            .backend(Arc::new(OpenAiBackend::new().with_api_key(key)))
            .model(&settings.model)
            .build()
    }

    /// Forward an event to the handler, if one is installed.
    pub fn emit(&self, event: Event) {
        crate::events::emit(&self.event_handler, event);
    }
}

impl std::fmt::Debug for ExecCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecCtx")
            .field("base_url", &self.base_url)
            .field("backend", &self.backend.name())
            .field("model", &self.model)
            .field("has_event_handler", &self.event_handler.is_some())
            .finish()
    }
}

/// Builder for [`ExecCtx`].
pub struct ExecCtxBuilder {
    client: Option<Client>,
    base_url: String,
    backend: Option<Arc<dyn Backend>>,
    model: Option<String>,
    event_handler: Option<Arc<dyn EventHandler>>,
    timeout: Option<Duration>,
}

impl ExecCtxBuilder {
    /// Set the HTTP client. If not set, a default client is created.
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the text generation backend.
    pub fn backend(mut self, backend: Arc<dyn Backend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set the model identifier. Default: `gpt-4o-mini`.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the event handler.
    pub fn event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    /// Set the request timeout. Default: 60 seconds.
    ///
    /// Ignored when a custom `Client` is provided via `.client()`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the execution context.
    pub fn build(self) -> Result<ExecCtx> {
        let model = self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string());
        if model.trim().is_empty() {
            return Err(PipelineError::InvalidConfig(
                "model name cannot be empty".to_string(),
            ));
        }

        let client = match self.client {
            Some(client) => client,
            None => Client::builder()
                .timeout(self.timeout.unwrap_or(Duration::from_secs(60)))
                .build()?,
        };

        Ok(ExecCtx {
            client,
            base_url: normalize_base_url(&self.base_url),
            backend: self
                .backend
                .unwrap_or_else(|| Arc::new(OpenAiBackend::new())),
            model,
            event_handler: self.event_handler,
        })
    }
}

/// Strip known provider path suffixes from a base URL.
/// This prevents double-pathing when backends append their own paths.
/// e.g., "https://api.openai.com/v1" -> "https://api.openai.com"
fn normalize_base_url(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    // Strip known suffixes (order matters, longest first)
    for suffix in &["/v1/chat/completions", "/v1/embeddings", "/v1/chat", "/v1"] {
        if let Some(stripped) = trimmed.strip_suffix(suffix) {
            return stripped.to_string();
        }
    }
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;

    #[test]
    fn test_normalize_base_url_strips_v1() {
        assert_eq!(normalize_base_url("https://api.openai.com/v1"), "https://api.openai.com");
        assert_eq!(normalize_base_url("https://api.openai.com/v1/"), "https://api.openai.com");
    }

    #[test]
    fn test_normalize_base_url_strips_full_path() {
        assert_eq!(
            normalize_base_url("https://api.openai.com/v1/chat/completions"),
            "https://api.openai.com"
        );
        assert_eq!(
            normalize_base_url("https://api.openai.com/v1/embeddings"),
            "https://api.openai.com"
        );
    }

    #[test]
    fn test_normalize_base_url_preserves_clean() {
        assert_eq!(normalize_base_url("http://localhost:8080"), "http://localhost:8080");
        assert_eq!(normalize_base_url("http://localhost:8080/"), "http://localhost:8080");
    }

    #[test]
    fn test_defaults() {
        let ctx = ExecCtx::builder("https://api.openai.com/v1").build().unwrap();
        assert_eq!(ctx.model, DEFAULT_MODEL);
        assert_eq!(ctx.backend.name(), "openai");
        assert_eq!(ctx.base_url, "https://api.openai.com");
        assert!(ctx.event_handler.is_none());
    }

    #[test]
    fn test_empty_model_rejected() {
        let result = ExecCtx::builder("http://unused").model(" ").build();
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn test_custom_backend_and_timeout() {
        let ctx = ExecCtx::builder("http://unused")
            .backend(Arc::new(MockBackend::fixed("x")))
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        assert_eq!(ctx.backend.name(), "mock");
        assert!(format!("{:?}", ctx).contains("mock"));
    }

    #[test]
    fn test_from_settings_requires_key() {
        let settings = Settings::default();
        assert!(ExecCtx::from_settings(&settings).is_err());

        let settings = Settings {
            api_key: Some("sk-test".into()),
            model: "gpt-4.1-mini".into(),
            ..Settings::default()
        };
        let ctx = ExecCtx::from_settings(&settings).unwrap();
        assert_eq!(ctx.model, "gpt-4.1-mini");
        assert_eq!(ctx.backend.name(), "openai");
    }
}
