//! Backend for OpenAI-compatible APIs.
//!
//! Endpoints: `/v1/chat/completions` for generation, `/v1/embeddings` for
//! the retrieval demo. Token usage is read from the `usage` object
//! (`prompt_tokens` / `completion_tokens`). Tools are sent in the
//! `{"type": "function", "function": {...}}` shape and tool calls are read
//! back from `choices[0].message.tool_calls`.

use super::{Backend, ChatMessage, EmbeddingBackend, LlmRequest, LlmResponse, TokenUsage, ToolCall};
use crate::error::Result;
use crate::PipelineError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

/// Backend for any OpenAI-compatible API.
///
/// # Example
///
/// ```
/// use chunkbuddy::backend::OpenAiBackend;
///
/// let backend = OpenAiBackend::new();
/// let with_key = OpenAiBackend::new().with_api_key("sk-...");
/// assert!(with_key.has_api_key());
/// ```
#[derive(Clone)]
pub struct OpenAiBackend {
    /// Optional API key. If set, sent as `Authorization: Bearer {key}`.
    pub(crate) api_key: Option<String>,
    /// Optional organization ID. If set, sent as `OpenAI-Organization: {org}`.
    pub(crate) organization: Option<String>,
}

impl std::fmt::Debug for OpenAiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiBackend")
            .field(
                "api_key",
                &self.api_key.as_ref().map(|k| {
                    if k.chars().count() > 6 {
                        format!("{}***", k.chars().take(6).collect::<String>())
                    } else {
                        "***".to_string()
                    }
                }),
            )
            .field("organization", &self.organization)
            .finish()
    }
}

impl OpenAiBackend {
    /// Create a new OpenAI-compatible backend without authentication.
    pub fn new() -> Self {
        Self {
            api_key: None,
            organization: None,
        }
    }

    /// Set the API key for authentication.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the organization ID header.
    pub fn with_organization(mut self, org: impl Into<String>) -> Self {
        self.organization = Some(org.into());
        self
    }

    /// Returns `true` if an API key has been configured.
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Build the request body for `/v1/chat/completions`.
    fn build_body(request: &LlmRequest) -> Value {
        let messages: Vec<Value> = request
            .messages
            .iter()
            .map(Self::message_json)
            .collect();

        let mut body = json!({
            "model": request.model,
            "messages": messages,
            "temperature": request.config.temperature,
        });

        if let Some(max_tokens) = request.config.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        if !request.tools.is_empty() {
            let tools: Vec<Value> = request
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect();
            body["tools"] = Value::Array(tools);
            body["tool_choice"] = json!("auto");
        }

        body
    }

    fn message_json(message: &ChatMessage) -> Value {
        let mut value = json!({"role": message.role.as_str(), "content": message.content});
        if !message.tool_calls.is_empty() {
            let calls: Vec<Value> = message
                .tool_calls
                .iter()
                .map(|c| {
                    json!({
                        "id": c.id,
                        "type": "function",
                        "function": {"name": c.name, "arguments": c.arguments},
                    })
                })
                .collect();
            value["tool_calls"] = Value::Array(calls);
        }
        if let Some(ref id) = message.tool_call_id {
            value["tool_call_id"] = json!(id);
        }
        value
    }

    /// Build the reqwest request with appropriate headers.
    fn build_http_request(
        &self,
        client: &Client,
        url: &str,
        body: &Value,
    ) -> reqwest::RequestBuilder {
        let mut req = client.post(url).json(body);

        if let Some(ref key) = self.api_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }
        if let Some(ref org) = self.organization {
            req = req.header("OpenAI-Organization", org.as_str());
        }

        req
    }

    /// POST `body` to `{base_url}{path}` and return the decoded JSON body.
    async fn post_json(
        &self,
        client: &Client,
        base_url: &str,
        path: &str,
        body: &Value,
    ) -> Result<(u16, Value)> {
        let url = format!("{}{}", base_url.trim_end_matches('/'), path);

        let resp = self
            .build_http_request(client, &url, body)
            .send()
            .await?;

        let status = resp.status().as_u16();

        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(PipelineError::HttpError { status, body: text });
        }

        let json_resp: Value = resp.json().await?;
        Ok((status, json_resp))
    }

    /// Extract the token counters from a chat completion response.
    fn extract_usage(json_resp: &Value) -> Option<TokenUsage> {
        let usage = json_resp.get("usage")?;
        let input_tokens = usage.get("prompt_tokens").and_then(Value::as_u64)?;
        let output_tokens = usage
            .get("completion_tokens")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        Some(TokenUsage::new(input_tokens, output_tokens))
    }

    /// Extract the generated text from a chat completion response.
    fn extract_text(json_resp: &Value) -> String {
        json_resp
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string()
    }

    /// Extract requested tool calls. Entries missing an id, name or
    /// arguments string are skipped.
    fn extract_tool_calls(json_resp: &Value) -> Vec<ToolCall> {
        let Some(calls) = json_resp
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("tool_calls"))
            .and_then(Value::as_array)
        else {
            return Vec::new();
        };

        calls
            .iter()
            .filter_map(|call| {
                let function = call.get("function")?;
                Some(ToolCall::new(
                    call.get("id")?.as_str()?,
                    function.get("name")?.as_str()?,
                    function.get("arguments")?.as_str()?,
                ))
            })
            .collect()
    }

    /// Extract embedding vectors, ordered by their `index` field.
    fn extract_embeddings(json_resp: &Value, expected: usize) -> Result<Vec<Vec<f32>>> {
        let data = json_resp
            .get("data")
            .and_then(Value::as_array)
            .ok_or_else(|| PipelineError::Other("embedding response has no data array".into()))?;

        let mut indexed: Vec<(u64, Vec<f32>)> = Vec::with_capacity(data.len());
        for (pos, item) in data.iter().enumerate() {
            let index = item
                .get("index")
                .and_then(Value::as_u64)
                .unwrap_or(pos as u64);
            let vector = item
                .get("embedding")
                .and_then(Value::as_array)
                .ok_or_else(|| PipelineError::Other("embedding item has no vector".into()))?
                .iter()
                .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                .collect();
            indexed.push((index, vector));
        }
        indexed.sort_by_key(|(index, _)| *index);

        if indexed.len() != expected {
            return Err(PipelineError::Other(format!(
                "expected {} embeddings, got {}",
                expected,
                indexed.len()
            )));
        }

        Ok(indexed.into_iter().map(|(_, v)| v).collect())
    }
}

impl Default for OpenAiBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for OpenAiBackend {
    async fn complete(
        &self,
        client: &Client,
        base_url: &str,
        request: &LlmRequest,
    ) -> Result<LlmResponse> {
        let body = Self::build_body(request);
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "chat completion request"
        );

        let (status, json_resp) = self
            .post_json(client, base_url, "/v1/chat/completions", &body)
            .await?;

        Ok(LlmResponse {
            text: Self::extract_text(&json_resp),
            status,
            usage: Self::extract_usage(&json_resp),
            tool_calls: Self::extract_tool_calls(&json_resp),
        })
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

#[async_trait]
impl EmbeddingBackend for OpenAiBackend {
    async fn embed(
        &self,
        client: &Client,
        base_url: &str,
        model: &str,
        inputs: &[String],
    ) -> Result<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        let body = json!({"model": model, "input": inputs});
        debug!(model, inputs = inputs.len(), "embedding request");

        let (_, json_resp) = self
            .post_json(client, base_url, "/v1/embeddings", &body)
            .await?;
        Self::extract_embeddings(&json_resp, inputs.len())
    }
}
