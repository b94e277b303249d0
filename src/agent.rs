//! Tool-calling agent.
//!
//! The model is offered a set of [`Tool`]s. While it keeps asking for calls,
//! the agent runs them and sends the results back; the first reply without
//! tool calls is the answer. The loop is bounded by
//! [`max_steps`](Agent::with_max_steps).

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::backend::{ChatMessage, LlmRequest, TokenUsage, ToolCall, ToolSpec};
use crate::config::LlmConfig;
use crate::error::Result;
use crate::exec_ctx::ExecCtx;
use crate::stages::dispatch;
use crate::PipelineError;

/// Model the agent command uses when none is configured.
pub const DEFAULT_AGENT_MODEL: &str = "gpt-4.1-mini";
pub const DEFAULT_AGENT_SYSTEM: &str = "You are a helpful math assistant.";
pub const DEFAULT_MAX_STEPS: usize = 5;

/// A function the model can call.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name, description and argument schema sent to the model.
    fn spec(&self) -> ToolSpec;

    /// Run the tool on the decoded arguments object.
    async fn call(&self, arguments: &Value) -> Result<String>;
}

/// Adds two numbers `a` and `b`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Calculator;

#[async_trait]
impl Tool for Calculator {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "calculator".to_string(),
            description: "Add two numbers and return the sum.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "a": {"type": "number", "description": "First number"},
                    "b": {"type": "number", "description": "Second number"}
                },
                "required": ["a", "b"]
            }),
        }
    }

    async fn call(&self, arguments: &Value) -> Result<String> {
        let number = |key: &str| {
            arguments.get(key).and_then(Value::as_f64).ok_or_else(|| {
                PipelineError::Other(format!("calculator: `{}` must be a number", key))
            })
        };
        let sum = number("a")? + number("b")?;
        Ok(json!(sum).to_string())
    }
}

/// Outcome of [`Agent::run`].
#[derive(Debug, Clone)]
pub struct AgentRun {
    /// Text of the final assistant reply.
    pub answer: String,
    /// The whole exchange: system, user, tool-call turns, tool results and
    /// the final answer.
    pub messages: Vec<ChatMessage>,
    /// Names of the tools called, in order.
    pub tool_calls_made: Vec<String>,
    /// Backend calls made.
    pub steps: usize,
    pub usage: TokenUsage,
}

/// A model plus tools, run to a final answer.
///
/// # Example
///
/// ```
/// use chunkbuddy::agent::{Agent, Calculator};
/// use chunkbuddy::backend::mock::MockReply;
/// use chunkbuddy::backend::ToolCall;
/// use chunkbuddy::{ExecCtx, MockBackend};
/// use std::sync::Arc;
///
/// # tokio_test::block_on(async {
/// let mock = MockBackend::scripted(vec![
///     MockReply::tool_calls(vec![ToolCall::new("c1", "calculator", r#"{"a": 2, "b": 3}"#)]),
///     MockReply::text("2 + 3 = 5"),
/// ]);
/// let ctx = ExecCtx::builder("http://unused").backend(Arc::new(mock)).build()?;
/// let run = Agent::new(ctx).with_tool(Calculator).run("What is 2 + 3?").await?;
/// assert_eq!(run.answer, "2 + 3 = 5");
/// assert_eq!(run.tool_calls_made, vec!["calculator"]);
/// # Ok::<(), chunkbuddy::PipelineError>(())
/// # }).unwrap();
/// ```
pub struct Agent {
    ctx: ExecCtx,
    llm: LlmConfig,
    system: String,
    tools: Vec<Box<dyn Tool>>,
    max_steps: usize,
}

impl Agent {
    const NAME: &'static str = "agent";

    /// An agent with the math-assistant system prompt, temperature 0 and no
    /// tools.
    pub fn new(ctx: ExecCtx) -> Self {
        Self {
            ctx,
            llm: LlmConfig::default().with_temperature(0.0),
            system: DEFAULT_AGENT_SYSTEM.to_string(),
            tools: Vec::new(),
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    pub fn with_system(mut self, prompt: impl Into<String>) -> Self {
        self.system = prompt.into();
        self
    }

    pub fn with_tool(mut self, tool: impl Tool + 'static) -> Self {
        self.tools.push(Box::new(tool));
        self
    }

    pub fn with_config(mut self, llm: LlmConfig) -> Self {
        self.llm = llm;
        self
    }

    /// Backend calls allowed before giving up. At least 1.
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    /// Answer `question`, calling tools as the model asks.
    ///
    /// Backend errors propagate. Tool failures, unknown tools and malformed
    /// arguments are reported back to the model as the tool result. Running
    /// out of steps is an error.
    pub async fn run(&self, question: &str) -> Result<AgentRun> {
        let specs: Vec<ToolSpec> = self.tools.iter().map(|t| t.spec()).collect();
        let mut messages = vec![
            ChatMessage::system(self.system.as_str()),
            ChatMessage::user(question),
        ];
        let mut tool_calls_made = Vec::new();
        let mut usage = TokenUsage::default();

        for step in 1..=self.max_steps {
            let request = LlmRequest {
                model: self.ctx.model.clone(),
                messages: messages.clone(),
                config: self.llm.clone(),
                tools: specs.clone(),
            };
            let response = dispatch(&self.ctx, Self::NAME, &request).await?;
            if let Some(u) = response.usage {
                usage += u;
            }

            if response.tool_calls.is_empty() {
                info!(steps = step, tool_calls = tool_calls_made.len(), "agent finished");
                messages.push(ChatMessage::assistant(response.text.as_str()));
                return Ok(AgentRun {
                    answer: response.text,
                    messages,
                    tool_calls_made,
                    steps: step,
                    usage,
                });
            }

            messages.push(ChatMessage::assistant_tool_calls(
                response.text.as_str(),
                response.tool_calls.clone(),
            ));
            for call in &response.tool_calls {
                debug!(tool = %call.name, id = %call.id, arguments = %call.arguments, "tool call");
                tool_calls_made.push(call.name.clone());
                let result = self.execute(call).await;
                messages.push(ChatMessage::tool(call.id.as_str(), result));
            }
        }

        warn!(max_steps = self.max_steps, "agent gave up");
        Err(PipelineError::Other(format!(
            "agent gave no final answer after {} steps",
            self.max_steps
        )))
    }

    async fn execute(&self, call: &ToolCall) -> String {
        let Some(tool) = self.tools.iter().find(|t| t.spec().name == call.name) else {
            warn!(tool = %call.name, "unknown tool requested");
            return format!("Error: unknown tool '{}'", call.name);
        };

        let arguments: Value = match serde_json::from_str(&call.arguments) {
            Ok(value) => value,
            Err(e) => {
                warn!(tool = %call.name, error = %e, "malformed tool arguments");
                return format!("Error: arguments are not valid JSON: {}", e);
            }
        };

        match tool.call(&arguments).await {
            Ok(result) => result,
            Err(e) => {
                warn!(tool = %call.name, error = %e, "tool failed");
                format!("Error: {}", e)
            }
        }
    }
}
