//! Example: token usage and cost for a single prompt.
//!
//! Uses the hosted API when `OPENAI_API_KEY` is set, otherwise a mock
//! backend that reports made-up usage.
//!
//! Run with: `cargo run --example cost_tracking -- "Explain TCP slow start"`

use chunkbuddy::backend::mock::MockReply;
use chunkbuddy::chat::ChatSession;
use chunkbuddy::cost::{format_cost, PriceTable, UsageTracker};
use chunkbuddy::{Backend, ExecCtx, MockBackend, OpenAiBackend, Settings, TokenUsage};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let prompt = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    let prompt = if prompt.trim().is_empty() {
        "Explain TCP slow start in two sentences.".to_string()
    } else {
        prompt
    };

    let settings = Settings::from_env()?;
    let backend: Arc<dyn Backend> = match settings.api_key.as_deref() {
        Some(key) => Arc::new(OpenAiBackend::new().with_api_key(key)),
        None => {
            println!("(no OPENAI_API_KEY, using a mock backend)\n");
            Arc::new(MockBackend::scripted(vec![MockReply::text_with_usage(
                "Slow start doubles the congestion window every round trip until loss or a threshold.",
                TokenUsage::new(14, 19),
            )]))
        }
    };

    let tracker = Arc::new(UsageTracker::new());
    let ctx = ExecCtx::builder(&settings.base_url)
        .backend(backend)
        .model(&settings.model)
        .event_handler(tracker.clone())
        .build()?;

    let mut session = ChatSession::new(ctx);
    let response = session.send(&prompt).await?;
    println!("{}\n", response.text);

    let usage = tracker.total();
    println!("Input tokens:  {}", usage.input_tokens);
    println!("Output tokens: {}", usage.output_tokens);

    let prices = PriceTable::default();
    match tracker.estimated_cost(&prices) {
        Ok(cost) => println!("Estimated cost: {}", format_cost(cost)),
        Err(e) => println!("Estimated cost unavailable: {}", e),
    }
    Ok(())
}
