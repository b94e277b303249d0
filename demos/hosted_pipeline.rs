//! Example: run the pipeline against the hosted OpenAI-compatible API.
//!
//! Needs `OPENAI_API_KEY` (environment or `.env`). `CHUNKBUDDY_MODEL` and
//! `OPENAI_BASE_URL` are honored.
//!
//! Run with: `cargo run --example hosted_pipeline -- "Rust lifetimes" intermediate`

use chunkbuddy::{ExecCtx, Pipeline, Settings};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let topic = args.next().unwrap_or_else(|| "Kafka partitions".to_string());
    let level = args.next().unwrap_or_else(|| "beginner".to_string());

    let settings = Settings::from_env()?;
    let ctx = ExecCtx::from_settings(&settings)?;
    let pipeline = Pipeline::builder(ctx)
        .config(settings.pipeline_config())
        .build()?;

    println!("Explaining '{}' for a {} learner with {}...\n", topic, level, settings.model);
    let state = pipeline.run(&topic, &level).await?;

    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(())
}
