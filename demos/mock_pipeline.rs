//! Example: run the full pipeline against a scripted MockBackend.
//!
//! No API key or network needed. Shows progress callbacks, lifecycle
//! events, and the final state.
//!
//! Run with: `cargo run --example mock_pipeline`

use chunkbuddy::events::FnEventHandler;
use chunkbuddy::{Event, ExecCtx, MockBackend, Pipeline, PipelineState};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // One canned reply per stage, in order
    let mock = MockBackend::new(vec![
        "A Kafka topic is split into partitions, like a highway split into lanes. \
         Each partition is an ordered log, so consumers can read lanes in parallel."
            .into(),
        "Chunk 1: What a partition is\n\nA partition is a slice of a topic.\n\n\
         Chunk 2: Why partitions matter\n\nThey enable parallelism."
            .into(),
        "1. What is a partition?\n2) Why do partitions enable parallelism?\n- Explain the highway analogy."
            .into(),
        "Summary: Partitions split a topic into ordered logs that can be read in parallel.\n\
         - Short chunks keep one idea in view at a time.\n\
         - Questions turn reading into retrieval practice."
            .into(),
    ]);

    let ctx = ExecCtx::builder("http://unused")
        .backend(Arc::new(mock))
        .event_handler(Arc::new(FnEventHandler(|event: Event| match event {
            Event::StageSkipped { name, reason } => println!("  [skip] {}: {}", name, reason),
            Event::StageEnd { name, ok } => println!("  [end] {} ok={}", name, ok),
            _ => {}
        })))
        .build()?;

    let pipeline = Pipeline::builder(ctx).build()?;
    let state = pipeline
        .run_with_progress(PipelineState::new("Kafka partitions", "beginner"), |p| {
            println!("[{}/{}] {}", p.stage_index + 1, p.total_stages, p.stage_name);
        })
        .await?;

    println!("\nChunks:");
    for chunk in &state.chunks {
        println!("---\n{}", chunk);
    }
    println!("\nQuestions:");
    for question in &state.check_questions {
        println!("- {}", question);
    }
    println!("\nSummary: {}", state.summary);
    println!("Notes: {:?}", state.meta.learning_design_notes);
    println!(
        "Meta: {} chunks, {} questions",
        state.meta.num_chunks, state.meta.num_questions
    );

    Ok(())
}
