//! ChunkBuddy CLI: chunked explanations, check questions and summaries
//! from a hosted LLM, plus chat, evaluation and retrieval demos.

mod commands;

use anyhow::Result;
use clap::Parser;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
