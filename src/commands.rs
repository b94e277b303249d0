//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::info;

use chunkbuddy::agent::{Agent, Calculator, DEFAULT_AGENT_MODEL};
use chunkbuddy::backend::{OpenAiBackend, TokenUsage};
use chunkbuddy::chat::ChatSession;
use chunkbuddy::config::Settings;
use chunkbuddy::cost::{estimate_cost, format_cost, PriceTable, UsageTracker};
use chunkbuddy::evaluation::{load_dataset, summarize_reports, ClarityJudge, Evaluator};
use chunkbuddy::prompt::numbered_list;
use chunkbuddy::rag::{load_documents, Rag};
use chunkbuddy::{ExecCtx, Pipeline, PipelineState};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// ChunkBuddy: explanations broken into learnable chunks.
#[derive(Parser)]
#[command(
    name = "chunkbuddy",
    version,
    about = "Explain a topic in short chunks with check questions and a summary.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Model to use (overrides CHUNKBUDDY_MODEL).
    #[arg(long, global = true, env = "CHUNKBUDDY_MODEL")]
    pub model: Option<String>,

    /// OpenAI-compatible base URL (overrides OPENAI_BASE_URL).
    #[arg(long, global = true, env = "OPENAI_BASE_URL")]
    pub base_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the explain → chunk → questions → summarize pipeline.
    Explain {
        /// Topic to explain.
        topic: String,

        /// Learner level (beginner, intermediate, advanced, ...).
        #[arg(short, long, default_value = "beginner")]
        level: String,

        /// Print the final state as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Send a single prompt and print the reply with its cost.
    Ask {
        /// Prompt text. Read from stdin when omitted.
        prompt: Vec<String>,
    },

    /// Ask the math assistant, which can call a calculator tool.
    Agent {
        /// Question. Defaults to "What is 2 + 3?".
        question: Vec<String>,

        /// Show each tool call and result.
        #[arg(long)]
        trace: bool,
    },

    /// Interactive chat that remembers earlier turns.
    Chat {
        /// System prompt.
        #[arg(long, default_value = "You are a helpful assistant.")]
        system: String,
    },

    /// Evaluate the pipeline over a JSON dataset of {topic, level} rows.
    Eval {
        /// Path to the dataset file.
        dataset: PathBuf,

        /// Skip the LLM-as-judge clarity score.
        #[arg(long)]
        no_judge: bool,
    },

    /// Ask questions answered only from the given documents.
    Rag {
        /// Markdown/text files to index.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = match cli.verbose {
        0 => "chunkbuddy=warn",
        1 => "chunkbuddy=info",
        2 => "chunkbuddy=debug",
        _ => "chunkbuddy=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let mut settings = Settings::from_env().context("failed to load settings")?;
    let model_given = cli.model.is_some();
    if let Some(model) = cli.model {
        settings.model = model;
    }
    if let Some(base_url) = cli.base_url {
        settings.base_url = base_url;
    }
    info!(model = %settings.model, base_url = %settings.base_url, "settings loaded");

    match cli.command {
        Command::Explain { topic, level, json } => explain(&settings, &topic, &level, json).await,
        Command::Ask { prompt } => ask(&settings, prompt).await,
        Command::Agent { question, trace } => {
            if !model_given {
                settings.model = DEFAULT_AGENT_MODEL.to_string();
            }
            agent(&settings, question, trace).await
        }
        Command::Chat { system } => chat(&settings, system).await,
        Command::Eval { dataset, no_judge } => eval(&settings, &dataset, no_judge).await,
        Command::Rag { files } => rag(&settings, &files).await,
    }
}

fn openai_backend(settings: &Settings) -> Result<OpenAiBackend> {
    let key = settings.require_api_key()?;
    Ok(OpenAiBackend::new().with_api_key(key))
}

fn exec_ctx(settings: &Settings, tracker: &Arc<UsageTracker>) -> Result<ExecCtx> {
    let ctx = ExecCtx::builder(&settings.base_url)
        .backend(Arc::new(openai_backend(settings)?))
        .model(&settings.model)
        .event_handler(tracker.clone())
        .build()?;
    Ok(ctx)
}

fn print_usage(usage: TokenUsage, cost: Option<f64>) {
    println!(
        "\nUsage: {} input + {} output = {} tokens",
        usage.input_tokens,
        usage.output_tokens,
        usage.total()
    );
    match cost {
        Some(cost) => println!("Estimated cost: {}", format_cost(cost)),
        None => println!("Estimated cost: n/a (no price for this model)"),
    }
}

fn print_tracker(tracker: &UsageTracker) {
    print_usage(
        tracker.total(),
        tracker.estimated_cost(&PriceTable::default()).ok(),
    );
}

async fn explain(settings: &Settings, topic: &str, level: &str, json: bool) -> Result<()> {
    let tracker = Arc::new(UsageTracker::new());
    let pipeline = Pipeline::builder(exec_ctx(settings, &tracker)?)
        .config(settings.pipeline_config())
        .build()?;

    let state = pipeline
        .run_with_progress(PipelineState::new(topic, level), |progress| {
            eprintln!(
                "[{}/{}] {}",
                progress.stage_index + 1,
                progress.total_stages,
                progress.stage_name
            );
        })
        .await
        .context("pipeline run failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
        return Ok(());
    }

    print_state(&state);
    print_tracker(&tracker);
    Ok(())
}

fn print_state(state: &PipelineState) {
    println!("=== {} ({}) ===\n", state.topic, state.level);
    println!("{}\n", state.raw_explanation.trim());

    println!("=== Chunks ===\n");
    for chunk in &state.chunks {
        println!("{}\n", chunk);
    }

    println!("=== Check questions ===\n");
    println!("{}\n", numbered_list(&state.check_questions));

    println!("=== Summary ===\n");
    println!("{}\n", state.summary);

    if !state.meta.learning_design_notes.is_empty() {
        println!("=== Why this structure helps ===\n");
        for note in &state.meta.learning_design_notes {
            println!("- {}", note);
        }
        println!();
    }
    println!(
        "{} chunks, {} questions",
        state.meta.num_chunks, state.meta.num_questions
    );
}

async fn ask(settings: &Settings, words: Vec<String>) -> Result<()> {
    let prompt = if words.is_empty() {
        Input::new().prompt("Enter your prompt: ").await?.unwrap_or_default()
    } else {
        words.join(" ")
    };
    let prompt = prompt.trim();
    if prompt.is_empty() {
        bail!("Prompt cannot be empty.");
    }

    let tracker = Arc::new(UsageTracker::new());
    let ctx = exec_ctx(settings, &tracker)?;
    let llm = settings.pipeline_config().llm;
    let mut session = ChatSession::new(ctx).with_config(llm);

    let response = session.send(prompt).await?;
    println!("{}", response.text);

    let usage = response.usage.unwrap_or_default();
    print_usage(usage, estimate_cost(&settings.model, &usage).ok());
    Ok(())
}

async fn agent(settings: &Settings, words: Vec<String>, trace: bool) -> Result<()> {
    let question = if words.is_empty() {
        "What is 2 + 3?".to_string()
    } else {
        words.join(" ")
    };

    let tracker = Arc::new(UsageTracker::new());
    let agent = Agent::new(exec_ctx(settings, &tracker)?).with_tool(Calculator);
    let run = agent.run(&question).await.context("agent run failed")?;

    if trace {
        for message in &run.messages {
            for call in &message.tool_calls {
                eprintln!("-> {}({})", call.name, call.arguments);
            }
            if let Some(id) = &message.tool_call_id {
                eprintln!("<- [{}] {}", id, message.content);
            }
        }
    }
    println!("{}", run.answer);
    print_tracker(&tracker);
    Ok(())
}

async fn chat(settings: &Settings, system: String) -> Result<()> {
    let tracker = Arc::new(UsageTracker::new());
    let ctx = exec_ctx(settings, &tracker)?;
    let mut session = ChatSession::new(ctx)
        .with_system(system)
        .with_config(settings.pipeline_config().llm);

    eprintln!(
        "Chat with {}. Type 'exit' to quit, '/reset' to forget the conversation.",
        settings.model
    );
    let mut input = Input::new();
    while let Some(line) = input.prompt("You: ").await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            break;
        }
        if line == "/reset" {
            session.reset();
            eprintln!("(history cleared)");
            continue;
        }

        let response = session.send(line).await?;
        println!("AI: {}\n", response.text);
    }

    print_tracker(&tracker);
    Ok(())
}

async fn eval(settings: &Settings, dataset: &Path, no_judge: bool) -> Result<()> {
    let rows = load_dataset(dataset)
        .with_context(|| format!("failed to load dataset {}", dataset.display()))?;
    if rows.is_empty() {
        bail!("dataset {} has no rows", dataset.display());
    }

    let tracker = Arc::new(UsageTracker::new());
    let pipeline = Pipeline::builder(exec_ctx(settings, &tracker)?)
        .config(settings.pipeline_config())
        .build()?;
    let mut evaluator = Evaluator::new(pipeline);
    if !no_judge {
        evaluator = evaluator.with_judge(ClarityJudge::new(exec_ctx(settings, &tracker)?));
    }

    let reports = evaluator.evaluate(&rows).await?;
    for report in &reports {
        println!("{} ({})", report.row.topic, report.row.level);
        for score in &report.scores {
            let detail = match (&score.value, &score.reason) {
                (Some(value), _) => format!(" [value={}]", value),
                (None, Some(reason)) => format!(" [{}]", reason),
                (None, None) => String::new(),
            };
            println!("  {:<20} {:.2}{}", score.name, score.score, detail);
        }
    }

    println!("\nMeans over {} rows:", reports.len());
    for summary in summarize_reports(&reports) {
        println!("  {:<20} {:.2}", summary.name, summary.mean);
    }
    print_tracker(&tracker);
    Ok(())
}

async fn rag(settings: &Settings, files: &[PathBuf]) -> Result<()> {
    let documents = load_documents(files)?;
    if documents.is_empty() {
        bail!("No documents loaded. Make sure the files exist.");
    }

    let tracker = Arc::new(UsageTracker::new());
    let ctx = exec_ctx(settings, &tracker)?;
    let embedder = Arc::new(openai_backend(settings)?);
    let rag = Rag::build(ctx, embedder, &settings.embedding_model, documents)
        .await
        .context("failed to index documents")?;

    eprintln!(
        "Indexed {} documents. Type 'exit' to quit.",
        rag.index().len()
    );
    let mut input = Input::new();
    while let Some(question) = input.prompt("Question: ").await? {
        let question = question.trim();
        if question.is_empty() {
            continue;
        }
        if question.eq_ignore_ascii_case("exit") || question.eq_ignore_ascii_case("quit") {
            break;
        }
        let answer = rag.answer(question).await?;
        println!("Answer: {}\n", answer);
    }

    print_tracker(&tracker);
    Ok(())
}

/// Line reader over stdin that prompts on stderr.
struct Input {
    lines: Lines<BufReader<Stdin>>,
}

impl Input {
    fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    /// Next line, or `None` at end of input.
    async fn prompt(&mut self, prompt: &str) -> Result<Option<String>> {
        eprint!("{}", prompt);
        Ok(self.lines.next_line().await?)
    }
}
