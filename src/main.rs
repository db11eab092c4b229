//! cardsmith - generate flashcards from a notes file with OpenRouter.
//!
//! Exit codes: 0 on success or a graceful "cannot generate" answer, 1 on
//! argument, file, credential or API errors and when no cards could be found.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use cardsmith::cost::{calculate_cost, Completion, ModelPricing};
use cardsmith::flashcards::{
    AttemptKind, CardCount, FlashcardPipeline, GenerationAttempt, GenerationSettings,
    PipelineOutcome,
};
use cardsmith::llm::OpenRouterClient;
use cardsmith::{logging, Config};

const INSTRUCTIONS_FILE: &str = "INSTRUCTIONS.md";
const BUNDLED_INSTRUCTIONS: &str = include_str!("../INSTRUCTIONS.md");

#[derive(Debug, Parser)]
#[command(name = "cardsmith", version, about = "Generate flashcards from a notes file")]
struct Cli {
    /// Path to the notes file
    notes: PathBuf,

    /// Number of cards to generate (1-5)
    #[arg(short, long, default_value = "3")]
    count: CardCount,

    /// System prompt file sent with every request [default: INSTRUCTIONS.md
    /// next to the executable, else the built-in copy]
    #[arg(long, env = "CARDSMITH_INSTRUCTIONS")]
    instructions: Option<PathBuf>,

    /// Print token usage and cost for each model call
    #[arg(long)]
    cost: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            // --help and --version also arrive here
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    // Ignore a missing .env; real environment variables still apply.
    dotenvy::dotenv().ok();

    if let Err(e) = logging::init_logger(cli.verbose) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("❌ Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let system_prompt = load_system_prompt(cli.instructions.as_deref()).await?;
    let notes = read_file(&cli.notes, "Notes file").await?;
    let config = Config::from_env()?;
    tracing::debug!(?config, "Configuration loaded");

    let llm = Arc::new(OpenRouterClient::from_config(&config)?);
    let settings = GenerationSettings::from_config(&config, system_prompt);
    let pipeline = FlashcardPipeline::new(llm, settings);

    let run = pipeline.run(&notes, cli.count).await?;
    let code = report(&run.outcome);

    if cli.cost {
        print_costs(&config, &run.attempts).await?;
    }

    Ok(code)
}

async fn read_file(path: &Path, description: &str) -> anyhow::Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("{} not found or unreadable: {}", description, path.display()))
}

/// An explicit path must exist. Otherwise prefer an `INSTRUCTIONS.md` installed
/// beside the executable over the copy compiled into it.
async fn load_system_prompt(path: Option<&Path>) -> anyhow::Result<String> {
    if let Some(path) = path {
        return read_file(path, "System prompt file").await;
    }
    match installed_instructions() {
        Some(path) => read_file(&path, "System prompt file").await,
        None => Ok(BUNDLED_INSTRUCTIONS.to_string()),
    }
}

fn installed_instructions() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    let path = exe.parent()?.join(INSTRUCTIONS_FILE);
    path.is_file().then_some(path)
}

fn report(outcome: &PipelineOutcome) -> ExitCode {
    match outcome {
        PipelineOutcome::Generated { cards, shortfall } => {
            println!("✅ Generated {} flashcard(s):\n", cards.len());
            for card in cards {
                println!("{}\n", card);
            }
            if let Some(message) = shortfall {
                println!("{}", message);
            }
            ExitCode::SUCCESS
        }
        PipelineOutcome::Declined { message } => {
            println!("{}", message);
            ExitCode::SUCCESS
        }
        PipelineOutcome::NoCards { raw_output } => {
            println!("❌ No cards found in output.");
            println!("\n--- Raw model output (for debugging) ---\n");
            println!("{}", raw_output);
            ExitCode::FAILURE
        }
    }
}

async fn print_costs(config: &Config, attempts: &[GenerationAttempt]) -> anyhow::Result<()> {
    if attempts.is_empty() {
        return Ok(());
    }

    let pricing = ModelPricing::from_config(config)?;
    let mut total = 0.0;

    println!("\n--- Cost ---");
    for attempt in attempts {
        let label = match attempt.kind {
            AttemptKind::Generation => "generation",
            AttemptKind::Repair => "repair",
        };
        let completion = Completion {
            model: Some(attempt.model.clone()),
            usage: attempt.usage,
        };
        match calculate_cost(&completion, &pricing).await {
            Ok(cost) => {
                total += cost.total;
                println!(
                    "{:<10} {}: {} prompt + {} completion tokens = ${:.6}",
                    label, cost.model, cost.tokens.prompt, cost.tokens.completion, cost.total
                );
            }
            Err(e) => println!("{:<10} {}: {}", label, attempt.model, e),
        }
    }
    println!("Total cost: ${:.6}", total);

    Ok(())
}
