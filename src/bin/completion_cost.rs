//! completion-cost - price a saved OpenRouter chat completion response.
//!
//! Reads the response JSON from a file (or `-` for stdin), looks up live
//! pricing for its model and prints the USD breakdown.

use std::io::Read;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use cardsmith::config::{normalize_base_url, DEFAULT_BASE_URL};
use cardsmith::cost::{calculate_cost, Completion, CostBreakdown, ModelPricing, PricingLookup};
use cardsmith::logging;

const PRICING_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Parser)]
#[command(name = "completion-cost", version, about = "Calculate the cost of a chat completion")]
struct Args {
    /// Completion response JSON file, or `-` for stdin
    input: String,

    /// OpenRouter API root used for the pricing lookup
    #[arg(long, env = "OPENROUTER_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Print the breakdown as JSON
    #[arg(long)]
    json: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn read_input(input: &str, mut stdin: impl Read) -> anyhow::Result<String> {
    if input == "-" {
        let mut buf = String::new();
        stdin
            .read_to_string(&mut buf)
            .context("Failed to read completion from stdin")?;
        Ok(buf)
    } else {
        std::fs::read_to_string(input).with_context(|| format!("Failed to read {}", input))
    }
}

async fn price(body: &str, pricing: &dyn PricingLookup) -> anyhow::Result<CostBreakdown> {
    let completion: Completion =
        serde_json::from_str(body).context("Input is not a chat completion JSON object")?;
    Ok(calculate_cost(&completion, pricing).await?)
}

fn print_breakdown(cost: &CostBreakdown) {
    println!("Model:       {}", cost.model);
    println!("Input cost:  ${:.6} ({} tokens)", cost.input, cost.tokens.prompt);
    println!("Output cost: ${:.6} ({} tokens)", cost.output, cost.tokens.completion);
    println!("Total cost:  ${:.6} ({} tokens)", cost.total, cost.tokens.total);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    logging::init_logger(args.verbose)?;

    let body = read_input(&args.input, std::io::stdin().lock())?;

    let base_url = normalize_base_url(&args.base_url)?;
    let pricing = ModelPricing::new(&base_url, PRICING_TIMEOUT)?;
    let cost = price(&body, &pricing).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&cost)?);
    } else {
        print_breakdown(&cost);
    }

    Ok(())
}
