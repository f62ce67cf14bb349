//! insightforge CLI: daily insight-asset production pipeline.
//!
//! Selects a bounded shard of unprocessed catalog items, derives one
//! structured insight asset per item through tiered LLM backends, and
//! records completions so no item is ever produced twice.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
