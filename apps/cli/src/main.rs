//! docsmith CLI: incremental documentation pipeline.
//!
//! Scans a Markdown tree, enriches and categorizes each document with an LLM,
//! materializes hash-addressed content with rewritten links, and translates it.

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