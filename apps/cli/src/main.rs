//! LawWatch CLI: keyword alerts for draft regulations.
//!
//! Polls the regulation portal's RSS feed, scans new projects and their
//! attachments for configured keywords, and reports matches.

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
