//! mystify CLI: rule-based MyST formatting with a content preservation check.
//!
//! Reads plain or lightly structured Markdown, annotates it with admonitions
//! and code fences, and verifies that no sentence was lost on the way.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli)
}
