//! The `custodia inspect` subcommand.
//!
//! Displays a bundle in human-readable format. Nothing is verified.

use std::path::PathBuf;

use clap::Args;
use color_eyre::eyre::Result;
use custodia_verify::inspect;

use super::read_bundle;

/// Arguments for `custodia inspect`.
#[derive(Args)]
pub struct InspectArgs {
    /// Path to the bundle JSON file.
    pub bundle: PathBuf,

    /// Show every envelope with its payload decoded as text.
    #[arg(long, conflicts_with = "json")]
    pub payloads: bool,

    /// Output the summary as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Execute the inspect command.
pub fn execute(args: &InspectArgs) -> Result<()> {
    let bundle = read_bundle(&args.bundle)?;

    if args.payloads {
        println!("{}", bundle.to_debug_json_pretty()?);
    } else if args.json {
        let summaries = inspect::summarize(&bundle);
        println!("{}", serde_json::to_string_pretty(&summaries)?);
    } else {
        print!("{}", inspect::format_summary(&inspect::summarize(&bundle)));
    }

    Ok(())
}
