//! The `custodia verify` subcommand.
//!
//! Checks a bundle against one lifecycle stage using a trusted facts file.

use std::path::PathBuf;
use std::process;

use clap::Args;
use color_eyre::eyre::Result;
use custodia_schema::{BundleInput, Facts};
use custodia_verify::{Stage, VerificationError};

use super::read_bundle;

/// Arguments for `custodia verify`.
#[derive(Args)]
pub struct VerifyArgs {
    /// Path to the bundle JSON file.
    pub bundle: PathBuf,

    /// Lifecycle stage to check against.
    #[arg(long, value_name = "STAGE")]
    pub stage: Stage,

    /// Trusted facts about the user and authority (JSON).
    #[arg(long, value_name = "PATH", required_unless_present = "shape_only")]
    pub facts: Option<PathBuf>,

    /// Only check envelope count and payload kinds; skip signatures and content.
    #[arg(long)]
    pub shape_only: bool,

    /// Output the result as JSON.
    #[arg(long)]
    pub json: bool,
}

fn check(args: &VerifyArgs) -> Result<std::result::Result<(), VerificationError>> {
    if args.shape_only {
        let json = std::fs::read_to_string(&args.bundle)?;
        let input: BundleInput = serde_json::from_str(&json)?;
        return Ok(args.stage.parse_unverified(input).map(|_| ()));
    }

    let bundle = read_bundle(&args.bundle)?;
    let facts = match &args.facts {
        Some(path) => Facts::from_file(path)?,
        None => color_eyre::eyre::bail!("--facts is required unless --shape-only is set"),
    };
    Ok(args.stage.verify(&facts, &bundle))
}

/// Execute the verify command.
pub fn execute(args: &VerifyArgs) -> Result<()> {
    let outcome = check(args)?;
    let check_name = if args.shape_only { "shape" } else { "stage" };

    if args.json {
        let report = serde_json::json!({
            "stage": args.stage.name(),
            "check": check_name,
            "passed": outcome.is_ok(),
            "position": outcome.as_ref().err().and_then(VerificationError::position),
            "error": outcome.as_ref().err().map(ToString::to_string),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        match &outcome {
            Ok(()) => println!("[PASS] {check_name} check for `{}`", args.stage),
            Err(e) => println!("[FAIL] {check_name} check for `{}`: {e}", args.stage),
        }
        println!();
        if outcome.is_ok() {
            println!("Verification PASSED");
        } else {
            println!("Verification FAILED");
        }
    }

    if outcome.is_err() {
        process::exit(1);
    }
    Ok(())
}
