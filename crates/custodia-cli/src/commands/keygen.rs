//! The `custodia keygen` subcommand.
//!
//! Creates a P-256 signing key if none exists and prints its public half.

use std::path::PathBuf;

use clap::Args;
use color_eyre::eyre::Result;
use custodia_schema::LocalSigner;
use custodia_schema::signer::default_key_path;

/// Arguments for `custodia keygen`.
#[derive(Args)]
pub struct KeygenArgs {
    /// Key name under the default key directory.
    #[arg(long, default_value = super::USER_KEY_NAME, conflicts_with = "key")]
    pub name: String,

    /// Explicit key file path (overrides `--name`).
    #[arg(long, value_name = "PATH")]
    pub key: Option<PathBuf>,

    /// Print the public key as PEM instead of base64 SPKI.
    #[arg(long)]
    pub pem: bool,
}

/// Execute the keygen command.
pub fn execute(args: &KeygenArgs) -> Result<()> {
    let path = args
        .key
        .clone()
        .unwrap_or_else(|| default_key_path(&args.name));
    let signer = LocalSigner::load_or_generate(&path)?;
    let public_key = signer.public_key()?;

    if args.pem {
        print!("{}", public_key.to_pem());
    } else {
        println!("{public_key}");
    }
    Ok(())
}
