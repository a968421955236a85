//! The `custodia facts` subcommand.
//!
//! Assembles a facts file from a user ID and the PEM public keys printed
//! by `custodia keygen --pem`.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::Args;
use color_eyre::eyre::{Result, WrapErr};
use custodia_schema::facts::{IdentityAuthority, User};
use custodia_schema::{Facts, PublicKey};

/// Arguments for `custodia facts`.
#[derive(Args)]
pub struct FactsArgs {
    /// The user's ID as known to the identity authority.
    #[arg(long)]
    pub user_id: String,

    /// The user's PEM public key.
    #[arg(long, value_name = "PATH")]
    pub user_key: PathBuf,

    /// The identity authority's PEM public key.
    #[arg(long, value_name = "PATH")]
    pub authority_key: PathBuf,

    /// Trusted time to record, RFC 3339 (default: now).
    #[arg(long, value_name = "TIME")]
    pub time: Option<DateTime<Utc>>,

    /// Write the facts here instead of stdout.
    #[arg(short, long, value_name = "PATH")]
    pub out: Option<PathBuf>,
}

/// Execute `custodia facts`.
pub fn execute(args: &FactsArgs) -> Result<()> {
    let user_key = PublicKey::from_pem_file(&args.user_key)
        .wrap_err_with(|| format!("reading user key {}", args.user_key.display()))?;
    let authority_key = PublicKey::from_pem_file(&args.authority_key)
        .wrap_err_with(|| format!("reading authority key {}", args.authority_key.display()))?;

    let facts = Facts {
        user: User {
            id: args.user_id.clone(),
            public_key: user_key,
        },
        identity_authority: IdentityAuthority {
            public_key: authority_key,
        },
        time: args.time.unwrap_or_else(Utc::now),
    };
    let json = serde_json::to_string_pretty(&facts)?;

    match &args.out {
        Some(path) => {
            std::fs::write(path, json + "\n")
                .wrap_err_with(|| format!("writing facts {}", path.display()))?;
            tracing::info!(path = %path.display(), user = %facts.user.id, "facts written");
        }
        None => println!("{json}"),
    }
    Ok(())
}
