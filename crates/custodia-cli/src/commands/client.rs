//! User-side subcommands: `init`, `counter-sign` and `request-access`.

use std::path::PathBuf;

use clap::Args;
use color_eyre::eyre::Result;
use custodia_schema::SignContext;
use custodia_schema::actions::ClientActor;
use custodia_schema::payload::AccessRequest;

use super::{USER_KEY_NAME, load_signer, read_bundle, write_bundle};

/// Arguments for `custodia init`.
#[derive(Args)]
pub struct InitArgs {
    /// User signing key (default: `~/.config/custodia/keys/user.pem`).
    #[arg(long, value_name = "PATH")]
    pub key: Option<PathBuf>,

    /// Write the bundle here instead of stdout.
    #[arg(short, long, value_name = "PATH")]
    pub out: Option<PathBuf>,
}

/// Arguments for `custodia counter-sign`.
#[derive(Args)]
pub struct CounterSignArgs {
    /// Bundle whose Authenticated envelope to sign.
    pub bundle: PathBuf,

    /// User signing key (default: `~/.config/custodia/keys/user.pem`).
    #[arg(long, value_name = "PATH")]
    pub key: Option<PathBuf>,

    /// Write the bundle here instead of stdout.
    #[arg(short, long, value_name = "PATH")]
    pub out: Option<PathBuf>,
}

/// Arguments for `custodia request-access`.
#[derive(Args)]
pub struct RequestAccessArgs {
    /// Authenticated bundle to extend.
    pub bundle: PathBuf,

    /// Role being requested.
    #[arg(long)]
    pub role: String,

    /// Why access is needed.
    #[arg(long)]
    pub reason: String,

    /// User signing key (default: `~/.config/custodia/keys/user.pem`).
    #[arg(long, value_name = "PATH")]
    pub key: Option<PathBuf>,

    /// Write the bundle here instead of stdout.
    #[arg(short, long, value_name = "PATH")]
    pub out: Option<PathBuf>,
}

/// Execute `custodia init`.
pub async fn init(args: InitArgs, ctx: SignContext) -> Result<()> {
    let signer = load_signer(args.key.as_deref(), USER_KEY_NAME)?;
    let public_key = signer.public_key()?;
    let bundle = ClientActor::new(signer)
        .with_context(ctx)
        .init(&public_key)
        .await?;
    write_bundle(&bundle, args.out.as_deref())
}

/// Execute `custodia counter-sign`.
pub async fn counter_sign(args: CounterSignArgs, ctx: SignContext) -> Result<()> {
    let bundle = read_bundle(&args.bundle)?;
    let signer = load_signer(args.key.as_deref(), USER_KEY_NAME)?;
    let bundle = ClientActor::new(signer)
        .with_context(ctx)
        .counter_sign(&bundle)
        .await?;
    write_bundle(&bundle, args.out.as_deref())
}

/// Execute `custodia request-access`.
pub async fn request_access(args: RequestAccessArgs, ctx: SignContext) -> Result<()> {
    let bundle = read_bundle(&args.bundle)?;
    let signer = load_signer(args.key.as_deref(), USER_KEY_NAME)?;
    let request = AccessRequest {
        role: args.role,
        reason: args.reason,
    };
    let bundle = ClientActor::new(signer)
        .with_context(ctx)
        .request_access(&bundle, request)
        .await?;
    write_bundle(&bundle, args.out.as_deref())
}
