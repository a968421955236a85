//! Custodia CLI: build and verify signed access attestation bundles.
//!
//! Each lifecycle step reads a bundle, adds to it, and writes a new one.
//! `verify` checks a bundle against a lifecycle stage.

mod commands;

use std::time::Duration;

use clap::Parser;
use color_eyre::eyre::Result;
use custodia_schema::SignContext;

/// Custodia: signed, verifiable access request trails.
///
/// A user and an identity authority take turns adding signed envelopes
/// to a bundle. Anyone holding trusted facts about both parties can
/// check the bundle at any stage of the lifecycle.
#[derive(Parser)]
#[command(name = "custodia", version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (repeat for more detail: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Output logs as JSON (for machine consumption).
    #[arg(long, global = true)]
    json_logs: bool,

    /// Give up on a signing call after this many seconds.
    #[arg(long, value_name = "SECS", default_value_t = 30, global = true)]
    sign_timeout_secs: u64,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Create a signing key (or show the public half of an existing one).
    Keygen(commands::keygen::KeygenArgs),
    /// Start a lifecycle: sign an Init envelope claiming your key.
    Init(commands::client::InitArgs),
    /// As the authority, counter-sign Init and attest the user's identity.
    Authenticate(commands::server::AuthenticateArgs),
    /// As the user, counter-sign the Authenticated envelope.
    CounterSign(commands::client::CounterSignArgs),
    /// As the user, append a signed access request.
    RequestAccess(commands::client::RequestAccessArgs),
    /// As the authority, sign the request and append a decision.
    Decide(commands::server::DecideArgs),
    /// As the authority, append a signed grant.
    Grant(commands::server::GrantArgs),
    /// Assemble a facts file from a user ID and PEM public keys.
    Facts(commands::facts::FactsArgs),
    /// Verify a bundle against a lifecycle stage.
    Verify(commands::verify::VerifyArgs),
    /// Display a bundle in human-readable format.
    Inspect(commands::inspect::InspectArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    if cli.json_logs {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let ctx = SignContext::new(Duration::from_secs(cli.sign_timeout_secs));

    match cli.command {
        Commands::Keygen(args) => commands::keygen::execute(&args),
        Commands::Init(args) => commands::client::init(args, ctx).await,
        Commands::Authenticate(args) => commands::server::authenticate(args, ctx).await,
        Commands::CounterSign(args) => commands::client::counter_sign(args, ctx).await,
        Commands::RequestAccess(args) => commands::client::request_access(args, ctx).await,
        Commands::Decide(args) => commands::server::decide(args, ctx).await,
        Commands::Grant(args) => commands::server::grant(args, ctx).await,
        Commands::Facts(args) => commands::facts::execute(&args),
        Commands::Verify(args) => commands::verify::execute(&args),
        Commands::Inspect(args) => commands::inspect::execute(&args),
    }
}
