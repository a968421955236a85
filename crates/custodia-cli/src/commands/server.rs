//! Authority-side subcommands: `authenticate`, `decide` and `grant`.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, TimeDelta, Utc};
use clap::Args;
use color_eyre::eyre::{Result, eyre};
use custodia_schema::SignContext;
use custodia_schema::actions::{AuthenticateOpts, ServerActor, TrailingEnvelopes};
use custodia_schema::payload::{Decision, Grant};

use super::{AUTHORITY_KEY_NAME, load_signer, read_bundle, write_bundle};

/// Arguments for `custodia authenticate`.
#[derive(Args)]
pub struct AuthenticateArgs {
    /// Bundle whose first envelope is the user's Init.
    pub bundle: PathBuf,

    /// The authenticated user's ID.
    #[arg(long)]
    pub user_id: String,

    /// Extra claim as `KEY=VALUE`; VALUE is parsed as JSON when possible.
    #[arg(long = "claim", value_name = "KEY=VALUE", value_parser = parse_claim)]
    pub claims: Vec<(String, serde_json::Value)>,

    /// Authentication time, RFC 3339 (default: now).
    #[arg(long, value_name = "TIME")]
    pub time: Option<DateTime<Utc>>,

    /// Authority signing key (default: `~/.config/custodia/keys/authority.pem`).
    #[arg(long, value_name = "PATH")]
    pub key: Option<PathBuf>,

    /// Write the bundle here instead of stdout.
    #[arg(short, long, value_name = "PATH")]
    pub out: Option<PathBuf>,
}

/// Arguments for `custodia decide`.
#[derive(Args)]
pub struct DecideArgs {
    /// Access-request bundle to decide on.
    pub bundle: PathBuf,

    /// Allow without human approval.
    #[arg(long)]
    pub auto_allow: bool,

    /// Require a human approval step.
    #[arg(long)]
    pub require_approval: bool,

    /// Discard envelopes after the access request instead of failing.
    #[arg(long)]
    pub drop_trailing: bool,

    /// Authority signing key (default: `~/.config/custodia/keys/authority.pem`).
    #[arg(long, value_name = "PATH")]
    pub key: Option<PathBuf>,

    /// Write the bundle here instead of stdout.
    #[arg(short, long, value_name = "PATH")]
    pub out: Option<PathBuf>,
}

/// Arguments for `custodia grant`.
#[derive(Args)]
pub struct GrantArgs {
    /// Decided bundle to extend.
    pub bundle: PathBuf,

    /// Identifier of the granted role or resource.
    #[arg(long)]
    pub role_arn: String,

    /// Grant type.
    #[arg(long = "type", default_value = "aws-sso")]
    pub grant_type: String,

    /// Grant lifetime in seconds from now.
    #[arg(long, value_name = "SECS", default_value_t = 3600, conflicts_with = "expires_at")]
    pub ttl_secs: i64,

    /// Absolute expiry, RFC 3339.
    #[arg(long, value_name = "TIME")]
    pub expires_at: Option<DateTime<Utc>>,

    /// Authority signing key (default: `~/.config/custodia/keys/authority.pem`).
    #[arg(long, value_name = "PATH")]
    pub key: Option<PathBuf>,

    /// Write the bundle here instead of stdout.
    #[arg(short, long, value_name = "PATH")]
    pub out: Option<PathBuf>,
}

fn parse_claim(s: &str) -> Result<(String, serde_json::Value), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{s}`"))?;
    if key.is_empty() {
        return Err("claim key must not be empty".to_owned());
    }
    let value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_owned()));
    Ok((key.to_owned(), value))
}

/// `now + ttl_secs`, or an error when that falls outside chrono's range.
fn grant_expiry(now: DateTime<Utc>, ttl_secs: i64) -> Result<DateTime<Utc>> {
    TimeDelta::try_seconds(ttl_secs)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| eyre!("--ttl-secs {ttl_secs} is out of range"))
}

/// Execute `custodia authenticate`.
pub async fn authenticate(args: AuthenticateArgs, ctx: SignContext) -> Result<()> {
    let bundle = read_bundle(&args.bundle)?;
    let init = bundle
        .get(0)
        .ok_or_else(|| eyre!("{} has no envelopes", args.bundle.display()))?;
    let signer = load_signer(args.key.as_deref(), AUTHORITY_KEY_NAME)?;

    let opts = AuthenticateOpts {
        time: args.time.unwrap_or_else(Utc::now),
        user_id: args.user_id,
        claims: args.claims.into_iter().collect::<BTreeMap<_, _>>(),
    };
    let bundle = ServerActor::new(signer)
        .with_context(ctx)
        .authenticate(init, opts)
        .await?;
    write_bundle(&bundle, args.out.as_deref())
}

/// Execute `custodia decide`.
pub async fn decide(args: DecideArgs, ctx: SignContext) -> Result<()> {
    let bundle = read_bundle(&args.bundle)?;
    let signer = load_signer(args.key.as_deref(), AUTHORITY_KEY_NAME)?;
    let trailing = if args.drop_trailing {
        TrailingEnvelopes::Drop
    } else {
        TrailingEnvelopes::Reject
    };
    let decision = Decision {
        auto_allow: args.auto_allow,
        require_approval: args.require_approval,
    };

    let bundle = ServerActor::new(signer)
        .with_context(ctx)
        .with_trailing_envelopes(trailing)
        .decide(&bundle, decision)
        .await?;
    write_bundle(&bundle, args.out.as_deref())
}

/// Execute `custodia grant`.
pub async fn grant(args: GrantArgs, ctx: SignContext) -> Result<()> {
    let bundle = read_bundle(&args.bundle)?;
    let signer = load_signer(args.key.as_deref(), AUTHORITY_KEY_NAME)?;
    let expires_at = match args.expires_at {
        Some(at) => at,
        None => grant_expiry(Utc::now(), args.ttl_secs)?,
    };
    let grant = Grant {
        grant_type: args.grant_type,
        expires_at,
        role_arn: args.role_arn,
    };

    let bundle = ServerActor::new(signer)
        .with_context(ctx)
        .create_grant(&bundle, grant)
        .await?;
    write_bundle(&bundle, args.out.as_deref())
}
