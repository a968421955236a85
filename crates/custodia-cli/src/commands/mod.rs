//! CLI subcommands.

use std::path::Path;

use color_eyre::eyre::{Result, WrapErr};
use custodia_schema::signer::default_key_path;
use custodia_schema::{Bundle, LocalSigner};

#[expect(
    unreachable_pub,
    reason = "binary crate — pub inside private module is fine"
)]
pub mod client;
#[expect(
    unreachable_pub,
    reason = "binary crate — pub inside private module is fine"
)]
pub mod facts;
#[expect(
    unreachable_pub,
    reason = "binary crate — pub inside private module is fine"
)]
pub mod inspect;
#[expect(
    unreachable_pub,
    reason = "binary crate — pub inside private module is fine"
)]
pub mod keygen;
#[expect(
    unreachable_pub,
    reason = "binary crate — pub inside private module is fine"
)]
pub mod server;
#[expect(
    unreachable_pub,
    reason = "binary crate — pub inside private module is fine"
)]
pub mod verify;

/// Key name used when a user command gets no `--key`.
pub(crate) const USER_KEY_NAME: &str = "user";
/// Key name used when an authority command gets no `--key`.
pub(crate) const AUTHORITY_KEY_NAME: &str = "authority";

/// Load the signing key at `key`, or the default key called `name`.
pub(crate) fn load_signer(key: Option<&Path>, name: &str) -> Result<LocalSigner> {
    let path = key.map_or_else(|| default_key_path(name), Path::to_path_buf);
    LocalSigner::load(&path).wrap_err_with(|| {
        format!("loading signing key {} (run `custodia keygen`?)", path.display())
    })
}

pub(crate) fn read_bundle(path: &Path) -> Result<Bundle> {
    let json = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("reading bundle {}", path.display()))?;
    Bundle::from_json(&json).wrap_err_with(|| format!("parsing bundle {}", path.display()))
}

/// Write `bundle` to `out`, or stdout when `out` is `None`.
pub(crate) fn write_bundle(bundle: &Bundle, out: Option<&Path>) -> Result<()> {
    let json = bundle.to_json_pretty()?;
    match out {
        Some(path) => {
            std::fs::write(path, json + "\n")
                .wrap_err_with(|| format!("writing bundle {}", path.display()))?;
            tracing::info!(path = %path.display(), envelopes = bundle.len(), "bundle written");
        }
        None => println!("{json}"),
    }
    Ok(())
}
