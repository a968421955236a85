//! Trusted context for content validation.
//!
//! Facts MUST come from the verifier's own infrastructure. Nothing in a
//! bundle, and nothing supplied by any client, may be used to build them.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AttestationError;
use crate::key::PublicKey;

/// The user whose lifecycle is being verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// The user's ID as known to the identity authority.
    pub id: String,
    /// The user's signing key.
    pub public_key: PublicKey,
}

/// The authority that authenticates users and issues decisions and grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityAuthority {
    /// The authority's signing key.
    pub public_key: PublicKey,
}

/// Data known to be true, independent of any bundle.
///
/// Serialized as JSON with keys in base64 SPKI DER. `time` may be omitted
/// in a facts file, in which case the current time is used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Facts {
    /// The user.
    pub user: User,
    /// The identity authority.
    pub identity_authority: IdentityAuthority,
    /// Trusted current time.
    #[serde(default = "Utc::now")]
    pub time: DateTime<Utc>,
}

impl Facts {
    /// Load facts from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`AttestationError::IoError`] or [`AttestationError::Json`].
    pub fn from_file(path: &Path) -> Result<Self, AttestationError> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }
}
