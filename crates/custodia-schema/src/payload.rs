//! Typed payloads carried inside envelopes.
//!
//! Every payload serializes to a JSON object whose `type` field holds a
//! versioned discriminant token. Signatures are computed over these exact
//! bytes, so serialization must be deterministic: struct fields are
//! written in declaration order and claims use an ordered map.
//!
//! Decoding always happens against an expected kind. The discriminant is
//! read first; a mismatch is reported as
//! [`AttestationError::UnexpectedPayloadKind`] before the body is parsed.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AttestationError, ContentError};
use crate::facts::Facts;

/// Discriminant of a [`Payload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PayloadKind {
    /// The user's claimed public key.
    #[serde(rename = "custodia.dev/Init/v0.1")]
    Init,
    /// The identity authority vouches for the user's identity.
    #[serde(rename = "custodia.dev/Authenticated/v0.1")]
    Authenticated,
    /// The user asks for a role.
    #[serde(rename = "custodia.dev/AccessRequest/v0.1")]
    AccessRequest,
    /// The authority's decision on the request.
    #[serde(rename = "custodia.dev/Decision/v0.1")]
    Decision,
    /// The issued grant.
    #[serde(rename = "custodia.dev/GrantCreated/v0.1")]
    GrantCreated,
}

impl PayloadKind {
    /// Every kind, in lifecycle order.
    pub const ALL: [Self; 5] = [
        Self::Init,
        Self::Authenticated,
        Self::AccessRequest,
        Self::Decision,
        Self::GrantCreated,
    ];

    /// The wire token for this kind.
    #[must_use]
    pub const fn as_token(self) -> &'static str {
        match self {
            Self::Init => "custodia.dev/Init/v0.1",
            Self::Authenticated => "custodia.dev/Authenticated/v0.1",
            Self::AccessRequest => "custodia.dev/AccessRequest/v0.1",
            Self::Decision => "custodia.dev/Decision/v0.1",
            Self::GrantCreated => "custodia.dev/GrantCreated/v0.1",
        }
    }

    /// Look up a kind by wire token.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_token() == token)
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

/// The user's claimed public key, as SPKI DER.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitPayload {
    /// DER-encoded SubjectPublicKeyInfo.
    #[serde(rename = "publicKey", with = "crate::base64_serde")]
    pub public_key_der: Vec<u8>,
}

/// Identity assertion from the identity authority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedPayload {
    /// When the user authenticated.
    #[serde(with = "chrono::serde::ts_nanoseconds")]
    pub time: DateTime<Utc>,
    /// The authenticated user's ID.
    pub user_id: String,
    /// Identity-provider claims, in key order.
    pub claims: BTreeMap<String, serde_json::Value>,
}

/// A request for a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRequest {
    /// Role being requested.
    pub role: String,
    /// Free-text justification.
    pub reason: String,
}

/// Payload wrapper for an [`AccessRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRequestPayload {
    /// The request.
    pub request: AccessRequest,
}

/// Outcome of policy evaluation on a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    /// The request is allowed without a human approver.
    pub auto_allow: bool,
    /// A human approver must sign off.
    pub require_approval: bool,
}

/// Payload wrapper for a [`Decision`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionPayload {
    /// The decision.
    pub decision: Decision,
}

/// The issued authorization record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grant {
    /// Kind of grant (e.g. the target provider).
    #[serde(rename = "type")]
    pub grant_type: String,
    /// When the grant stops being valid.
    pub expires_at: DateTime<Utc>,
    /// Identifier of the role resource being granted.
    pub role_arn: String,
}

/// Payload wrapper for a [`Grant`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantCreatedPayload {
    /// The grant.
    pub grant: Grant,
}

/// A typed, signable claim.
///
/// Adding a kind means adding a variant here and a [`PayloadKind`]; the
/// exhaustive matches in [`Payload::kind`] and
/// [`Payload::validate_contents`] then refuse to compile until it is
/// handled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Payload {
    /// See [`InitPayload`].
    #[serde(rename = "custodia.dev/Init/v0.1")]
    Init(InitPayload),
    /// See [`AuthenticatedPayload`].
    #[serde(rename = "custodia.dev/Authenticated/v0.1")]
    Authenticated(AuthenticatedPayload),
    /// See [`AccessRequestPayload`].
    #[serde(rename = "custodia.dev/AccessRequest/v0.1")]
    AccessRequest(AccessRequestPayload),
    /// See [`DecisionPayload`].
    #[serde(rename = "custodia.dev/Decision/v0.1")]
    Decision(DecisionPayload),
    /// See [`GrantCreatedPayload`].
    #[serde(rename = "custodia.dev/GrantCreated/v0.1")]
    GrantCreated(GrantCreatedPayload),
}

/// Only the discriminant, read ahead of the body.
#[derive(Deserialize)]
struct Discriminant {
    #[serde(rename = "type")]
    token: String,
}

impl Payload {
    /// An Init payload claiming `public_key_der`.
    #[must_use]
    pub const fn init(public_key_der: Vec<u8>) -> Self {
        Self::Init(InitPayload { public_key_der })
    }

    /// An Authenticated payload.
    #[must_use]
    pub const fn authenticated(
        time: DateTime<Utc>,
        user_id: String,
        claims: BTreeMap<String, serde_json::Value>,
    ) -> Self {
        Self::Authenticated(AuthenticatedPayload {
            time,
            user_id,
            claims,
        })
    }

    /// An AccessRequest payload.
    #[must_use]
    pub const fn access_request(request: AccessRequest) -> Self {
        Self::AccessRequest(AccessRequestPayload { request })
    }

    /// A Decision payload.
    #[must_use]
    pub const fn decision(decision: Decision) -> Self {
        Self::Decision(DecisionPayload { decision })
    }

    /// A GrantCreated payload.
    #[must_use]
    pub const fn grant_created(grant: Grant) -> Self {
        Self::GrantCreated(GrantCreatedPayload { grant })
    }

    /// This payload's discriminant.
    #[must_use]
    pub const fn kind(&self) -> PayloadKind {
        match self {
            Self::Init(_) => PayloadKind::Init,
            Self::Authenticated(_) => PayloadKind::Authenticated,
            Self::AccessRequest(_) => PayloadKind::AccessRequest,
            Self::Decision(_) => PayloadKind::Decision,
            Self::GrantCreated(_) => PayloadKind::GrantCreated,
        }
    }

    /// Canonical bytes of this payload.
    ///
    /// # Errors
    ///
    /// Returns [`AttestationError::Json`] if a claim value cannot be
    /// serialized.
    pub fn to_bytes(&self) -> Result<Vec<u8>, AttestationError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode `bytes`, requiring the embedded discriminant to be `expected`.
    ///
    /// # Errors
    ///
    /// - [`AttestationError::Json`] if the bytes are not a JSON object with a `type`
    /// - [`AttestationError::UnknownPayloadKind`] if the token is not recognised
    /// - [`AttestationError::UnexpectedPayloadKind`] if it names another kind
    /// - [`AttestationError::Json`] if the body does not match the kind's layout
    pub fn from_bytes(bytes: &[u8], expected: PayloadKind) -> Result<Self, AttestationError> {
        let Discriminant { token } = serde_json::from_slice(bytes)?;
        let actual =
            PayloadKind::from_token(&token).ok_or(AttestationError::UnknownPayloadKind(token))?;
        if actual != expected {
            return Err(AttestationError::UnexpectedPayloadKind { expected, actual });
        }
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Check this payload's content against trusted facts.
    ///
    /// # Errors
    ///
    /// - Init: [`ContentError::Mismatch`] `"public key"` if the claimed key is not the user's
    /// - Authenticated: [`ContentError::Mismatch`] `"user id"` if the ID is not the user's
    /// - GrantCreated: [`ContentError::Expired`] if `facts.time` is after the expiry
    pub fn validate_contents(&self, facts: &Facts) -> Result<(), ContentError> {
        match self {
            Self::Init(init) => {
                if init.public_key_der != facts.user.public_key.to_spki_der() {
                    return Err(ContentError::Mismatch {
                        field: "public key",
                    });
                }
            }
            Self::Authenticated(auth) => {
                if auth.user_id != facts.user.id {
                    return Err(ContentError::Mismatch { field: "user id" });
                }
            }
            Self::AccessRequest(_) | Self::Decision(_) => {}
            Self::GrantCreated(created) => {
                if facts.time > created.grant.expires_at {
                    return Err(ContentError::Expired {
                        expires_at: created.grant.expires_at,
                        now: facts.time,
                    });
                }
            }
        }
        Ok(())
    }
}
