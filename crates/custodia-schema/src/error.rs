//! Error types for the attestation schema.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::key::PublicKey;
use crate::payload::PayloadKind;

/// Errors from building, signing, and decoding attestation envelopes.
#[derive(Debug, thiserror::Error)]
pub enum AttestationError {
    /// The signing key is not usable for this protocol (wrong curve size).
    #[error("invalid signing key configuration: {0}")]
    InvalidKeyConfig(String),

    /// One or more required signers have no valid signature on an envelope.
    #[error("{0}")]
    MissingSignatures(#[from] MissingSignatures),

    /// The payload's embedded discriminant is not the one the caller expected.
    #[error("payload type {actual} did not match expected type {expected}")]
    UnexpectedPayloadKind {
        /// The kind the caller asked for.
        expected: PayloadKind,
        /// The kind found in the payload bytes.
        actual: PayloadKind,
    },

    /// The payload carries a discriminant token this version does not know.
    #[error("unhandled payload type `{0}`")]
    UnknownPayloadKind(String),

    /// The payload decoded but its contents contradict the trusted facts.
    #[error(transparent)]
    Content(#[from] ContentError),

    /// JSON (de)serialization failed, including malformed payload bytes.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The signer returned an error.
    #[error("signing failed: {0}")]
    SigningFailed(String),

    /// The signer did not answer within the context's timeout.
    #[error("signing timed out after {0:?}")]
    SigningTimedOut(Duration),

    /// The signing context was cancelled before the signer answered.
    #[error("signing was cancelled")]
    SigningCancelled,

    /// A role action needs more envelopes than the bundle holds.
    #[error("bundle holds {actual} envelopes, at least {required} required")]
    BundleTooShort {
        /// Minimum envelope count the action operates on.
        required: usize,
        /// Envelopes actually present.
        actual: usize,
    },

    /// A role action was handed envelopes past the ones it rebuilds.
    #[error("unexpected trailing envelopes: bundle holds {actual}, expected exactly {expected}")]
    UnexpectedTrailingEnvelopes {
        /// Envelope count the action accepts.
        expected: usize,
        /// Envelopes actually present.
        actual: usize,
    },

    /// The bundle has no envelope of the requested kind.
    #[error("{0} envelope not found in bundle")]
    MissingEnvelope(PayloadKind),

    /// Key load, generate, or parse failed.
    #[error("key error: {0}")]
    KeyError(String),

    /// I/O error while reading or writing key material.
    #[error("attestation I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// An untrusted bundle does not have the envelope layout a stage expects.
#[derive(Debug, thiserror::Error)]
pub enum ShapeError {
    /// The bundle does not have one envelope per expected kind.
    #[error("wrong envelope count: expected {expected}, got {actual}")]
    WrongEnvelopeCount {
        /// Envelopes expected.
        expected: usize,
        /// Envelopes received.
        actual: usize,
    },

    /// An envelope does not decode as the kind expected at its position.
    #[error("envelope {position} ({kind}): {source}")]
    Envelope {
        /// Zero-based position in the bundle.
        position: usize,
        /// The kind expected at this position.
        kind: PayloadKind,
        /// Why decoding failed.
        #[source]
        source: AttestationError,
    },
}

/// Required signers that did not sign an envelope.
///
/// Lists every missing key, in the order they were required.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingSignatures {
    /// Public keys with no matching signature.
    pub missing_keys: Vec<PublicKey>,
}

impl std::fmt::Display for MissingSignatures {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keys: Vec<String> = self.missing_keys.iter().map(ToString::to_string).collect();
        write!(f, "missing signatures from {}", keys.join(", "))
    }
}

impl std::error::Error for MissingSignatures {}

/// A payload's semantic content failed a check against trusted facts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContentError {
    /// A field in the payload does not match the corresponding fact.
    #[error("invalid payload contents: {field} didn't match")]
    Mismatch {
        /// Name of the mismatched field (`"public key"`, `"user id"`).
        field: &'static str,
    },

    /// The grant expired before the trusted current time.
    #[error("grant expired at {expires_at}, current time is {now}")]
    Expired {
        /// Expiry recorded in the grant.
        expires_at: DateTime<Utc>,
        /// Trusted current time from the facts.
        now: DateTime<Utc>,
    },
}
