//! Fixed-layout ECDSA P-256 signatures.
//!
//! A signature is exactly 64 bytes: `R` big-endian in `[0, 32)` and `S`
//! big-endian in `[32, 64)`, each left-padded with zeros. It covers the
//! SHA-256 digest of the exact payload bytes it was produced over and
//! nothing else.

use aws_lc_rs::signature::{ECDSA_P256_SHA256_FIXED, UnparsedPublicKey};
use serde::{Deserialize, Serialize};

use crate::error::AttestationError;
use crate::key::PublicKey;

/// Width of one scalar (`R` or `S`) for a 256-bit curve.
pub const SCALAR_LEN: usize = 32;

/// Total signature length.
pub const SIGNATURE_LEN: usize = 2 * SCALAR_LEN;

/// The only curve size this protocol signs with.
pub const EXPECTED_CURVE_BITS: usize = 256;

/// An ECDSA signature as carried in an envelope.
///
/// Wire bytes are kept as received; a signature of the wrong length is
/// representable so that it can fail verification instead of failing to
/// parse.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(#[serde(with = "crate::base64_serde")] Vec<u8>);

impl Signature {
    /// Wrap a signer's fixed-width `R || S` output.
    ///
    /// # Errors
    ///
    /// Returns [`AttestationError::InvalidKeyConfig`] if the output is not
    /// [`SIGNATURE_LEN`] bytes, which means the key is not on a 256-bit curve.
    pub fn from_fixed(bytes: &[u8]) -> Result<Self, AttestationError> {
        if bytes.len() != SIGNATURE_LEN {
            return Err(AttestationError::InvalidKeyConfig(format!(
                "signature is {} bytes, expected {SIGNATURE_LEN}",
                bytes.len()
            )));
        }
        Ok(Self(bytes.to_vec()))
    }

    /// Wrap raw wire bytes without any length check.
    #[must_use]
    pub const fn from_wire(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// The raw signature bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Split into `(R, S)`, or `None` if the signature is malformed.
    #[must_use]
    pub fn scalars(&self) -> Option<(&[u8], &[u8])> {
        (self.0.len() == SIGNATURE_LEN).then(|| self.0.split_at(SCALAR_LEN))
    }
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Signature({} bytes)", self.0.len())
    }
}

/// Curve size in bits implied by an uncompressed public point.
#[must_use]
pub const fn curve_bits(uncompressed_point_len: usize) -> usize {
    uncompressed_point_len.saturating_sub(1) / 2 * 8
}

/// Check `signature` over `payload` against `key`.
///
/// Malformed signatures verify as `false`; this never panics.
#[must_use]
pub fn verify(payload: &[u8], signature: &Signature, key: &PublicKey) -> bool {
    if signature.scalars().is_none() {
        return false;
    }
    UnparsedPublicKey::new(&ECDSA_P256_SHA256_FIXED, key.as_point())
        .verify(payload, signature.as_bytes())
        .is_ok()
}
