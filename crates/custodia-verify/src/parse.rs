//! Shape-only parsing of untrusted bundles.
//!
//! Checks envelope count and payload kinds per position. Signatures and
//! content are NOT checked: this is a gate in front of
//! [`Stage::verify`](crate::Stage::verify), never a replacement for it.

use custodia_schema::{Bundle, BundleInput, PayloadKind};
use tracing::debug;

use crate::error::VerificationError;

/// Accept `input` if it has exactly one envelope per entry in
/// `expected_kinds` and each decodes as the kind at its position.
///
/// # Errors
///
/// - [`VerificationError::WrongEnvelopeCount`] on a length mismatch
/// - [`VerificationError::Envelope`] for the first envelope that does not
///   decode as its expected kind
pub fn parse_bundle_unverified(
    input: BundleInput,
    expected_kinds: &[PayloadKind],
) -> Result<Bundle, VerificationError> {
    let bundle = input.check_shape(expected_kinds)?;
    debug!(envelopes = bundle.len(), "bundle shape accepted");
    Ok(bundle)
}
