//! Attestation bundles.
//!
//! A bundle is the ordered trail of envelopes for one access lifecycle.
//! Position is meaningful: which kind sits where is fixed by the
//! verification stage the bundle is checked against.

use serde::{Deserialize, Serialize};

use crate::envelope::Envelope;
use crate::error::{AttestationError, ShapeError};
use crate::payload::{Payload, PayloadKind};
use crate::signature::Signature;

/// An ordered sequence of envelopes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Bundle(Vec<Envelope>);

/// A bundle as received from an untrusted caller, before any checks.
///
/// The only way to a [`Bundle`] is [`check_shape`](Self::check_shape);
/// run full verification on the result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BundleInput(Vec<Envelope>);

/// Same as [`Envelope`] but with the payload left as text.
///
/// For human inspection only; never sign or verify this form.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugEnvelope<'a> {
    /// Signatures in the order they were added.
    pub signatures: &'a [Signature],
    /// The encoding tag.
    pub payload_type: &'a str,
    /// The payload JSON as a string.
    pub payload: String,
}

impl Bundle {
    /// An empty bundle.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// A bundle of `envelopes`, in order.
    #[must_use]
    pub const fn from_envelopes(envelopes: Vec<Envelope>) -> Self {
        Self(envelopes)
    }

    /// Number of envelopes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the bundle has no envelopes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The envelope at `position`.
    #[must_use]
    pub fn get(&self, position: usize) -> Option<&Envelope> {
        self.0.get(position)
    }

    /// All envelopes, in order.
    #[must_use]
    pub fn envelopes(&self) -> &[Envelope] {
        &self.0
    }

    /// Iterate envelopes in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Envelope> {
        self.0.iter()
    }

    /// A new bundle with `envelope` appended; `self` is unchanged.
    #[must_use]
    pub fn with_appended(&self, envelope: Envelope) -> Self {
        let mut envelopes = Vec::with_capacity(self.0.len() + 1);
        envelopes.extend_from_slice(&self.0);
        envelopes.push(envelope);
        Self(envelopes)
    }

    /// Parse a bundle from its JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns [`AttestationError::Json`] on malformed input.
    pub fn from_json(json: &str) -> Result<Self, AttestationError> {
        Ok(serde_json::from_str(json)?)
    }

    /// The JSON wire form, pretty-printed.
    ///
    /// # Errors
    ///
    /// Returns [`AttestationError::Json`] if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, AttestationError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn debug_envelopes(&self) -> Vec<DebugEnvelope<'_>> {
        self.0
            .iter()
            .map(|e| DebugEnvelope {
                signatures: e.signatures(),
                payload_type: e.payload_type(),
                payload: e.payload_text(),
            })
            .collect()
    }

    /// JSON rendering with readable payloads, for debugging.
    ///
    /// # Errors
    ///
    /// Returns [`AttestationError::Json`] if serialization fails.
    pub fn to_debug_json(&self) -> Result<String, AttestationError> {
        Ok(serde_json::to_string(&self.debug_envelopes())?)
    }

    /// Indented JSON rendering with readable payloads, for debugging.
    ///
    /// # Errors
    ///
    /// Returns [`AttestationError::Json`] if serialization fails.
    pub fn to_debug_json_pretty(&self) -> Result<String, AttestationError> {
        Ok(serde_json::to_string_pretty(&self.debug_envelopes())?)
    }

    /// The user ID from the first Authenticated envelope.
    ///
    /// Does not check signatures; only use on a verified bundle.
    ///
    /// # Errors
    ///
    /// Returns [`AttestationError::MissingEnvelope`] if no envelope decodes
    /// as Authenticated.
    pub fn load_user_id(&self) -> Result<String, AttestationError> {
        self.0
            .iter()
            .find_map(|e| match e.decode(PayloadKind::Authenticated) {
                Ok(Payload::Authenticated(auth)) => Some(auth.user_id),
                _ => None,
            })
            .ok_or(AttestationError::MissingEnvelope(PayloadKind::Authenticated))
    }
}

impl BundleInput {
    /// Wrap envelopes received from an untrusted caller.
    #[must_use]
    pub const fn new(envelopes: Vec<Envelope>) -> Self {
        Self(envelopes)
    }

    /// Number of envelopes received.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no envelopes were received.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Accept the input as a [`Bundle`] if it has exactly one envelope per
    /// entry in `expected_kinds` and each decodes as the kind at its
    /// position.
    ///
    /// Signatures and content are not checked.
    ///
    /// # Errors
    ///
    /// - [`ShapeError::WrongEnvelopeCount`] on a length mismatch
    /// - [`ShapeError::Envelope`] for the first envelope that does not decode
    ///   as its expected kind
    pub fn check_shape(self, expected_kinds: &[PayloadKind]) -> Result<Bundle, ShapeError> {
        if self.0.len() != expected_kinds.len() {
            return Err(ShapeError::WrongEnvelopeCount {
                expected: expected_kinds.len(),
                actual: self.0.len(),
            });
        }
        for (position, (env, &kind)) in self.0.iter().zip(expected_kinds).enumerate() {
            env.decode(kind).map_err(|source| ShapeError::Envelope {
                position,
                kind,
                source,
            })?;
        }
        Ok(Bundle(self.0))
    }
}

impl<'a> IntoIterator for &'a Bundle {
    type Item = &'a Envelope;
    type IntoIter = std::slice::Iter<'a, Envelope>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
