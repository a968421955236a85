//! Error types for stage verification.

use custodia_schema::{AttestationError, PayloadKind, ShapeError};

/// Errors from verifying a bundle against a lifecycle stage.
#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    /// The bundle does not have the number of envelopes the stage requires.
    #[error("wrong envelope count: expected {expected}, got {actual}")]
    WrongEnvelopeCount {
        /// Envelopes the stage requires.
        expected: usize,
        /// Envelopes in the bundle.
        actual: usize,
    },

    /// An envelope failed its kind, signature or content check.
    #[error("envelope {position} ({kind}): {source}")]
    Envelope {
        /// Zero-based position in the bundle.
        position: usize,
        /// The kind the stage expects at this position.
        kind: PayloadKind,
        /// What went wrong.
        #[source]
        source: AttestationError,
    },
}

impl From<ShapeError> for VerificationError {
    fn from(err: ShapeError) -> Self {
        match err {
            ShapeError::WrongEnvelopeCount { expected, actual } => {
                Self::WrongEnvelopeCount { expected, actual }
            }
            ShapeError::Envelope {
                position,
                kind,
                source,
            } => Self::Envelope {
                position,
                kind,
                source,
            },
        }
    }
}

impl VerificationError {
    /// The underlying schema error for a failed envelope, if any.
    #[must_use]
    pub const fn cause(&self) -> Option<&AttestationError> {
        match self {
            Self::Envelope { source, .. } => Some(source),
            Self::WrongEnvelopeCount { .. } => None,
        }
    }

    /// The failing envelope's position, if the failure was per-envelope.
    #[must_use]
    pub const fn position(&self) -> Option<usize> {
        match self {
            Self::Envelope { position, .. } => Some(*position),
            Self::WrongEnvelopeCount { .. } => None,
        }
    }
}
