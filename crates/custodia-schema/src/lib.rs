//! Signed attestation bundles for access requests.
//!
//! `custodia-schema` defines the payloads exchanged between a user and an
//! identity authority, wraps each in a signed [`Envelope`](envelope::Envelope),
//! and chains envelopes into a [`Bundle`](bundle::Bundle) recording one
//! access lifecycle: init, authentication, request, decision, grant.
//!
//! Verification against a lifecycle stage lives in `custodia-verify`.

pub mod actions;
mod base64_serde;
pub mod bundle;
pub mod envelope;
pub mod error;
pub mod facts;
pub mod key;
pub mod payload;
pub mod signature;
pub mod signer;

pub use bundle::{Bundle, BundleInput};
pub use envelope::Envelope;
pub use error::{AttestationError, ContentError, MissingSignatures, ShapeError};
pub use facts::Facts;
pub use key::PublicKey;
pub use payload::{Payload, PayloadKind};
pub use signer::{LocalSigner, SignContext, Signer};
