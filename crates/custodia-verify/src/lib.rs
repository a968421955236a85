//! Stage verification for custodia attestation bundles.
//!
//! `custodia-verify` checks a [`Bundle`](custodia_schema::Bundle) against
//! a lifecycle [`Stage`]:
//! 1. **Shape**: exact envelope count for the stage
//! 2. **Per position**: payload kind, required signers, then content
//!    against trusted [`Facts`](custodia_schema::Facts)
//!
//! The scan stops at the first failing position. A shape-only parse for
//! untrusted input and a diagnostic summary are also provided.

pub mod error;
pub mod inspect;
pub mod parse;
pub mod stage;

pub use error::VerificationError;
pub use parse::parse_bundle_unverified;
pub use stage::{Actor, Slot, Stage, UnknownStage};
