//! Role actions that grow a bundle one step at a time.
//!
//! Each action borrows its input and returns a new [`Bundle`](crate::bundle::Bundle).
//! A failed signature therefore never leaves a half-built bundle behind:
//! the caller still holds the untouched input.
//!
//! | Actor | Action | Output |
//! |---|---|---|
//! | client | [`ClientActor::init`] | `[Init]` |
//! | server | [`ServerActor::authenticate`] | `[Init*, Authenticated]` |
//! | client | [`ClientActor::counter_sign`] | `[Init, Authenticated*]` |
//! | client | [`ClientActor::request_access`] | `[.., AccessRequest]` |
//! | server | [`ServerActor::decide`] | `[Init, Authenticated, AccessRequest*, Decision]` |
//! | server | [`ServerActor::create_grant`] | `[.., GrantCreated]` |
//!
//! `*` marks an existing envelope that gains a signature.

mod client;
mod server;

pub use client::ClientActor;
pub use server::{AuthenticateOpts, ServerActor, TrailingEnvelopes};

#[cfg(test)]
pub(crate) mod testing {
    use crate::error::AttestationError;
    use crate::signature::Signature;
    use crate::signer::Signer;

    /// A signer whose backend is always down.
    pub(crate) struct UnavailableSigner;

    impl Signer for UnavailableSigner {
        async fn sign(&self, _payload: &[u8]) -> Result<Signature, AttestationError> {
            Err(AttestationError::SigningFailed("key service unavailable".to_owned()))
        }

        fn description(&self) -> &'static str {
            "unavailable"
        }
    }
}
