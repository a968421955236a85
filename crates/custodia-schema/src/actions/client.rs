use crate::bundle::Bundle;
use crate::envelope::Envelope;
use crate::error::AttestationError;
use crate::key::PublicKey;
use crate::payload::{AccessRequest, Payload, PayloadKind};
use crate::signer::{SignContext, Signer};

/// Position of the Authenticated envelope in every lifecycle bundle.
const AUTHENTICATED_POSITION: usize = 1;

/// Actions taken by the user requesting access.
pub struct ClientActor<S> {
    signer: S,
    ctx: SignContext,
}

impl<S: Signer> ClientActor<S> {
    /// A client signing with `signer` under the default [`SignContext`].
    pub fn new(signer: S) -> Self {
        Self {
            signer,
            ctx: SignContext::default(),
        }
    }

    /// Use `ctx` for every signing call.
    #[must_use]
    pub fn with_context(mut self, ctx: SignContext) -> Self {
        self.ctx = ctx;
        self
    }

    /// Start a lifecycle: a one-envelope bundle claiming `user_public_key`.
    ///
    /// # Errors
    ///
    /// Propagates serialization and signing errors.
    pub async fn init(&self, user_public_key: &PublicKey) -> Result<Bundle, AttestationError> {
        let mut env = Envelope::from_payload(&Payload::init(user_public_key.to_spki_der()))?;
        env.sign(&self.ctx, &self.signer).await?;
        Ok(Bundle::from_envelopes(vec![env]))
    }

    /// Add this user's signature to the Authenticated envelope.
    ///
    /// All other envelopes are carried over unchanged.
    ///
    /// # Errors
    ///
    /// - [`AttestationError::BundleTooShort`] if there is no second envelope
    /// - [`AttestationError::UnexpectedPayloadKind`] if it is not Authenticated
    /// - signing errors
    pub async fn counter_sign(&self, bundle: &Bundle) -> Result<Bundle, AttestationError> {
        let auth = bundle
            .get(AUTHENTICATED_POSITION)
            .ok_or(AttestationError::BundleTooShort {
                required: AUTHENTICATED_POSITION + 1,
                actual: bundle.len(),
            })?;
        auth.decode(PayloadKind::Authenticated)?;

        let mut envelopes = bundle.envelopes().to_vec();
        envelopes[AUTHENTICATED_POSITION]
            .sign(&self.ctx, &self.signer)
            .await?;
        Ok(Bundle::from_envelopes(envelopes))
    }

    /// Append a signed AccessRequest.
    ///
    /// # Errors
    ///
    /// Propagates serialization and signing errors.
    pub async fn request_access(
        &self,
        bundle: &Bundle,
        request: AccessRequest,
    ) -> Result<Bundle, AttestationError> {
        let mut env = Envelope::from_payload(&Payload::access_request(request))?;
        env.sign(&self.ctx, &self.signer).await?;
        Ok(bundle.with_appended(env))
    }
}
