use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::bundle::Bundle;
use crate::envelope::Envelope;
use crate::error::AttestationError;
use crate::payload::{Decision, Grant, Payload, PayloadKind};
use crate::signer::{SignContext, Signer};

/// Envelopes a decision is built from: Init, Authenticated, AccessRequest.
const DECISION_INPUT_LEN: usize = 3;
const ACCESS_REQUEST_POSITION: usize = 2;

/// What [`ServerActor::decide`] does with envelopes past the AccessRequest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TrailingEnvelopes {
    /// Fail with [`AttestationError::UnexpectedTrailingEnvelopes`].
    #[default]
    Reject,
    /// Discard them and log a warning.
    Drop,
}

/// Inputs to [`ServerActor::authenticate`].
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticateOpts {
    /// When the authority authenticated the user.
    pub time: DateTime<Utc>,
    /// The user's ID as known to the authority.
    pub user_id: String,
    /// Extra identity claims.
    pub claims: BTreeMap<String, serde_json::Value>,
}

/// Actions taken by the identity authority.
pub struct ServerActor<S> {
    signer: S,
    ctx: SignContext,
    trailing: TrailingEnvelopes,
}

impl<S: Signer> ServerActor<S> {
    /// A server signing with `signer` under the default [`SignContext`].
    pub fn new(signer: S) -> Self {
        Self {
            signer,
            ctx: SignContext::default(),
            trailing: TrailingEnvelopes::default(),
        }
    }

    /// Use `ctx` for every signing call.
    #[must_use]
    pub fn with_context(mut self, ctx: SignContext) -> Self {
        self.ctx = ctx;
        self
    }

    /// Set how [`decide`](Self::decide) treats envelopes after the third.
    #[must_use]
    pub const fn with_trailing_envelopes(mut self, policy: TrailingEnvelopes) -> Self {
        self.trailing = policy;
        self
    }

    /// Counter-sign the user's Init envelope and append a signed
    /// Authenticated envelope.
    ///
    /// # Errors
    ///
    /// - [`AttestationError::UnexpectedPayloadKind`] if `init` is not an Init envelope
    /// - serialization and signing errors
    pub async fn authenticate(
        &self,
        init: &Envelope,
        opts: AuthenticateOpts,
    ) -> Result<Bundle, AttestationError> {
        init.decode(PayloadKind::Init)?;

        let mut init = init.clone();
        init.sign(&self.ctx, &self.signer).await?;

        let user_id = opts.user_id.clone();
        let mut auth = Envelope::from_payload(&Payload::authenticated(
            opts.time,
            opts.user_id,
            opts.claims,
        ))?;
        auth.sign(&self.ctx, &self.signer).await?;

        info!(user_id = %user_id, "user authenticated");
        Ok(Bundle::from_envelopes(vec![init, auth]))
    }

    /// Counter-sign the AccessRequest and append a signed Decision.
    ///
    /// Only the first three envelopes are carried forward. Anything after
    /// them is handled per [`TrailingEnvelopes`].
    ///
    /// # Errors
    ///
    /// - [`AttestationError::BundleTooShort`] with fewer than three envelopes
    /// - [`AttestationError::UnexpectedTrailingEnvelopes`] with more, under [`TrailingEnvelopes::Reject`]
    /// - [`AttestationError::UnexpectedPayloadKind`] if the third envelope is not an AccessRequest
    /// - serialization and signing errors
    pub async fn decide(
        &self,
        bundle: &Bundle,
        decision: Decision,
    ) -> Result<Bundle, AttestationError> {
        if bundle.len() < DECISION_INPUT_LEN {
            return Err(AttestationError::BundleTooShort {
                required: DECISION_INPUT_LEN,
                actual: bundle.len(),
            });
        }
        if bundle.len() > DECISION_INPUT_LEN {
            match self.trailing {
                TrailingEnvelopes::Reject => {
                    return Err(AttestationError::UnexpectedTrailingEnvelopes {
                        expected: DECISION_INPUT_LEN,
                        actual: bundle.len(),
                    });
                }
                TrailingEnvelopes::Drop => {
                    warn!(
                        dropped = bundle.len() - DECISION_INPUT_LEN,
                        "discarding envelopes after access request"
                    );
                }
            }
        }

        let mut envelopes = bundle.envelopes()[..DECISION_INPUT_LEN].to_vec();
        envelopes[ACCESS_REQUEST_POSITION].decode(PayloadKind::AccessRequest)?;
        envelopes[ACCESS_REQUEST_POSITION]
            .sign(&self.ctx, &self.signer)
            .await?;

        let mut env = Envelope::from_payload(&Payload::decision(decision))?;
        env.sign(&self.ctx, &self.signer).await?;
        envelopes.push(env);

        info!(
            auto_allow = decision.auto_allow,
            require_approval = decision.require_approval,
            "decision recorded"
        );
        Ok(Bundle::from_envelopes(envelopes))
    }

    /// Append a signed GrantCreated.
    ///
    /// # Errors
    ///
    /// Propagates serialization and signing errors.
    pub async fn create_grant(
        &self,
        bundle: &Bundle,
        grant: Grant,
    ) -> Result<Bundle, AttestationError> {
        let role_arn = grant.role_arn.clone();
        let mut env = Envelope::from_payload(&Payload::grant_created(grant))?;
        env.sign(&self.ctx, &self.signer).await?;
        info!(role = %role_arn, "grant created");
        Ok(bundle.with_appended(env))
    }
}
