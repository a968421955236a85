//! Lifecycle stages and their verification.
//!
//! A [`Stage`] is a stateless checkpoint. It fixes how many envelopes a
//! bundle must have, which payload kind sits at each position, and whose
//! signatures each envelope needs. Moving through the lifecycle means
//! choosing a later stage to check a longer bundle against; nothing in a
//! stage ever changes.
//!
//! Verification scans positions left to right and stops at the first
//! failure. At each position it decodes the payload, checks signatures,
//! then validates content against [`Facts`].

use std::fmt;
use std::str::FromStr;

use custodia_schema::{
    AttestationError, Bundle, BundleInput, Envelope, Facts, PayloadKind, PublicKey,
};
use tracing::{debug, warn};

use crate::error::VerificationError;
use crate::parse::parse_bundle_unverified;

/// A party whose signature a stage can require.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    /// The user requesting access.
    User,
    /// The authority that authenticates users and decides requests.
    IdentityAuthority,
}

impl Actor {
    /// This actor's key, as recorded in `facts`.
    #[must_use]
    pub const fn key(self, facts: &Facts) -> &PublicKey {
        match self {
            Self::User => &facts.user.public_key,
            Self::IdentityAuthority => &facts.identity_authority.public_key,
        }
    }
}

/// What a stage expects at one bundle position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    /// Required payload kind.
    pub kind: PayloadKind,
    /// Actors who must each have signed the envelope.
    pub signers: &'static [Actor],
}

const USER: &[Actor] = &[Actor::User];
const AUTHORITY: &[Actor] = &[Actor::IdentityAuthority];
const BOTH: &[Actor] = &[Actor::User, Actor::IdentityAuthority];

const fn slot(kind: PayloadKind, signers: &'static [Actor]) -> Slot {
    Slot { kind, signers }
}

const INIT: &[Slot] = &[slot(PayloadKind::Init, USER)];

const AUTHENTICATION: &[Slot] = &[
    slot(PayloadKind::Init, BOTH),
    slot(PayloadKind::Authenticated, AUTHORITY),
];

const ACCESS_REQUEST: &[Slot] = &[
    slot(PayloadKind::Init, BOTH),
    slot(PayloadKind::Authenticated, BOTH),
    slot(PayloadKind::AccessRequest, USER),
];

const AUTO_APPROVE_DECISION: &[Slot] = &[
    slot(PayloadKind::Init, BOTH),
    slot(PayloadKind::Authenticated, BOTH),
    slot(PayloadKind::AccessRequest, BOTH),
    slot(PayloadKind::Decision, AUTHORITY),
    slot(PayloadKind::GrantCreated, AUTHORITY),
];

/// A verification checkpoint in the access lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// The user has claimed a key.
    Init,
    /// The authority has authenticated the user.
    Authentication,
    /// The user has requested access.
    AccessRequest,
    /// The authority auto-approved the request and issued a grant.
    AutoApproveDecision,
}

impl Stage {
    /// All stages, in lifecycle order.
    pub const ALL: [Self; 4] = [
        Self::Init,
        Self::Authentication,
        Self::AccessRequest,
        Self::AutoApproveDecision,
    ];

    /// Per-position expectations.
    #[must_use]
    pub const fn layout(self) -> &'static [Slot] {
        match self {
            Self::Init => INIT,
            Self::Authentication => AUTHENTICATION,
            Self::AccessRequest => ACCESS_REQUEST,
            Self::AutoApproveDecision => AUTO_APPROVE_DECISION,
        }
    }

    /// Exact number of envelopes a bundle must have at this stage.
    #[must_use]
    pub const fn required_len(self) -> usize {
        self.layout().len()
    }

    /// Payload kinds by position.
    #[must_use]
    pub fn expected_kinds(self) -> Vec<PayloadKind> {
        self.layout().iter().map(|s| s.kind).collect()
    }

    /// Kebab-case name, as accepted by [`FromStr`].
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Authentication => "authentication",
            Self::AccessRequest => "access-request",
            Self::AutoApproveDecision => "auto-approve-decision",
        }
    }

    /// Verify `bundle` against this stage.
    ///
    /// # Errors
    ///
    /// - [`VerificationError::WrongEnvelopeCount`] if the length is not [`required_len`](Self::required_len)
    /// - [`VerificationError::Envelope`] for the first position whose kind,
    ///   signatures or content fail
    pub fn verify(self, facts: &Facts, bundle: &Bundle) -> Result<(), VerificationError> {
        let result = self.verify_inner(facts, bundle);
        match &result {
            Ok(()) => debug!(stage = %self, "bundle verified"),
            Err(e) => warn!(stage = %self, error = %e, "bundle failed verification"),
        }
        result
    }

    fn verify_inner(self, facts: &Facts, bundle: &Bundle) -> Result<(), VerificationError> {
        let layout = self.layout();
        if bundle.len() != layout.len() {
            return Err(VerificationError::WrongEnvelopeCount {
                expected: layout.len(),
                actual: bundle.len(),
            });
        }

        for (position, (slot, env)) in layout.iter().zip(bundle).enumerate() {
            verify_slot(slot, env, facts).map_err(|source| VerificationError::Envelope {
                position,
                kind: slot.kind,
                source,
            })?;
            debug!(stage = %self, position, kind = %slot.kind, "envelope verified");
        }
        Ok(())
    }

    /// Shape-only parse of an untrusted bundle for this stage.
    ///
    /// # Errors
    ///
    /// See [`parse_bundle_unverified`].
    pub fn parse_unverified(self, input: BundleInput) -> Result<Bundle, VerificationError> {
        parse_bundle_unverified(input, &self.expected_kinds())
    }
}

fn verify_slot(slot: &Slot, env: &Envelope, facts: &Facts) -> Result<(), AttestationError> {
    let payload = env.decode(slot.kind)?;
    let required: Vec<PublicKey> = slot
        .signers
        .iter()
        .map(|actor| actor.key(facts).clone())
        .collect();
    env.verify_signatures(&required)?;
    payload.validate_contents(facts)?;
    Ok(())
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A stage name that matches no [`Stage`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown stage `{0}` (expected init, authentication, access-request or auto-approve-decision)")]
pub struct UnknownStage(pub String);

impl FromStr for Stage {
    type Err = UnknownStage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|stage| stage.name() == s)
            .ok_or_else(|| UnknownStage(s.to_owned()))
    }
}
