//! Signed envelopes.
//!
//! An envelope holds one payload's canonical bytes and the signatures
//! collected over them. The payload bytes never change after
//! construction; signing only appends.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AttestationError, MissingSignatures};
use crate::key::PublicKey;
use crate::payload::{Payload, PayloadKind};
use crate::signature::{self, Signature};
use crate::signer::{SignContext, Signer};

/// Encoding tag for every envelope this crate produces.
///
/// Names the encoding of `payload`, not the payload's kind; the kind is
/// inside the payload bytes.
pub const PAYLOAD_TYPE: &str = "application/custodia+json";

/// A payload plus its accumulated signatures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    signatures: Vec<Signature>,
    payload_type: String,
    #[serde(with = "crate::base64_serde")]
    payload: Vec<u8>,
}

impl Envelope {
    /// Serialize `payload` into a new, unsigned envelope.
    ///
    /// # Errors
    ///
    /// Returns [`AttestationError::Json`] if the payload cannot be serialized.
    pub fn from_payload(payload: &Payload) -> Result<Self, AttestationError> {
        Ok(Self {
            signatures: Vec::new(),
            payload_type: PAYLOAD_TYPE.to_owned(),
            payload: payload.to_bytes()?,
        })
    }

    /// Reassemble an envelope from raw parts, e.g. one received over the wire.
    #[must_use]
    pub const fn from_parts(
        payload_type: String,
        payload: Vec<u8>,
        signatures: Vec<Signature>,
    ) -> Self {
        Self {
            signatures,
            payload_type,
            payload,
        }
    }

    /// The encoding tag.
    #[must_use]
    pub fn payload_type(&self) -> &str {
        &self.payload_type
    }

    /// The exact bytes every signature covers.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Signatures in the order they were added.
    #[must_use]
    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    /// Decode the payload, requiring it to be of kind `expected`.
    ///
    /// # Errors
    ///
    /// See [`Payload::from_bytes`].
    pub fn decode(&self, expected: PayloadKind) -> Result<Payload, AttestationError> {
        Payload::from_bytes(&self.payload, expected)
    }

    /// The payload as text, for diagnostics only.
    #[must_use]
    pub fn payload_text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }

    /// Append a signature from `signer` over the payload bytes.
    ///
    /// If signing fails, times out, or is cancelled, the envelope is left
    /// exactly as it was.
    ///
    /// # Errors
    ///
    /// Propagates the error from [`SignContext::sign`].
    pub async fn sign<S: Signer + ?Sized>(
        &mut self,
        ctx: &SignContext,
        signer: &S,
    ) -> Result<(), AttestationError> {
        let sig = ctx.sign(signer, &self.payload).await?;
        self.signatures.push(sig);
        debug!(
            signatures = self.signatures.len(),
            backend = signer.description(),
            "signature appended to envelope"
        );
        Ok(())
    }

    /// Check that every key in `required` has at least one valid signature.
    ///
    /// Extra signatures from keys outside `required` are ignored. Every
    /// missing key is reported, not just the first.
    ///
    /// # Errors
    ///
    /// Returns [`MissingSignatures`] listing each required key with no
    /// matching signature, in `required` order without duplicates.
    pub fn verify_signatures(&self, required: &[PublicKey]) -> Result<(), MissingSignatures> {
        let mut missing_keys: Vec<PublicKey> = Vec::new();

        for key in required {
            let signed = self
                .signatures
                .iter()
                .any(|sig| signature::verify(&self.payload, sig, key));
            if !signed && !missing_keys.contains(key) {
                missing_keys.push(key.clone());
            }
        }

        if missing_keys.is_empty() {
            Ok(())
        } else {
            Err(MissingSignatures { missing_keys })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{AccessRequest, Decision};
    use crate::signer::LocalSigner;

    fn decision_envelope() -> Envelope {
        Envelope::from_payload(&Payload::decision(Decision {
            auto_allow: true,
            require_approval: false,
        }))
        .unwrap()
    }

    #[test]
    fn from_payload_sets_tag_and_no_signatures() {
        let env = decision_envelope();
        assert_eq!(env.payload_type(), PAYLOAD_TYPE);
        assert!(env.signatures().is_empty());
        assert!(env.decode(PayloadKind::Decision).is_ok());
    }

    #[tokio::test]
    async fn verify_signatures_works() {
        let signer = LocalSigner::generate().unwrap();
        let mut env = decision_envelope();
        env.sign(&SignContext::default(), &signer).await.unwrap();

        env.verify_signatures(&[signer.public_key().unwrap()])
            .expect("signed key should verify");
    }

    #[test]
    fn unsigned_envelope_reports_missing_key() {
        let signer = LocalSigner::generate().unwrap();
        let key = signer.public_key().unwrap();

        let err = decision_envelope().verify_signatures(&[key.clone()]).unwrap_err();
        assert_eq!(err.missing_keys, vec![key]);
    }

    #[tokio::test]
    async fn all_missing_keys_are_reported_together() {
        let a = LocalSigner::generate().unwrap();
        let b = LocalSigner::generate().unwrap();
        let c = LocalSigner::generate().unwrap();
        let (ka, kb, kc) = (
            a.public_key().unwrap(),
            b.public_key().unwrap(),
            c.public_key().unwrap(),
        );

        let mut env = decision_envelope();
        env.sign(&SignContext::default(), &a).await.unwrap();

        let err = env.verify_signatures(&[ka, kb.clone(), kc.clone()]).unwrap_err();
        assert_eq!(err.missing_keys, vec![kb, kc]);
    }

    #[tokio::test]
    async fn unrelated_extra_signatures_do_not_cause_false_negatives() {
        let wanted = LocalSigner::generate().unwrap();
        let stranger = LocalSigner::generate().unwrap();
        let ctx = SignContext::default();

        let mut env = decision_envelope();
        env.sign(&ctx, &stranger).await.unwrap();
        env.sign(&ctx, &stranger).await.unwrap();
        env.sign(&ctx, &wanted).await.unwrap();

        assert!(env.verify_signatures(&[wanted.public_key().unwrap()]).is_ok());
    }

    #[tokio::test]
    async fn duplicate_signatures_count_once() {
        let user = LocalSigner::generate().unwrap();
        let authority = LocalSigner::generate().unwrap();
        let ctx = SignContext::default();

        let mut env = decision_envelope();
        env.sign(&ctx, &user).await.unwrap();
        let dup = env.signatures()[0].clone();
        let env = Envelope::from_parts(
            env.payload_type().to_owned(),
            env.payload().to_vec(),
            vec![dup.clone(), dup],
        );

        let err = env
            .verify_signatures(&[user.public_key().unwrap(), authority.public_key().unwrap()])
            .unwrap_err();
        assert_eq!(err.missing_keys, vec![authority.public_key().unwrap()]);
    }

    #[tokio::test]
    async fn signature_does_not_transfer_to_other_payload() {
        let signer = LocalSigner::generate().unwrap();
        let mut env = decision_envelope();
        env.sign(&SignContext::default(), &signer).await.unwrap();

        let other = Envelope::from_payload(&Payload::access_request(AccessRequest {
            role: "admin".to_owned(),
            reason: "x".to_owned(),
        }))
        .unwrap();
        let forged = Envelope::from_parts(
            other.payload_type().to_owned(),
            other.payload().to_vec(),
            env.signatures().to_vec(),
        );
        assert!(forged.verify_signatures(&[signer.public_key().unwrap()]).is_err());
    }

    #[tokio::test]
    async fn failed_sign_leaves_envelope_untouched() {
        let ctx = SignContext::default();
        ctx.cancellation_token().cancel();
        let signer = LocalSigner::generate().unwrap();

        let mut env = decision_envelope();
        let before = env.clone();
        assert!(env.sign(&ctx, &signer).await.is_err());
        assert_eq!(env, before);
    }

    #[test]
    fn wire_format_field_names() {
        let env = Envelope::from_parts(
            PAYLOAD_TYPE.to_owned(),
            b"{}".to_vec(),
            vec![Signature::from_wire(vec![1, 2])],
        );
        let value = serde_json::to_value(&env).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "signatures": ["AQI="],
                "payloadType": PAYLOAD_TYPE,
                "payload": "e30=",
            })
        );
        let back: Envelope = serde_json::from_value(value).unwrap();
        assert_eq!(back, env);
    }

    #[test]
    fn missing_signatures_message_lists_keys() {
        let key = LocalSigner::generate().unwrap().public_key().unwrap();
        let err = MissingSignatures {
            missing_keys: vec![key.clone()],
        };
        assert_eq!(err.to_string(), format!("missing signatures from {key}"));
    }
}
