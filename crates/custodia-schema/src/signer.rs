//! Signing capability for envelopes.
//!
//! A [`Signer`] may be backed by an in-process key or by a remote key
//! service, so signing is async and always runs under a [`SignContext`]
//! that bounds it with a timeout and a cancellation token.
//!
//! Uses `aws-lc-rs` for the local ECDSA P-256 implementation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use aws_lc_rs::rand::SystemRandom;
use aws_lc_rs::signature::{ECDSA_P256_SHA256_FIXED_SIGNING, EcdsaKeyPair, KeyPair};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::AttestationError;
use crate::key::{PublicKey, der_to_pem, pem_to_der};
use crate::signature::{EXPECTED_CURVE_BITS, Signature, curve_bits};

/// A capability that signs payload bytes.
///
/// Implementors return a fixed-layout [`Signature`] over the SHA-256
/// digest of `payload`.
#[expect(async_fn_in_trait, reason = "internal trait — all impls are Send")]
pub trait Signer: Send + Sync {
    /// Sign a byte payload.
    async fn sign(&self, payload: &[u8]) -> Result<Signature, AttestationError>;

    /// A human-readable description of this signing backend.
    fn description(&self) -> &'static str;
}

impl<S: Signer + ?Sized> Signer for &S {
    async fn sign(&self, payload: &[u8]) -> Result<Signature, AttestationError> {
        (**self).sign(payload).await
    }

    fn description(&self) -> &'static str {
        (**self).description()
    }
}

/// Scope for a signing call: a deadline plus a cancellation token.
#[derive(Debug, Clone)]
pub struct SignContext {
    timeout: Duration,
    cancel: CancellationToken,
}

impl SignContext {
    /// Timeout used by [`SignContext::default`].
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// A context with the given timeout and a fresh cancellation token.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            cancel: CancellationToken::new(),
        }
    }

    /// Use `cancel` instead of the context's own token.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// The signing deadline.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The token that aborts in-flight signing.
    #[must_use]
    pub const fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run `signer` over `payload` within this context.
    ///
    /// # Errors
    ///
    /// [`AttestationError::SigningCancelled`] if the token fires first,
    /// [`AttestationError::SigningTimedOut`] if the deadline passes first,
    /// otherwise whatever the signer returns.
    pub async fn sign<S: Signer + ?Sized>(
        &self,
        signer: &S,
        payload: &[u8],
    ) -> Result<Signature, AttestationError> {
        debug!(
            backend = signer.description(),
            timeout_ms = self.timeout.as_millis(),
            "signing payload"
        );
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(AttestationError::SigningCancelled),
            outcome = tokio::time::timeout(self.timeout, signer.sign(payload)) => {
                outcome.unwrap_or(Err(AttestationError::SigningTimedOut(self.timeout)))
            }
        }
    }
}

impl Default for SignContext {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TIMEOUT)
    }
}

/// Local ECDSA signer backed by `aws-lc-rs`.
///
/// Keys are stored as PKCS#8 DER wrapped in PEM. The key file is created
/// with mode `0o600` (owner-only read/write).
pub struct LocalSigner {
    key_pair: EcdsaKeyPair,
    rng: SystemRandom,
}

impl LocalSigner {
    /// Generate an ephemeral P-256 key.
    ///
    /// # Errors
    ///
    /// Returns [`AttestationError::KeyError`] if key generation fails.
    pub fn generate() -> Result<Self, AttestationError> {
        let rng = SystemRandom::new();
        let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, &rng)
            .map_err(|e| AttestationError::KeyError(format!("failed to generate key: {e}")))?;
        Self::from_pkcs8(pkcs8.as_ref())
    }

    /// Parse a P-256 PKCS#8 DER private key.
    ///
    /// # Errors
    ///
    /// Returns [`AttestationError::KeyError`] if the DER is not a P-256
    /// PKCS#8 key.
    pub fn from_pkcs8(der: &[u8]) -> Result<Self, AttestationError> {
        let key_pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, der)
            .map_err(|e| AttestationError::KeyError(format!("failed to parse PKCS#8 key: {e}")))?;
        Ok(Self::from_key_pair(key_pair))
    }

    /// Wrap an existing key pair.
    ///
    /// The curve is checked when signing, not here: a key pair on any
    /// curve other than P-256 makes every [`Signer::sign`] call fail with
    /// [`AttestationError::InvalidKeyConfig`].
    #[must_use]
    pub fn from_key_pair(key_pair: EcdsaKeyPair) -> Self {
        Self {
            key_pair,
            rng: SystemRandom::new(),
        }
    }

    /// Load an existing key from `key_path`, or generate a new one if
    /// the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`AttestationError::KeyError`] if:
    /// - The key file exists but cannot be parsed as PKCS#8
    /// - The key file cannot be created or written
    pub fn load_or_generate(key_path: &Path) -> Result<Self, AttestationError> {
        if key_path.exists() {
            let signer = Self::load(key_path)?;
            tracing::info!(path = %key_path.display(), "loaded existing signing key");
            return Ok(signer);
        }

        let rng = SystemRandom::new();
        let pkcs8_doc = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, &rng)
            .map_err(|e| AttestationError::KeyError(format!("failed to generate key: {e}")))?;

        if let Some(parent) = key_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AttestationError::KeyError(format!(
                    "failed to create key directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let pem = der_to_pem(pkcs8_doc.as_ref(), "PRIVATE KEY");
        std::fs::write(key_path, pem.as_bytes())
            .map_err(|e| AttestationError::KeyError(format!("failed to write key file: {e}")))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(key_path, perms).map_err(|e| {
                AttestationError::KeyError(format!("failed to set key file permissions: {e}"))
            })?;
        }

        let signer = Self::from_pkcs8(pkcs8_doc.as_ref())?;
        tracing::info!(path = %key_path.display(), "generated new signing key");
        Ok(signer)
    }

    /// Load a PEM-wrapped PKCS#8 key from `key_path`.
    ///
    /// # Errors
    ///
    /// Returns [`AttestationError::KeyError`] if the file is unreadable or
    /// not a P-256 PKCS#8 key.
    pub fn load(key_path: &Path) -> Result<Self, AttestationError> {
        let pem = std::fs::read_to_string(key_path)
            .map_err(|e| AttestationError::KeyError(format!("failed to read key file: {e}")))?;
        let der = pem_to_der(&pem)
            .ok_or_else(|| AttestationError::KeyError("invalid PEM format".to_owned()))?;
        Self::from_pkcs8(&der)
    }

    /// The public half of this key.
    ///
    /// # Errors
    ///
    /// Returns [`AttestationError::KeyError`] if the key is not on P-256.
    pub fn public_key(&self) -> Result<PublicKey, AttestationError> {
        PublicKey::from_point(self.key_pair.public_key().as_ref())
    }

    /// Sign `payload` synchronously.
    ///
    /// # Errors
    ///
    /// Returns [`AttestationError::InvalidKeyConfig`] if the key is not on
    /// a 256-bit curve, or [`AttestationError::SigningFailed`] if the
    /// underlying ECDSA operation fails.
    pub fn sign_payload(&self, payload: &[u8]) -> Result<Signature, AttestationError> {
        let bits = curve_bits(self.key_pair.public_key().as_ref().len());
        if bits != EXPECTED_CURVE_BITS {
            return Err(AttestationError::InvalidKeyConfig(format!(
                "signing key is on a {bits}-bit curve, expected {EXPECTED_CURVE_BITS}"
            )));
        }

        let sig = self
            .key_pair
            .sign(&self.rng, payload)
            .map_err(|e| AttestationError::SigningFailed(format!("ECDSA sign failed: {e}")))?;

        Signature::from_fixed(sig.as_ref())
    }
}

impl Signer for LocalSigner {
    async fn sign(&self, payload: &[u8]) -> Result<Signature, AttestationError> {
        self.sign_payload(payload)
    }

    fn description(&self) -> &'static str {
        "local ECDSA P-256 (aws-lc)"
    }
}

/// Default key path: `~/.config/custodia/keys/<name>.pem`.
#[must_use]
pub fn default_key_path(name: &str) -> PathBuf {
    let file = format!("{name}.pem");
    directories::ProjectDirs::from("dev", "custodia", "custodia").map_or_else(
        || {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_owned());
            PathBuf::from(home).join(".config/custodia/keys").join(&file)
        },
        |dirs| dirs.config_dir().join("keys").join(&file),
    )
}
