//! P-256 public keys and their SPKI / PEM encodings.
//!
//! Keys are held as the 65-byte uncompressed SEC1 point that `aws-lc-rs`
//! consumes directly. The SubjectPublicKeyInfo DER form is what gets
//! embedded in Init payloads and written to disk.

use std::fmt;
use std::path::Path;

use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::AttestationError;

/// Length of an uncompressed P-256 point (`0x04 || X || Y`).
pub const P256_POINT_LEN: usize = 65;

/// Fixed SPKI header for a P-256 uncompressed public key.
///
/// ```text
/// SEQUENCE {
///   SEQUENCE {
///     OID 1.2.840.10045.2.1  (id-ecPublicKey)
///     OID 1.2.840.10045.3.1.7 (prime256v1)
///   }
///   BIT STRING <public key>
/// }
/// ```
#[rustfmt::skip]
const P256_SPKI_HEADER: [u8; 26] = [
    0x30, 0x59,                                     // SEQUENCE (89 bytes total)
    0x30, 0x13,                                     // SEQUENCE (19 bytes)
    0x06, 0x07,                                     // OID (7 bytes)
    0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01,       // 1.2.840.10045.2.1
    0x06, 0x08,                                     // OID (8 bytes)
    0x2a, 0x86, 0x48, 0xce, 0x3d, 0x03, 0x01, 0x07, // 1.2.840.10045.3.1.7
    0x03, 0x42, 0x00,                               // BIT STRING (66 bytes, 0 unused bits)
];

/// An ECDSA P-256 public key.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PublicKey {
    point: Vec<u8>,
}

impl PublicKey {
    /// Wrap a raw uncompressed P-256 point.
    ///
    /// # Errors
    ///
    /// Returns [`AttestationError::KeyError`] if the bytes are not a
    /// 65-byte uncompressed point.
    pub fn from_point(point: &[u8]) -> Result<Self, AttestationError> {
        if point.len() != P256_POINT_LEN || point[0] != 0x04 {
            return Err(AttestationError::KeyError(format!(
                "expected a {P256_POINT_LEN}-byte uncompressed P-256 point, got {} bytes",
                point.len()
            )));
        }
        Ok(Self {
            point: point.to_vec(),
        })
    }

    /// Parse a DER-encoded SubjectPublicKeyInfo.
    ///
    /// # Errors
    ///
    /// Returns [`AttestationError::KeyError`] if the DER is not a P-256
    /// uncompressed SPKI.
    pub fn from_spki_der(der: &[u8]) -> Result<Self, AttestationError> {
        let Some(point) = der.strip_prefix(&P256_SPKI_HEADER) else {
            return Err(AttestationError::KeyError(
                "public key DER is not a P-256 SubjectPublicKeyInfo".to_owned(),
            ));
        };
        Self::from_point(point)
    }

    /// Parse a PEM `PUBLIC KEY` block.
    ///
    /// # Errors
    ///
    /// Returns [`AttestationError::KeyError`] on bad PEM or a non-P-256 key.
    pub fn from_pem(pem: &str) -> Result<Self, AttestationError> {
        let der = pem_to_der(pem)
            .ok_or_else(|| AttestationError::KeyError("invalid PEM public key".to_owned()))?;
        Self::from_spki_der(&der)
    }

    /// Read a PEM `PUBLIC KEY` file, as written by `custodia keygen --pem`.
    ///
    /// # Errors
    ///
    /// Returns [`AttestationError::IoError`] if the file cannot be read, or
    /// [`AttestationError::KeyError`] if it holds no P-256 public key.
    pub fn from_pem_file(path: &Path) -> Result<Self, AttestationError> {
        let pem = std::fs::read_to_string(path)?;
        Self::from_pem(&pem)
    }

    /// The raw uncompressed point.
    #[must_use]
    pub fn as_point(&self) -> &[u8] {
        &self.point
    }

    /// Encode as SubjectPublicKeyInfo DER.
    #[must_use]
    pub fn to_spki_der(&self) -> Vec<u8> {
        let mut spki = Vec::with_capacity(P256_SPKI_HEADER.len() + self.point.len());
        spki.extend_from_slice(&P256_SPKI_HEADER);
        spki.extend_from_slice(&self.point);
        spki
    }

    /// Encode as a PEM `PUBLIC KEY` block.
    #[must_use]
    pub fn to_pem(&self) -> String {
        der_to_pem(&self.to_spki_der(), "PUBLIC KEY")
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&base64::engine::general_purpose::STANDARD.encode(self.to_spki_der()))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PublicKey").field(&self.to_string()).finish()
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        let der = base64::engine::general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)?;
        Self::from_spki_der(&der).map_err(serde::de::Error::custom)
    }
}

// ── PEM helpers ──────────────────────────────────────────────────────

/// Wrap DER bytes in PEM with the given label.
#[must_use]
pub fn der_to_pem(der: &[u8], label: &str) -> String {
    use std::fmt::Write;

    let b64 = base64::engine::general_purpose::STANDARD.encode(der);
    let mut pem = format!("-----BEGIN {label}-----\n");
    // base64 output is ASCII, so splitting on byte boundaries is safe.
    for chunk in b64.as_bytes().chunks(64) {
        pem.push_str(&String::from_utf8_lossy(chunk));
        pem.push('\n');
    }
    let _ = writeln!(pem, "-----END {label}-----");
    pem
}

/// Extract DER bytes from a PEM string.
#[must_use]
pub fn pem_to_der(pem: &str) -> Option<Vec<u8>> {
    let mut b64 = String::new();
    let mut in_body = false;

    for line in pem.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("-----BEGIN ") {
            in_body = true;
            continue;
        }
        if trimmed.starts_with("-----END ") {
            break;
        }
        if in_body {
            b64.push_str(trimmed);
        }
    }

    if !in_body {
        return None;
    }
    base64::engine::general_purpose::STANDARD.decode(&b64).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_point() -> Vec<u8> {
        let mut point = vec![0x04];
        point.extend(1..=64u8);
        point
    }

    #[test]
    fn spki_round_trip() {
        let key = PublicKey::from_point(&sample_point()).unwrap();
        let der = key.to_spki_der();
        assert_eq!(der.len(), 91);
        assert_eq!(PublicKey::from_spki_der(&der).unwrap(), key);
    }

    #[test]
    fn pem_round_trip() {
        let key = PublicKey::from_point(&sample_point()).unwrap();
        let pem = key.to_pem();
        assert!(pem.starts_with("-----BEGIN PUBLIC KEY-----\n"));
        assert_eq!(PublicKey::from_pem(&pem).unwrap(), key);
    }

    #[test]
    fn pem_file_is_read() {
        let key = PublicKey::from_point(&sample_point()).unwrap();
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), key.to_pem()).unwrap();
        assert_eq!(PublicKey::from_pem_file(tmp.path()).unwrap(), key);
    }

    #[test]
    fn private_key_pem_is_not_a_public_key() {
        let pem = der_to_pem(&[0x30, 0x03, 0x02, 0x01, 0x00], "PRIVATE KEY");
        assert!(matches!(
            PublicKey::from_pem(&pem),
            Err(AttestationError::KeyError(_))
        ));
    }

    #[test]
    fn missing_pem_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            PublicKey::from_pem_file(&dir.path().join("absent.pem")),
            Err(AttestationError::IoError(_))
        ));
    }

    #[test]
    fn rejects_compressed_point() {
        let mut point = sample_point();
        point[0] = 0x02;
        assert!(PublicKey::from_point(&point).is_err());
    }

    #[test]
    fn rejects_foreign_spki() {
        let mut der = PublicKey::from_point(&sample_point()).unwrap().to_spki_der();
        // Flip the curve OID's last byte.
        der[22] ^= 0xFF;
        assert!(PublicKey::from_spki_der(&der).is_err());
    }

    #[test]
    fn pem_without_armor_is_rejected() {
        assert!(pem_to_der("not a pem").is_none());
    }

    #[test]
    fn serde_uses_base64_spki() {
        let key = PublicKey::from_point(&sample_point()).unwrap();
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, format!("\"{key}\""));
        let back: PublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }
}
