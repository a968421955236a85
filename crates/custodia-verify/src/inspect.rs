//! Human-readable bundle display.
//!
//! Reads each envelope's kind token without any expectation, so it works
//! on bundles that would fail verification. Diagnostics only.

use std::fmt::Write;

use custodia_schema::{Bundle, Envelope};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Shown when an envelope's payload has no readable `type`.
pub const UNREADABLE_KIND: &str = "<unreadable>";

/// Extracted summary of one envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeSummary {
    /// Zero-based position in the bundle.
    pub position: usize,
    /// The payload's `type` token, or [`UNREADABLE_KIND`].
    pub kind: String,
    /// Number of attached signatures, valid or not.
    pub signature_count: usize,
    /// SHA-256 of the payload bytes, hex.
    pub payload_sha256: String,
}

/// Compute the SHA-256 hex digest of a byte slice.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn kind_token(env: &Envelope) -> String {
    serde_json::from_slice::<serde_json::Value>(env.payload())
        .ok()
        .and_then(|v| v.get("type")?.as_str().map(str::to_owned))
        .unwrap_or_else(|| UNREADABLE_KIND.to_owned())
}

/// Summarize every envelope in `bundle`.
#[must_use]
pub fn summarize(bundle: &Bundle) -> Vec<EnvelopeSummary> {
    bundle
        .iter()
        .enumerate()
        .map(|(position, env)| EnvelopeSummary {
            position,
            kind: kind_token(env),
            signature_count: env.signatures().len(),
            payload_sha256: sha256_hex(env.payload()),
        })
        .collect()
}

/// Format summaries as a terminal table.
#[must_use]
pub fn format_summary(summaries: &[EnvelopeSummary]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Bundle Summary ({} envelopes)", summaries.len());
    let _ = writeln!(out, "----------------------------");
    for s in summaries {
        let _ = writeln!(
            out,
            "[{}] {:<36} sigs: {}  sha256: {}",
            s.position, s.kind, s.signature_count, s.payload_sha256
        );
    }
    out
}
