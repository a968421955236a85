//! Integration tests for the custodia CLI.
//!
//! Each test creates keys and bundles in a temporary directory, invokes
//! the `custodia` binary via `assert_cmd`, and checks outputs and exit
//! codes.

#![allow(deprecated)] // cargo_bin deprecation — macro replacement not yet stable

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;

/// Convenience: get a `Command` for the `custodia` binary.
fn custodia() -> Command {
    Command::cargo_bin("custodia").expect("custodia binary not found")
}

fn path_str(path: &Path) -> &str {
    path.to_str().expect("utf-8 temp path")
}

/// Generate a key at `dir/<name>.pem` and return (key path, base64 public key).
fn keygen(dir: &Path, name: &str) -> (PathBuf, String) {
    let key = dir.join(format!("{name}.pem"));
    let output = custodia()
        .args(["keygen", "--key", path_str(&key)])
        .output()
        .expect("run keygen");
    assert!(output.status.success(), "keygen failed: {output:?}");
    let public = String::from_utf8(output.stdout).unwrap().trim().to_owned();
    (key, public)
}

/// Keys and file paths for one lifecycle.
struct Lifecycle {
    dir: tempfile::TempDir,
    user_key: PathBuf,
    authority_key: PathBuf,
    user_public: String,
    authority_public: String,
}

impl Lifecycle {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let (user_key, user_public) = keygen(dir.path(), "user");
        let (authority_key, authority_public) = keygen(dir.path(), "authority");
        Self {
            dir,
            user_key,
            authority_key,
            user_public,
            authority_public,
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn facts(&self, user_id: &str) -> PathBuf {
        let path = self.path(&format!("facts-{user_id}.json"));
        let facts = serde_json::json!({
            "user": { "id": user_id, "publicKey": self.user_public },
            "identityAuthority": { "publicKey": self.authority_public },
        });
        std::fs::write(&path, serde_json::to_string_pretty(&facts).unwrap()).unwrap();
        path
    }

    fn run(&self, args: &[&str]) {
        custodia().args(args).assert().success();
    }

    fn init(&self) -> PathBuf {
        let out = self.path("1-init.json");
        self.run(&[
            "init",
            "--key",
            path_str(&self.user_key),
            "-o",
            path_str(&out),
        ]);
        out
    }

    fn authenticate(&self, user_id: &str) -> PathBuf {
        let init = self.init();
        let out = self.path("2-auth.json");
        self.run(&[
            "authenticate",
            path_str(&init),
            "--user-id",
            user_id,
            "--claim",
            "email=alice@example.com",
            "--key",
            path_str(&self.authority_key),
            "-o",
            path_str(&out),
        ]);
        out
    }

    fn request_access(&self) -> PathBuf {
        let auth = self.authenticate("alice");
        let signed = self.path("3-countersigned.json");
        self.run(&[
            "counter-sign",
            path_str(&auth),
            "--key",
            path_str(&self.user_key),
            "-o",
            path_str(&signed),
        ]);
        let out = self.path("4-request.json");
        self.run(&[
            "request-access",
            path_str(&signed),
            "--role",
            "test-role",
            "--reason",
            "on-call",
            "--key",
            path_str(&self.user_key),
            "-o",
            path_str(&out),
        ]);
        out
    }

    fn decide(&self, bundle: &Path) -> PathBuf {
        let out = self.path("5-decided.json");
        self.run(&[
            "decide",
            path_str(bundle),
            "--auto-allow",
            "--key",
            path_str(&self.authority_key),
            "-o",
            path_str(&out),
        ]);
        out
    }

    fn grant(&self, bundle: &Path, extra: &[&str]) -> PathBuf {
        let out = self.path("6-granted.json");
        let mut args = vec![
            "grant",
            path_str(bundle),
            "--role-arn",
            "arn:aws:iam::123456789012:role/test",
            "--key",
            path_str(&self.authority_key),
            "-o",
            path_str(&out),
        ];
        args.extend_from_slice(extra);
        self.run(&args);
        out
    }

    fn verify(&self, bundle: &Path, stage: &str, facts: &Path) -> assert_cmd::assert::Assert {
        custodia()
            .args([
                "verify",
                path_str(bundle),
                "--stage",
                stage,
                "--facts",
                path_str(facts),
            ])
            .assert()
    }
}

// ─── keygen tests ───────────────────────────────────────────

#[test]
fn keygen_is_stable_for_existing_key() {
    let dir = tempfile::tempdir().unwrap();
    let (_, first) = keygen(dir.path(), "user");
    let (_, second) = keygen(dir.path(), "user");
    assert_eq!(first, second);
}

#[test]
fn keygen_pem_output() {
    let dir = tempfile::tempdir().unwrap();
    let key = dir.path().join("k.pem");
    custodia()
        .args(["keygen", "--pem", "--key", path_str(&key)])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("-----BEGIN PUBLIC KEY-----"));
}

#[test]
fn default_key_location_is_used_without_key_flag() {
    let home = tempfile::tempdir().unwrap();
    let env = |cmd: &mut Command| {
        cmd.env("HOME", home.path())
            .env("XDG_CONFIG_HOME", home.path().join(".config"));
    };

    let mut keygen = custodia();
    env(&mut keygen);
    keygen.args(["keygen"]).assert().success();

    let mut init = custodia();
    env(&mut init);
    init.args(["init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("application/custodia+json"));
}

#[test]
fn missing_key_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    custodia()
        .args(["init", "--key", path_str(&dir.path().join("nope.pem"))])
        .assert()
        .failure()
        .stderr(predicate::str::contains("custodia keygen"));
}

// ─── facts tests ────────────────────────────────────────────

/// Write the PEM public half of `key` to `out`.
fn public_pem(key: &Path, out: &Path) {
    let output = custodia()
        .args(["keygen", "--pem", "--key", path_str(key)])
        .output()
        .expect("run keygen");
    assert!(output.status.success(), "keygen failed: {output:?}");
    std::fs::write(out, output.stdout).unwrap();
}

#[test]
fn facts_from_pem_keys_verify_a_bundle() {
    let lc = Lifecycle::new();
    let user_pem = lc.path("user.pub.pem");
    let authority_pem = lc.path("authority.pub.pem");
    public_pem(&lc.user_key, &user_pem);
    public_pem(&lc.authority_key, &authority_pem);
    let bundle = lc.authenticate("alice");

    for (user_id, passes) in [("alice", true), ("bob", false)] {
        let facts = lc.path(&format!("pem-facts-{user_id}.json"));
        custodia()
            .args([
                "facts",
                "--user-id",
                user_id,
                "--user-key",
                path_str(&user_pem),
                "--authority-key",
                path_str(&authority_pem),
                "-o",
                path_str(&facts),
            ])
            .assert()
            .success();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&facts).unwrap()).unwrap();
        assert_eq!(written["user"]["publicKey"], lc.user_public.as_str());
        assert_eq!(
            written["identityAuthority"]["publicKey"],
            lc.authority_public.as_str()
        );

        let verify = lc.verify(&bundle, "authentication", &facts);
        if passes {
            verify.success();
        } else {
            verify.failure();
        }
    }
}

#[test]
fn facts_rejects_private_key_file() {
    let lc = Lifecycle::new();
    let authority_pem = lc.path("authority.pub.pem");
    public_pem(&lc.authority_key, &authority_pem);

    custodia()
        .args([
            "facts",
            "--user-id",
            "alice",
            "--user-key",
            path_str(&lc.user_key),
            "--authority-key",
            path_str(&authority_pem),
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("reading user key"));
}

// ─── verify tests ───────────────────────────────────────────

#[test]
fn init_bundle_verifies() {
    let lc = Lifecycle::new();
    let bundle = lc.init();
    lc.verify(&bundle, "init", &lc.facts("alice"))
        .success()
        .stdout(predicate::str::contains("Verification PASSED"));
}

#[test]
fn authentication_for_right_user_passes() {
    let lc = Lifecycle::new();
    let bundle = lc.authenticate("alice");
    lc.verify(&bundle, "authentication", &lc.facts("alice"))
        .success()
        .stdout(predicate::str::contains("Verification PASSED"));
}

#[test]
fn authentication_for_wrong_user_fails() {
    let lc = Lifecycle::new();
    let bundle = lc.authenticate("alice");
    lc.verify(&bundle, "authentication", &lc.facts("mallory"))
        .failure()
        .stdout(predicate::str::contains("Verification FAILED"))
        .stdout(predicate::str::contains("user id"));
}

#[test]
fn wrong_stage_reports_envelope_count() {
    let lc = Lifecycle::new();
    let bundle = lc.authenticate("alice");
    lc.verify(&bundle, "access-request", &lc.facts("alice"))
        .failure()
        .stdout(predicate::str::contains("expected 3, got 2"));
}

#[test]
fn full_lifecycle_verifies_at_every_stage() {
    let lc = Lifecycle::new();
    let facts = lc.facts("alice");

    let requested = lc.request_access();
    lc.verify(&requested, "access-request", &facts).success();

    let decided = lc.decide(&requested);
    let granted = lc.grant(&decided, &[]);
    lc.verify(&granted, "auto-approve-decision", &facts)
        .success()
        .stdout(predicate::str::contains("Verification PASSED"));
}

#[test]
fn expired_grant_fails_verification() {
    let lc = Lifecycle::new();
    let requested = lc.request_access();
    let decided = lc.decide(&requested);
    let granted = lc.grant(&decided, &["--expires-at", "2020-01-01T00:00:00Z"]);

    lc.verify(&granted, "auto-approve-decision", &lc.facts("alice"))
        .failure()
        .stdout(predicate::str::contains("expired"));
}

#[test]
fn tampered_bundle_fails_verification() {
    let lc = Lifecycle::new();
    let bundle_path = lc.authenticate("alice");

    let mut bundle: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&bundle_path).unwrap()).unwrap();
    bundle[0]["signatures"] = serde_json::json!([]);
    std::fs::write(&bundle_path, serde_json::to_string(&bundle).unwrap()).unwrap();

    lc.verify(&bundle_path, "authentication", &lc.facts("alice"))
        .failure()
        .stdout(predicate::str::contains("missing signatures"));
}

#[test]
fn verify_json_output() {
    let lc = Lifecycle::new();
    let bundle = lc.authenticate("alice");
    let output = custodia()
        .args([
            "verify",
            path_str(&bundle),
            "--stage",
            "authentication",
            "--facts",
            path_str(&lc.facts("mallory")),
            "--json",
        ])
        .output()
        .unwrap();

    assert!(!output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["passed"], false);
    assert_eq!(report["position"], 1);
    assert_eq!(report["stage"], "authentication");
}

#[test]
fn shape_only_skips_signatures() {
    let lc = Lifecycle::new();
    let bundle_path = lc.authenticate("alice");

    let mut bundle: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&bundle_path).unwrap()).unwrap();
    bundle[0]["signatures"] = serde_json::json!([]);
    std::fs::write(&bundle_path, serde_json::to_string(&bundle).unwrap()).unwrap();

    custodia()
        .args([
            "verify",
            path_str(&bundle_path),
            "--stage",
            "authentication",
            "--shape-only",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("[PASS] shape check"));
}

#[test]
fn verify_requires_facts() {
    let lc = Lifecycle::new();
    let bundle = lc.init();
    custodia()
        .args(["verify", path_str(&bundle), "--stage", "init"])
        .assert()
        .failure();
}

#[test]
fn unknown_stage_is_rejected() {
    let lc = Lifecycle::new();
    let bundle = lc.init();
    custodia()
        .args([
            "verify",
            path_str(&bundle),
            "--stage",
            "approved",
            "--facts",
            path_str(&lc.facts("alice")),
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown stage"));
}

// ─── decide tests ───────────────────────────────────────────

#[test]
fn decide_rejects_trailing_envelopes_unless_dropped() {
    let lc = Lifecycle::new();
    let requested = lc.request_access();
    let decided = lc.decide(&requested);

    custodia()
        .args([
            "decide",
            path_str(&decided),
            "--key",
            path_str(&lc.authority_key),
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("trailing"));

    let redecided = lc.path("7-redecided.json");
    custodia()
        .args([
            "decide",
            path_str(&decided),
            "--drop-trailing",
            "--key",
            path_str(&lc.authority_key),
            "-o",
            path_str(&redecided),
        ])
        .assert()
        .success();
    let bundle: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&redecided).unwrap()).unwrap();
    assert_eq!(bundle.as_array().unwrap().len(), 4);
}

#[test]
fn authenticate_rejects_non_init_bundle() {
    let lc = Lifecycle::new();
    let requested = lc.request_access();
    let decided = lc.decide(&requested);

    // Reorder so the first envelope is the Decision.
    let mut bundle: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&decided).unwrap()).unwrap();
    bundle.as_array_mut().unwrap().reverse();
    std::fs::write(&decided, serde_json::to_string(&bundle).unwrap()).unwrap();

    custodia()
        .args([
            "authenticate",
            path_str(&decided),
            "--user-id",
            "alice",
            "--key",
            path_str(&lc.authority_key),
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("did not match expected type"));
}

// ─── grant tests ────────────────────────────────────────────

#[test]
fn grant_rejects_out_of_range_ttl() {
    let lc = Lifecycle::new();
    let requested = lc.request_access();
    let decided = lc.decide(&requested);
    let out = lc.path("6-granted.json");

    custodia()
        .args([
            "grant",
            path_str(&decided),
            "--role-arn",
            "arn:aws:iam::123456789012:role/test",
            "--ttl-secs",
            "9223372036854775807",
            "--key",
            path_str(&lc.authority_key),
            "-o",
            path_str(&out),
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("out of range"))
        .stderr(predicate::str::contains("panicked").not());
    assert!(!out.exists());
}

// ─── inspect tests ──────────────────────────────────────────

#[test]
fn inspect_summary_lists_envelopes() {
    let lc = Lifecycle::new();
    let bundle = lc.authenticate("alice");
    custodia()
        .args(["inspect", path_str(&bundle)])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 envelopes"))
        .stdout(predicate::str::contains("custodia.dev/Init/v0.1"))
        .stdout(predicate::str::contains("custodia.dev/Authenticated/v0.1"));
}

#[test]
fn inspect_payloads_shows_readable_json() {
    let lc = Lifecycle::new();
    let bundle = lc.authenticate("alice");
    custodia()
        .args(["inspect", "--payloads", path_str(&bundle)])
        .assert()
        .success()
        .stdout(predicate::str::contains("alice@example.com"));
}

#[test]
fn inspect_json_summary() {
    let lc = Lifecycle::new();
    let bundle = lc.authenticate("alice");
    let output = custodia()
        .args(["inspect", "--json", path_str(&bundle)])
        .output()
        .unwrap();
    assert!(output.status.success());
    let summaries: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summaries[0]["signatureCount"], 2);
    assert_eq!(summaries[1]["kind"], "custodia.dev/Authenticated/v0.1");
}

#[test]
fn inspect_nonexistent_file() {
    custodia()
        .args(["inspect", "/nonexistent/bundle.json"])
        .assert()
        .failure();
}
