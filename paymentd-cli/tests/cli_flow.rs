//! Tests that drive the `paymentdctl` binary.

use std::io::Write;
use std::process::{Command, Output};

use tempfile::NamedTempFile;

fn paymentdctl(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_paymentdctl"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run paymentdctl")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn keygen() -> String {
    let output = paymentdctl(&["keygen"]);
    assert!(output.status.success());
    stdout(&output).trim().to_string()
}

#[test]
fn test_keygen_count() {
    let output = paymentdctl(&["keygen", "--count", "3"]);
    assert!(output.status.success());
    let keys: Vec<String> = stdout(&output).lines().map(str::to_string).collect();
    assert_eq!(keys.len(), 3);
    for key in &keys {
        assert_eq!(hex::decode(key).unwrap().len(), 32);
    }
    assert_ne!(keys[0], keys[1]);
}

#[test]
fn test_config_default_is_loadable() {
    let output = paymentdctl(&["config", "default"]);
    assert!(output.status.success());
    let config: paymentd_auth::AuthConfig = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(config, paymentd_auth::AuthConfig::default());
}

#[test]
fn test_config_test() {
    let file = config_file(&format!(r#"{{"auth_keys": ["{}"]}}"#, keygen()));
    let output = paymentdctl(&["config", "test", "--config", file.path().to_str().unwrap()]);
    assert!(output.status.success());

    let bad = config_file(r#"{"auth_keys": ["not hex"]}"#);
    let output = paymentdctl(&["config", "test", "--config", bad.path().to_str().unwrap()]);
    assert!(!output.status.success());
}

#[test]
fn test_issue_then_inspect() {
    let file = config_file(&format!(r#"{{"auth_keys": ["{}"]}}"#, keygen()));
    let config = file.path().to_str().unwrap();

    let output = paymentdctl(&[
        "token", "issue", "--config", config, "--user", "admin", "--claim", "role=ops",
    ]);
    assert!(output.status.success());
    let token = stdout(&output).trim().to_string();
    assert!(!token.is_empty());

    let output = paymentdctl(&["token", "inspect", "--config", config, &token]);
    assert!(output.status.success());
    let claims: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(claims["userID"], "admin");
    assert_eq!(claims["role"], "ops");

    let other = config_file(&format!(r#"{{"auth_keys": ["{}"]}}"#, keygen()));
    let output = paymentdctl(&[
        "token",
        "inspect",
        "--config",
        other.path().to_str().unwrap(),
        &token,
    ]);
    assert!(!output.status.success());
}

#[test]
fn test_issue_requires_keys() {
    let file = config_file("{}");
    let output = paymentdctl(&[
        "token",
        "issue",
        "--config",
        file.path().to_str().unwrap(),
        "--user",
        "admin",
    ]);
    assert!(!output.status.success());
}

#[test]
fn test_sign_init() {
    let secret = keygen();
    let body = config_file(
        r#"{"ProjectKey": "shop", "Ident": "order-1", "Amount": "1000", "Subunits": "2",
            "Currency": "EUR", "Country": "DE"}"#,
    );
    let output = paymentdctl(&[
        "sign-init",
        "--secret",
        &secret,
        "--nonce",
        "fixed",
        "--timestamp",
        "1400000000",
        body.path().to_str().unwrap(),
    ]);
    assert!(output.status.success());

    let req = paymentd_api::InitPaymentRequest::from_json(&output.stdout).unwrap();
    assert_eq!(req.timestamp, 1_400_000_000);
    assert_eq!(req.nonce, "fixed");
    req.validate().unwrap();
    assert!(paymentd_auth::is_authentic(&req, &hex::decode(&secret).unwrap()).unwrap());
}
