//! Config commands - print defaults and check configuration files

use std::path::Path;

use anyhow::Result;
use paymentd_auth::{AuthConfig, RetentionPolicy};

use crate::ui;

pub fn print_default() -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&AuthConfig::default())?);
    Ok(())
}

pub fn test(path: &Path) -> Result<()> {
    let config = super::load_config(path)?;
    let (keychain, generated) = config.build_keychain()?;

    ui::header("Configuration");
    ui::key_value("Keys", &keychain.key_count().to_string());
    ui::key_value("Hash", config.hash.as_str());
    ui::key_value(
        "Session lifetime",
        &format!("{}s", config.session_lifetime_secs),
    );
    ui::key_value("Max message size", &config.max_msg_size.to_string());
    ui::key_value("Key retention", &describe_retention(&config.key_retention));
    ui::key_value(
        "Request max age",
        &format!("{}s", config.request_max_age_secs),
    );
    ui::key_value(
        "Cookie auth",
        if config.cookie.allow_cookie_auth {
            "enabled"
        } else {
            "disabled"
        },
    );

    if generated.is_some() {
        ui::warning("no auth_keys configured; paymentd would generate a key on every start");
        ui::info("Run 'paymentdctl keygen' and add the key to auth_keys");
    }
    ui::success("configuration OK");
    Ok(())
}

fn describe_retention(policy: &RetentionPolicy) -> String {
    match policy {
        RetentionPolicy::Unbounded => "unbounded".to_string(),
        RetentionPolicy::KeepLatest { count } => format!("keep latest {}", count),
        RetentionPolicy::OverlapWindow { secs } => format!("overlap window {}s", secs),
    }
}
