//! Token commands - issue and inspect admin session tokens

use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, ensure, Context, Result};
use chrono::{SecondsFormat, Utc};
use paymentd_auth::{Authorization, Claims, SessionAuthority, AUTH_USER_ID_KEY};

use crate::ui;

pub fn issue(config_path: &Path, user: &str, extra_claims: &[String]) -> Result<()> {
    let config = super::load_config(config_path)?;
    ensure!(
        !config.auth_keys.is_empty(),
        "{} has no auth_keys; a token signed with a throwaway key cannot be verified",
        config_path.display()
    );
    ensure!(!user.is_empty(), "user id must not be empty");

    let mut claims = Claims::for_user(user);
    for claim in extra_claims {
        let (key, value) = claim
            .split_once('=')
            .ok_or_else(|| anyhow!("invalid claim {:?}, expected KEY=VALUE", claim))?;
        ensure!(key != AUTH_USER_ID_KEY, "use --user to set {}", AUTH_USER_ID_KEY);
        claims.insert(key, value);
    }

    let (keychain, _) = config.build_keychain()?;
    let authority = SessionAuthority::new(Arc::new(keychain), config.session_config());
    let session = authority.issue(claims)?;

    println!("{}", session.token);
    ui::key_value(
        "Expires",
        &session.expires_at.to_rfc3339_opts(SecondsFormat::Secs, true),
    );
    if let Some(cookie) = authority.cookie_for(&session) {
        ui::key_value("Set-Cookie", &cookie);
    }
    Ok(())
}

/// Walk the verification steps one by one so a failure can be reported with
/// its reason.
pub fn inspect(config_path: &Path, token: &str) -> Result<()> {
    let config = super::load_config(config_path)?;
    let (keychain, generated) = config.build_keychain()?;
    if generated.is_some() {
        bail!("{} has no auth_keys", config_path.display());
    }

    let mut auth = Authorization::new(config.hash)
        .with_max_msg_size(config.max_msg_size)
        .read_wire(token.trim())
        .context("token is not a readable authorization")?;

    ui::header("Token");
    ui::key_value(
        "Expiry",
        &auth.expiry().to_rfc3339_opts(SecondsFormat::Secs, true),
    );
    let expired = auth.is_expired_at(Utc::now());

    let key = keychain
        .match_key(&auth)
        .context("no configured key verifies this token")?;
    auth.decode(key.as_bytes()).context("token does not decrypt")?;

    let claims = Claims::from(auth.payload().clone());
    ui::key_value("User", claims.user_id().unwrap_or("<none>"));
    println!("{}", serde_json::to_string_pretty(claims.as_payload())?);

    if expired {
        ui::warning("token is expired");
    } else if claims.user_id().is_none() {
        ui::warning("token carries no user id and would be rejected");
    } else {
        ui::success("token is valid");
    }
    Ok(())
}
