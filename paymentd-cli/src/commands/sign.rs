//! Sign command - sign payment request bodies with a project secret

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use paymentd_api::InitPaymentRequest;
use paymentd_auth::Nonce;
use zeroize::Zeroizing;

use crate::ui;

pub fn init_payment(
    secret_hex: &str,
    file: &Path,
    nonce: Option<&str>,
    timestamp: Option<i64>,
) -> Result<()> {
    let secret = Zeroizing::new(
        hex::decode(secret_hex.trim()).context("secret must be hex encoded")?,
    );
    let body = super::read_input(file)?;
    let mut req = InitPaymentRequest::from_json(&body)?;

    let now = match timestamp {
        Some(ts) => DateTime::from_timestamp(ts, 0).context("timestamp out of range")?,
        None => Utc::now(),
    };
    let nonce = match nonce {
        Some(n) => n.to_string(),
        None => Nonce::generate()?.into_string(),
    };
    req.sign(now, &nonce, &secret)?;
    if let Err(err) = req.validate() {
        ui::warning(&format!("request would be rejected: {}", err));
    }

    println!("{}", serde_json::to_string_pretty(&req)?);
    Ok(())
}
