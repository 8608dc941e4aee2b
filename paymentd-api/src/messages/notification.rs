//! Payment status notifications sent to a project's callback URL.

use std::borrow::Cow;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use paymentd_auth::{sign, CanonicalMessage, HashAlgorithm, Signable, Signed};
use serde::{Deserialize, Serialize};

use super::{decode_signature, API_HASH};
use crate::errors::Result;
use crate::json::{option_string_int, string_int};

pub const NOTIFICATION_VERSION: &str = "2.0.0-alpha";

/// Render `amount` scaled by `10^-subunits` without trailing zeros.
///
/// `decimal_amount(1234, 2)` is `"12.34"`, `decimal_amount(1000, 2)` is `"10"`.
pub fn decimal_amount(amount: i64, subunits: i8) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let digits = amount.unsigned_abs().to_string();
    if subunits <= 0 {
        if amount == 0 {
            return "0".to_string();
        }
        let zeros = "0".repeat(subunits.unsigned_abs() as usize);
        return format!("{}{}{}", sign, digits, zeros);
    }

    let scale = subunits as usize;
    let padded = format!("{:0>width$}", digits, width = scale + 1);
    let (int_part, frac_part) = padded.split_at(padded.len() - scale);
    let frac_part = frac_part.trim_end_matches('0');
    if frac_part.is_empty() {
        if int_part == "0" {
            return "0".to_string();
        }
        format!("{}{}", sign, int_part)
    } else {
        format!("{}{}.{}", sign, int_part, frac_part)
    }
}

/// Notification about the state of a payment, version 2.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Notification {
    pub version: String,
    pub payment_id: String,
    pub ident: String,
    #[serde(with = "string_int")]
    pub amount: i64,
    #[serde(with = "string_int")]
    pub subunits: i8,
    pub decimal_amount: String,
    pub currency: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub country: String,
    #[serde(with = "option_string_int", skip_serializing_if = "Option::is_none")]
    pub payment_method_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    /// Decimal balance per currency.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Unix nanoseconds of the last transaction.
    #[serde(with = "option_string_int", skip_serializing_if = "Option::is_none")]
    pub transaction_timestamp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, String>>,
    #[serde(with = "string_int")]
    pub timestamp: i64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub nonce: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub signature: String,
}

impl Notification {
    pub fn new(
        payment_id: impl Into<String>,
        ident: impl Into<String>,
        amount: i64,
        subunits: i8,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            version: NOTIFICATION_VERSION.to_string(),
            payment_id: payment_id.into(),
            ident: ident.into(),
            amount,
            subunits,
            decimal_amount: decimal_amount(amount, subunits),
            currency: currency.into(),
            ..Self::default()
        }
    }

    /// Set the payment configuration fields.
    pub fn with_config(
        mut self,
        country: impl Into<String>,
        payment_method_id: i64,
        locale: impl Into<String>,
    ) -> Self {
        self.country = country.into();
        self.payment_method_id = Some(payment_method_id).filter(|id| *id != 0);
        self.locale = Some(locale.into()).filter(|l| !l.is_empty());
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_transaction_time(mut self, at: DateTime<Utc>) -> Self {
        self.transaction_timestamp = at.timestamp_nanos_opt();
        self
    }

    pub fn with_balance(mut self, balance: HashMap<String, String>) -> Self {
        self.balance = Some(balance);
        self
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Human readable name for logs.
    pub fn identification(&self) -> String {
        format!("payment notification {}", self.version)
    }

    /// Set timestamp and nonce and sign with the project secret.
    pub fn sign(&mut self, now: DateTime<Utc>, nonce: &str, secret: &[u8]) -> Result<()> {
        self.timestamp = now.timestamp();
        self.nonce = nonce.to_string();
        self.signature = hex::encode(sign(&*self, secret)?);
        Ok(())
    }

    /// JSON body as posted to the callback URL.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self).map_err(paymentd_auth::AuthError::from)?)
    }
}

impl Signable for Notification {
    fn message(&self) -> paymentd_auth::Result<Vec<u8>> {
        Ok(CanonicalMessage::new()
            .field(&self.version)
            .field(&self.payment_id)
            .field(&self.ident)
            .int(self.amount)
            .int(self.subunits)
            .field(&self.decimal_amount)
            .field(&self.currency)
            .field(&self.country)
            .optional_int(self.payment_method_id.unwrap_or_default())
            .optional(self.locale.as_deref())
            .sorted_map(self.balance.iter().flatten())
            .optional(self.status.as_deref())
            .optional_int(self.transaction_timestamp.unwrap_or_default())
            .sorted_map(self.metadata.iter().flatten())
            .tail(self.timestamp, &self.nonce)
            .into_bytes())
    }

    fn hash_algorithm(&self) -> HashAlgorithm {
        API_HASH
    }
}

impl Signed for Notification {
    fn signature(&self) -> paymentd_auth::Result<Cow<'_, [u8]>> {
        decode_signature(&self.signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paymentd_auth::is_authentic;

    #[test]
    fn test_decimal_amount() {
        assert_eq!(decimal_amount(1234, 2), "12.34");
        assert_eq!(decimal_amount(1000, 2), "10");
        assert_eq!(decimal_amount(1050, 2), "10.5");
        assert_eq!(decimal_amount(5, 3), "0.005");
        assert_eq!(decimal_amount(-1234, 2), "-12.34");
        assert_eq!(decimal_amount(0, 2), "0");
        assert_eq!(decimal_amount(12, 0), "12");
        assert_eq!(decimal_amount(12, -2), "1200");
    }

    #[test]
    fn test_canonical_order() {
        let at = DateTime::from_timestamp(1_400_000_000, 5).unwrap();
        let mut n = Notification::new("1234-5678", "order-1", 1050, 2, "EUR")
            .with_config("DE", 3, "de_DE")
            .with_status("paid")
            .with_transaction_time(at)
            .with_balance([("EUR".to_string(), "10.5".to_string())].into())
            .with_metadata([("k".to_string(), "v".to_string())].into());
        n.timestamp = 1_400_000_001;
        n.nonce = "n".into();

        assert_eq!(
            String::from_utf8(n.message().unwrap()).unwrap(),
            "2.0.0-alpha1234-5678order-1105021\
             0.5EURDE3de_DEEUR10.5paid1400000000000000005kv1400000001n"
        );
    }

    #[test]
    fn test_unconfigured_payment() {
        let mut n = Notification::new("1", "i", 100, 2, "EUR");
        n.nonce = "n".into();
        assert_eq!(n.message().unwrap(), b"2.0.0-alpha1i10021EUR0n");

        let json = serde_json::to_value(&n).unwrap();
        assert!(json.get("Country").is_none());
        assert_eq!(json["Amount"], "100");
        assert_eq!(json["DecimalAmount"], "1");
    }

    #[test]
    fn test_sign_and_parse() {
        let mut n = Notification::new("1", "order-1", 1234, 2, "EUR").with_status("open");
        let now = DateTime::from_timestamp(1_400_000_000, 0).unwrap();
        n.sign(now, "nonce", b"secret").unwrap();
        assert_eq!(n.identification(), "payment notification 2.0.0-alpha");

        let parsed: Notification = serde_json::from_slice(&n.to_json().unwrap()).unwrap();
        assert_eq!(parsed, n);
        assert!(is_authentic(&parsed, b"secret").unwrap());
        assert!(!is_authentic(&parsed, b"wrong").unwrap());
    }
}
