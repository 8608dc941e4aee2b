//! `POST /payment`: payment initiation request and response.

use std::borrow::Cow;
use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use paymentd_auth::{sign, CanonicalMessage, HashAlgorithm, Signable, Signed, NONCE_LEN};
use serde::{Deserialize, Serialize};

use super::{
    decode_signature, is_valid_locale, is_valid_url, require, AuthenticatedRequest, API_HASH,
    IDENT_MAX_LEN,
};
use crate::errors::{ApiError, Result};
use crate::json::{option_string_int, string_int};

/// Payment initiation request sent by a project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct InitPaymentRequest {
    pub project_key: String,
    pub ident: String,
    #[serde(with = "option_string_int", skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,
    #[serde(with = "option_string_int", skip_serializing_if = "Option::is_none")]
    pub subunits: Option<i8>,
    pub currency: String,
    pub country: String,
    #[serde(with = "option_string_int", skip_serializing_if = "Option::is_none")]
    pub payment_method_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(rename = "CallbackURL", skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    #[serde(rename = "ReturnURL", skip_serializing_if = "Option::is_none")]
    pub return_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, String>>,
    #[serde(with = "string_int")]
    pub timestamp: i64,
    pub nonce: String,
    /// Hex-encoded HMAC.
    pub signature: String,
}

impl InitPaymentRequest {
    /// Parse a request body.
    pub fn from_json(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body).map_err(|e| ApiError::invalid(format!("invalid JSON: {}", e)))
    }

    /// Check presence and format of every field.
    pub fn validate(&self) -> Result<()> {
        require(&self.project_key, "ProjectKey")?;
        require(&self.ident, "Ident")?;
        if self.ident.chars().count() > IDENT_MAX_LEN {
            return Err(ApiError::invalid("invalid Ident"));
        }
        match self.amount {
            None => return Err(ApiError::invalid("missing Amount")),
            Some(amount) if amount < 0 => {
                return Err(ApiError::invalid(format!("invalid Amount: {}", amount)))
            }
            Some(_) => {}
        }
        if self.subunits.is_none() {
            return Err(ApiError::invalid("missing Subunits"));
        }
        require(&self.currency, "Currency")?;
        if self.currency.len() != 3 {
            return Err(ApiError::invalid("invalid Currency"));
        }
        require(&self.country, "Country")?;
        if self.country.len() != 2 {
            return Err(ApiError::invalid("invalid Country"));
        }
        if self.timestamp == 0 {
            return Err(ApiError::invalid("missing Timestamp"));
        }
        require(&self.nonce, "Nonce")?;
        if self.nonce.len() > NONCE_LEN {
            return Err(ApiError::invalid("invalid Nonce"));
        }
        require(&self.signature, "Signature")?;
        if hex::decode(&self.signature).is_err() {
            return Err(ApiError::invalid("invalid Signature format"));
        }
        if let Some(locale) = non_empty(&self.locale) {
            if !is_valid_locale(locale) {
                return Err(ApiError::invalid("invalid Locale"));
            }
        }
        if let Some(url) = non_empty(&self.callback_url) {
            if !is_valid_url(url) {
                return Err(ApiError::invalid("invalid CallbackURL"));
            }
        }
        if let Some(url) = non_empty(&self.return_url) {
            if !is_valid_url(url) {
                return Err(ApiError::invalid("invalid ReturnURL"));
            }
        }
        Ok(())
    }

    /// Set timestamp and nonce and sign the request with the project secret.
    pub fn sign(&mut self, now: DateTime<Utc>, nonce: &str, secret: &[u8]) -> Result<()> {
        self.timestamp = now.timestamp();
        self.nonce = nonce.to_string();
        self.signature = hex::encode(sign(&*self, secret)?);
        Ok(())
    }

    fn canonical(&self) -> CanonicalMessage {
        CanonicalMessage::new()
            .field(&self.project_key)
            .field(&self.ident)
            .int(self.amount.unwrap_or_default())
            .int(self.subunits.unwrap_or_default())
            .field(&self.currency)
            .field(&self.country)
            .optional_int(self.payment_method_id.unwrap_or_default())
            .optional(self.locale.as_deref())
            .optional(self.callback_url.as_deref())
            .optional(self.return_url.as_deref())
            .sorted_map(self.metadata.iter().flatten())
            .tail(self.timestamp, &self.nonce)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl Signable for InitPaymentRequest {
    fn message(&self) -> paymentd_auth::Result<Vec<u8>> {
        Ok(self.canonical().into_bytes())
    }

    fn hash_algorithm(&self) -> HashAlgorithm {
        API_HASH
    }
}

impl Signed for InitPaymentRequest {
    fn signature(&self) -> paymentd_auth::Result<Cow<'_, [u8]>> {
        decode_signature(&self.signature)
    }
}

impl AuthenticatedRequest for InitPaymentRequest {
    fn request_project_key(&self) -> &str {
        &self.project_key
    }

    fn timestamp(&self) -> i64 {
        self.timestamp
    }

    fn nonce(&self) -> &str {
        &self.nonce
    }
}

/// The payment as confirmed by paymentd.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Confirmation {
    pub ident: String,
    #[serde(with = "string_int")]
    pub amount: i64,
    #[serde(with = "string_int")]
    pub subunits: i8,
    pub currency: String,
    pub country: String,
    #[serde(with = "option_string_int", skip_serializing_if = "Option::is_none")]
    pub payment_method_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(rename = "CallbackURL", skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    #[serde(rename = "ReturnURL", skip_serializing_if = "Option::is_none")]
    pub return_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, String>>,
}

impl Confirmation {
    /// Confirm the fields of a validated request.
    pub fn from_request(req: &InitPaymentRequest) -> Self {
        Self {
            ident: req.ident.clone(),
            amount: req.amount.unwrap_or_default(),
            subunits: req.subunits.unwrap_or_default(),
            currency: req.currency.clone(),
            country: req.country.clone(),
            payment_method_id: req.payment_method_id.filter(|id| *id != 0),
            locale: non_empty(&req.locale).map(str::to_string),
            callback_url: non_empty(&req.callback_url).map(str::to_string),
            return_url: non_empty(&req.return_url).map(str::to_string),
            metadata: req.metadata.clone(),
        }
    }
}

/// The created payment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PaymentInfo {
    pub payment_id: String,
    /// RFC 3339 creation time.
    pub created: String,
    pub token: String,
    #[serde(rename = "RedirectURL", skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
}

impl PaymentInfo {
    pub fn new(payment_id: impl Into<String>, created: DateTime<Utc>, token: impl Into<String>) -> Self {
        Self {
            payment_id: payment_id.into(),
            created: created.to_rfc3339_opts(SecondsFormat::Secs, true),
            token: token.into(),
            redirect_url: None,
        }
    }

    pub fn with_redirect_url(mut self, url: impl Into<String>) -> Self {
        self.redirect_url = Some(url.into());
        self
    }
}

/// Signed response to a payment initiation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct InitPaymentResponse {
    pub confirmation: Confirmation,
    pub payment: PaymentInfo,
    #[serde(with = "string_int")]
    pub timestamp: i64,
    pub nonce: String,
    pub signature: String,
}

impl InitPaymentResponse {
    pub fn new(confirmation: Confirmation, payment: PaymentInfo) -> Self {
        Self {
            confirmation,
            payment,
            ..Self::default()
        }
    }

    /// Set timestamp and nonce and sign the response with the project secret.
    pub fn sign(&mut self, now: DateTime<Utc>, nonce: &str, secret: &[u8]) -> Result<()> {
        self.timestamp = now.timestamp();
        self.nonce = nonce.to_string();
        self.signature = hex::encode(sign(&*self, secret)?);
        Ok(())
    }
}

impl Signable for InitPaymentResponse {
    fn message(&self) -> paymentd_auth::Result<Vec<u8>> {
        let c = &self.confirmation;
        let p = &self.payment;
        Ok(CanonicalMessage::new()
            .field(&c.ident)
            .int(c.amount)
            .int(c.subunits)
            .field(&c.currency)
            .field(&c.country)
            .optional_int(c.payment_method_id.unwrap_or_default())
            .optional(c.locale.as_deref())
            .optional(c.callback_url.as_deref())
            .optional(c.return_url.as_deref())
            .sorted_map(c.metadata.iter().flatten())
            .field(&p.payment_id)
            .field(&p.created)
            .field(&p.token)
            .optional(p.redirect_url.as_deref())
            .tail(self.timestamp, &self.nonce)
            .into_bytes())
    }

    fn hash_algorithm(&self) -> HashAlgorithm {
        API_HASH
    }
}

impl Signed for InitPaymentResponse {
    fn signature(&self) -> paymentd_auth::Result<Cow<'_, [u8]>> {
        decode_signature(&self.signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paymentd_auth::is_authentic;

    fn request() -> InitPaymentRequest {
        InitPaymentRequest {
            project_key: "testkey".into(),
            ident: "order-1".into(),
            amount: Some(1234),
            subunits: Some(2),
            currency: "EUR".into(),
            country: "DE".into(),
            timestamp: 1_400_000_000,
            nonce: "abc".into(),
            signature: "00".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_canonical_order() {
        let mut req = request();
        assert_eq!(
            String::from_utf8(req.message().unwrap()).unwrap(),
            "testkeyorder-112342EURDE1400000000abc"
        );

        req.payment_method_id = Some(7);
        req.locale = Some("de_DE".into());
        req.return_url = Some("https://shop/return".into());
        req.metadata = Some([("b".into(), "2".into()), ("a".into(), "1".into())].into());
        assert_eq!(
            String::from_utf8(req.message().unwrap()).unwrap(),
            "testkeyorder-112342EURDE7de_DEhttps://shop/returna1b21400000000abc"
        );
    }

    #[test]
    fn test_json_shape() {
        let json = r#"{
            "ProjectKey": "testkey",
            "Ident": "order-1",
            "Amount": "1234",
            "Subunits": "2",
            "Currency": "EUR",
            "Country": "DE",
            "PaymentMethodId": "7",
            "CallbackURL": "https://shop/cb",
            "Metadata": {"k": "v"},
            "Timestamp": "1400000000",
            "Nonce": "abc",
            "Signature": "00ff"
        }"#;
        let req = InitPaymentRequest::from_json(json.as_bytes()).unwrap();
        assert_eq!(req.amount, Some(1234));
        assert_eq!(req.payment_method_id, Some(7));
        assert_eq!(req.callback_url.as_deref(), Some("https://shop/cb"));
        assert!(req.validate().is_ok());

        let out = serde_json::to_value(&req).unwrap();
        assert_eq!(out["Amount"], "1234");
        assert_eq!(out["Timestamp"], "1400000000");
        assert!(out.get("Locale").is_none());
    }

    fn assert_invalid(mutate: impl FnOnce(&mut InitPaymentRequest), expected: &str) {
        let mut req = request();
        mutate(&mut req);
        match req.validate() {
            Err(ApiError::Invalid(msg)) => assert_eq!(msg, expected),
            other => panic!("expected {:?}, got {:?}", expected, other),
        }
    }

    #[test]
    fn test_validate() {
        assert!(request().validate().is_ok());

        assert_invalid(|r| r.project_key.clear(), "missing ProjectKey");
        assert_invalid(|r| r.ident.clear(), "missing Ident");
        assert_invalid(|r| r.ident = "x".repeat(IDENT_MAX_LEN + 1), "invalid Ident");
        assert_invalid(|r| r.amount = None, "missing Amount");
        assert_invalid(|r| r.amount = Some(-1), "invalid Amount: -1");
        assert_invalid(|r| r.subunits = None, "missing Subunits");
        assert_invalid(|r| r.currency = "EU".into(), "invalid Currency");
        assert_invalid(|r| r.country.clear(), "missing Country");
        assert_invalid(|r| r.country = "DEU".into(), "invalid Country");
        assert_invalid(|r| r.timestamp = 0, "missing Timestamp");
        assert_invalid(|r| r.nonce = "n".repeat(NONCE_LEN + 1), "invalid Nonce");
        assert_invalid(|r| r.signature.clear(), "missing Signature");
        assert_invalid(|r| r.signature = "xyz".into(), "invalid Signature format");
        assert_invalid(|r| r.locale = Some("english".into()), "invalid Locale");
        assert_invalid(|r| r.callback_url = Some("::".into()), "invalid CallbackURL");
        assert_invalid(|r| r.return_url = Some("/relative".into()), "invalid ReturnURL");
    }

    #[test]
    fn test_ident_length_counts_chars() {
        let mut req = request();
        req.ident = "ü".repeat(IDENT_MAX_LEN);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_sign_request() {
        let mut req = request();
        let now = DateTime::from_timestamp(1_500_000_000, 0).unwrap();
        req.sign(now, "nonce", b"secret").unwrap();
        assert_eq!(req.timestamp, 1_500_000_000);
        assert_eq!(req.signature.len(), 64);
        assert!(is_authentic(&req, b"secret").unwrap());
        assert!(!is_authentic(&req, b"other").unwrap());
    }

    #[test]
    fn test_response_sign_and_verify() {
        let mut req = request();
        req.metadata = Some([("x".into(), "1".into())].into());
        let created = DateTime::from_timestamp(1_400_000_000, 0).unwrap();
        let payment = PaymentInfo::new("1234-5678", created, "tok")
            .with_redirect_url("https://pay.example.com/?token=tok");
        assert_eq!(payment.created, "2014-05-13T16:53:20Z");

        let mut resp = InitPaymentResponse::new(Confirmation::from_request(&req), payment);
        resp.sign(created, "nonce", b"secret").unwrap();
        assert!(is_authentic(&resp, b"secret").unwrap());

        let msg = String::from_utf8(resp.message().unwrap()).unwrap();
        assert_eq!(
            msg,
            "order-112342EURDEx11234-56782014-05-13T16:53:20Ztokhttps://pay.example.com/?token=tok1400000000nonce"
        );

        let json = serde_json::to_string(&resp).unwrap();
        let parsed: InitPaymentResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, resp);
        assert!(is_authentic(&parsed, b"secret").unwrap());
    }
}
