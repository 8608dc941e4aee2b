//! `GET /payment/id/{paymentId}` and `GET /payment/ident/{ident}`.

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use paymentd_auth::{sign, AuthError, CanonicalMessage, HashAlgorithm, Signable, Signed};
use url::form_urlencoded;

use super::{decode_signature, AuthenticatedRequest, API_HASH};
use crate::errors::{ApiError, Result};

/// Payment status lookup. The payment is addressed by id or by the
/// project's own identifier; the id wins when both are set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetPaymentRequest {
    pub project_key: String,
    pub payment_id: Option<String>,
    pub ident: Option<String>,
    pub timestamp: i64,
    pub nonce: String,
    pub signature: String,
}

impl GetPaymentRequest {
    pub fn by_id(project_key: impl Into<String>, payment_id: impl Into<String>) -> Self {
        Self {
            project_key: project_key.into(),
            payment_id: Some(payment_id.into()),
            ..Self::default()
        }
    }

    pub fn by_ident(project_key: impl Into<String>, ident: impl Into<String>) -> Self {
        Self {
            project_key: project_key.into(),
            ident: Some(ident.into()),
            ..Self::default()
        }
    }

    /// Build a request from the path variables and the URL query string.
    pub fn from_request(
        payment_id: Option<&str>,
        ident: Option<&str>,
        query: &str,
    ) -> Result<Self> {
        let mut req = Self {
            payment_id: payment_id.filter(|v| !v.is_empty()).map(str::to_string),
            ident: ident.filter(|v| !v.is_empty()).map(str::to_string),
            ..Self::default()
        };
        let mut timestamp = None;
        for (name, value) in form_urlencoded::parse(query.as_bytes()) {
            match name.as_ref() {
                "ProjectKey" => req.project_key = value.into_owned(),
                "Timestamp" => timestamp = Some(value.into_owned()),
                "Nonce" => req.nonce = value.into_owned(),
                "Signature" => req.signature = value.into_owned(),
                _ => {}
            }
        }
        if req.project_key.is_empty() {
            return Err(ApiError::invalid("no project key"));
        }
        req.timestamp = timestamp
            .as_deref()
            .unwrap_or_default()
            .parse()
            .map_err(|e| ApiError::invalid(format!("invalid timestamp: {}", e)))?;
        if req.nonce.is_empty() {
            return Err(ApiError::invalid("no nonce"));
        }
        if req.signature.is_empty() {
            return Err(ApiError::invalid("no signature"));
        }
        Ok(req)
    }

    /// Render the authentication parameters as a URL query string.
    pub fn to_query(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .append_pair("ProjectKey", &self.project_key)
            .append_pair("Timestamp", &self.timestamp.to_string())
            .append_pair("Nonce", &self.nonce)
            .append_pair("Signature", &self.signature)
            .finish()
    }

    pub fn sign(&mut self, now: DateTime<Utc>, nonce: &str, secret: &[u8]) -> Result<()> {
        self.timestamp = now.timestamp();
        self.nonce = nonce.to_string();
        self.signature = hex::encode(sign(&*self, secret)?);
        Ok(())
    }

    fn lookup(&self) -> Option<&str> {
        [&self.payment_id, &self.ident]
            .into_iter()
            .find_map(|v| v.as_deref().filter(|v| !v.is_empty()))
    }
}

impl Signable for GetPaymentRequest {
    fn message(&self) -> paymentd_auth::Result<Vec<u8>> {
        let lookup = self
            .lookup()
            .ok_or_else(|| AuthError::Canonical("neither payment id nor ident set".into()))?;
        Ok(CanonicalMessage::new()
            .field(&self.project_key)
            .field(lookup)
            .tail(self.timestamp, &self.nonce)
            .into_bytes())
    }

    fn hash_algorithm(&self) -> HashAlgorithm {
        API_HASH
    }
}

impl Signed for GetPaymentRequest {
    fn signature(&self) -> paymentd_auth::Result<Cow<'_, [u8]>> {
        decode_signature(&self.signature)
    }
}

impl AuthenticatedRequest for GetPaymentRequest {
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
