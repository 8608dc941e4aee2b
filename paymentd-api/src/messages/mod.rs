//! Payment API messages
//!
//! Requests from projects and responses and notifications to projects all
//! carry `Timestamp`, `Nonce` and a hex `Signature`. The signature is an
//! HMAC-SHA256 under the project secret over the message's canonical form
//! (see [`CanonicalMessage`](paymentd_auth::CanonicalMessage)).

mod get_payment;
mod init_payment;
mod notification;

pub use get_payment::GetPaymentRequest;
pub use init_payment::{Confirmation, InitPaymentRequest, InitPaymentResponse, PaymentInfo};
pub use notification::{decimal_amount, Notification, NOTIFICATION_VERSION};

use std::borrow::Cow;

use paymentd_auth::{AuthError, HashAlgorithm, Signed};

use crate::errors::{ApiError, Result};

/// Maximum length of a payment identifier in characters.
pub const IDENT_MAX_LEN: usize = 175;

/// Hash algorithm for every payment API signature.
pub const API_HASH: HashAlgorithm = HashAlgorithm::Sha256;

/// A signed request sent by a project.
pub trait AuthenticatedRequest: Signed {
    /// The project key the request claims to come from.
    fn request_project_key(&self) -> &str;

    /// Request timestamp in unix seconds.
    fn timestamp(&self) -> i64;

    fn nonce(&self) -> &str;
}

/// Decode a hex signature field.
pub(crate) fn decode_signature(hex_signature: &str) -> paymentd_auth::Result<Cow<'static, [u8]>> {
    hex::decode(hex_signature)
        .map(Cow::Owned)
        .map_err(|_| AuthError::Malformed("invalid signature format".into()))
}

pub(crate) fn require(value: &str, name: &str) -> Result<()> {
    if value.is_empty() {
        return Err(ApiError::invalid(format!("missing {}", name)));
    }
    Ok(())
}

/// Loose BCP 47 check: alphanumeric subtags separated by `-` or `_`, the
/// first one 2 to 3 letters.
pub(crate) fn is_valid_locale(locale: &str) -> bool {
    let mut subtags = locale.split(['-', '_']);
    let primary_ok = subtags
        .next()
        .is_some_and(|p| (2..=3).contains(&p.len()) && p.chars().all(|c| c.is_ascii_alphabetic()));
    primary_ok
        && subtags.all(|s| (1..=8).contains(&s.len()) && s.chars().all(|c| c.is_ascii_alphanumeric()))
}

pub(crate) fn is_valid_url(raw: &str) -> bool {
    url::Url::parse(raw).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locale() {
        for ok in ["en", "de_DE", "en-US", "zh-Hant-TW", "deu"] {
            assert!(is_valid_locale(ok), "{}", ok);
        }
        for bad in ["", "e", "english", "en--US", "en US", "12"] {
            assert!(!is_valid_locale(bad), "{}", bad);
        }
    }

    #[test]
    fn test_url() {
        assert!(is_valid_url("https://shop.example.com/callback?id=1"));
        assert!(!is_valid_url("not a url"));
    }

    #[test]
    fn test_decode_signature() {
        assert_eq!(&*decode_signature("0aff").unwrap(), &[0x0a, 0xff]);
        assert!(matches!(
            decode_signature("zz"),
            Err(AuthError::Malformed(_))
        ));
    }
}
