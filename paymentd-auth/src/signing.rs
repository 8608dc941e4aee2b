//! # Message Signing
//!
//! The signing contract shared by every authenticated message in paymentd:
//! session containers, payment requests, payment responses and callback
//! notifications.
//!
//! A [`Signable`] type renders itself into a canonical byte sequence and names
//! the hash algorithm its MAC uses. A [`Signed`] type additionally carries the
//! MAC it was sent with. [`sign`] and [`is_authentic`] compute
//! `HMAC(hash, key, message)` over that canonical form; the key either comes
//! from a [`Keychain`](crate::Keychain) or from a per-project secret.
//!
//! ## Security
//!
//! - Verification compares MACs in constant time.
//! - Canonical messages must be deterministic: a fixed field order, unset
//!   optional fields omitted, maps written in sorted key order (see
//!   [`CanonicalMessage`](crate::CanonicalMessage)).

use std::borrow::Cow;

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Sha256, Sha384, Sha512};
use subtle::ConstantTimeEq;

use crate::{AuthError, Result};

/// Hash algorithm used for HMAC signatures and key derivation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// SHA-256, used throughout paymentd.
    #[default]
    Sha256,
    /// SHA-384.
    Sha384,
    /// SHA-512.
    Sha512,
}

impl HashAlgorithm {
    /// Size of the digest (and therefore of the MAC) in bytes.
    pub fn output_size(&self) -> usize {
        match self {
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }

    /// Name as used in configuration files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        }
    }
}

/// A message that can be signed.
pub trait Signable {
    /// Deterministic canonical serialization used as MAC input.
    fn message(&self) -> Result<Vec<u8>>;

    /// Hash algorithm the MAC is computed with.
    fn hash_algorithm(&self) -> HashAlgorithm;
}

/// A message carrying its own signature.
pub trait Signed: Signable {
    /// The raw (binary) signature the message was sent with.
    fn signature(&self) -> Result<Cow<'_, [u8]>>;
}

impl<T: Signable + ?Sized> Signable for &T {
    fn message(&self) -> Result<Vec<u8>> {
        (**self).message()
    }

    fn hash_algorithm(&self) -> HashAlgorithm {
        (**self).hash_algorithm()
    }
}

impl<T: Signed + ?Sized> Signed for &T {
    fn signature(&self) -> Result<Cow<'_, [u8]>> {
        (**self).signature()
    }
}

macro_rules! hmac_with {
    ($digest:ty, $key:expr, $message:expr) => {{
        let mut mac = <Hmac<$digest> as Mac>::new_from_slice($key)
            .map_err(|_| AuthError::InvalidKey)?;
        mac.update($message);
        mac.finalize().into_bytes().to_vec()
    }};
}

/// Compute `HMAC(algorithm, key, message)`.
pub fn hmac(algorithm: HashAlgorithm, key: &[u8], message: &[u8]) -> Result<Vec<u8>> {
    let tag = match algorithm {
        HashAlgorithm::Sha256 => hmac_with!(Sha256, key, message),
        HashAlgorithm::Sha384 => hmac_with!(Sha384, key, message),
        HashAlgorithm::Sha512 => hmac_with!(Sha512, key, message),
    };
    Ok(tag)
}

/// Sign a message with the given key and return the MAC.
///
/// Fails only if the message cannot produce its canonical form.
pub fn sign<S: Signable + ?Sized>(msg: &S, key: &[u8]) -> Result<Vec<u8>> {
    let message = msg.message()?;
    hmac(msg.hash_algorithm(), key, &message)
}

/// Check whether the signature carried by `msg` was produced with `key`.
///
/// # Returns
///
/// `Ok(true)` if the signature verifies, `Ok(false)` if it does not and
/// `Err(_)` if the message or its signature cannot be read.
pub fn is_authentic<S: Signed + ?Sized>(msg: &S, key: &[u8]) -> Result<bool> {
    let expected = sign(msg, key)?;
    let signature = msg.signature()?;
    Ok(constant_time_eq(&expected, &signature))
}

/// Length-aware constant-time equality.
///
/// The length comparison leaks only the length, which is public for MACs.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && bool::from(a.ct_eq(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestMsg {
        msg: Vec<u8>,
        key: Vec<u8>,
        algorithm: HashAlgorithm,
    }

    impl TestMsg {
        fn new(msg: &[u8], key: &[u8]) -> Self {
            Self {
                msg: msg.to_vec(),
                key: key.to_vec(),
                algorithm: HashAlgorithm::Sha256,
            }
        }
    }

    impl Signable for TestMsg {
        fn message(&self) -> Result<Vec<u8>> {
            Ok(self.msg.clone())
        }

        fn hash_algorithm(&self) -> HashAlgorithm {
            self.algorithm
        }
    }

    impl Signed for TestMsg {
        fn signature(&self) -> Result<Cow<'_, [u8]>> {
            hmac(self.algorithm, &self.key, &self.msg).map(Cow::Owned)
        }
    }

    struct Unrenderable;

    impl Signable for Unrenderable {
        fn message(&self) -> Result<Vec<u8>> {
            Err(AuthError::Canonical("neither payment id nor ident set".into()))
        }

        fn hash_algorithm(&self) -> HashAlgorithm {
            HashAlgorithm::Sha256
        }
    }

    #[test]
    fn test_sign_and_verify() {
        let msg = TestMsg::new(b"test", b"key");
        let sig = sign(&msg, b"key").unwrap();
        assert_eq!(sig.len(), 32);
        assert!(is_authentic(&msg, b"key").unwrap());
    }

    #[test]
    fn test_wrong_key_fails() {
        let msg = TestMsg::new(b"test", b"key");
        assert!(!is_authentic(&msg, b"other").unwrap());
    }

    #[test]
    fn test_output_size_follows_algorithm() {
        for algorithm in [
            HashAlgorithm::Sha256,
            HashAlgorithm::Sha384,
            HashAlgorithm::Sha512,
        ] {
            let mut msg = TestMsg::new(b"test", b"key");
            msg.algorithm = algorithm;
            let sig = sign(&msg, b"key").unwrap();
            assert_eq!(sig.len(), algorithm.output_size());
            assert!(is_authentic(&msg, b"key").unwrap());
        }
    }

    #[test]
    fn test_message_error_propagates() {
        let result = sign(&Unrenderable, b"key");
        assert!(matches!(result, Err(AuthError::Canonical(_))));
    }

    /// RFC 4231 Test Case 2
    #[test]
    fn test_hmac_sha256_rfc4231_case2() {
        let tag = hmac(
            HashAlgorithm::Sha256,
            b"Jefe",
            b"what do ya want for nothing?",
        )
        .unwrap();
        assert_eq!(
            hex::encode(tag),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_constant_time_eq_length_mismatch() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
        assert!(!constant_time_eq(b"", b"a"));
    }
}
