//! Rotating Symmetric Keychain
//!
//! The keychain holds the keys currently trusted for session containers,
//! newest first. New containers are always signed with the newest key;
//! verification scans the whole keychain, so a container signed with a key
//! that has since been superseded keeps verifying until that key is evicted by
//! the [`RetentionPolicy`].
//!
//! # Thread Safety
//!
//! State lives behind a single `RwLock`. Readers ([`Keychain::bin_key`],
//! [`Keychain::match_key`], [`Keychain::key_count`]) hold the read lock for the
//! whole operation. Writers build a fresh vector and swap it in, so readers
//! observe either the old or the new keychain and a poisoned lock still guards
//! a consistent keychain.
//!
//! # Example
//!
//! ```
//! use paymentd_auth::Keychain;
//!
//! let keychain = Keychain::new();
//! keychain.add_key("abcdef123456")?;
//! let generated = keychain.generate_key()?;
//!
//! // the generated key is the newest and will sign new containers
//! assert_eq!(keychain.bin_key()?, generated);
//! assert_eq!(keychain.key_count(), 2);
//! # Ok::<(), paymentd_auth::AuthError>(())
//! ```

mod policy;

pub use policy::{RetentionPolicy, DEFAULT_KEYCHAIN_LEN};

use std::fmt;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::signing::{is_authentic, Signed};
use crate::{AuthError, Result};

/// Size of generated keys in bytes (AES-256 capable).
pub const DEFAULT_KEY_SIZE: usize = 32;

/// Raw symmetric key material.
///
/// The bytes are wiped when the key is dropped and never printed by `Debug`.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Key(Vec<u8>);

impl Key {
    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Decode a hex-encoded key.
    pub fn from_hex(encoded: &str) -> Result<Self> {
        hex::decode(encoded.trim())
            .map(Self)
            .map_err(|_| AuthError::InvalidKey)
    }

    /// Generate a random key of [`DEFAULT_KEY_SIZE`] bytes from the OS CSPRNG.
    pub fn generate() -> Result<Self> {
        let mut bytes = vec![0u8; DEFAULT_KEY_SIZE];
        OsRng.try_fill_bytes(&mut bytes)?;
        Ok(Self(bytes))
    }

    /// The raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Hex-encode the key, e.g. for exporting it to configuration.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Key length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for a zero-length key.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for Key {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl PartialEq<[u8]> for Key {
    fn eq(&self, other: &[u8]) -> bool {
        self.0 == other
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key([REDACTED; {} bytes])", self.0.len())
    }
}

#[derive(Clone)]
struct Entry {
    key: Key,
    added_at: DateTime<Utc>,
}

/// Ordered, rotating set of trusted symmetric keys, newest first.
pub struct Keychain {
    entries: RwLock<Vec<Entry>>,
    retention: RetentionPolicy,
}

impl Keychain {
    /// Create an empty keychain with the default retention policy.
    pub fn new() -> Self {
        Self::with_retention(RetentionPolicy::default())
    }

    /// Create an empty keychain with the given retention policy.
    pub fn with_retention(retention: RetentionPolicy) -> Self {
        Self {
            entries: RwLock::new(Vec::with_capacity(DEFAULT_KEYCHAIN_LEN)),
            retention,
        }
    }

    /// The retention policy in effect.
    pub fn retention(&self) -> &RetentionPolicy {
        &self.retention
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Entry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Entry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of keys in the keychain.
    pub fn key_count(&self) -> usize {
        self.read().len()
    }

    /// Add a hex-encoded key as the newest key.
    ///
    /// Malformed hex fails with [`AuthError::InvalidKey`] and leaves the
    /// keychain unchanged.
    pub fn add_key(&self, encoded: &str) -> Result<()> {
        let key = Key::from_hex(encoded)?;
        self.add_key_at(key, Utc::now());
        Ok(())
    }

    /// Add raw key bytes as the newest key. No validation is performed.
    pub fn add_bin_key(&self, key: impl Into<Vec<u8>>) {
        self.add_key_at(Key::from_bytes(key), Utc::now());
    }

    /// Generate a random key, add it as the newest key and return it so the
    /// caller can export it.
    pub fn generate_key(&self) -> Result<Key> {
        let key = Key::generate()?;
        self.add_key_at(key.clone(), Utc::now());
        tracing::info!(key_count = self.key_count(), "generated keychain key");
        Ok(key)
    }

    /// Add a key as the newest key, recording when it was added.
    ///
    /// The retention policy is applied as part of the insertion.
    pub fn add_key_at(&self, key: Key, added_at: DateTime<Utc>) {
        let mut entries = self.write();
        let mut next = Vec::with_capacity(entries.len() + 1);
        next.push(Entry { key, added_at });
        next.extend(entries.iter().cloned());
        let evicted = retain(&self.retention, &mut next, added_at);
        *entries = next;
        if evicted > 0 {
            tracing::debug!(evicted, key_count = entries.len(), "evicted superseded keys");
        }
    }

    /// Apply the retention policy at `now` and return the number of evicted keys.
    pub fn prune(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.write();
        let mut next = entries.clone();
        let evicted = retain(&self.retention, &mut next, now);
        if evicted > 0 {
            *entries = next;
            tracing::debug!(evicted, key_count = entries.len(), "evicted superseded keys");
        }
        evicted
    }

    /// The newest key, used for every new container or message.
    pub fn bin_key(&self) -> Result<Key> {
        self.read()
            .first()
            .map(|entry| entry.key.clone())
            .ok_or(AuthError::NoKeys)
    }

    /// The newest key, hex-encoded.
    pub fn key_hex(&self) -> Result<String> {
        self.bin_key().map(|key| key.to_hex())
    }

    /// Find the key `signed` was signed with.
    ///
    /// Keys are tried newest first and the first one whose MAC verifies is
    /// returned.
    ///
    /// # Errors
    ///
    /// - [`AuthError::NoKeys`] if the keychain is empty
    /// - [`AuthError::NoMatchingKey`] if no key verifies the signature
    /// - any error raised while rendering the message or its signature
    pub fn match_key<S: Signed + ?Sized>(&self, signed: &S) -> Result<Key> {
        let entries = self.read();
        if entries.is_empty() {
            return Err(AuthError::NoKeys);
        }
        for entry in entries.iter() {
            if is_authentic(signed, entry.key.as_bytes())? {
                return Ok(entry.key.clone());
            }
        }
        Err(AuthError::NoMatchingKey)
    }
}

impl Default for Keychain {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Keychain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keychain")
            .field("key_count", &self.key_count())
            .field("retention", &self.retention)
            .finish()
    }
}

/// Drop entries the policy no longer retains; returns how many were dropped.
fn retain(policy: &RetentionPolicy, entries: &mut Vec<Entry>, now: DateTime<Utc>) -> usize {
    let before = entries.len();
    let superseded: Vec<Option<DateTime<Utc>>> = (0..entries.len())
        .map(|i| i.checked_sub(1).map(|prev| entries[prev].added_at))
        .collect();
    let mut position = 0;
    entries.retain(|_| {
        let keep = policy.retains(position, superseded[position], now);
        position += 1;
        keep
    });
    before - entries.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing::{hmac, HashAlgorithm, Signable};
    use chrono::Duration;
    use std::borrow::Cow;

    struct TestMsg {
        msg: Vec<u8>,
        key: Vec<u8>,
    }

    impl TestMsg {
        fn new(msg: &[u8], key: &[u8]) -> Self {
            Self {
                msg: msg.to_vec(),
                key: key.to_vec(),
            }
        }
    }

    impl Signable for TestMsg {
        fn message(&self) -> Result<Vec<u8>> {
            Ok(self.msg.clone())
        }

        fn hash_algorithm(&self) -> HashAlgorithm {
            HashAlgorithm::Sha256
        }
    }

    impl Signed for TestMsg {
        fn signature(&self) -> Result<Cow<'_, [u8]>> {
            hmac(HashAlgorithm::Sha256, &self.key, &self.msg).map(Cow::Owned)
        }
    }

    #[test]
    fn test_empty_keychain() {
        let keychain = Keychain::new();
        assert_eq!(keychain.key_count(), 0);
        assert!(matches!(keychain.bin_key(), Err(AuthError::NoKeys)));
        assert!(matches!(keychain.key_hex(), Err(AuthError::NoKeys)));
        let msg = TestMsg::new(b"test", b"key");
        assert!(matches!(keychain.match_key(&msg), Err(AuthError::NoKeys)));
    }

    #[test]
    fn test_add_hex_then_binary_key() {
        let keychain = Keychain::new();
        keychain.add_key("abcdef123456").unwrap();
        assert_eq!(keychain.key_count(), 1);

        let bin = b"acf".to_vec();
        keychain.add_bin_key(bin.clone());
        assert_eq!(keychain.key_count(), 2);

        // the second key takes preference
        assert_eq!(keychain.bin_key().unwrap().as_bytes(), &bin[..]);
        assert_eq!(keychain.key_hex().unwrap(), hex::encode(&bin));
    }

    #[test]
    fn test_invalid_hex_key_rejected() {
        let keychain = Keychain::new();
        assert!(matches!(keychain.add_key("xfg"), Err(AuthError::InvalidKey)));
        assert!(matches!(keychain.add_key("not-hex"), Err(AuthError::InvalidKey)));
        assert_eq!(keychain.key_count(), 0);
    }

    #[test]
    fn test_generate_key() {
        let keychain = Keychain::new();
        let generated = keychain.generate_key().unwrap();
        assert_eq!(generated.len(), DEFAULT_KEY_SIZE);
        assert_eq!(keychain.key_count(), 1);
        assert_eq!(keychain.bin_key().unwrap(), generated);
    }

    #[test]
    fn test_match_key() {
        let keychain = Keychain::new();
        keychain.add_bin_key(b"one".to_vec());
        keychain.add_bin_key(b"two".to_vec());

        let msg = TestMsg::new(b"test", b"key");
        assert!(matches!(
            keychain.match_key(&msg),
            Err(AuthError::NoMatchingKey)
        ));

        keychain.add_bin_key(b"key".to_vec());
        let key = keychain.match_key(&msg).unwrap();
        assert_eq!(key.as_bytes(), b"key");
    }

    #[test]
    fn test_match_key_finds_superseded_key() {
        let keychain = Keychain::new();
        keychain.add_bin_key(b"key".to_vec());
        keychain.add_bin_key(b"newer".to_vec());
        keychain.add_bin_key(b"newest".to_vec());

        let msg = TestMsg::new(b"test", b"key");
        assert_eq!(keychain.match_key(&msg).unwrap().as_bytes(), b"key");
    }

    #[test]
    fn test_keep_latest_evicts_oldest() {
        let keychain = Keychain::with_retention(RetentionPolicy::keep_latest(2));
        keychain.add_bin_key(b"one".to_vec());
        keychain.add_bin_key(b"two".to_vec());
        keychain.add_bin_key(b"three".to_vec());
        assert_eq!(keychain.key_count(), 2);

        let msg = TestMsg::new(b"test", b"one");
        assert!(matches!(
            keychain.match_key(&msg),
            Err(AuthError::NoMatchingKey)
        ));
        let msg = TestMsg::new(b"test", b"two");
        assert!(keychain.match_key(&msg).is_ok());
    }

    #[test]
    fn test_overlap_window_eviction() {
        let keychain = Keychain::with_retention(RetentionPolicy::OverlapWindow { secs: 3600 });
        let start = Utc::now() - Duration::hours(3);
        keychain.add_key_at(Key::from_bytes(b"old".to_vec()), start);
        keychain.add_key_at(Key::from_bytes(b"new".to_vec()), start + Duration::hours(2));
        // "old" was superseded half an hour before "newest" arrives
        keychain.add_key_at(
            Key::from_bytes(b"newest".to_vec()),
            start + Duration::minutes(150),
        );
        assert_eq!(keychain.key_count(), 3);

        // two hours after "newest" superseded "new" both old keys fall out
        let evicted = keychain.prune(start + Duration::minutes(270));
        assert_eq!(evicted, 2);
        assert_eq!(keychain.key_count(), 1);
        assert_eq!(keychain.bin_key().unwrap().as_bytes(), b"newest");
    }

    #[test]
    fn test_prune_never_empties_keychain() {
        let keychain = Keychain::with_retention(RetentionPolicy::OverlapWindow { secs: 1 });
        keychain.add_bin_key(b"only".to_vec());
        assert_eq!(keychain.prune(Utc::now() + Duration::days(365)), 0);
        assert_eq!(keychain.key_count(), 1);
    }

    #[test]
    fn test_key_debug_redacted() {
        let key = Key::from_bytes(b"secret".to_vec());
        let printed = format!("{:?}", key);
        assert!(!printed.contains("secret"));
        assert!(printed.contains("6 bytes"));
    }

    #[test]
    fn test_poisoned_lock_keeps_serving() {
        let keychain = std::sync::Arc::new(Keychain::new());
        keychain.add_bin_key(b"first".to_vec());

        let poisoner = std::sync::Arc::clone(&keychain);
        let result = std::thread::spawn(move || {
            let _guard = poisoner.entries.write().unwrap();
            panic!("poison the keychain lock");
        })
        .join();
        assert!(result.is_err());
        assert!(keychain.entries.is_poisoned());

        assert_eq!(keychain.bin_key().unwrap().as_bytes(), b"first");
        keychain.add_bin_key(b"second".to_vec());
        assert_eq!(keychain.key_count(), 2);
        assert_eq!(keychain.bin_key().unwrap().as_bytes(), b"second");
    }
}
