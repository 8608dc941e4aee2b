//! Nonces and replay tracking
//!
//! Signed API messages carry a [`Nonce`]. A [`NonceStore`] remembers which
//! nonces were already accepted so that a captured message cannot be replayed
//! while its timestamp is still fresh.
//!
//! # Security
//!
//! - Nonces come from the OS CSPRNG
//! - Each nonce is accepted at most once per scope
//! - Retention is up to the store; [`InMemoryNonceStore`] keeps a nonce until
//!   its expiry passes and [`NonceStore::purge_expired`] is called

use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::{AuthError, Result};

/// Length of a generated nonce in characters, and the maximum accepted length.
pub const NONCE_LEN: usize = 32;

/// A random per-message value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Nonce(String);

impl Nonce {
    /// Generate a nonce: 32 random bytes, standard base64, first 32 characters.
    pub fn generate() -> Result<Self> {
        let mut bytes = [0u8; NONCE_LEN];
        OsRng.try_fill_bytes(&mut bytes)?;
        let mut encoded = STANDARD.encode(bytes);
        encoded.truncate(NONCE_LEN);
        Ok(Self(encoded))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Nonce {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<Nonce> for String {
    fn from(nonce: Nonce) -> Self {
        nonce.0
    }
}

/// Storage for used nonces.
///
/// Implementations must make [`NonceStore::check_and_mark`] atomic: of two
/// concurrent calls with the same scope and nonce exactly one returns `true`.
pub trait NonceStore: Send + Sync {
    /// Check whether `nonce` is fresh within `scope` and mark it as used.
    ///
    /// Returns `Ok(true)` for a fresh nonce and `Ok(false)` for a replay.
    /// `expires_at` (unix seconds) is when the message carrying the nonce
    /// stops being acceptable anyway.
    fn check_and_mark(&self, scope: &str, nonce: &str, expires_at: i64) -> Result<bool>;

    /// Forget nonces that expired before `before` (unix seconds).
    ///
    /// Returns the number of forgotten nonces.
    fn purge_expired(&self, before: i64) -> Result<usize>;
}

impl<T: NonceStore + ?Sized> NonceStore for std::sync::Arc<T> {
    fn check_and_mark(&self, scope: &str, nonce: &str, expires_at: i64) -> Result<bool> {
        (**self).check_and_mark(scope, nonce, expires_at)
    }

    fn purge_expired(&self, before: i64) -> Result<usize> {
        (**self).purge_expired(before)
    }
}

/// Process-local nonce store.
#[derive(Debug, Default)]
pub struct InMemoryNonceStore {
    // scope -> nonce -> expiry
    used: RwLock<HashMap<String, HashMap<String, i64>>>,
}

impl InMemoryNonceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked nonces across all scopes.
    pub fn count(&self) -> Result<usize> {
        let used = self.used.read().map_err(poisoned)?;
        Ok(used.values().map(HashMap::len).sum())
    }

    /// Check whether a nonce is tracked, without marking it.
    pub fn contains(&self, scope: &str, nonce: &str) -> Result<bool> {
        let used = self.used.read().map_err(poisoned)?;
        Ok(used.get(scope).is_some_and(|nonces| nonces.contains_key(nonce)))
    }
}

impl NonceStore for InMemoryNonceStore {
    fn check_and_mark(&self, scope: &str, nonce: &str, expires_at: i64) -> Result<bool> {
        let mut used = self.used.write().map_err(poisoned)?;
        let nonces = used.entry(scope.to_string()).or_default();
        if nonces.contains_key(nonce) {
            tracing::warn!(scope, "replayed nonce");
            return Ok(false);
        }
        nonces.insert(nonce.to_string(), expires_at);
        Ok(true)
    }

    fn purge_expired(&self, before: i64) -> Result<usize> {
        let mut used = self.used.write().map_err(poisoned)?;
        let mut purged = 0;
        used.retain(|_, nonces| {
            let len = nonces.len();
            nonces.retain(|_, expires_at| *expires_at >= before);
            purged += len - nonces.len();
            !nonces.is_empty()
        });
        if purged > 0 {
            tracing::debug!(purged, "purged expired nonces");
        }
        Ok(purged)
    }
}

fn poisoned<T>(e: std::sync::PoisonError<T>) -> AuthError {
    AuthError::Internal(format!("nonce store lock poisoned: {}", e))
}
