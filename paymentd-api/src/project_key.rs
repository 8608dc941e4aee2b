//! Per-project API credentials.

use paymentd_auth::{AuthError, Key};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// A project's API key and the shared secret its messages are signed with.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProjectKey {
    pub key: String,
    /// Hex-encoded shared secret.
    pub secret: String,
    pub active: bool,
}

impl ProjectKey {
    pub fn new(key: impl Into<String>, secret_hex: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: secret_hex.into(),
            active: true,
        }
    }

    /// Create an active project key with a random secret.
    pub fn generate(key: impl Into<String>) -> Result<Self, AuthError> {
        let secret = Key::generate()?;
        Ok(Self::new(key, secret.to_hex()))
    }

    /// A key is usable if it is named and active.
    pub fn is_valid(&self) -> bool {
        !self.key.is_empty() && self.active
    }

    /// The binary shared secret.
    pub fn secret_bytes(&self) -> Result<Zeroizing<Vec<u8>>, AuthError> {
        hex::decode(&self.secret)
            .map(Zeroizing::new)
            .map_err(|_| AuthError::InvalidKey)
    }
}

impl std::fmt::Debug for ProjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectKey")
            .field("key", &self.key)
            .field("secret", &"[REDACTED]")
            .field("active", &self.active)
            .finish()
    }
}
