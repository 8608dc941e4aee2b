//! Configuration for the credential layer.
//!
//! Every field has a default, so an empty JSON object is a valid
//! configuration:
//!
//! ```
//! use paymentd_auth::AuthConfig;
//!
//! let config = AuthConfig::from_reader(r#"{"auth_keys": ["abcdef"]}"#.as_bytes())?;
//! assert_eq!(config.session_lifetime_secs, 900);
//! assert_eq!(config.max_msg_size, 4096);
//! # Ok::<(), paymentd_auth::AuthError>(())
//! ```

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::authorization::MAX_MSG_SIZE;
use crate::keychain::{Key, Keychain, RetentionPolicy};
use crate::session::{SessionConfig, DEFAULT_SESSION_LIFETIME_SECS};
use crate::signing::HashAlgorithm;
use crate::{AuthError, Result};

/// Largest accepted `max_msg_size`.
pub const MAX_MSG_SIZE_LIMIT: usize = 1 << 20;

/// Default freshness window for signed API requests in seconds.
pub const DEFAULT_REQUEST_MAX_AGE_SECS: u64 = 60;

/// Session cookie settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieConfig {
    /// Accept the session token from the cookie when no header is present.
    #[serde(default)]
    pub allow_cookie_auth: bool,

    #[serde(default = "default_true")]
    pub http_only: bool,

    #[serde(default)]
    pub secure: bool,

    /// Cookie path, the admin API service path.
    #[serde(default = "default_cookie_path")]
    pub path: String,
}

fn default_true() -> bool {
    true
}

fn default_cookie_path() -> String {
    "/v1".to_string()
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            allow_cookie_auth: false,
            http_only: true,
            secure: false,
            path: default_cookie_path(),
        }
    }
}

/// Credential layer configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Hex-encoded keychain seeds. The last entry becomes the newest key.
    #[serde(default)]
    pub auth_keys: Vec<String>,

    /// Hash for session container MACs and key derivation.
    #[serde(default)]
    pub hash: HashAlgorithm,

    /// Lifetime of issued session tokens in seconds.
    #[serde(default = "default_session_lifetime")]
    pub session_lifetime_secs: u64,

    /// Maximum compressed payload size of a session container.
    #[serde(default = "default_max_msg_size")]
    pub max_msg_size: usize,

    /// Keychain eviction policy.
    #[serde(default)]
    pub key_retention: RetentionPolicy,

    /// Freshness window for signed API requests in seconds.
    #[serde(default = "default_request_max_age")]
    pub request_max_age_secs: u64,

    #[serde(default)]
    pub cookie: CookieConfig,
}

fn default_session_lifetime() -> u64 {
    DEFAULT_SESSION_LIFETIME_SECS
}

fn default_max_msg_size() -> usize {
    MAX_MSG_SIZE
}

fn default_request_max_age() -> u64 {
    DEFAULT_REQUEST_MAX_AGE_SECS
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            auth_keys: Vec::new(),
            hash: HashAlgorithm::default(),
            session_lifetime_secs: default_session_lifetime(),
            max_msg_size: default_max_msg_size(),
            key_retention: RetentionPolicy::default(),
            request_max_age_secs: default_request_max_age(),
            cookie: CookieConfig::default(),
        }
    }
}

impl AuthConfig {
    /// Load a JSON configuration and validate it.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let config: Self = serde_json::from_reader(reader)
            .map_err(|e| AuthError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file and validate it.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| AuthError::Config(format!("cannot open {}: {}", path.display(), e)))?;
        tracing::debug!(path = %path.display(), "loading auth configuration");
        Self::from_reader(BufReader::new(file))
    }

    /// Add a hex key seed.
    pub fn with_key(mut self, hex_key: impl Into<String>) -> Self {
        self.auth_keys.push(hex_key.into());
        self
    }

    /// Set the session lifetime.
    pub fn with_session_lifetime(mut self, secs: u64) -> Self {
        self.session_lifetime_secs = secs;
        self
    }

    /// Set the keychain retention policy.
    pub fn with_retention(mut self, retention: RetentionPolicy) -> Self {
        self.key_retention = retention;
        self
    }

    /// Check the configuration for unusable values.
    pub fn validate(&self) -> Result<()> {
        if self.session_lifetime_secs == 0 {
            return Err(AuthError::Config(
                "session_lifetime_secs must be at least 1".into(),
            ));
        }
        if self.session_lifetime_secs > i64::MAX as u64 / 1000 {
            return Err(AuthError::Config("session_lifetime_secs is too large".into()));
        }
        if self.max_msg_size == 0 {
            return Err(AuthError::Config("max_msg_size must be at least 1".into()));
        }
        if self.max_msg_size > MAX_MSG_SIZE_LIMIT {
            return Err(AuthError::Config(format!(
                "max_msg_size must be at most {}",
                MAX_MSG_SIZE_LIMIT
            )));
        }
        if self.request_max_age_secs == 0 {
            return Err(AuthError::Config(
                "request_max_age_secs must be at least 1".into(),
            ));
        }
        self.key_retention.validate().map_err(AuthError::Config)?;
        for (i, key) in self.auth_keys.iter().enumerate() {
            Key::from_hex(key)
                .map_err(|_| AuthError::Config(format!("auth_keys[{}] is not valid hex", i)))?;
        }
        Ok(())
    }

    /// Session settings derived from this configuration.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            lifetime: i64::try_from(self.session_lifetime_secs)
                .ok()
                .and_then(Duration::try_seconds)
                .unwrap_or(Duration::MAX),
            hash: self.hash,
            max_msg_size: self.max_msg_size,
            cookie: self.cookie.clone(),
        }
    }

    /// Seed a keychain from `auth_keys`.
    ///
    /// Without configured keys a key is generated; its hex form is returned so
    /// an operator can persist it. Sessions issued with a generated key do not
    /// survive a restart.
    pub fn build_keychain(&self) -> Result<(Keychain, Option<String>)> {
        let keychain = Keychain::with_retention(self.key_retention.clone());
        for key in &self.auth_keys {
            keychain.add_key(key)?;
        }
        if keychain.key_count() > 0 {
            tracing::info!(key_count = keychain.key_count(), "keychain seeded from configuration");
            return Ok((keychain, None));
        }
        let generated = keychain.generate_key()?;
        tracing::info!("no auth keys configured, generated a keychain key");
        Ok((keychain, Some(generated.to_hex())))
    }
}
