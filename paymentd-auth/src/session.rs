//! Admin Session Tokens
//!
//! [`SessionAuthority`] issues [`Authorization`] containers as session tokens
//! and turns presented tokens back into [`Claims`]. Handlers receive the
//! claims as an explicit value; nothing is stashed in shared request state.
//!
//! Every authentication failure surfaces as [`AuthError::Unauthorized`]. The
//! precise reason is only logged at debug level.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use paymentd_auth::{Claims, Keychain, SessionAuthority, SessionConfig};
//!
//! let keychain = Arc::new(Keychain::new());
//! keychain.generate_key()?;
//! let authority = SessionAuthority::new(keychain, SessionConfig::default());
//!
//! let session = authority.issue(Claims::for_user("root"))?;
//! let claims = authority.authenticate(&session.token)?;
//! assert_eq!(claims.user_id(), Some("root"));
//! # Ok::<(), paymentd_auth::AuthError>(())
//! ```

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::authorization::{Authorization, Payload, MAX_MSG_SIZE};
use crate::config::CookieConfig;
use crate::keychain::Keychain;
use crate::signing::HashAlgorithm;
use crate::{AuthError, Result};

/// Claim holding the authenticated user id.
pub const AUTH_USER_ID_KEY: &str = "userID";

/// Cookie carrying the session token.
pub const AUTH_COOKIE_NAME: &str = "auth";

/// The built-in administrative user.
pub const SYSTEM_USER_ID: &str = "root";

/// Default session lifetime in seconds (15 minutes).
pub const DEFAULT_SESSION_LIFETIME_SECS: u64 = 15 * 60;

/// Claims carried by a session token.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Claims(Payload);

impl Claims {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims identifying `user_id`.
    pub fn for_user(user_id: impl Into<String>) -> Self {
        let mut claims = Self::new();
        claims.insert(AUTH_USER_ID_KEY, user_id.into());
        claims
    }

    /// The authenticated user, if the claim is present and a string.
    pub fn user_id(&self) -> Option<&str> {
        self.0.get(AUTH_USER_ID_KEY).and_then(Value::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn as_payload(&self) -> &Payload {
        &self.0
    }

    pub fn into_payload(self) -> Payload {
        self.0
    }
}

impl From<Payload> for Claims {
    fn from(payload: Payload) -> Self {
        Self(payload)
    }
}

/// A freshly issued session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct IssuedSession {
    #[serde(rename = "Authorization")]
    pub token: String,
    #[serde(skip)]
    pub expires_at: DateTime<Utc>,
}

/// Session settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub lifetime: Duration,
    pub hash: HashAlgorithm,
    pub max_msg_size: usize,
    pub cookie: CookieConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            lifetime: Duration::seconds(DEFAULT_SESSION_LIFETIME_SECS as i64),
            hash: HashAlgorithm::default(),
            max_msg_size: MAX_MSG_SIZE,
            cookie: CookieConfig::default(),
        }
    }
}

/// Issues and verifies session tokens against a shared keychain.
#[derive(Debug, Clone)]
pub struct SessionAuthority {
    keychain: Arc<Keychain>,
    config: SessionConfig,
}

impl SessionAuthority {
    pub fn new(keychain: Arc<Keychain>, config: SessionConfig) -> Self {
        Self { keychain, config }
    }

    pub fn keychain(&self) -> &Arc<Keychain> {
        &self.keychain
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Issue a token for `claims`, valid for the configured lifetime.
    pub fn issue(&self, claims: Claims) -> Result<IssuedSession> {
        self.issue_at(claims, Utc::now())
    }

    /// Issue a token as if the current time were `now`.
    ///
    /// # Errors
    ///
    /// Issuing errors are server errors: [`AuthError::NoKeys`],
    /// [`AuthError::MessageTooLarge`] or a failed random source.
    pub fn issue_at(&self, claims: Claims, now: DateTime<Utc>) -> Result<IssuedSession> {
        let mut auth =
            Authorization::new(self.config.hash).with_max_msg_size(self.config.max_msg_size);
        *auth.payload_mut() = claims.into_payload();
        let expires_at = now
            .checked_add_signed(self.config.lifetime)
            .ok_or_else(|| AuthError::Config("session lifetime out of range".into()))?;
        auth.expires(expires_at);

        let key = self.keychain.bin_key()?;
        auth.encode(key.as_bytes())?;

        tracing::debug!(expiry = auth.timestamp(), "issued session token");
        Ok(IssuedSession {
            token: auth.to_wire(),
            expires_at: auth.expiry(),
        })
    }

    /// Re-issue a token for the claims of an authenticated session.
    pub fn refresh(&self, claims: &Claims) -> Result<IssuedSession> {
        self.issue(claims.clone())
    }

    /// Authenticate a presented token.
    pub fn authenticate(&self, token: &str) -> Result<Claims> {
        self.authenticate_at(token, Utc::now())
    }

    /// Authenticate a presented token as if the current time were `now`.
    ///
    /// The token is read, checked for expiry, matched against the keychain
    /// and decrypted. A token without a user id claim is rejected.
    pub fn authenticate_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims> {
        let claims = self.verify(token, now).map_err(|err| {
            tracing::debug!(
                error = %err,
                keys_in_keychain = self.keychain.key_count(),
                "session authentication failed"
            );
            err.collapse()
        })?;
        if claims.user_id().is_none() {
            tracing::debug!("session token without user id claim");
            return Err(AuthError::Unauthorized);
        }
        Ok(claims)
    }

    fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Claims> {
        let auth = Authorization::new(self.config.hash)
            .with_max_msg_size(self.config.max_msg_size)
            .read_wire(token)?;
        if auth.is_expired_at(now) {
            return Err(AuthError::Expired {
                expired_at: auth.timestamp(),
            });
        }
        // an empty keychain cannot accept any token
        let key = self.keychain.match_key(&auth).map_err(|err| match err {
            AuthError::NoKeys => AuthError::Unauthorized,
            other => other,
        })?;
        let mut auth = auth;
        auth.decode(key.as_bytes())?;
        Ok(Claims::from(std::mem::take(auth.payload_mut())))
    }

    /// Pick the token from a request: the `Authorization` header first, then
    /// the session cookie if cookie authentication is allowed.
    pub fn token_from_request<'a>(
        &self,
        header: Option<&'a str>,
        cookie: Option<&'a str>,
    ) -> Option<&'a str> {
        match header.map(str::trim).filter(|h| !h.is_empty()) {
            Some(header) => Some(header),
            None if self.config.cookie.allow_cookie_auth => {
                cookie.map(str::trim).filter(|c| !c.is_empty())
            }
            None => None,
        }
    }

    /// `Set-Cookie` value for an issued session, if cookie authentication is allowed.
    pub fn cookie_for(&self, session: &IssuedSession) -> Option<String> {
        let cookie = &self.config.cookie;
        if !cookie.allow_cookie_auth {
            return None;
        }
        let mut value = format!(
            "{}={}; Path={}; Expires={}",
            AUTH_COOKIE_NAME,
            session.token,
            cookie.path,
            session.expires_at.format("%a, %d %b %Y %H:%M:%S GMT"),
        );
        if cookie.http_only {
            value.push_str("; HttpOnly");
        }
        if cookie.secure {
            value.push_str("; Secure");
        }
        Some(value)
    }
}
