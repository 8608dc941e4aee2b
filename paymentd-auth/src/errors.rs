//! Error types for the credential layer.
//!
//! Every operation returns an [`AuthError`]; nothing in this crate panics on
//! untrusted input. The variants fall into three groups:
//!
//! - configuration or programmer errors (bad key material, empty keychain,
//!   missing randomness), reported as server errors;
//! - authentication failures, which callers must collapse into a single
//!   "unauthorized" outcome before anything reaches a client;
//! - resource limits (an oversized container payload), which point at a caller
//!   bug rather than an attack.

/// Error codes for logs, metrics and API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum AuthErrorCode {
    /// Malformed key material
    InvalidKey = 1000,
    /// Keychain is empty
    NoKeys = 1001,
    /// Invalid configuration
    Config = 1002,
    /// Secure random source failed
    Random = 1003,
    /// Generic authentication failure
    Unauthorized = 3000,
    /// No key in the keychain verifies the signature
    NoMatchingKey = 3001,
    /// Container or request expired
    Expired = 3002,
    /// Ciphertext could not be decrypted
    Decrypt = 3003,
    /// Wire representation is malformed
    Malformed = 3004,
    /// Request timestamp outside the freshness window
    StaleTimestamp = 3005,
    /// Nonce was already used
    ReplayedNonce = 3006,
    /// Payload compression failed
    Compression = 5000,
    /// Payload (de)serialization failed
    Serialization = 5001,
    /// Canonical message could not be built
    Canonical = 5002,
    /// Container payload exceeds the configured limit
    MessageTooLarge = 7000,
    /// Internal/unexpected error
    Internal = 9999,
}

/// Error type for keychain, signing and container operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid key")]
    InvalidKey,

    #[error("no keys in keychain")]
    NoKeys,

    #[error("no matching key for signature")]
    NoMatchingKey,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("secure random source failed: {0}")]
    Random(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("authorization expired at {expired_at}")]
    Expired {
        /// Expiry as unix seconds
        expired_at: i64,
    },

    #[error("error decrypting container")]
    Decrypt,

    #[error("malformed authorization: {0}")]
    Malformed(String),

    #[error("request timestamp {timestamp} outside of the accepted window")]
    StaleTimestamp {
        /// Timestamp carried by the request (unix seconds)
        timestamp: i64,
    },

    #[error("nonce already used")]
    ReplayedNonce,

    #[error("compression error: {0}")]
    Compression(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("cannot build canonical message: {0}")]
    Canonical(String),

    #[error("message too big: {size} bytes exceeds limit of {limit}")]
    MessageTooLarge {
        /// Compressed payload size
        size: usize,
        /// Configured maximum
        limit: usize,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Get the numeric error code.
    pub fn code(&self) -> AuthErrorCode {
        match self {
            Self::InvalidKey => AuthErrorCode::InvalidKey,
            Self::NoKeys => AuthErrorCode::NoKeys,
            Self::NoMatchingKey => AuthErrorCode::NoMatchingKey,
            Self::Config(_) => AuthErrorCode::Config,
            Self::Random(_) => AuthErrorCode::Random,
            Self::Unauthorized => AuthErrorCode::Unauthorized,
            Self::Expired { .. } => AuthErrorCode::Expired,
            Self::Decrypt => AuthErrorCode::Decrypt,
            Self::Malformed(_) => AuthErrorCode::Malformed,
            Self::StaleTimestamp { .. } => AuthErrorCode::StaleTimestamp,
            Self::ReplayedNonce => AuthErrorCode::ReplayedNonce,
            Self::Compression(_) => AuthErrorCode::Compression,
            Self::Serialization(_) => AuthErrorCode::Serialization,
            Self::Canonical(_) => AuthErrorCode::Canonical,
            Self::MessageTooLarge { .. } => AuthErrorCode::MessageTooLarge,
            Self::Internal(_) => AuthErrorCode::Internal,
        }
    }

    /// Returns true if this error means "the presented credential is not
    /// acceptable".
    ///
    /// Decoding failures of untrusted containers (compression, JSON) count as
    /// authentication failures. `NoKeys` does not: an empty keychain is a
    /// server fault.
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            Self::Unauthorized
                | Self::NoMatchingKey
                | Self::Expired { .. }
                | Self::Decrypt
                | Self::Malformed(_)
                | Self::StaleTimestamp { .. }
                | Self::ReplayedNonce
                | Self::Compression(_)
                | Self::Serialization(_)
        )
    }

    /// Collapse any authentication failure into [`AuthError::Unauthorized`].
    ///
    /// Other errors are passed through unchanged.
    pub fn collapse(self) -> Self {
        if self.is_unauthorized() {
            Self::Unauthorized
        } else {
            self
        }
    }

    /// HTTP status a service should answer with.
    ///
    /// Oversized payloads map to 500 because they originate from trusted
    /// server state; handlers that build containers from client input should
    /// answer 400 instead.
    pub fn http_status(&self) -> u16 {
        if self.is_unauthorized() {
            401
        } else {
            500
        }
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<rand::Error> for AuthError {
    fn from(err: rand::Error) -> Self {
        Self::Random(err.to_string())
    }
}

/// Result type for credential operations.
pub type Result<T> = std::result::Result<T, AuthError>;
