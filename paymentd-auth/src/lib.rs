//! # paymentd credential layer
//!
//! Symmetric credentials shared by the paymentd services:
//!
//! - a rotating [`Keychain`] of trusted keys, newest first
//! - the [`Signable`]/[`Signed`] contract and HMAC [`sign`]/[`is_authentic`]
//! - the [`Authorization`] container: expiring, encrypted, signed claims
//! - [`CanonicalMessage`] for deterministic MAC input of API messages
//! - [`Nonce`] generation and a pluggable [`NonceStore`]
//! - [`SessionAuthority`] for admin session tokens
//!
//! ## Security Model
//!
//! - MACs are compared in constant time
//! - Container cipher keys are derived per container (PBKDF2, random salt)
//! - Authentication failures collapse into [`AuthError::Unauthorized`]
//! - Key material is zeroized on drop and never logged

pub mod authorization;
pub mod canonical;
pub mod config;
pub mod errors;
pub mod keychain;
pub mod nonce;
pub mod session;
pub mod signing;

pub use authorization::{Authorization, Payload, MAX_MSG_SIZE};
pub use canonical::CanonicalMessage;
pub use config::{AuthConfig, CookieConfig, DEFAULT_REQUEST_MAX_AGE_SECS, MAX_MSG_SIZE_LIMIT};
pub use errors::{AuthError, AuthErrorCode, Result};
pub use keychain::{Key, Keychain, RetentionPolicy, DEFAULT_KEY_SIZE};
pub use nonce::{InMemoryNonceStore, Nonce, NonceStore, NONCE_LEN};
pub use session::{
    Claims, IssuedSession, SessionAuthority, SessionConfig, AUTH_COOKIE_NAME, AUTH_USER_ID_KEY,
    SYSTEM_USER_ID,
};
pub use signing::{constant_time_eq, hmac, is_authentic, sign, HashAlgorithm, Signable, Signed};
