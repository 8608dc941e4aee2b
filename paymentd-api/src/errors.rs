//! Error types for the payment API layer.

use paymentd_auth::AuthError;

/// Error type for payment API message handling.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request is malformed or misses required fields.
    #[error("invalid request: {0}")]
    Invalid(String),

    /// The request could not be authenticated. The reason is only logged.
    #[error("unauthorized")]
    Unauthorized,

    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl ApiError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }

    /// Returns true if the error means "the request is not authentic".
    pub fn is_unauthorized(&self) -> bool {
        match self {
            Self::Unauthorized => true,
            Self::Auth(err) => err.is_unauthorized(),
            Self::Invalid(_) => false,
        }
    }

    /// HTTP status a service should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Invalid(_) => 400,
            Self::Unauthorized => 401,
            Self::Auth(err) => err.http_status(),
        }
    }
}

/// Result type for payment API operations.
pub type Result<T> = std::result::Result<T, ApiError>;
