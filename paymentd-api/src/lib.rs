//! # paymentd payment API
//!
//! Messages exchanged between paymentd and the projects it serves. Each one
//! is signed with the project's shared secret over its canonical form; see
//! [`paymentd_auth::CanonicalMessage`].
//!
//! - [`InitPaymentRequest`] / [`InitPaymentResponse`]
//! - [`GetPaymentRequest`]
//! - [`Notification`] for callback URLs
//! - [`RequestVerifier`]: signature, freshness window and nonce checks

pub mod errors;
pub mod json;
pub mod messages;
pub mod project_key;
pub mod verify;

pub use errors::{ApiError, Result};
pub use messages::{
    decimal_amount, AuthenticatedRequest, Confirmation, GetPaymentRequest, InitPaymentRequest,
    InitPaymentResponse, Notification, PaymentInfo, API_HASH, IDENT_MAX_LEN, NOTIFICATION_VERSION,
};
pub use project_key::ProjectKey;
pub use verify::RequestVerifier;
