//! Verification of signed requests from projects.
//!
//! A request is accepted when, in this order:
//!
//! 1. the project key is usable and is the one the request names,
//! 2. the signature verifies under the project secret,
//! 3. the timestamp lies within `max_age` of now (either direction),
//! 4. the nonce has not been seen for this project.
//!
//! The nonce is only consumed after the signature and timestamp checks, so
//! forged or stale requests cannot burn nonces. Every rejection is reported
//! as [`ApiError::Unauthorized`]; the reason is logged at debug level. A
//! request that lacks the fields its signature covers is
//! [`ApiError::Invalid`].

use chrono::{DateTime, Utc};
use paymentd_auth::{is_authentic, AuthConfig, AuthError, NonceStore};
use tracing::debug;

use crate::errors::{ApiError, Result};
use crate::messages::AuthenticatedRequest;
use crate::project_key::ProjectKey;

/// Verifier for signed project requests.
#[derive(Debug)]
pub struct RequestVerifier<S: NonceStore> {
    nonces: S,
    max_age_secs: i64,
}

impl<S: NonceStore> RequestVerifier<S> {
    pub fn new(nonces: S, max_age_secs: u64) -> Self {
        Self {
            nonces,
            max_age_secs: i64::try_from(max_age_secs).unwrap_or(i64::MAX),
        }
    }

    pub fn from_config(nonces: S, config: &AuthConfig) -> Self {
        Self::new(nonces, config.request_max_age_secs)
    }

    pub fn nonce_store(&self) -> &S {
        &self.nonces
    }

    pub fn max_age_secs(&self) -> i64 {
        self.max_age_secs
    }

    pub fn verify<R>(&self, project_key: &ProjectKey, request: &R) -> Result<()>
    where
        R: AuthenticatedRequest + ?Sized,
    {
        self.verify_at(project_key, request, Utc::now())
    }

    pub fn verify_at<R>(&self, project_key: &ProjectKey, request: &R, now: DateTime<Utc>) -> Result<()>
    where
        R: AuthenticatedRequest + ?Sized,
    {
        let scope = request.request_project_key();
        if !project_key.is_valid() {
            debug!(project_key = scope, "project key inactive");
            return Err(ApiError::Unauthorized);
        }
        if project_key.key != scope {
            debug!(project_key = scope, "project key mismatch");
            return Err(ApiError::Unauthorized);
        }

        let secret = project_key.secret_bytes().map_err(|err| {
            debug!(project_key = scope, %err, "unusable project secret");
            ApiError::Unauthorized
        })?;
        match is_authentic(request, &secret) {
            Ok(true) => {}
            Ok(false) => {
                debug!(project_key = scope, "signature mismatch");
                return Err(ApiError::Unauthorized);
            }
            Err(AuthError::Canonical(msg)) => {
                debug!(project_key = scope, %msg, "request cannot be rendered");
                return Err(ApiError::Invalid(msg));
            }
            Err(err) => {
                debug!(project_key = scope, %err, "signature check failed");
                return Err(ApiError::Unauthorized);
            }
        }

        let timestamp = request.timestamp();
        let age = now.timestamp().saturating_sub(timestamp);
        if age.checked_abs().map_or(true, |age| age > self.max_age_secs) {
            let err = AuthError::StaleTimestamp { timestamp };
            debug!(project_key = scope, %err, age, "request rejected");
            return Err(ApiError::Unauthorized);
        }

        let expires_at = timestamp.saturating_add(self.max_age_secs);
        if !self.nonces.check_and_mark(scope, request.nonce(), expires_at)? {
            debug!(project_key = scope, "nonce replayed");
            return Err(ApiError::Unauthorized);
        }
        Ok(())
    }

    /// Forget nonces of requests that can no longer pass the timestamp check.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        Ok(self.nonces.purge_expired(now.timestamp())?)
    }
}
