//! Keychain Retention Policies
//!
//! A keychain only grows when keys are rotated in. The retention policy decides
//! when a superseded key is evicted. The newest key is never evicted, so a
//! keychain that holds at least one key can always issue new containers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default number of keys kept by [`RetentionPolicy::KeepLatest`].
pub const DEFAULT_KEYCHAIN_LEN: usize = 16;

/// Policy for evicting superseded keys.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum RetentionPolicy {
    /// Never evict.
    /// Containers signed with any key ever added keep verifying.
    Unbounded,

    /// Keep the `count` most recently added keys.
    KeepLatest {
        /// Number of keys to keep, including the newest.
        count: usize,
    },

    /// Keep a superseded key while less than `secs` seconds have passed since
    /// its successor was added.
    ///
    /// Pick a window at least as long as the session lifetime, otherwise
    /// rotation invalidates live sessions.
    OverlapWindow {
        /// Overlap in seconds.
        secs: u64,
    },
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::KeepLatest {
            count: DEFAULT_KEYCHAIN_LEN,
        }
    }
}

impl RetentionPolicy {
    /// Create a policy that keeps the latest `count` keys.
    pub fn keep_latest(count: usize) -> Self {
        Self::KeepLatest { count }
    }

    /// Create a policy with an overlap window of `hours` hours.
    pub fn overlap_hours(hours: u64) -> Self {
        Self::OverlapWindow {
            secs: hours.saturating_mul(3600),
        }
    }

    /// Check whether the policy parameters are usable.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::KeepLatest { count: 0 } => {
                Err("key_retention.count must be at least 1".to_string())
            }
            Self::OverlapWindow { secs: 0 } => {
                Err("key_retention.secs must be at least 1".to_string())
            }
            _ => Ok(()),
        }
    }

    /// Decide whether the key at `position` (0 = newest) is kept.
    ///
    /// `superseded_at` is when the next newer key was added; `None` for the
    /// newest key.
    pub fn retains(
        &self,
        position: usize,
        superseded_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(superseded_at) = superseded_at else {
            return true;
        };
        match self {
            Self::Unbounded => true,
            Self::KeepLatest { count } => position < (*count).max(1),
            Self::OverlapWindow { secs } => {
                let elapsed = now.signed_duration_since(superseded_at).num_seconds();
                elapsed < 0 || (elapsed as u64) < *secs
            }
        }
    }
}
