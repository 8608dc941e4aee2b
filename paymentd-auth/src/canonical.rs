//! Canonical message construction for signed API messages.
//!
//! Fields are concatenated without delimiters in a fixed order chosen by the
//! message type. Unset optional fields are omitted entirely, maps are written
//! as `key value` pairs in lexicographic key order and every message ends with
//! its timestamp and nonce.
//!
//! ```
//! use paymentd_auth::CanonicalMessage;
//! use std::collections::HashMap;
//!
//! let metadata: HashMap<String, String> =
//!     [("b".to_string(), "2".to_string()), ("a".to_string(), "1".to_string())].into();
//!
//! let msg = CanonicalMessage::new()
//!     .field("project")
//!     .int(1000)
//!     .optional(None)
//!     .sorted_map(&metadata)
//!     .tail(1400000000, "nonce")
//!     .into_bytes();
//! assert_eq!(msg, b"project1000a1b21400000000nonce");
//! ```

use std::fmt::Display;

/// Builder for a canonical MAC input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalMessage {
    buf: Vec<u8>,
}

impl CanonicalMessage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a required field, even if empty.
    pub fn field(mut self, value: impl AsRef<[u8]>) -> Self {
        self.buf.extend_from_slice(value.as_ref());
        self
    }

    /// Append a required integer in decimal.
    pub fn int(mut self, value: impl Display) -> Self {
        self.buf.extend_from_slice(value.to_string().as_bytes());
        self
    }

    /// Append an optional field; `None` and empty strings are omitted.
    pub fn optional(self, value: Option<&str>) -> Self {
        match value {
            Some(v) if !v.is_empty() => self.field(v),
            _ => self,
        }
    }

    /// Append an optional integer; zero means unset and is omitted.
    pub fn optional_int(self, value: i64) -> Self {
        if value == 0 {
            self
        } else {
            self.int(value)
        }
    }

    /// Append a map as sorted `key value` pairs.
    ///
    /// Iteration order of the input does not matter.
    pub fn sorted_map<'a, K, V, I>(mut self, map: I) -> Self
    where
        I: IntoIterator<Item = (&'a K, &'a V)>,
        K: AsRef<str> + 'a + ?Sized,
        V: AsRef<str> + 'a + ?Sized,
    {
        let mut pairs: Vec<(&str, &str)> = map
            .into_iter()
            .map(|(k, v)| (k.as_ref(), v.as_ref()))
            .collect();
        pairs.sort_unstable();
        for (k, v) in pairs {
            self.buf.extend_from_slice(k.as_bytes());
            self.buf.extend_from_slice(v.as_bytes());
        }
        self
    }

    /// Append the `timestamp nonce` tail every signed message ends with.
    pub fn tail(self, timestamp: i64, nonce: &str) -> Self {
        self.int(timestamp).field(nonce)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}
