//! Authorization Container
//!
//! An [`Authorization`] carries arbitrary claims between services that share a
//! [`Keychain`](crate::Keychain). The claims are JSON-encoded, gzip-compressed,
//! encrypted with a per-container derived key and signed with the raw key.
//!
//! # Lifecycle
//!
//! Issuing:
//!
//! 1. [`Authorization::new`], fill the payload, set [`Authorization::expires`]
//! 2. [`Authorization::encode`] with the newest keychain key
//! 3. [`Authorization::to_wire`]
//!
//! Verifying:
//!
//! 1. [`Authorization::from_wire`]
//! 2. reject if [`Authorization::is_expired_at`]
//! 3. [`Keychain::match_key`](crate::Keychain::match_key)
//! 4. [`Authorization::decode`] with the matched key
//!
//! Decoding an expired but correctly signed container succeeds; expiry is a
//! policy check layered on top.
//!
//! # Example
//!
//! ```
//! use paymentd_auth::{Authorization, HashAlgorithm, Keychain};
//! use chrono::{Duration, Utc};
//!
//! let keychain = Keychain::new();
//! keychain.generate_key()?;
//!
//! let mut auth = Authorization::new(HashAlgorithm::Sha256);
//! auth.insert("userID", "root");
//! auth.expires(Utc::now() + Duration::minutes(15));
//! auth.encode(keychain.bin_key()?.as_bytes())?;
//! let wire = auth.to_wire();
//!
//! let mut received = Authorization::from_wire(&wire, HashAlgorithm::Sha256)?;
//! assert!(!received.is_expired_at(Utc::now()));
//! let key = keychain.match_key(&received)?;
//! received.decode(key.as_bytes())?;
//! assert_eq!(received.payload()["userID"], "root");
//! # Ok::<(), paymentd_auth::AuthError>(())
//! ```

pub mod cipher;
mod wire;

use std::borrow::Cow;
use std::io::{Read, Write};

use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use rand::rngs::OsRng;
use rand::RngCore;
use serde_json::Value;

use crate::signing::{sign, HashAlgorithm, Signable, Signed};
use crate::{AuthError, Result};

/// Default maximum size of the compressed payload.
pub const MAX_MSG_SIZE: usize = 4096;

/// Salt length in bytes.
pub const SALT_LEN: usize = 8;

/// Decompressed payloads may be at most this many times `max_msg_size`.
const DECOMPRESSION_FACTOR: usize = 16;

/// Container claims.
pub type Payload = serde_json::Map<String, Value>;

/// An encrypted, signed, expiring claims container.
#[derive(Clone)]
pub struct Authorization {
    timestamp: i64,
    salt: [u8; SALT_LEN],
    signature: Vec<u8>,
    ciphertext: Vec<u8>,
    payload: Payload,
    hash: HashAlgorithm,
    max_msg_size: usize,
}

impl Authorization {
    /// Create an empty container signed and keyed with `hash`.
    pub fn new(hash: HashAlgorithm) -> Self {
        Self {
            timestamp: 0,
            salt: [0u8; SALT_LEN],
            signature: vec![0u8; hash.output_size()],
            ciphertext: Vec::new(),
            payload: Payload::new(),
            hash,
            max_msg_size: MAX_MSG_SIZE,
        }
    }

    /// Override the maximum compressed payload size.
    pub fn with_max_msg_size(mut self, max_msg_size: usize) -> Self {
        self.max_msg_size = max_msg_size;
        self
    }

    /// Parse a container from its wire representation, using the default size limit.
    ///
    /// The payload stays empty until [`Authorization::decode`] is called.
    pub fn from_wire(wire: &str, hash: HashAlgorithm) -> Result<Self> {
        Self::new(hash).read_wire(wire)
    }

    /// Parse `wire` into this container, keeping its hash and size limit.
    pub fn read_wire(mut self, wire: &str) -> Result<Self> {
        let raw = wire::decode(wire, self.hash.output_size(), self.max_msg_size)?;
        self.timestamp = raw.timestamp;
        self.salt = raw.salt;
        self.signature = raw.signature;
        self.ciphertext = raw.ciphertext;
        self.payload.clear();
        Ok(self)
    }

    /// Read a container from `reader`.
    ///
    /// At most the largest valid wire length is read; longer inputs fail.
    pub fn read_from<R: Read>(reader: R, hash: HashAlgorithm) -> Result<Self> {
        let auth = Self::new(hash);
        let limit = wire::max_encoded_len(hash.output_size(), auth.max_msg_size);
        let mut wire = String::new();
        reader
            .take((limit as u64).saturating_add(1))
            .read_to_string(&mut wire)
            .map_err(|e| AuthError::Malformed(format!("read error: {}", e)))?;
        auth.read_wire(&wire)
    }

    /// Wire representation. Call [`Authorization::encode`] first.
    pub fn to_wire(&self) -> String {
        wire::encode(self.timestamp, &self.salt, &self.signature, &self.ciphertext)
    }

    /// Write the wire representation to `writer`, returning the bytes written.
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<usize> {
        let wire = self.to_wire();
        writer
            .write_all(wire.as_bytes())
            .map_err(|e| AuthError::Internal(format!("write error: {}", e)))?;
        Ok(wire.len())
    }

    /// Set the expiry instant. Sub-second precision is dropped.
    pub fn expires(&mut self, at: DateTime<Utc>) {
        self.timestamp = at.timestamp();
    }

    /// The expiry instant.
    ///
    /// Timestamps outside chrono's range map to the earliest representable
    /// instant, so they always count as expired.
    pub fn expiry(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.timestamp, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Raw expiry timestamp in unix seconds.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// A container is expired strictly after its expiry instant.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry() < now
    }

    /// Hash algorithm for the MAC and key derivation.
    pub fn hash_algorithm(&self) -> HashAlgorithm {
        self.hash
    }

    /// Maximum compressed payload size.
    pub fn max_msg_size(&self) -> usize {
        self.max_msg_size
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut Payload {
        &mut self.payload
    }

    /// Insert a claim, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.payload.insert(key.into(), value.into())
    }

    /// Compress, encrypt and sign the payload with `key`.
    ///
    /// Every call draws a new salt and IV, so the same payload never encodes
    /// to the same container twice.
    ///
    /// # Errors
    ///
    /// - [`AuthError::MessageTooLarge`] if the compressed payload exceeds the limit;
    ///   nothing is encrypted in that case
    /// - [`AuthError::Random`] if the random source fails
    pub fn encode(&mut self, key: &[u8]) -> Result<()> {
        let compressed = compress(&self.payload)?;
        if compressed.len() > self.max_msg_size {
            return Err(AuthError::MessageTooLarge {
                size: compressed.len(),
                limit: self.max_msg_size,
            });
        }

        let mut salt = [0u8; SALT_LEN];
        OsRng.try_fill_bytes(&mut salt)?;
        let block_key = cipher::derive_key(self.hash, key, &salt);

        self.salt = salt;
        self.ciphertext = cipher::encrypt(&block_key, compressed)?;
        self.signature = sign(&*self, key)?;
        Ok(())
    }

    /// Decrypt and decompress the payload with `key`.
    ///
    /// `key` must be the key the container was signed with, normally the one
    /// returned by [`Keychain::match_key`](crate::Keychain::match_key). The
    /// signature is not checked here.
    pub fn decode(&mut self, key: &[u8]) -> Result<()> {
        let block_key = cipher::derive_key(self.hash, key, &self.salt);
        let compressed = cipher::decrypt(&block_key, &self.ciphertext)?;
        let limit = self.max_msg_size.saturating_mul(DECOMPRESSION_FACTOR);
        self.payload = decompress(&compressed, limit)?;
        Ok(())
    }
}

impl std::fmt::Debug for Authorization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authorization")
            .field("expiry", &self.timestamp)
            .field("hash", &self.hash)
            .field("ciphertext_len", &self.ciphertext.len())
            .field("claims", &self.payload.len())
            .finish()
    }
}

impl Signable for Authorization {
    fn message(&self) -> Result<Vec<u8>> {
        let ts = self.timestamp.to_string();
        let mut msg = Vec::with_capacity(ts.len() + SALT_LEN + self.ciphertext.len());
        msg.extend_from_slice(ts.as_bytes());
        msg.extend_from_slice(&self.salt);
        msg.extend_from_slice(&self.ciphertext);
        Ok(msg)
    }

    fn hash_algorithm(&self) -> HashAlgorithm {
        self.hash
    }
}

impl Signed for Authorization {
    fn signature(&self) -> Result<Cow<'_, [u8]>> {
        Ok(Cow::Borrowed(&self.signature))
    }
}

fn compress(payload: &Payload) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(payload)?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&json)
        .map_err(|e| AuthError::Compression(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| AuthError::Compression(e.to_string()))
}

fn decompress(compressed: &[u8], limit: usize) -> Result<Payload> {
    let mut json = Vec::new();
    GzDecoder::new(compressed)
        .take((limit as u64).saturating_add(1))
        .read_to_end(&mut json)
        .map_err(|e| AuthError::Compression(e.to_string()))?;
    if json.len() > limit {
        return Err(AuthError::Compression(
            "decompressed payload exceeds limit".into(),
        ));
    }
    Ok(serde_json::from_slice(&json)?)
}
