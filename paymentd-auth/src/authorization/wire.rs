//! Wire codec for authorization containers.
//!
//! ```text
//! base64std( <decimal unix seconds> '|' <salt: 8> <signature: hash size> <iv ‖ ciphertext> )
//! ```
//!
//! The codec only frames bytes. It does not verify or decrypt anything.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use super::cipher::BLOCK_SIZE;
use super::SALT_LEN;
use crate::{AuthError, Result};

const SEPARATOR: u8 = b'|';

/// Longest decimal rendering of an `i64`, sign included.
const MAX_TIMESTAMP_LEN: usize = 20;

/// Raw container fields as read from the wire.
#[derive(Debug)]
pub(crate) struct RawContainer {
    pub timestamp: i64,
    pub salt: [u8; SALT_LEN],
    pub signature: Vec<u8>,
    pub ciphertext: Vec<u8>,
}

pub(crate) fn encode(timestamp: i64, salt: &[u8], signature: &[u8], ciphertext: &[u8]) -> String {
    let ts = timestamp.to_string();
    let mut raw = Vec::with_capacity(ts.len() + 1 + salt.len() + signature.len() + ciphertext.len());
    raw.extend_from_slice(ts.as_bytes());
    raw.push(SEPARATOR);
    raw.extend_from_slice(salt);
    raw.extend_from_slice(signature);
    raw.extend_from_slice(ciphertext);
    STANDARD.encode(raw)
}

/// Upper bound for the base64 length of a container.
pub(crate) fn max_encoded_len(signature_len: usize, max_msg_size: usize) -> usize {
    let raw = (MAX_TIMESTAMP_LEN + 1 + SALT_LEN + BLOCK_SIZE)
        .saturating_add(signature_len)
        .saturating_add(max_msg_size);
    raw.div_ceil(3).saturating_mul(4)
}

pub(crate) fn decode(wire: &str, signature_len: usize, max_msg_size: usize) -> Result<RawContainer> {
    let wire = wire.trim();
    if wire.len() > max_encoded_len(signature_len, max_msg_size) {
        return Err(AuthError::Malformed("container exceeds size limit".into()));
    }
    let raw = STANDARD
        .decode(wire)
        .map_err(|e| AuthError::Malformed(format!("invalid base64: {}", e)))?;

    let sep = raw
        .iter()
        .take(MAX_TIMESTAMP_LEN + 1)
        .position(|b| *b == SEPARATOR)
        .ok_or_else(|| AuthError::Malformed("missing timestamp separator".into()))?;
    let timestamp = std::str::from_utf8(&raw[..sep])
        .ok()
        .and_then(|ts| ts.parse::<i64>().ok())
        .ok_or_else(|| AuthError::Malformed("invalid timestamp".into()))?;

    let rest = &raw[sep + 1..];
    if rest.len() < SALT_LEN + signature_len {
        return Err(AuthError::Malformed("container too short".into()));
    }
    let (salt_bytes, rest) = rest.split_at(SALT_LEN);
    let (signature, ciphertext) = rest.split_at(signature_len);
    if ciphertext.len() > max_msg_size.saturating_add(BLOCK_SIZE) {
        return Err(AuthError::Malformed("ciphertext exceeds size limit".into()));
    }

    let mut salt = [0u8; SALT_LEN];
    salt.copy_from_slice(salt_bytes);
    Ok(RawContainer {
        timestamp,
        salt,
        signature: signature.to_vec(),
        ciphertext: ciphertext.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_wire(raw: &[u8]) -> String {
        STANDARD.encode(raw)
    }

    #[test]
    fn test_encode_decode() {
        let wire = encode(1_400_000_000, b"saltsalt", &[7u8; 32], &[9u8; 40]);
        let raw = decode(&wire, 32, 4096).unwrap();
        assert_eq!(raw.timestamp, 1_400_000_000);
        assert_eq!(&raw.salt, b"saltsalt");
        assert_eq!(raw.signature, vec![7u8; 32]);
        assert_eq!(raw.ciphertext, vec![9u8; 40]);
    }

    #[test]
    fn test_layout() {
        let wire = encode(42, b"ABCDEFGH", b"sig", b"ct");
        let raw = STANDARD.decode(wire).unwrap();
        assert_eq!(raw, b"42|ABCDEFGHsigct");
    }

    #[test]
    fn test_missing_separator() {
        let wire = raw_wire(b"1400000000saltsalt");
        assert!(matches!(decode(&wire, 32, 4096), Err(AuthError::Malformed(_))));
    }

    #[test]
    fn test_invalid_timestamp() {
        let mut raw = b"14x|".to_vec();
        raw.extend_from_slice(&[0u8; 60]);
        assert!(matches!(
            decode(&raw_wire(&raw), 32, 4096),
            Err(AuthError::Malformed(_))
        ));
    }

    #[test]
    fn test_too_short() {
        let mut raw = b"1|".to_vec();
        raw.extend_from_slice(&[0u8; 20]);
        assert!(matches!(
            decode(&raw_wire(&raw), 32, 4096),
            Err(AuthError::Malformed(_))
        ));
    }

    #[test]
    fn test_ciphertext_limit() {
        let wire = encode(1, b"saltsalt", &[0u8; 32], &[0u8; 64 + BLOCK_SIZE + 1]);
        assert!(matches!(decode(&wire, 32, 64), Err(AuthError::Malformed(_))));
        let wire = encode(1, b"saltsalt", &[0u8; 32], &[0u8; 64 + BLOCK_SIZE]);
        assert!(decode(&wire, 32, 64).is_ok());
    }

    #[test]
    fn test_unbounded_limit_does_not_overflow() {
        assert_eq!(max_encoded_len(64, usize::MAX), usize::MAX);
        let wire = encode(1, b"saltsalt", &[0u8; 32], &[0u8; 48]);
        let raw = decode(&wire, 32, usize::MAX).unwrap();
        assert_eq!(raw.ciphertext.len(), 48);
    }

    #[test]
    fn test_not_base64() {
        assert!(matches!(
            decode("not base64!", 32, 4096),
            Err(AuthError::Malformed(_))
        ));
    }
}
