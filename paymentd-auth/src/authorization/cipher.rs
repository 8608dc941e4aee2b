//! Per-container key derivation and AES-256-CTR encryption.
//!
//! # Security Properties
//!
//! - **Key separation**: the cipher key is derived from the raw signing key
//!   with PBKDF2 and a per-container random salt, so the raw key never keys
//!   the cipher and no two containers share a cipher key.
//! - **Integrity**: CTR mode is malleable on its own. The container MAC over
//!   `timestamp ‖ salt ‖ iv ‖ ciphertext` must verify before [`decrypt`] runs.
//! - **Fresh IVs**: every encryption draws a random 128-bit IV.
//!
//! # Format
//!
//! ```text
//! [16 bytes IV][N bytes ciphertext]
//! ```

use ctr::cipher::{KeyIvInit, StreamCipher};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Sha256, Sha384, Sha512};
use zeroize::Zeroizing;

use crate::signing::HashAlgorithm;
use crate::{AuthError, Result};

type Aes256Ctr = ctr::Ctr128BE<aes::Aes256>;

/// AES block size, also the IV size.
pub const BLOCK_SIZE: usize = 16;

/// Derived key length (AES-256).
pub const DERIVED_KEY_LEN: usize = 32;

/// PBKDF2 iteration count.
pub const PBKDF2_ROUNDS: u32 = 4096;

/// A derived cipher key, wiped on drop.
pub type DerivedKey = Zeroizing<[u8; DERIVED_KEY_LEN]>;

/// Derive the cipher key for one container.
pub fn derive_key(algorithm: HashAlgorithm, key: &[u8], salt: &[u8]) -> DerivedKey {
    let mut derived = Zeroizing::new([0u8; DERIVED_KEY_LEN]);
    match algorithm {
        HashAlgorithm::Sha256 => {
            pbkdf2::pbkdf2_hmac::<Sha256>(key, salt, PBKDF2_ROUNDS, &mut derived[..])
        }
        HashAlgorithm::Sha384 => {
            pbkdf2::pbkdf2_hmac::<Sha384>(key, salt, PBKDF2_ROUNDS, &mut derived[..])
        }
        HashAlgorithm::Sha512 => {
            pbkdf2::pbkdf2_hmac::<Sha512>(key, salt, PBKDF2_ROUNDS, &mut derived[..])
        }
    }
    derived
}

/// Encrypt `plaintext` in place under a fresh random IV and return `iv ‖ ciphertext`.
pub fn encrypt(key: &DerivedKey, mut plaintext: Vec<u8>) -> Result<Vec<u8>> {
    let mut iv = [0u8; BLOCK_SIZE];
    OsRng.try_fill_bytes(&mut iv)?;

    let mut cipher = Aes256Ctr::new_from_slices(&key[..], &iv)
        .map_err(|e| AuthError::Internal(format!("cipher setup: {}", e)))?;
    cipher.apply_keystream(&mut plaintext);

    let mut out = Vec::with_capacity(BLOCK_SIZE + plaintext.len());
    out.extend_from_slice(&iv);
    out.extend_from_slice(&plaintext);
    Ok(out)
}

/// Decrypt `iv ‖ ciphertext`.
///
/// Inputs no longer than one block carry no ciphertext and fail with
/// [`AuthError::Decrypt`].
pub fn decrypt(key: &DerivedKey, data: &[u8]) -> Result<Vec<u8>> {
    if data.len() <= BLOCK_SIZE {
        return Err(AuthError::Decrypt);
    }
    let (iv, ciphertext) = data.split_at(BLOCK_SIZE);

    let mut cipher =
        Aes256Ctr::new_from_slices(&key[..], iv).map_err(|_| AuthError::Decrypt)?;
    let mut plaintext = ciphertext.to_vec();
    cipher.apply_keystream(&mut plaintext);
    Ok(plaintext)
}
