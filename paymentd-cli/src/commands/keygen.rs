//! Keygen command - random keys for `auth_keys` and project secrets

use anyhow::{ensure, Result};
use paymentd_auth::{Key, DEFAULT_KEY_SIZE};

pub fn run(count: usize) -> Result<()> {
    ensure!(count > 0, "count must be at least 1");
    for _ in 0..count {
        println!("{}", Key::generate()?.to_hex());
    }
    tracing::debug!(count, key_size = DEFAULT_KEY_SIZE, "generated keys");
    Ok(())
}
