//! CLI command implementations

pub mod config;
pub mod keygen;
pub mod sign;
pub mod token;

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use paymentd_auth::AuthConfig;

/// Load and validate a configuration file.
pub fn load_config(path: &Path) -> Result<AuthConfig> {
    let config = AuthConfig::from_file(path)
        .with_context(|| format!("loading {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("validating {}", path.display()))?;
    Ok(config)
}

/// Read a file, or stdin for `-`.
pub fn read_input(path: &Path) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    if path == Path::new("-") {
        std::io::stdin().read_to_end(&mut buf)?;
    } else {
        buf = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    }
    Ok(buf)
}
