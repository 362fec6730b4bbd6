use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Reads and parses a configuration file without validating it
///
/// Missing sections and keys take their defaults, so an empty file is a
/// valid configuration. Use this when further overrides will be applied
/// before [`validate`] runs.
pub fn read_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    Ok(config)
}

/// Loads, parses and validates a configuration file
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use steam_harvest::config::load_config;
///
/// let config = load_config(Path::new("harvest.toml")).unwrap();
/// println!("Pause: {}s", config.http.pause_secs);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let config = read_config(path)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the effective configuration
///
/// The configuration is re-serialized to TOML first, so the hash covers CLI
/// overrides and defaults as well as whatever was in the file. Runs record
/// it in the ledger to tell apart runs made with different settings.
pub fn compute_config_hash(config: &Config) -> Result<String, ConfigError> {
    let content = toml::to_string(config)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}
