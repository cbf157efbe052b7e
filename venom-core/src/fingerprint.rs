//! Configuration fingerprinting.
//!
//! A BLAKE3 hash of the canonical JSON form of an [`EngineConfig`]. Reports
//! carry it so two runs can be checked for identical engine settings.

use crate::config::EngineConfig;

/// Hex-encoded BLAKE3 hash of the config's JSON serialization.
///
/// Struct fields serialize in declaration order, so equal configs always
/// hash equal.
pub fn config_hash(config: &EngineConfig) -> Result<String, serde_json::Error> {
    let json = serde_json::to_vec(config)?;
    Ok(blake3::hash(&json).to_hex().to_string())
}

/// First 12 hex characters of a hash, for log lines and report headers.
pub fn short_hash(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}
