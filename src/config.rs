//! Configuration for Keygate
//!
//! Environment-driven settings for credential issuance and request
//! verification. The embedding process owns argument parsing; this module
//! only reads the environment.

use std::time::Duration;

use crate::types::{KeygateError, Result};

/// Keygate configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server-wide master secret used to derive per-prefix cipher keys
    pub master_secret: String,
    /// TTL applied to secrets, signatures and issued tokens
    pub token_ttl: Duration,
    /// Fixed audience claim stamped into every issued token
    pub token_audience: String,
    /// RSA modulus size in bits for generated keypairs
    pub rsa_modulus_bits: usize,
    /// Deadline for a single cache round-trip
    pub cache_op_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            master_secret: String::new(),
            token_ttl: Duration::from_secs(600),
            token_audience: "keygate".to_string(),
            rsa_modulus_bits: 4096,
            cache_op_timeout: Duration::from_secs(2),
        }
    }
}

impl Config {
    /// Create config from environment or defaults
    pub fn from_env() -> Self {
        let master_secret = std::env::var("KEYGATE_MASTER_SECRET").unwrap_or_default();

        let token_ttl_secs = std::env::var("KEYGATE_TOKEN_TTL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(600);

        let token_audience = std::env::var("KEYGATE_TOKEN_AUDIENCE")
            .unwrap_or_else(|_| "keygate".to_string());

        let rsa_modulus_bits = std::env::var("KEYGATE_RSA_MODULUS_BITS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(4096);

        let cache_op_timeout_ms = std::env::var("KEYGATE_CACHE_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(2000);

        Self {
            master_secret,
            token_ttl: Duration::from_secs(token_ttl_secs),
            token_audience,
            rsa_modulus_bits,
            cache_op_timeout: Duration::from_millis(cache_op_timeout_ms),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.master_secret.is_empty() {
            return Err(KeygateError::Config(
                "KEYGATE_MASTER_SECRET is required".into(),
            ));
        }

        if self.master_secret.len() < 32 {
            return Err(KeygateError::Config(
                "KEYGATE_MASTER_SECRET must be at least 32 characters".into(),
            ));
        }

        if self.rsa_modulus_bits < 1024 {
            return Err(KeygateError::Config(
                "KEYGATE_RSA_MODULUS_BITS must be at least 1024".into(),
            ));
        }

        if self.token_audience.is_empty() {
            return Err(KeygateError::Config(
                "KEYGATE_TOKEN_AUDIENCE must not be empty".into(),
            ));
        }

        Ok(())
    }
}
