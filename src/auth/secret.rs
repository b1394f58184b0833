//! Per-prefix RSA keypair generation and caching
//!
//! # Security
//!
//! - The private key is cached only in its passphrase-encrypted PKCS#8 form
//! - The cipher key is derived from the configured master secret plus fresh
//!   randomness, never from the material it protects
//! - Key generation runs on a blocking worker so it cannot stall the executor

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::OsRng;
use rand::RngCore;
use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::RsaPrivateKey;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::cache::{bounded, keys, CacheStore, SetOutcome};
use crate::config::Config;
use crate::crypto;
use crate::types::{KeygateError, Result};

/// Seed length for cipher key derivation (32 bytes)
const CIPHER_SEED_LEN: usize = 32;

/// One RSA keypair plus the symmetric cipher key protecting it.
///
/// Immutable once cached; identical for every caller until TTL expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretMetadata {
    /// Public key, SPKI PEM
    pub public_key_pem: String,
    /// Private key, PKCS#8 PEM encrypted under `cipher_key`
    pub private_key_pem: String,
    /// Hex-encoded symmetric key, reused later as the HMAC secret
    pub cipher_key: String,
}

/// Generates and caches one keypair per logical prefix.
pub struct SecretKeyManager {
    store: Arc<dyn CacheStore>,
    master_secret: String,
    rsa_modulus_bits: usize,
    op_timeout: Duration,
}

impl SecretKeyManager {
    pub fn new(store: Arc<dyn CacheStore>, config: &Config) -> Self {
        Self {
            store,
            master_secret: config.master_secret.clone(),
            rsa_modulus_bits: config.rsa_modulus_bits,
            op_timeout: config.cache_op_timeout,
        }
    }

    /// Load the cached keypair for `prefix`, generating one on first call.
    ///
    /// The prefix is trusted as an opaque cache-key segment. Publication goes
    /// through a conditional set, so concurrent first callers observe exactly
    /// one cached keypair: the loser discards its local material and adopts
    /// the winner's.
    pub async fn create_secret(&self, prefix: &str, ttl: Duration) -> Result<SecretMetadata> {
        let key = keys::secret_key(prefix);

        if let Some(cached) = bounded(self.op_timeout, || self.store.get_string(&key)).await? {
            debug!(prefix, "secret cache hit");
            return Ok(serde_json::from_str(&cached)?);
        }

        let master_secret = self.master_secret.clone();
        let modulus_bits = self.rsa_modulus_bits;
        let generated =
            tokio::task::spawn_blocking(move || generate_secret(&master_secret, modulus_bits))
                .await
                .map_err(|e| {
                    KeygateError::Internal(format!("key generation task failed: {}", e))
                })??;

        let json = serde_json::to_string(&generated)?;
        match bounded(self.op_timeout, || {
            self.store.set_string_if_absent(&key, ttl, &json)
        })
        .await?
        {
            SetOutcome::Inserted => {
                info!(prefix, modulus_bits, "generated new RSA keypair");
                Ok(generated)
            }
            SetOutcome::Existing(winner) => {
                debug!(prefix, "lost secret creation race, adopting cached keypair");
                Ok(serde_json::from_str(&winner)?)
            }
        }
    }
}

/// CPU-bound generation of one keypair and its cipher key.
fn generate_secret(master_secret: &str, modulus_bits: usize) -> Result<SecretMetadata> {
    let mut seed = Zeroizing::new([0u8; CIPHER_SEED_LEN]);
    OsRng.fill_bytes(seed.as_mut());
    let cipher_key = hex::encode(crypto::aes256_encrypt(master_secret, seed.as_ref())?);

    let private_key = RsaPrivateKey::new(&mut OsRng, modulus_bits)
        .map_err(|e| KeygateError::Crypto(format!("RSA key generation failed: {}", e)))?;

    let public_key_pem = private_key
        .to_public_key()
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| KeygateError::Crypto(format!("public key encoding failed: {}", e)))?;

    let private_key_pem = private_key
        .to_pkcs8_encrypted_pem(&mut OsRng, cipher_key.as_bytes(), LineEnding::LF)
        .map_err(|e| KeygateError::Crypto(format!("private key encryption failed: {}", e)))?;

    Ok(SecretMetadata {
        public_key_pem,
        private_key_pem: private_key_pem.to_string(),
        cipher_key,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;

    fn test_config() -> Config {
        Config {
            master_secret: "test-master-secret-at-least-32-chars!!".to_string(),
            rsa_modulus_bits: 1024,
            ..Config::default()
        }
    }

    fn test_manager() -> SecretKeyManager {
        SecretKeyManager::new(Arc::new(MemoryStore::new()), &test_config())
    }

    #[tokio::test]
    async fn test_create_secret_shape() {
        let manager = test_manager();
        let secret = manager
            .create_secret("alice", Duration::from_secs(600))
            .await
            .unwrap();

        assert!(secret.public_key_pem.contains("BEGIN PUBLIC KEY"));
        assert!(secret.private_key_pem.contains("BEGIN ENCRYPTED PRIVATE KEY"));
        assert!(!secret.cipher_key.is_empty());
        assert!(secret.cipher_key.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_create_secret_is_idempotent() {
        let manager = test_manager();
        let ttl = Duration::from_secs(600);

        let first = manager.create_secret("alice", ttl).await.unwrap();
        let second = manager.create_secret("alice", ttl).await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_different_prefixes_get_different_keys() {
        let manager = test_manager();
        let ttl = Duration::from_secs(600);

        let alice = manager.create_secret("alice", ttl).await.unwrap();
        let bob = manager.create_secret("bob", ttl).await.unwrap();

        assert_ne!(alice.cipher_key, bob.cipher_key);
        assert_ne!(alice.public_key_pem, bob.public_key_pem);
    }

    #[tokio::test]
    async fn test_concurrent_creation_converges() {
        let manager = Arc::new(test_manager());
        let ttl = Duration::from_secs(600);

        let (a, b) = tokio::join!(
            manager.create_secret("alice", ttl),
            manager.create_secret("alice", ttl),
        );

        // Both callers observe the same cached keypair
        assert_eq!(a.unwrap(), b.unwrap());
    }
}
