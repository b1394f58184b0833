//! Per-prefix RSA payload signatures
//!
//! A signature is derived once per prefix per TTL window and cached together
//! with the decrypted private key handle and the cipher key, which later
//! HMAC operations reuse as their secret.

use std::sync::Arc;
use std::time::Duration;

use rsa::pkcs1v15::{SigningKey, VerifyingKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, LineEnding};
use rsa::sha2::Sha256;
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::auth::secret::{SecretKeyManager, SecretMetadata};
use crate::cache::{bounded, keys, CacheStore, SetOutcome};
use crate::config::Config;
use crate::types::{KeygateError, Result};

/// One RSA-SHA256 signature over a caller-specified payload.
///
/// The private key handle is the decrypted PKCS#8 PEM reconstructed from the
/// secret's encrypted form. Immutable after creation; the cached value wins
/// over any later payload until TTL expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureMetadata {
    /// Decrypted private key, PKCS#8 PEM
    pub private_key_pem: String,
    /// Hex-encoded RSA-SHA256 signature
    pub signature_hex: String,
    /// Cipher key of the owning secret, reused as the HMAC secret
    pub cipher_key: String,
}

/// Derives and caches one payload signature per logical prefix.
pub struct SignatureManager {
    store: Arc<dyn CacheStore>,
    secrets: SecretKeyManager,
    ttl: Duration,
    op_timeout: Duration,
}

impl SignatureManager {
    pub fn new(store: Arc<dyn CacheStore>, config: &Config) -> Self {
        Self {
            secrets: SecretKeyManager::new(store.clone(), config),
            store,
            ttl: config.token_ttl,
            op_timeout: config.cache_op_timeout,
        }
    }

    /// Load the cached signature for `prefix`, deriving one on first call.
    ///
    /// The cached signature is returned for every later call in the TTL
    /// window regardless of `body`: callers must not assume the signature
    /// reflects their own payload after the first call.
    pub async fn create_signature(
        &self,
        prefix: &str,
        body: &serde_json::Value,
    ) -> Result<SignatureMetadata> {
        let key = keys::signature_key(prefix);

        if let Some(cached) = bounded(self.op_timeout, || self.store.get_string(&key)).await? {
            debug!(prefix, "signature cache hit");
            return Ok(serde_json::from_str(&cached)?);
        }

        let secret = self.secrets.create_secret(prefix, self.ttl).await?;
        let payload = serde_json::to_string(body)?;
        let derived = tokio::task::spawn_blocking(move || derive_signature(secret, &payload))
            .await
            .map_err(|e| KeygateError::Internal(format!("signing task failed: {}", e)))??;

        let json = serde_json::to_string(&derived)?;
        match bounded(self.op_timeout, || {
            self.store.set_string_if_absent(&key, self.ttl, &json)
        })
        .await?
        {
            SetOutcome::Inserted => {
                info!(prefix, "derived new payload signature");
                Ok(derived)
            }
            SetOutcome::Existing(winner) => {
                debug!(prefix, "lost signature creation race, adopting cached value");
                Ok(serde_json::from_str(&winner)?)
            }
        }
    }
}

/// CPU-bound signature derivation with immediate self-verification.
///
/// The self-check guards against corrupted key material, not an attacker;
/// failure is fatal for the call.
fn derive_signature(secret: SecretMetadata, payload: &str) -> Result<SignatureMetadata> {
    let private_key = RsaPrivateKey::from_pkcs8_encrypted_pem(
        &secret.private_key_pem,
        secret.cipher_key.as_bytes(),
    )
    .map_err(|e| KeygateError::Crypto(format!("private key decryption failed: {}", e)))?;

    let signing_key = SigningKey::<Sha256>::new(private_key.clone());
    let signature = signing_key
        .try_sign(payload.as_bytes())
        .map_err(|e| KeygateError::Crypto(format!("RSA signing failed: {}", e)))?;

    let public_key = RsaPublicKey::from_public_key_pem(&secret.public_key_pem)
        .map_err(|e| KeygateError::Crypto(format!("public key decoding failed: {}", e)))?;
    VerifyingKey::<Sha256>::new(public_key)
        .verify(payload.as_bytes(), &signature)
        .map_err(|_| KeygateError::CredentialVerification)?;

    let private_key_pem = private_key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| KeygateError::Crypto(format!("private key encoding failed: {}", e)))?;

    Ok(SignatureMetadata {
        private_key_pem: private_key_pem.to_string(),
        signature_hex: hex::encode(signature.to_bytes()),
        cipher_key: secret.cipher_key,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use serde_json::json;

    fn test_config() -> Config {
        Config {
            master_secret: "test-master-secret-at-least-32-chars!!".to_string(),
            rsa_modulus_bits: 1024,
            ..Config::default()
        }
    }

    fn test_manager() -> SignatureManager {
        SignatureManager::new(Arc::new(MemoryStore::new()), &test_config())
    }

    #[tokio::test]
    async fn test_create_signature_shape() {
        let manager = test_manager();
        let signature = manager
            .create_signature("alice", &json!({"user": "alice"}))
            .await
            .unwrap();

        assert!(signature.private_key_pem.contains("BEGIN PRIVATE KEY"));
        assert!(!signature.signature_hex.is_empty());
        assert!(signature
            .signature_hex
            .chars()
            .all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_cached_signature_wins_over_new_body() {
        let manager = test_manager();

        let first = manager
            .create_signature("alice", &json!({"n": 1}))
            .await
            .unwrap();
        let second = manager
            .create_signature("alice", &json!({"n": 2}))
            .await
            .unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_signature_references_secret_cipher_key() {
        let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
        let config = test_config();
        let secrets = SecretKeyManager::new(store.clone(), &config);
        let signatures = SignatureManager::new(store, &config);

        let signature = signatures
            .create_signature("alice", &json!({}))
            .await
            .unwrap();
        let secret = secrets
            .create_secret("alice", config.token_ttl)
            .await
            .unwrap();

        assert_eq!(signature.cipher_key, secret.cipher_key);
    }

    #[tokio::test]
    async fn test_different_prefixes_sign_independently() {
        let manager = test_manager();
        let body = json!({"shared": true});

        let alice = manager.create_signature("alice", &body).await.unwrap();
        let bob = manager.create_signature("bob", &body).await.unwrap();

        assert_ne!(alice.signature_hex, bob.signature_hex);
        assert_ne!(alice.cipher_key, bob.cipher_key);
    }
}
