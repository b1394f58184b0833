//! Rotated signature slot provisioning
//!
//! A slot is a pre-published, short-lived HMAC commitment a caller must match
//! to prove request authenticity. Each slot is written under two truncated
//! cipher-key prefixes so a key rotation does not invalidate in-flight
//! requests: the verification stage requires both fields to resolve.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::signature::SignatureMetadata;
use crate::cache::{bounded, keys, CacheStore};
use crate::config::Config;
use crate::crypto::{self, MacEncoding};
use crate::types::Result;

/// A pre-published HMAC commitment with its validity horizon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotatedSignatureSlot {
    /// The payload the commitment was computed over
    pub payload: String,
    /// Base64 HMAC-SHA512 over `payload`, keyed by the cipher key
    pub signature: String,
    /// Instant after which the slot no longer authenticates requests
    pub expiry: DateTime<Utc>,
}

/// Publishes rotated signature slots for the verification stage to consume.
pub struct SlotRotator {
    store: Arc<dyn CacheStore>,
    op_timeout: Duration,
}

impl SlotRotator {
    pub fn new(store: Arc<dyn CacheStore>, config: &Config) -> Self {
        Self {
            store,
            op_timeout: config.cache_op_timeout,
        }
    }

    /// Publish one slot for `user_id` under both truncated cipher-key fields.
    ///
    /// Returns the slot so the caller can hand the commitment to the client.
    pub async fn publish(
        &self,
        user_id: &str,
        signature: &SignatureMetadata,
        payload: &str,
        ttl: Duration,
    ) -> Result<RotatedSignatureSlot> {
        let commitment =
            crypto::hmac_sha512_sign(&signature.cipher_key, MacEncoding::Base64, payload);
        let slot = RotatedSignatureSlot {
            payload: payload.to_string(),
            signature: commitment,
            expiry: Utc::now() + chrono::Duration::seconds(ttl.as_secs() as i64),
        };

        let json = serde_json::to_string(&slot)?;
        let map_key = keys::slots_map_key(user_id);
        for len in [keys::SLOT_FIELD_SHORT, keys::SLOT_FIELD_LONG] {
            let field = keys::slot_field(&signature.cipher_key, len).to_string();
            bounded(self.op_timeout, || {
                self.store.set_hash_field(&map_key, &field, ttl, &json)
            })
            .await?;
        }

        info!(user_id, ttl_secs = ttl.as_secs(), "published rotated signature slots");
        Ok(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;

    fn test_signature() -> SignatureMetadata {
        SignatureMetadata {
            private_key_pem: String::new(),
            signature_hex: "deadbeef".repeat(8),
            cipher_key: "0123456789abcdef0123456789abcdef".to_string(),
        }
    }

    fn test_config() -> Config {
        Config {
            master_secret: "test-master-secret-at-least-32-chars!!".to_string(),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_publish_writes_both_fields() {
        let store = Arc::new(MemoryStore::new());
        let rotator = SlotRotator::new(store.clone(), &test_config());
        let signature = test_signature();

        let slot = rotator
            .publish("user-1", &signature, "commitment-payload", Duration::from_secs(60))
            .await
            .unwrap();

        let short = store
            .get_hash_field("user-1-signatures", "01234")
            .await
            .unwrap()
            .unwrap();
        let long = store
            .get_hash_field("user-1-signatures", "0123456789")
            .await
            .unwrap()
            .unwrap();

        // The same slot lands under both truncated prefixes
        assert_eq!(short, long);
        let stored: RotatedSignatureSlot = serde_json::from_str(&short).unwrap();
        assert_eq!(stored, slot);
    }

    #[tokio::test]
    async fn test_commitment_verifies_under_cipher_key() {
        let store = Arc::new(MemoryStore::new());
        let rotator = SlotRotator::new(store, &test_config());
        let signature = test_signature();

        let slot = rotator
            .publish("user-1", &signature, "commitment-payload", Duration::from_secs(60))
            .await
            .unwrap();

        assert!(crypto::hmac_sha512_verify(
            &signature.cipher_key,
            MacEncoding::Base64,
            &slot.payload,
            &slot.signature,
        ));
    }

    #[tokio::test]
    async fn test_expiry_is_in_the_future() {
        let store = Arc::new(MemoryStore::new());
        let rotator = SlotRotator::new(store, &test_config());

        let slot = rotator
            .publish("user-1", &test_signature(), "p", Duration::from_secs(60))
            .await
            .unwrap();

        assert!(slot.expiry > Utc::now());
    }
}
