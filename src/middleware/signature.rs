//! Request signature verification stage
//!
//! Validates an inbound request's declared signature against the user's
//! rotating slot set:
//!
//! headers present -> well formed -> signature metadata found -> slots found
//! -> timestamp valid -> HMAC verified -> pass
//!
//! Any failed transition short-circuits to an Unauthorized outcome. A failed
//! HMAC or slot mismatch is treated as a forgery attempt: the user's entire
//! slot map is purged and the signature headers are stripped from the
//! request, forcing full re-provisioning.

use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose, Engine};
use chrono::{DateTime, Utc};
use hyper::HeaderMap;
use tracing::{debug, warn};

use crate::auth::signature::SignatureMetadata;
use crate::auth::slots::RotatedSignatureSlot;
use crate::cache::{bounded, keys, CacheStore};
use crate::config::Config;
use crate::crypto::{self, MacEncoding};
use crate::types::{KeygateError, Result};

/// Header carrying the base64 HMAC commitment.
pub const HEADER_SIGNATURE: &str = "x-signature";

/// Header carrying the request timestamp (RFC 3339, UTC).
pub const HEADER_TIMESTAMP: &str = "x-timestamp";

/// Verifies inbound request signatures against pre-published rotated slots.
pub struct RequestSignatureVerifier {
    store: Arc<dyn CacheStore>,
    op_timeout: Duration,
}

impl RequestSignatureVerifier {
    pub fn new(store: Arc<dyn CacheStore>, config: &Config) -> Self {
        Self {
            store,
            op_timeout: config.cache_op_timeout,
        }
    }

    /// Run the verification state machine for one request.
    ///
    /// `user_id` is the already-authenticated caller identity. On a detected
    /// forgery the headers are mutated (signature headers stripped) before
    /// the error is returned.
    pub async fn verify(&self, user_id: &str, headers: &mut HeaderMap) -> Result<()> {
        let x_signature = match headers.get(HEADER_SIGNATURE) {
            None => return Err(KeygateError::MissingHeader("X-Signature")),
            Some(value) => value
                .to_str()
                .map_err(|_| KeygateError::MalformedSignature)?
                .to_string(),
        };
        let x_timestamp = match headers.get(HEADER_TIMESTAMP) {
            None => return Err(KeygateError::MissingHeader("X-Timestamp")),
            Some(value) => value
                .to_str()
                .map_err(|_| KeygateError::MalformedTimestamp)?
                .to_string(),
        };

        if x_signature.is_empty() {
            return Err(KeygateError::EmptyHeader("X-Signature"));
        }
        if x_timestamp.is_empty() {
            return Err(KeygateError::EmptyHeader("X-Timestamp"));
        }
        if general_purpose::STANDARD.decode(&x_signature).is_err() {
            return Err(KeygateError::MalformedSignature);
        }
        let timestamp = DateTime::parse_from_rfc3339(&x_timestamp)
            .map_err(|_| KeygateError::MalformedTimestamp)?
            .with_timezone(&Utc);

        let signature_key = keys::signature_key(user_id);
        let signature: SignatureMetadata =
            match bounded(self.op_timeout, || self.store.get_string(&signature_key)).await? {
                Some(json) => serde_json::from_str(&json)?,
                None => return Err(KeygateError::SignatureNotFound),
            };

        let map_key = keys::slots_map_key(user_id);
        let short_field =
            keys::slot_field(&signature.cipher_key, keys::SLOT_FIELD_SHORT).to_string();
        let long_field = keys::slot_field(&signature.cipher_key, keys::SLOT_FIELD_LONG).to_string();

        let (short_exists, short_value, long_exists, long_value) = tokio::join!(
            bounded(self.op_timeout, || {
                self.store.exists_hash_field(&map_key, &short_field)
            }),
            bounded(self.op_timeout, || {
                self.store.get_hash_field(&map_key, &short_field)
            }),
            bounded(self.op_timeout, || {
                self.store.exists_hash_field(&map_key, &long_field)
            }),
            bounded(self.op_timeout, || {
                self.store.get_hash_field(&map_key, &long_field)
            }),
        );

        let (payload_slot, signature_slot) =
            match (short_exists?, short_value?, long_exists?, long_value?) {
                (true, Some(short_json), true, Some(long_json)) => (
                    serde_json::from_str::<RotatedSignatureSlot>(&short_json)?,
                    serde_json::from_str::<RotatedSignatureSlot>(&long_json)?,
                ),
                _ => return Err(KeygateError::SlotNotFound),
            };

        let now = Utc::now();
        if timestamp < now || timestamp > signature_slot.expiry {
            return Err(KeygateError::TimestampExpired);
        }

        let matches_slot = x_signature == signature_slot.signature;
        let hmac_verified = crypto::hmac_sha512_verify(
            &signature.cipher_key,
            MacEncoding::Base64,
            &payload_slot.payload,
            &x_signature,
        );

        if !matches_slot || !hmac_verified {
            warn!(user_id, "request signature rejected, purging rotated slots");
            bounded(self.op_timeout, || self.store.delete_hash_map(&map_key)).await?;
            headers.remove(HEADER_SIGNATURE);
            headers.remove(HEADER_TIMESTAMP);
            return Err(KeygateError::SignatureMismatch);
        }

        debug!(user_id, "request signature verified");
        Ok(())
    }
}
