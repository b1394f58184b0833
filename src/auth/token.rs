//! Session-bound bearer tokens
//!
//! Tokens are RS256 JWTs signed with the per-session RSA key. The `key` claim
//! carries an HMAC over the request path/method and the session's payload
//! signature; `jti` is the 32-hex-character prefix of that signature. At most
//! one token is cached per session key at any time - issuance never
//! overwrites a live token.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::auth::secret::SecretMetadata;
use crate::auth::signature::{SignatureManager, SignatureMetadata};
use crate::cache::{bounded, keys, CacheStore};
use crate::config::Config;
use crate::crypto::{self, MacEncoding};
use crate::session::SessionProvider;
use crate::types::{KeygateError, Result};

/// Hex characters of the signature used as the token id.
const TOKEN_ID_LEN: usize = 32;

/// The request attributes a token is bound to.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub path: String,
    pub method: String,
}

impl RequestContext {
    pub fn new(path: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: method.into(),
        }
    }
}

/// Payload stored in an issued token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Hex HMAC-SHA512 over `path.method.signature`
    pub key: String,
    /// Token id: 32-hex-char prefix of the payload signature
    pub jti: String,
    /// Fixed configured audience
    pub aud: String,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Issues and verifies session-bound bearer tokens.
pub struct TokenIssuer {
    store: Arc<dyn CacheStore>,
    signatures: SignatureManager,
    sessions: Arc<dyn SessionProvider>,
    ttl: Duration,
    audience: String,
    op_timeout: Duration,
}

impl TokenIssuer {
    pub fn new(
        store: Arc<dyn CacheStore>,
        sessions: Arc<dyn SessionProvider>,
        config: &Config,
    ) -> Self {
        Self {
            signatures: SignatureManager::new(store.clone(), config),
            store,
            sessions,
            ttl: config.token_ttl,
            audience: config.token_audience.clone(),
            op_timeout: config.cache_op_timeout,
        }
    }

    /// Issue a token bound to `session_key` for the given request.
    ///
    /// A token is cached only when the session exists and no live token is
    /// already cached; a live token is left untouched and the freshly signed
    /// token is still returned, so issuance stays idempotent under session
    /// churn. A missing session with no cached token is `SessionExpired`.
    pub async fn sign(
        &self,
        ctx: &RequestContext,
        session_key: &str,
        body: &serde_json::Value,
    ) -> Result<String> {
        let session_exists = self.sessions.session_exists(session_key).await;
        let token_key = keys::token_key(session_key);
        let token_exists =
            bounded(self.op_timeout, || self.store.exists_string(&token_key)).await?;

        let signature = self.signatures.create_signature(session_key, body).await?;

        let payload = format!(
            "{}.{}.{}",
            ctx.path,
            ctx.method,
            signature.signature_hex.to_lowercase()
        );
        let mac = crypto::hmac_sha512_sign(&signature.cipher_key, MacEncoding::Hex, &payload);

        let now = Utc::now().timestamp() as u64;
        let claims = Claims {
            key: mac,
            jti: token_id(&signature),
            aud: self.audience.clone(),
            iat: now,
            exp: now + self.ttl.as_secs(),
        };

        let encoding_key = EncodingKey::from_rsa_pem(signature.private_key_pem.as_bytes())
            .map_err(|e| KeygateError::Internal(format!("JWT signing key error: {}", e)))?;
        let token = encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
            .map_err(|e| KeygateError::Internal(format!("JWT error: {}", e)))?;

        if session_exists && !token_exists {
            bounded(self.op_timeout, || {
                self.store.set_string_with_ttl(&token_key, self.ttl, &token)
            })
            .await?;
            info!(session_key, ttl_secs = self.ttl.as_secs(), "issued and cached token");
        } else if !session_exists && !token_exists {
            return Err(KeygateError::SessionExpired);
        } else {
            debug!(session_key, "live token already cached, leaving it untouched");
        }

        Ok(token)
    }

    /// Verify a token against the cached credentials for `session_key`.
    ///
    /// Missing cache entries are verification failures; there is no fallback
    /// generation. Returns the session key on success.
    pub async fn verify(&self, session_key: &str, token: &str) -> Result<String> {
        let secret_key = keys::secret_key(session_key);
        let signature_key = keys::signature_key(session_key);

        let secret_json = bounded(self.op_timeout, || self.store.get_string(&secret_key))
            .await?
            .ok_or(KeygateError::TokenInvalid)?;
        let signature_json = bounded(self.op_timeout, || self.store.get_string(&signature_key))
            .await?
            .ok_or(KeygateError::TokenInvalid)?;

        let secret: SecretMetadata = serde_json::from_str(&secret_json)?;
        let signature: SignatureMetadata = serde_json::from_str(&signature_json)?;

        let decoding_key = DecodingKey::from_rsa_pem(secret.public_key_pem.as_bytes())
            .map_err(|_| KeygateError::TokenInvalid)?;
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[self.audience.as_str()]);

        let data = decode::<Claims>(token, &decoding_key, &validation)
            .map_err(|_| KeygateError::TokenInvalid)?;

        if data.claims.jti != token_id(&signature) {
            return Err(KeygateError::TokenInvalid);
        }

        debug!(session_key, "token verified");
        Ok(session_key.to_string())
    }
}

/// Token id for a signature: its first 32 hex characters.
fn token_id(signature: &SignatureMetadata) -> String {
    let hex = &signature.signature_hex;
    hex[..TOKEN_ID_LEN.min(hex.len())].to_string()
}
