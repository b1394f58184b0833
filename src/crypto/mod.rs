//! Cryptographic primitives for credential material
//!
//! # Algorithms
//!
//! - **Symmetric encryption**: AES-256-GCM (authenticated encryption)
//! - **Request commitments**: HMAC-SHA512, hex or base64 encoded
//!
//! The AES key is derived from the caller's key string by a single SHA-256
//! digest; the GCM nonce is generated fresh per call and prefixed to the
//! ciphertext.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::{engine::general_purpose, Engine};
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256, Sha512};

use crate::types::{KeygateError, Result};

type HmacSha512 = Hmac<Sha512>;

/// Nonce length for AES-256-GCM (12 bytes)
pub const NONCE_LEN: usize = 12;

/// Output encoding for HMAC commitments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacEncoding {
    Hex,
    Base64,
}

// =============================================================================
// Symmetric Encryption
// =============================================================================

/// Derive a 256-bit AES key from an arbitrary-length key string.
fn derive_aes_key(key: &str) -> [u8; 32] {
    let digest = Sha256::digest(key.as_bytes());
    digest.into()
}

/// Encrypt a plaintext under a key string with AES-256-GCM.
///
/// # Returns
///
/// `nonce || ciphertext || tag` - the nonce is fresh per call, so two
/// encryptions of the same plaintext never produce the same output.
pub fn aes256_encrypt(key: &str, plaintext: &[u8]) -> Result<Vec<u8>> {
    let aes_key = derive_aes_key(key);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&aes_key));

    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| KeygateError::Crypto(format!("AES encryption failed: {}", e)))?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt a `nonce || ciphertext || tag` blob produced by [`aes256_encrypt`].
pub fn aes256_decrypt(key: &str, data: &[u8]) -> Result<Vec<u8>> {
    if data.len() <= NONCE_LEN {
        return Err(KeygateError::Crypto("ciphertext too short".into()));
    }

    let aes_key = derive_aes_key(key);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&aes_key));

    let (nonce, ciphertext) = data.split_at(NONCE_LEN);
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| KeygateError::Crypto("AES decryption failed".into()))
}

// =============================================================================
// HMAC Commitments
// =============================================================================

/// Compute an HMAC-SHA512 over `payload` keyed by `secret`.
pub fn hmac_sha512_sign(secret: &str, encoding: MacEncoding, payload: &str) -> String {
    let mut mac =
        <HmacSha512 as Mac>::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(payload.as_bytes());
    let digest = mac.finalize().into_bytes();

    match encoding {
        MacEncoding::Hex => hex::encode(digest),
        MacEncoding::Base64 => general_purpose::STANDARD.encode(digest),
    }
}

/// Verify a candidate HMAC against `payload` keyed by `secret`.
///
/// The candidate is decoded per `encoding` and compared in constant time;
/// a candidate that fails to decode never verifies.
pub fn hmac_sha512_verify(
    secret: &str,
    encoding: MacEncoding,
    payload: &str,
    candidate: &str,
) -> bool {
    let decoded = match encoding {
        MacEncoding::Hex => hex::decode(candidate).ok(),
        MacEncoding::Base64 => general_purpose::STANDARD.decode(candidate).ok(),
    };

    let Some(candidate_bytes) = decoded else {
        return false;
    };

    let mut mac =
        <HmacSha512 as Mac>::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(payload.as_bytes());
    mac.verify_slice(&candidate_bytes).is_ok()
}

// =============================================================================
// Tests
// =============================================================================
