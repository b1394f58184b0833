//! Keygate - session-bound credential issuance and request signature verification
//!
//! Keygate issues RS256 bearer tokens backed by per-session RSA key material
//! and verifies per-request message signatures against a rotating set of
//! pre-published HMAC slots. All credential state lives in a TTL'd
//! key-value/hash cache; nothing is held on the managers between calls.

pub mod auth;
pub mod cache;
pub mod config;
pub mod crypto;
pub mod middleware;
pub mod session;
pub mod types;

pub use auth::{
    Claims, RequestContext, RotatedSignatureSlot, SecretKeyManager, SecretMetadata,
    SignatureManager, SignatureMetadata, SlotRotator, TokenIssuer,
};
pub use cache::{CacheStore, MemoryStore, SetOutcome};
pub use config::Config;
pub use middleware::RequestSignatureVerifier;
pub use session::{MemorySessionStore, SessionProvider};
pub use types::{KeygateError, Result};
