//! Caching layer for Keygate
//!
//! All credential state (secrets, signatures, tokens, rotated slots) lives in
//! a TTL'd key-value/hash store behind the [`CacheStore`] trait. The bundled
//! [`MemoryStore`] is a DashMap-backed implementation with expiry-on-read.
//!
//! Every round-trip a manager makes against the store goes through
//! [`bounded`], which enforces an explicit deadline and retries once before
//! failing with the distinct `CacheTimeout` error - a timed-out call is never
//! conflated with "not found".

pub mod keys;
pub mod store;

pub use store::{CacheStore, MemoryStore, SetOutcome};

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::types::{KeygateError, Result};

/// Run a cache operation under a deadline, retrying once on timeout.
///
/// The closure is invoked again for the retry so the operation is re-issued
/// from scratch rather than polled past its deadline.
pub async fn bounded<T, F, Fut>(limit: Duration, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, op()).await {
        Ok(result) => result,
        Err(_) => {
            warn!(limit_ms = limit.as_millis() as u64, "cache call timed out, retrying once");
            match tokio::time::timeout(limit, op()).await {
                Ok(result) => result,
                Err(_) => Err(KeygateError::CacheTimeout),
            }
        }
    }
}
