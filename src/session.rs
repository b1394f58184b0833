//! Session collaborator
//!
//! Token issuance only needs to know whether a session identifier is live;
//! session lifecycle is owned elsewhere. [`SessionProvider`] is that boundary,
//! and [`MemorySessionStore`] is an in-memory implementation for embedding
//! and tests.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

/// Boolean-valued session presence check.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn session_exists(&self, key: &str) -> bool;
}

/// In-memory session store with expiration.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: DashMap<String, Instant>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session under the given key.
    pub fn create(&self, key: &str, ttl: Duration) {
        self.sessions.insert(key.to_string(), Instant::now() + ttl);
        debug!(key, ttl_secs = ttl.as_secs(), "session created");
    }

    /// Register a session under a fresh random key and return it.
    pub fn create_anonymous(&self, ttl: Duration) -> String {
        let key = Uuid::new_v4().to_string();
        self.create(&key, ttl);
        key
    }

    /// Drop a session.
    pub fn remove(&self, key: &str) {
        if self.sessions.remove(key).is_some() {
            debug!(key, "session removed");
        }
    }
}

#[async_trait]
impl SessionProvider for MemorySessionStore {
    async fn session_exists(&self, key: &str) -> bool {
        if let Some(expires_at) = self.sessions.get(key) {
            if Instant::now() < *expires_at {
                return true;
            }
            drop(expires_at);
            self.sessions.remove(key);
        }
        false
    }
}
