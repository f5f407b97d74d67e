//! Cache store abstraction for provider responses and embeddings.
//!
//! The pipeline treats caching as a performance optimization, never a
//! correctness dependency: every caller logs and swallows cache failures.
//! Keys are namespaced (`s2:search:<hash>`, `<model>:query:<hash>`,
//! `s2:embedding:<paperId>`) so an external key-value store can be shared
//! across deployments. Writes are idempotent upserts; last-write-wins is
//! safe because content for a given key is deterministic.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

// ============================================================================
// Types
// ============================================================================

/// Cache operation failure. Callers log these and continue without caching.
#[derive(Debug, Clone, thiserror::Error)]
#[error("cache operation failed: {0}")]
pub struct CacheError(pub String);

/// Get/set-with-TTL key-value interface.
///
/// The in-process [`InMemoryCache`] is the default; deployments backed by an
/// external store implement this trait instead.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Look up a key. Expired entries read as `None`.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Upsert a value with a TTL.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;
}

/// Cache entry with TTL
#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Instant,
}

impl CacheEntry {
    fn new(value: String, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() > self.expires_at
    }
}

/// Cache statistics
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

// ============================================================================
// In-memory store
// ============================================================================

/// In-process cache store with per-entry TTL and hit/miss counters.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current statistics
    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.lock().await.len(),
        }
    }

    /// Drop expired entries
    pub async fn clear_expired(&self) {
        self.entries
            .lock()
            .await
            .retain(|_, entry| !entry.is_expired());
    }

    /// Drop all entries
    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }
}

#[async_trait]
impl CacheStore for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut entries = self.entries.lock().await;
        let expired = match entries.get(key) {
            Some(entry) if !entry.is_expired() => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(Some(entry.value.clone()));
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            // Lazy expiry
            entries.remove(key);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), CacheEntry::new(value, ttl));
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Deterministic cache key: `<namespace>:<sha256(payload)>`.
pub fn hashed_key(namespace: &str, payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    format!("{}:{:x}", namespace, hasher.finalize())
}

// ============================================================================
// Tests
// ============================================================================
