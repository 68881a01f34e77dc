//! Signal store abstraction and an in-memory implementation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use futures_util::future::{BoxFuture, FutureExt};
use thiserror::Error;

/// Errors returned by a signal store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Could not open or verify the connection.
    #[error("failed to connect to {addr}: {reason}")]
    Connect { addr: String, reason: String },

    /// The store answered with an error.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// The round trip exceeded its deadline.
    #[error("{op} timed out after {secs} seconds")]
    Timeout { op: &'static str, secs: u64 },
}

/// Minimal key-value surface the watcher needs.
///
/// Values are opaque; only presence matters.
pub trait SignalStore: Send + Sync {
    /// Fetch the value at `key`, `None` when absent.
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Vec<u8>>, StoreError>>;

    /// Remove `key`. Removing an absent key is not an error.
    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<(), StoreError>>;
}

/// Process-local store used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
    reads: AtomicUsize,
    deletes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a value, as an external trigger source would.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.lock().insert(key.into(), value.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    /// Number of `get` calls served.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of `delete` calls served.
    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>> {
        // A poisoned map is still a valid map.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SignalStore for MemoryStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Vec<u8>>, StoreError>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let value = self.lock().get(key).cloned();
        async move { Ok(value) }.boxed()
    }

    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<(), StoreError>> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.lock().remove(key);
        async move { Ok(()) }.boxed()
    }
}
