//! Check-and-clear of the trigger key.

use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::trigger::store::{SignalStore, StoreError};

/// Why a detection cycle could not decide.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("failed to get key: {0}")]
    Read(#[source] StoreError),

    /// The key was seen but is still in the store; it will be observed
    /// again on the next cycle.
    #[error("failed to delete key: {0}")]
    Clear(#[source] StoreError),

    #[error("key check cancelled")]
    Cancelled,
}

/// Watches a single well-known key in a [`SignalStore`].
pub struct SignalWatcher {
    store: Arc<dyn SignalStore>,
    key: String,
}

impl SignalWatcher {
    pub fn new(store: Arc<dyn SignalStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// The key being monitored.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns `true` exactly when the key was present, and removes it.
    ///
    /// GET and DEL are separate round trips, so a writer that sets the key
    /// between them has its write consumed together with the first one.
    ///
    /// Each round trip is abandoned when `ctx` is cancelled. A key that was
    /// read but not yet deleted stays in the store.
    pub async fn check(&self, ctx: &CancellationToken) -> Result<bool, CheckError> {
        if ctx.is_cancelled() {
            return Err(CheckError::Cancelled);
        }

        let value = tokio::select! {
            biased;
            _ = ctx.cancelled() => return Err(CheckError::Cancelled),
            value = self.store.get(&self.key) => value.map_err(CheckError::Read)?,
        };
        if value.is_none() {
            return Ok(false);
        }

        tokio::select! {
            biased;
            _ = ctx.cancelled() => Err(CheckError::Cancelled),
            cleared = self.store.delete(&self.key) => {
                cleared.map_err(CheckError::Clear)?;
                Ok(true)
            }
        }
    }
}

impl std::fmt::Debug for SignalWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalWatcher").field("key", &self.key).finish()
    }
}
