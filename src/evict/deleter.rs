use tracing::debug;

use super::cancel::CancelToken;
use crate::error::EvictError;
use crate::storage::KeyValueStore;

/// Issues bounded multi-key DELETEs and keeps a running total.
pub struct BatchDeleter<'a, S: KeyValueStore + ?Sized> {
    store: &'a S,
    max_batch: usize,
    cancel: CancelToken,
    deleted: u64,
    batches: u64,
}

impl<'a, S: KeyValueStore + ?Sized> BatchDeleter<'a, S> {
    pub fn new(store: &'a S, max_batch: usize) -> Self {
        Self {
            store,
            max_batch: max_batch.max(1),
            cancel: CancelToken::new(),
            deleted: 0,
            batches: 0,
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Deletes `keys` with a single DELETE. Keys that vanished since they were
    /// scanned are not counted. Use [`delete_all`](Self::delete_all) to respect
    /// the batch bound.
    pub async fn delete_batch(&mut self, keys: &[String]) -> Result<u64, EvictError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let removed = self
            .store
            .delete(keys)
            .await
            .map_err(EvictError::DeleteFailed)?;
        self.batches += 1;
        self.deleted += removed;
        debug!(
            "Deleted {}/{} keys (batch {}, total {})",
            removed,
            keys.len(),
            self.batches,
            self.deleted
        );
        Ok(removed)
    }

    /// Splits `keys` into `max_batch` sized chunks and deletes them in order,
    /// stopping at the first failed chunk or once cancelled. Earlier chunks
    /// stay deleted and counted.
    pub async fn delete_all(&mut self, keys: &[String]) -> Result<u64, EvictError> {
        let mut removed = 0;
        for chunk in keys.chunks(self.max_batch) {
            if self.cancel.is_cancelled() {
                return Err(EvictError::Cancelled);
            }
            removed += self.delete_batch(chunk).await?;
        }
        Ok(removed)
    }

    pub fn deleted(&self) -> u64 {
        self.deleted
    }

    pub fn batches(&self) -> u64 {
        self.batches
    }
}
