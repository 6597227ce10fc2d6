//! Periodic commits of pending graph mutations

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::info;

use crate::error::{IngestError, Result};
use crate::store::GraphStore;

/// Flushes the store every `every` recorded rows, plus once on [`finish`].
///
/// [`finish`]: CommitBatcher::finish
#[derive(Debug)]
pub struct CommitBatcher {
    every: u64,
    processed: AtomicU64,
    flushes: AtomicU64,
}

impl CommitBatcher {
    pub fn new(every: u64) -> Result<Self> {
        if every == 0 {
            return Err(IngestError::Config("commit interval must be at least 1".into()));
        }
        Ok(Self {
            every,
            processed: AtomicU64::new(0),
            flushes: AtomicU64::new(0),
        })
    }

    /// Count one processed row, committing when the interval is reached.
    pub async fn record(&self, store: &dyn GraphStore) -> Result<()> {
        let processed = self.processed.fetch_add(1, Ordering::SeqCst) + 1;
        if processed % self.every == 0 {
            self.flush(store).await?;
            info!(rows = processed, "Processed rows");
        }
        Ok(())
    }

    /// Unconditional last commit.
    pub async fn finish(&self, store: &dyn GraphStore) -> Result<()> {
        self.flush(store).await
    }

    async fn flush(&self, store: &dyn GraphStore) -> Result<()> {
        store.commit_pending().await?;
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::SeqCst)
    }

    pub fn flushes(&self) -> u64 {
        self.flushes.load(Ordering::SeqCst)
    }
}
