//! Bounded launcher for ingestion units
//!
//! At most `limit` units run at once. Submitting while the limit is reached
//! waits for any one unit to finish first.

use std::future::Future;

use tokio::task::JoinSet;
use tracing::debug;

use crate::error::{IngestError, Result};

pub struct BoundedScheduler {
    limit: usize,
    units: JoinSet<Result<()>>,
    submitted: u64,
    completed: u64,
    peak_in_flight: usize,
}

impl BoundedScheduler {
    pub fn new(limit: usize) -> Result<Self> {
        if limit == 0 {
            return Err(IngestError::Config("concurrency must be at least 1".into()));
        }
        Ok(Self {
            limit,
            units: JoinSet::new(),
            submitted: 0,
            completed: 0,
            peak_in_flight: 0,
        })
    }

    /// Start `unit` once a slot is free. The first failed unit observed while
    /// waiting is returned; the remaining units are aborted when the scheduler
    /// is dropped.
    pub async fn submit<F>(&mut self, unit: F) -> Result<()>
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        while self.units.len() >= self.limit {
            self.join_one().await?;
        }

        self.units.spawn(unit);
        self.submitted += 1;
        self.peak_in_flight = self.peak_in_flight.max(self.units.len());
        Ok(())
    }

    /// Wait for every submitted unit.
    pub async fn drain(&mut self) -> Result<()> {
        while !self.units.is_empty() {
            self.join_one().await?;
        }
        debug!(completed = self.completed, peak = self.peak_in_flight, "Scheduler drained");
        Ok(())
    }

    async fn join_one(&mut self) -> Result<()> {
        match self.units.join_next().await {
            Some(joined) => {
                joined??;
                self.completed += 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.units.len()
    }

    pub fn submitted(&self) -> u64 {
        self.submitted
    }

    pub fn completed(&self) -> u64 {
        self.completed
    }

    /// Highest number of units observed in flight at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Tracks how many units are running at the same time.
    #[derive(Default)]
    struct Gauge {
        current: AtomicUsize,
        max: AtomicUsize,
    }

    fn unit(gauge: Arc<Gauge>, delay_ms: u64) -> impl Future<Output = Result<()>> + Send + 'static {
        async move {
            let now = gauge.current.fetch_add(1, Ordering::SeqCst) + 1;
            gauge.max.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            gauge.current.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_never_exceeds_limit() {
        let gauge = Arc::new(Gauge::default());
        let mut scheduler = BoundedScheduler::new(3).unwrap();

        for i in 0..25 {
            scheduler.submit(unit(gauge.clone(), 1 + i % 4)).await.unwrap();
            assert!(scheduler.in_flight() <= 3);
        }
        scheduler.drain().await.unwrap();

        assert_eq!(scheduler.submitted(), 25);
        assert_eq!(scheduler.completed(), 25);
        assert_eq!(scheduler.in_flight(), 0);
        assert!(scheduler.peak_in_flight() <= 3);
        assert!(gauge.max.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_limit_of_one_serializes() {
        let gauge = Arc::new(Gauge::default());
        let mut scheduler = BoundedScheduler::new(1).unwrap();

        for _ in 0..5 {
            scheduler.submit(unit(gauge.clone(), 2)).await.unwrap();
        }
        scheduler.drain().await.unwrap();

        assert_eq!(gauge.max.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.completed(), 5);
    }

    async fn failing_unit() -> Result<()> {
        Err(IngestError::Store("boom".into()))
    }

    async fn panicking_unit() -> Result<()> {
        panic!("unit panicked")
    }

    async fn noop_unit() -> Result<()> {
        Ok(())
    }

    #[tokio::test]
    async fn test_unit_error_propagates() {
        let mut scheduler = BoundedScheduler::new(2).unwrap();
        scheduler
            .submit(failing_unit())
            .await
            .unwrap();

        let err = scheduler.drain().await.unwrap_err();
        assert!(matches!(err, IngestError::Store(_)));
    }

    #[tokio::test]
    async fn test_unit_panic_is_fatal() {
        let mut scheduler = BoundedScheduler::new(1).unwrap();
        scheduler.submit(panicking_unit()).await.unwrap();

        // The panic surfaces when the next submission waits for a slot
        let err = scheduler.submit(noop_unit()).await.unwrap_err();
        assert!(matches!(err, IngestError::Unit(_)));
    }

    #[test]
    fn test_zero_limit_is_rejected() {
        assert!(BoundedScheduler::new(0).is_err());
    }
}
