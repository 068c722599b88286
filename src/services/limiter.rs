use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Caps how many units of work run at the same time.
///
/// Permits are handed out first come, first served, so queued units start in
/// submission order as soon as a running one finishes.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    ceiling: usize,
}

impl ConcurrencyLimiter {
    /// `ceiling == 0` means unbounded.
    pub fn new(ceiling: usize) -> Self {
        let ceiling = if ceiling == 0 {
            Semaphore::MAX_PERMITS
        } else {
            ceiling
        };
        Self {
            semaphore: Arc::new(Semaphore::new(ceiling)),
            ceiling,
        }
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Runs one unit once a permit is free.
    pub async fn run<F>(&self, unit: F) -> F::Output
    where
        F: Future,
    {
        // The semaphore is never closed
        let _permit = self.semaphore.acquire().await.ok();
        unit.await
    }

    /// Runs all units, at most `ceiling` at a time, and returns their outputs in
    /// submission order. A failing unit does not stop the others.
    pub async fn run_all<I, F>(&self, units: I) -> Vec<F::Output>
    where
        I: IntoIterator<Item = F>,
        F: Future,
    {
        join_all(units.into_iter().map(|unit| self.run(unit))).await
    }
}
