//! In-flight execution tracking.
//!
//! # Responsibilities
//! - Count execution tasks that are currently running
//! - Optionally bound how many may run at once
//! - Let shutdown wait for in-flight work to finish

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Tracks running execution tasks.
#[derive(Debug, Clone)]
pub struct InFlightTracker {
    /// Current count of running tasks.
    active_count: Arc<AtomicU64>,
    /// Present when a concurrency cap is configured.
    limit: Option<Arc<Semaphore>>,
}

impl InFlightTracker {
    /// Create a tracker. `max_in_flight == 0` means unbounded.
    pub fn new(max_in_flight: usize) -> Self {
        Self {
            active_count: Arc::new(AtomicU64::new(0)),
            limit: (max_in_flight > 0).then(|| Arc::new(Semaphore::new(max_in_flight))),
        }
    }

    /// Record a dispatched task. Returns a guard that decrements on drop.
    ///
    /// Tasks count as in flight from dispatch, including while they wait
    /// for a slot under the cap.
    pub fn track(&self) -> InFlightGuard {
        let active = self.active_count.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::gauge!("dispatch_in_flight").set(active as f64);
        InFlightGuard {
            active_count: Arc::clone(&self.active_count),
        }
    }

    /// Wait for a free slot under the cap. `None` when unbounded.
    pub async fn slot(&self) -> Option<OwnedSemaphorePermit> {
        match &self.limit {
            Some(limit) => Arc::clone(limit).acquire_owned().await.ok(),
            None => None,
        }
    }

    /// Get current running task count.
    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }

    /// Wait until no task is running or the timeout elapses.
    ///
    /// Returns `true` if everything finished in time.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let poll = async {
            while self.active_count.load(Ordering::SeqCst) > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        };
        tokio::time::timeout(timeout, poll).await.is_ok()
    }
}

impl Default for InFlightTracker {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Guard held by an execution task for its whole lifetime.
#[derive(Debug)]
pub struct InFlightGuard {
    active_count: Arc<AtomicU64>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let active = self.active_count.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::gauge!("dispatch_in_flight").set(active as f64);
    }
}
