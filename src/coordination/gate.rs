//! Bounded admission gate
//!
//! Counting gate with FIFO hand-off and timeout-bounded acquisition. A timed-out
//! waiter leaves the queue immediately and never consumes a slot later.

use crate::error::{Result, TapfleetError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

/// Counting admission primitive sized to the concurrency ceiling
#[derive(Debug, Clone)]
pub struct BoundedGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// A held slot; released on drop or through [`GatePermit::release`]
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}

impl GatePermit {
    /// Return the slot to the gate, handing it to the longest waiter if any
    pub fn release(self) {}
}

impl BoundedGate {
    /// Create a gate with `capacity` slots (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Free slots
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Slots currently held by admitted callers, derived from the free count
    pub fn held(&self) -> usize {
        self.capacity - self.semaphore.available_permits()
    }

    /// Wait for a slot; waiters are admitted in arrival order
    pub async fn acquire(&self) -> Result<GatePermit> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| TapfleetError::Internal("admission gate closed".to_string()))?;
        Ok(GatePermit { _permit: permit })
    }

    /// Wait at most `timeout` for a slot. `None` means the request was withdrawn.
    pub async fn acquire_timeout(&self, timeout: Duration) -> Option<GatePermit> {
        match tokio::time::timeout(timeout, self.acquire()).await {
            Ok(Ok(permit)) => Some(permit),
            Ok(Err(e)) => {
                debug!(error = %e, "Gate acquisition failed");
                None
            }
            Err(_) => None,
        }
    }
}
