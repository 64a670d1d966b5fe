//! Admission control: bounds in-flight executions behind a semaphore.
//!
//! Excess load is rejected immediately with a `concurrency_limit`
//! classification rather than queued, so callers get an explicit
//! backpressure signal instead of unbounded latency growth.

use std::sync::Arc;

use keel_error::{ErrorCode, KeelError, Result};
use tokio::sync::{Semaphore, TryAcquireError};

pub struct ConcurrencyAdmission {
    permits: Arc<Semaphore>,
    max_concurrent: usize,
}

/// Holds one admitted slot. Dropping the ticket releases the slot on every
/// exit path, including panic unwinding.
pub struct Ticket {
    _permit: tokio::sync::OwnedSemaphorePermit,
}

impl ConcurrencyAdmission {
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    /// Try to admit one execution. Never waits.
    pub fn admit(&self) -> Result<Ticket> {
        match self.permits.clone().try_acquire_owned() {
            Ok(permit) => Ok(Ticket { _permit: permit }),
            Err(TryAcquireError::NoPermits) => Err(KeelError::new(
                ErrorCode::TooManyQueries,
                format!(
                    "Too many concurrent queries (limit {})",
                    self.max_concurrent
                ),
            )
            .with_suggestion("Retry once an in-flight query completes")),
            Err(TryAcquireError::Closed) => Err(KeelError::new(
                ErrorCode::Internal,
                "Admission semaphore closed",
            )),
        }
    }

    pub fn active_count(&self) -> usize {
        self.max_concurrent - self.permits.available_permits()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }
}
