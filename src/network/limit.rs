//! Connection admission control.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Caps the number of concurrent WebSocket sessions.
///
/// A permit is taken before the upgrade completes and held for the life of
/// the session. With no configured cap every acquire succeeds.
#[derive(Debug, Clone)]
pub struct ConnectionLimiter {
    permits: Option<Arc<Semaphore>>,
}

/// RAII admission ticket for one session.
#[derive(Debug)]
pub struct ConnectionPermit {
    _permit: Option<OwnedSemaphorePermit>,
}

impl ConnectionLimiter {
    /// `max_conns == 0` means unbounded.
    pub fn new(max_conns: usize) -> Self {
        Self {
            permits: (max_conns > 0).then(|| Arc::new(Semaphore::new(max_conns))),
        }
    }

    /// Try to admit one connection. `None` means the cap is reached.
    pub fn try_acquire(&self) -> Option<ConnectionPermit> {
        match &self.permits {
            None => Some(ConnectionPermit { _permit: None }),
            Some(semaphore) => Arc::clone(semaphore)
                .try_acquire_owned()
                .ok()
                .map(|permit| ConnectionPermit {
                    _permit: Some(permit),
                }),
        }
    }

    /// Remaining permits, or `None` when unbounded.
    pub fn available(&self) -> Option<usize> {
        self.permits
            .as_ref()
            .map(|semaphore| semaphore.available_permits())
    }
}
