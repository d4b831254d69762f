//! Cooperative cancellation for in-flight runs.
//!
//! The token is checked before each tool invocation and each copy entry, so a
//! cancelled run stops issuing new work promptly. Already-spawned processes
//! are reaped by the timeout path in [`crate::process`], and the
//! temp-file-then-rename discipline in [`crate::stage`] guarantees no
//! partially written destination survives cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Safe to call from any thread, repeatedly.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Bail out with [`crate::Error::Cancelled`] if cancellation was requested.
    pub fn check(&self) -> crate::Result<()> {
        if self.is_cancelled() {
            Err(crate::Error::Cancelled)
        } else {
            Ok(())
        }
    }
}
