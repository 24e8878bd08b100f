//! Concurrency control for the file-set driver.
//!
//! Bounds how many input files are repaired at once. Each in-flight file
//! holds one permit; dropping the permit frees the slot for the next file.
//!
//! # Usage
//!
//! ```ignore
//! let scheduler = FileScheduler::new(4);
//!
//! // Waits if all slots are taken; the slot frees itself on drop.
//! let permit = scheduler.acquire().await;
//! ```

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

// ─────────────────────────────────────────────────────────────────────────────
// FileScheduler
// ─────────────────────────────────────────────────────────────────────────────

/// Limits the number of files repaired concurrently.
///
/// A thin wrapper over a semaphore. Permits release on drop, so a slot can
/// never leak even when a repair task fails.
#[derive(Clone)]
pub struct FileScheduler {
    sem: Arc<Semaphore>,
    /// Maximum number of concurrent files allowed.
    max: usize,
}

impl FileScheduler {
    /// Creates a scheduler with the given number of file slots.
    ///
    /// # Panics
    ///
    /// Panics if `max_concurrent` is 0.
    pub fn new(max_concurrent: usize) -> Self {
        assert!(max_concurrent > 0, "max_concurrent must be greater than 0");

        Self {
            sem: Arc::new(Semaphore::new(max_concurrent)),
            max: max_concurrent,
        }
    }

    /// Acquires a file slot, waiting if all slots are currently in use.
    pub async fn acquire(&self) -> FilePermit {
        // The semaphore is never closed, so acquire_owned cannot fail
        let permit = self
            .sem
            .clone()
            .acquire_owned()
            .await
            .expect("semaphore closed unexpectedly");

        FilePermit {
            permit,
            max: self.max,
            sem: self.sem.clone(),
        }
    }

    /// Maximum number of files allowed in flight.
    pub fn max_files(&self) -> usize {
        self.max
    }

    /// Number of files currently holding a slot.
    pub fn active_files(&self) -> usize {
        self.max - self.sem.available_permits()
    }

    /// Number of free slots.
    pub fn available_slots(&self) -> usize {
        self.sem.available_permits()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// FilePermit
// ─────────────────────────────────────────────────────────────────────────────

/// An occupied file slot, released when dropped.
///
/// Do NOT implement Drop manually - OwnedSemaphorePermit handles release.
pub struct FilePermit {
    /// The underlying semaphore permit (releases on drop).
    #[allow(dead_code)]
    permit: OwnedSemaphorePermit,
    max: usize,
    sem: Arc<Semaphore>,
}

impl FilePermit {
    /// Number of files currently in flight, this one included.
    pub fn active_files(&self) -> usize {
        self.max - self.sem.available_permits()
    }

    /// Number of free slots.
    pub fn available_slots(&self) -> usize {
        self.sem.available_permits()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
