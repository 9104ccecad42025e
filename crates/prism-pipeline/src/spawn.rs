//! Fallible thread start-up for the parallel runners.
//!
//! `Scope::spawn` panics when the OS refuses a thread. A runner that has
//! already started some of its workers would then unwind while those
//! workers sit at a barrier waiting for peers that never arrive. Starting
//! every thread through [`Spawner`] turns the refusal into
//! [`PipelineError::Spawn`] so the runner can release the started workers
//! and fail the batch.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, Scope, ScopedJoinHandle};

use log::warn;

use crate::types::PipelineError;

/// Starts named scoped threads.
#[derive(Debug)]
pub struct Spawner {
    /// Threads still allowed to start; `None` leaves the decision to the OS.
    remaining: Option<AtomicUsize>,
}

impl Spawner {
    /// A spawner limited only by the OS.
    pub const fn os() -> Self {
        Self { remaining: None }
    }

    /// A spawner that refuses every thread after the first `threads`.
    #[cfg(test)]
    pub const fn limited(threads: usize) -> Self {
        Self {
            remaining: Some(AtomicUsize::new(threads)),
        }
    }

    /// Start `body` on a new thread called `name` inside `scope`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Spawn`] if the thread cannot be started.
    /// `body` is dropped without running in that case.
    pub fn spawn<'scope, 'env, F, T>(
        &self,
        scope: &'scope Scope<'scope, 'env>,
        name: String,
        body: F,
    ) -> Result<ScopedJoinHandle<'scope, T>, PipelineError>
    where
        F: FnOnce() -> T + Send + 'scope,
        T: Send + 'scope,
    {
        if let Some(remaining) = &self.remaining
            && remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_err()
        {
            warn!("{name}: thread limit reached");
            return Err(PipelineError::Spawn(io::Error::new(
                io::ErrorKind::WouldBlock,
                "thread limit reached",
            )));
        }
        thread::Builder::new()
            .name(name)
            .spawn_scoped(scope, body)
            .map_err(PipelineError::Spawn)
    }
}
