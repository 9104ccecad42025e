//! Synchronization primitives shared by the parallel runners.
//!
//! - [`JoinState`]: counts worker completions; the last arrival releases
//!   every waiter, including the driver. Blocking, no spinning.
//! - [`StageBarrier`]: reusable barrier between the compute and rotate
//!   phases of a BSP stage.
//! - [`AbortSignal`]: a flag raised by the first failing worker so the
//!   rest stop taking new work.
//!
//! `std::sync::Barrier` cannot be released early, so a panicking worker
//! would leave its peers blocked forever. Both waits here return
//! [`PipelineError::Aborted`] once `abort` has been called.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use log::debug;

use crate::types::PipelineError;

/// Lock `mutex`, ignoring poisoning. No code panics while holding these
/// locks, and the guarded state is plain counters.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cheap cloneable flag requesting that outstanding work stop.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal(Arc<AtomicBool>);

impl AbortSignal {
    /// Create a lowered signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal.
    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once any holder has raised the signal.
    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
struct JoinCounters {
    arrived: usize,
    completed: bool,
    aborted: bool,
}

/// Completion join for a fixed number of workers.
#[derive(Debug)]
pub struct JoinState {
    target: usize,
    counters: Mutex<JoinCounters>,
    released: Condvar,
}

impl JoinState {
    /// A join that completes after `target` arrivals.
    #[must_use]
    pub fn new(target: usize) -> Self {
        Self {
            target,
            counters: Mutex::new(JoinCounters {
                completed: target == 0,
                ..JoinCounters::default()
            }),
            released: Condvar::new(),
        }
    }

    /// Record one worker's completion and block until all have arrived.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Aborted`] if the join is aborted before it
    /// completes.
    pub fn arrive(&self) -> Result<(), PipelineError> {
        let mut counters = lock(&self.counters);
        counters.arrived += 1;
        debug!("join: {}/{} workers arrived", counters.arrived, self.target);
        if counters.arrived >= self.target {
            counters.completed = true;
            self.released.notify_all();
            return Ok(());
        }
        let counters = self
            .released
            .wait_while(counters, |c| !c.completed && !c.aborted)
            .unwrap_or_else(PoisonError::into_inner);
        if counters.completed {
            Ok(())
        } else {
            Err(PipelineError::Aborted)
        }
    }

    /// Block until every worker has arrived.
    ///
    /// Returns the number of completion signals observed, which equals
    /// the target passed to [`new`](Self::new) on success.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Aborted`] if the join is aborted before it
    /// completes.
    pub fn wait(&self) -> Result<usize, PipelineError> {
        let counters = lock(&self.counters);
        let counters = self
            .released
            .wait_while(counters, |c| !c.completed && !c.aborted)
            .unwrap_or_else(PoisonError::into_inner);
        if counters.completed {
            Ok(counters.arrived)
        } else {
            Err(PipelineError::Aborted)
        }
    }

    /// Release every waiter with [`PipelineError::Aborted`].
    pub fn abort(&self) {
        let mut counters = lock(&self.counters);
        if !counters.completed {
            counters.aborted = true;
        }
        self.released.notify_all();
    }
}

#[derive(Debug, Default)]
struct BarrierState {
    waiting: usize,
    generation: u64,
    aborted: bool,
}

/// Reusable barrier for a fixed number of parties.
#[derive(Debug)]
pub struct StageBarrier {
    parties: usize,
    state: Mutex<BarrierState>,
    released: Condvar,
}

impl StageBarrier {
    /// A barrier that opens each time `parties` workers have arrived.
    #[must_use]
    pub fn new(parties: usize) -> Self {
        Self {
            parties,
            state: Mutex::new(BarrierState::default()),
            released: Condvar::new(),
        }
    }

    /// Block until all parties reach the barrier.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Aborted`] if the barrier is aborted before
    /// or while waiting.
    pub fn wait(&self) -> Result<(), PipelineError> {
        let mut state = lock(&self.state);
        if state.aborted {
            return Err(PipelineError::Aborted);
        }
        let generation = state.generation;
        state.waiting += 1;
        if state.waiting >= self.parties {
            state.waiting = 0;
            state.generation = state.generation.wrapping_add(1);
            self.released.notify_all();
            return Ok(());
        }
        let state = self
            .released
            .wait_while(state, |s| s.generation == generation && !s.aborted)
            .unwrap_or_else(PoisonError::into_inner);
        if state.generation == generation {
            Err(PipelineError::Aborted)
        } else {
            Ok(())
        }
    }

    /// Release every current and future waiter with
    /// [`PipelineError::Aborted`].
    pub fn abort(&self) {
        lock(&self.state).aborted = true;
        self.released.notify_all();
    }
}
