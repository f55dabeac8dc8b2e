//! # Worker Routine (aux)
//!
//! The low-priority lock holder.
//!
//! ## States
//!
//! ```text
//! Idle -> PriorityElevating -> LockAcquiring -> LockHeld -> Releasing -> Done
//! ```
//!
//! While in `LockHeld` the worker spins on the CPU, modelling critical
//! section work that cannot be interrupted. It leaves early only when main
//! raises the stop flag.
//!
//! ## Failure
//!
//! Any setup failure is fatal to the **process**. Returning would leave
//! main blocked at the rendezvous forever, so the thread logs the error and
//! exits with [`FATAL_EXIT_CODE`].

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::{ScenarioResult, FATAL_EXIT_CODE};
use crate::host::RealtimeHost;
use crate::shared::SharedState;

/// Thread name of the worker.
pub const WORKER_THREAD_NAME: &str = "aux";

/// Worker lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum WorkerPhase {
    /// Thread started, nothing done yet.
    Idle,
    /// Applying real-time priority.
    PriorityElevating,
    /// Blocking on the mutex.
    LockAcquiring,
    /// Holding the mutex: rendezvous, then spin.
    LockHeld,
    /// Unlocking.
    Releasing,
    /// Finished.
    Done,
}

/// Why a [`spin_hold`] ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HoldEnd {
    /// The full budget was spent.
    Elapsed,
    /// A stop was requested first.
    Stopped,
}

/// Burns CPU for `budget` or until `stop_requested` returns true.
///
/// No sleeping: the point is to stay runnable the whole time.
pub fn spin_hold(budget: Duration, stop_requested: impl Fn() -> bool) -> HoldEnd {
    let end = Instant::now() + budget;
    while Instant::now() < end {
        if stop_requested() {
            return HoldEnd::Stopped;
        }
        std::hint::spin_loop();
    }
    HoldEnd::Elapsed
}

/// The aux side of a run.
pub struct Worker {
    shared: Arc<SharedState>,
    host: Arc<dyn RealtimeHost>,
    phase: WorkerPhase,
}

impl Worker {
    /// Creates a worker in `Idle`.
    #[must_use]
    pub fn new(shared: Arc<SharedState>, host: Arc<dyn RealtimeHost>) -> Self {
        Self {
            shared,
            host,
            phase: WorkerPhase::Idle,
        }
    }

    /// Current phase.
    #[inline]
    #[must_use]
    pub const fn phase(&self) -> WorkerPhase {
        self.phase
    }

    /// Runs the routine to `Done` on the calling thread.
    ///
    /// # Errors
    ///
    /// Returns priority, lock or barrier failures.
    pub fn run(&mut self) -> ScenarioResult<()> {
        // Local handle so the guard does not borrow `self`.
        let shared = Arc::clone(&self.shared);
        let log = &shared.log;
        let config = &shared.config;

        self.transition_to(WorkerPhase::PriorityElevating);
        self.host
            .elevate_current_thread(config.policy, config.worker_level)?;
        log.record(format_args!("Prio set to {}", config.worker_level));

        self.transition_to(WorkerPhase::LockAcquiring);
        log.record("Locking mutex");
        let guard = shared.mutex.lock()?;
        log.record("Locked mutex");

        self.transition_to(WorkerPhase::LockHeld);
        log.record("barrier wait");
        shared.rendezvous.wait()?;
        log.record("barrier wait done");

        let budget = config.work_time();
        log.record(format_args!("Work for {:.3} seconds", budget.as_secs_f64()));
        if spin_hold(budget, || shared.stop_requested()) == HoldEnd::Stopped {
            log.record("Stop requested, cutting work short");
        }

        self.transition_to(WorkerPhase::Releasing);
        guard.release();
        log.record("Unlocked mutex");

        self.transition_to(WorkerPhase::Done);
        Ok(())
    }

    fn transition_to(&mut self, phase: WorkerPhase) {
        tracing::trace!(from = ?self.phase, to = ?phase, "worker transition");
        self.phase = phase;
    }
}

/// Starts the worker on a new thread named `aux`.
///
/// # Errors
///
/// Returns the OS error if the thread cannot be created.
pub fn spawn(shared: Arc<SharedState>, host: Arc<dyn RealtimeHost>) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(WORKER_THREAD_NAME.to_owned())
        .spawn(move || {
            let mut worker = Worker::new(shared, host);
            if let Err(err) = worker.run() {
                worker.shared.log.record(&err);
                tracing::error!(error = %err, phase = ?worker.phase(), "worker setup failed");
                std::process::exit(i32::from(FATAL_EXIT_CODE));
            }
        })
}
