//! # Coordinator (main)
//!
//! Stages the inversion and checks that the bounded lock attempt expires.
//!
//! ## States
//!
//! ```text
//! Init -> AffinityPinned -> LockConfigured -> PriorityElevated
//!      -> WorkerSpawned -> Rendezvoused -> TimedLockAttempted
//!      -> Verified -> Done
//! ```
//!
//! ## Ordering
//!
//! main raises itself above aux BEFORE spawning it, then meets aux at the
//! rendezvous. aux only reaches the rendezvous after it owns the mutex, so
//! the timed attempt always starts against a held lock.
//!
//! ## Verdict
//!
//! A timed attempt that does not time out is logged as an ERROR line but
//! the run still stops and joins aux. The log line and the exit status are
//! both derived from [`RunReport::is_expected`].

use std::fmt;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use priolock_core::{Deadline, LockAttempt};

use crate::config::ScenarioConfig;
use crate::error::{ScenarioError, ScenarioResult};
use crate::host::RealtimeHost;
use crate::log::EventLog;
use crate::shared::SharedState;
use crate::worker;

/// Exit status when the timed attempt timed out.
pub const EXIT_TIMED_OUT: u8 = 0;

/// Exit status when the timed attempt did anything else.
pub const EXIT_MISMATCH: u8 = 1;

/// Coordinator lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum CoordinatorPhase {
    /// Start time recorded, header written.
    Init,
    /// Confined to one CPU.
    AffinityPinned,
    /// Mutex and rendezvous built.
    LockConfigured,
    /// main runs at its real-time priority.
    PriorityElevated,
    /// aux is running.
    WorkerSpawned,
    /// Both parties passed the rendezvous.
    Rendezvoused,
    /// The bounded attempt returned.
    TimedLockAttempted,
    /// Outcome checked against the expectation.
    Verified,
    /// aux joined.
    Done,
}

/// What the bounded lock attempt returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// `ETIMEDOUT`, the expected result.
    TimedOut,
    /// The lock was taken before the deadline.
    Acquired,
    /// Any other error, with its errno.
    Failed(i32),
}

impl Outcome {
    fn of(attempt: &LockAttempt<'_>) -> Self {
        match attempt {
            LockAttempt::TimedOut => Self::TimedOut,
            LockAttempt::Acquired(_) => Self::Acquired,
            LockAttempt::Failed(err) => Self::Failed(err.raw_os_error().unwrap_or(-1)),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TimedOut => write!(f, "timed out"),
            Self::Acquired => write!(f, "succeeded, not timed out"),
            Self::Failed(code) => write!(
                f,
                "failed: {}",
                std::io::Error::from_raw_os_error(*code)
            ),
        }
    }
}

/// Result of a completed run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunReport {
    /// Outcome of the bounded attempt.
    pub outcome: Outcome,
    /// How long the attempt actually blocked.
    pub waited: Duration,
}

impl RunReport {
    /// Whether the attempt timed out, as the scenario requires.
    #[inline]
    #[must_use]
    pub const fn is_expected(&self) -> bool {
        matches!(self.outcome, Outcome::TimedOut)
    }

    /// Process exit status for this report.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        if self.is_expected() {
            EXIT_TIMED_OUT
        } else {
            EXIT_MISMATCH
        }
    }
}

/// The main side of a run.
pub struct Coordinator {
    config: ScenarioConfig,
    host: Arc<dyn RealtimeHost>,
    log: Arc<EventLog>,
    phase: CoordinatorPhase,
}

impl Coordinator {
    /// Creates a coordinator. `log` must be created on the calling thread
    /// so main lines get the `main` tag.
    #[must_use]
    pub fn new(config: ScenarioConfig, host: Arc<dyn RealtimeHost>, log: Arc<EventLog>) -> Self {
        Self {
            config,
            host,
            log,
            phase: CoordinatorPhase::Init,
        }
    }

    /// Current phase. After a fatal error this is the last phase reached.
    #[inline]
    #[must_use]
    pub const fn phase(&self) -> CoordinatorPhase {
        self.phase
    }

    /// Runs the scenario on the calling thread.
    ///
    /// # Errors
    ///
    /// Returns fatal setup errors, already written to the log. A scenario
    /// that fails [`ScenarioConfig::validate`] is rejected before any host
    /// call. A bounded attempt that does not time out is NOT an error; see
    /// [`RunReport`].
    pub fn run(&mut self) -> ScenarioResult<RunReport> {
        self.transition_to(CoordinatorPhase::Init);
        self.log.header();
        self.config.validate().map_err(|err| self.fatal(err))?;

        let cpu = self.config.cpu;
        self.log
            .record(format_args!("Restricted execution to a single core (cpu {cpu})"));
        self.host
            .pin_to_single_core(cpu)
            .map_err(|err| self.fatal(err))?;
        self.transition_to(CoordinatorPhase::AffinityPinned);

        let shared = SharedState::new(self.config.clone(), Arc::clone(&self.log))
            .map(Arc::new)
            .map_err(|err| self.fatal(err))?;
        self.log.record(format_args!(
            "Mutex protocol {}, {} levels {}/{}",
            self.config.protocol.name(),
            self.config.policy.name(),
            self.config.worker_level,
            self.config.coordinator_level,
        ));
        self.transition_to(CoordinatorPhase::LockConfigured);

        self.host
            .elevate_current_thread(self.config.policy, self.config.coordinator_level)
            .map_err(|err| self.fatal(err))?;
        self.log
            .record(format_args!("Prio set to {}", self.config.coordinator_level));
        self.transition_to(CoordinatorPhase::PriorityElevated);

        let aux = worker::spawn(Arc::clone(&shared), Arc::clone(&self.host))
            .map_err(|err| self.fatal(ScenarioError::Spawn(err)))?;
        self.transition_to(CoordinatorPhase::WorkerSpawned);

        self.log.record("barrier wait");
        if let Err(err) = shared.rendezvous.wait() {
            let _ = release_worker(&shared, aux);
            return Err(self.fatal(err));
        }
        self.log.record("barrier wait done");
        self.transition_to(CoordinatorPhase::Rendezvoused);

        let timeout = self.config.lock_timeout();
        let deadline = match Deadline::after(timeout) {
            Ok(deadline) => deadline,
            Err(err) => {
                // aux is spinning with the lock; let it go before bailing.
                let _ = release_worker(&shared, aux);
                return Err(self.fatal(err));
            }
        };

        self.log
            .record(format_args!("timedlock({:.3} s)", timeout.as_secs_f64()));
        let started = Instant::now();
        let attempt = shared.mutex.try_lock_until(deadline);
        let waited = started.elapsed();
        self.log
            .record(format_args!("timedlock done ({:.6} seconds)", waited.as_secs_f64()));

        let report = RunReport {
            outcome: Outcome::of(&attempt),
            waited,
        };
        drop(attempt);
        self.transition_to(CoordinatorPhase::TimedLockAttempted);

        if !report.is_expected() {
            self.log.record(format_args!(
                "ERROR: Expected timedlock to time out (outcome: {})",
                report.outcome
            ));
            tracing::error!(outcome = %report.outcome, "timed lock did not time out");
        }
        self.log.record(format_args!("timedlock: {}", report.outcome));
        self.transition_to(CoordinatorPhase::Verified);

        release_worker(&shared, aux).map_err(|err| self.fatal(err))?;
        self.transition_to(CoordinatorPhase::Done);

        Ok(report)
    }

    fn fatal(&self, err: impl Into<ScenarioError>) -> ScenarioError {
        let err = err.into();
        self.log.record(&err);
        tracing::error!(error = %err, phase = ?self.phase, "fatal setup error");
        err
    }

    fn transition_to(&mut self, phase: CoordinatorPhase) {
        tracing::trace!(from = ?self.phase, to = ?phase, "coordinator transition");
        self.phase = phase;
    }
}

/// Raises the stop flag and waits for aux to unlock and exit.
fn release_worker(shared: &SharedState, aux: JoinHandle<()>) -> ScenarioResult<()> {
    shared.request_stop();
    aux.join().map_err(|_| ScenarioError::WorkerPanicked)
}
