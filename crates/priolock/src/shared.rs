//! # Shared Run State
//!
//! Everything main and aux both touch, built once per run and handed to
//! the worker through an `Arc`:
//!
//! - the priority-inheritance mutex
//! - the two-party rendezvous
//! - the stop flag (written by main only, polled by aux)
//! - the event log

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use priolock_core::{PiMutex, PlatformResult, Rendezvous};

use crate::config::ScenarioConfig;
use crate::log::EventLog;

/// State shared by coordinator and worker for one run.
#[derive(Debug)]
pub struct SharedState {
    /// Run parameters.
    pub config: ScenarioConfig,
    /// The contended lock.
    pub mutex: PiMutex,
    /// Two-party barrier.
    pub rendezvous: Rendezvous,
    /// Timestamped log.
    pub log: Arc<EventLog>,
    stop: AtomicBool,
}

impl SharedState {
    /// Builds the mutex with the configured protocol and a two-party barrier.
    ///
    /// # Errors
    ///
    /// Propagates mutex or barrier initialisation failures.
    pub fn new(config: ScenarioConfig, log: Arc<EventLog>) -> PlatformResult<Self> {
        let mutex = PiMutex::new(config.protocol)?;
        let rendezvous = Rendezvous::pair()?;
        Ok(Self {
            config,
            mutex,
            rendezvous,
            log,
            stop: AtomicBool::new(false),
        })
    }

    /// Asks the worker to stop holding the lock.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Whether a stop was requested.
    #[inline]
    #[must_use]
    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }
}
