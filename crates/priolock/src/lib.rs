//! # PRIOLOCK
//!
//! A self-contained check that a priority-inheritance mutex behaves under
//! a staged priority inversion on one CPU:
//!
//! ```text
//!   main (level 1)                        aux (level 0)
//!   ──────────────                        ─────────────
//!   pin to one CPU
//!   build PI mutex + 2-party rendezvous
//!   elevate self
//!   spawn aux  ─────────────────────────► elevate self
//!                                         lock mutex
//!   rendezvous ◄────────────────────────► rendezvous
//!   timedlock(T)                          spin H seconds, holding
//!     ... ETIMEDOUT after T                 (boosted to main's prio)
//!   raise stop flag ────────────────────► stop spinning, unlock
//!   join aux
//!   exit 0 if timed out, else 1
//! ```
//!
//! ## Architecture Rules
//!
//! 1. **Fatal means fatal** - affinity, priority and clock failures end the
//!    process. There is nothing to retry.
//! 2. **A surprise is reported, not thrown** - a timed lock that does not
//!    time out is logged and reflected in the exit status only.
//! 3. **Shared state is explicit** - one [`SharedState`] per run, handed to
//!    aux through an `Arc`. No globals.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod coordinator;
pub mod error;
pub mod host;
pub mod log;
pub mod shared;
pub mod worker;

pub use config::{ConfigError, ScenarioConfig, CONFIG_ENV};
pub use coordinator::{Coordinator, CoordinatorPhase, Outcome, RunReport, EXIT_MISMATCH, EXIT_TIMED_OUT};
pub use error::{ScenarioError, ScenarioResult, FATAL_EXIT_CODE};
pub use host::{LinuxHost, RealtimeHost};
pub use log::{CaptureBuffer, EventLog, LogEntry, LOG_HEADER};
pub use shared::SharedState;
pub use worker::{spin_hold, HoldEnd, Worker, WorkerPhase};
