//! # PRIOLOCK
//!
//! Stages a priority inversion on one CPU and checks that the
//! high-priority thread's timed lock expires.
//!
//! ## Usage
//!
//! ```bash
//! sudo priolock                                  # built-in constants
//! PRIOLOCK_CONFIG=scenario.toml sudo -E priolock # override some of them
//! RUST_LOG=priolock=trace sudo -E priolock       # structured trace on stderr
//! ```
//!
//! Exit status: 0 when the timed lock timed out, 1 otherwise.

use std::process::ExitCode;
use std::sync::Arc;

use priolock::{Coordinator, EventLog, LinuxHost, ScenarioConfig, FATAL_EXIT_CODE};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    // stdout carries the event log; tracing goes to stderr.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let log = Arc::new(EventLog::stdout());
    let config = match ScenarioConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            log.record_startup_failure(err);
            return ExitCode::from(FATAL_EXIT_CODE);
        }
    };

    let mut coordinator = Coordinator::new(config, Arc::new(LinuxHost), log);

    match coordinator.run() {
        Ok(report) => ExitCode::from(report.exit_code()),
        // Already logged where it happened.
        Err(_) => ExitCode::from(FATAL_EXIT_CODE),
    }
}
