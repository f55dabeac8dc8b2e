//! # Scenario Error Types
//!
//! Fatal conditions. The bounded lock attempt is not among them: its
//! outcome is reported through [`crate::RunReport`], never as an error.

use priolock_core::PlatformError;
use thiserror::Error;

use crate::config::ConfigError;

/// Exit status for a fatal setup failure.
pub const FATAL_EXIT_CODE: u8 = 1;

/// Errors that abort a run.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// The scenario itself is unusable (for example main not above aux).
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Affinity, scheduling, clock, lock or barrier setup failed.
    #[error(transparent)]
    Setup(#[from] PlatformError),

    /// The worker thread could not be created.
    #[error("unable to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// The worker thread panicked before finishing.
    #[error("worker thread panicked")]
    WorkerPanicked,
}

/// Result type for scenario operations.
pub type ScenarioResult<T> = Result<T, ScenarioError>;
