//! # Scenario Configuration
//!
//! The scenario has no command-line surface. Every knob is a constant,
//! and the defaults below ARE the demonstration:
//!
//! | Knob                | Default                | Meaning                          |
//! |---------------------|------------------------|----------------------------------|
//! | `work_time_ms`      | 5000                   | How long aux holds the lock (H)  |
//! | `lock_timeout_ms`   | 1000                   | main's timed-lock budget (T)     |
//! | `worker_level`      | 0                      | aux priority above policy min    |
//! | `coordinator_level` | 1                      | main priority above policy min   |
//! | `cpu`               | 1                      | the single core both run on      |
//! | `policy`            | `fifo`                 | `fifo` or `rr`                   |
//! | `protocol`          | `inherit`              | `inherit` or `none`              |
//!
//! A TOML file named by `PRIOLOCK_CONFIG` may override any subset at
//! start-up. Missing keys keep their default.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use priolock_core::{MutexProtocol, SchedPolicy, MAX_CPUS};
use serde::Deserialize;
use thiserror::Error;

/// Environment variable naming an optional scenario file.
pub const CONFIG_ENV: &str = "PRIOLOCK_CONFIG";

/// Errors raised while loading or validating a scenario.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The scenario file could not be read.
    #[error("unable to read {path}: {source}")]
    Io {
        /// File that was requested.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The scenario file is not valid TOML for this schema.
    #[error("invalid scenario file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Priority levels are offsets and cannot be negative.
    #[error("priority level {0} is negative")]
    NegativeLevel(i32),

    /// main must outrank aux, or there is no inversion to mitigate.
    #[error("coordinator level {coordinator} must be strictly above worker level {worker}")]
    InvertedPriorities {
        /// Worker level.
        worker: i32,
        /// Coordinator level.
        coordinator: i32,
    },

    /// CPU index does not fit in a `cpu_set_t`.
    #[error("cpu {0} is outside the cpu set")]
    InvalidCpu(usize),
}

/// Result type for configuration.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Fixed parameters of one run.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScenarioConfig {
    /// How long aux spins while holding the lock (ms).
    pub work_time_ms: u64,
    /// main's timed-lock budget (ms).
    pub lock_timeout_ms: u64,
    /// aux priority offset above the policy minimum.
    pub worker_level: i32,
    /// main priority offset above the policy minimum.
    pub coordinator_level: i32,
    /// Logical CPU both threads are confined to.
    pub cpu: usize,
    /// Real-time scheduling class for both threads.
    pub policy: SchedPolicy,
    /// Locking protocol of the shared mutex.
    pub protocol: MutexProtocol,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            work_time_ms: 5_000,
            lock_timeout_ms: 1_000,
            worker_level: 0,
            coordinator_level: 1,
            cpu: 1,
            policy: SchedPolicy::Fifo,
            protocol: MutexProtocol::Inherit,
        }
    }
}

impl ScenarioConfig {
    /// Lock hold duration (H).
    #[inline]
    #[must_use]
    pub const fn work_time(&self) -> Duration {
        Duration::from_millis(self.work_time_ms)
    }

    /// Timed-lock budget (T).
    #[inline]
    #[must_use]
    pub const fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Whether the run is built to end in a timeout (H > T).
    #[must_use]
    pub const fn expects_timeout(&self) -> bool {
        self.work_time_ms > self.lock_timeout_ms
    }

    /// Checks the invariants the scenario depends on.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> ConfigResult<()> {
        for level in [self.worker_level, self.coordinator_level] {
            if level < 0 {
                return Err(ConfigError::NegativeLevel(level));
            }
        }
        if self.coordinator_level <= self.worker_level {
            return Err(ConfigError::InvertedPriorities {
                worker: self.worker_level,
                coordinator: self.coordinator_level,
            });
        }
        if self.cpu >= MAX_CPUS {
            return Err(ConfigError::InvalidCpu(self.cpu));
        }
        Ok(())
    }

    /// Parses and validates a scenario from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] or a validation error.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a scenario file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`ScenarioConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Built-in constants, or the file named by [`CONFIG_ENV`] if set.
    ///
    /// # Errors
    ///
    /// As [`ScenarioConfig::load`] when the variable is set.
    pub fn from_env() -> ConfigResult<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => {
                tracing::info!(path = ?path, "loading scenario file");
                Self::load(path)
            }
            None => Ok(Self::default()),
        }
    }
}
