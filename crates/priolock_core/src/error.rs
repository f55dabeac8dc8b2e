//! # Platform Error Types
//!
//! Everything that can go wrong while talking to the real-time API.
//! All of these are setup preconditions: none is retried.

use std::io;
use thiserror::Error;

/// Errors raised by the real-time primitives.
#[derive(Error, Debug)]
pub enum PlatformError {
    /// Requested CPU index does not fit in a `cpu_set_t`.
    #[error("cpu {cpu} is outside the cpu set (highest index {max})")]
    InvalidCpu {
        /// The requested CPU.
        cpu: usize,
        /// Highest representable CPU index.
        max: usize,
    },

    /// `sched_setaffinity` refused the request.
    #[error("unable to set cpu affinity: {0}")]
    Affinity(#[source] io::Error),

    /// Priority level maps outside the policy's priority range.
    #[error("priority level {level} is outside the policy range ({min}..={max})")]
    InvalidPriority {
        /// Requested offset above the policy minimum.
        level: i32,
        /// Policy minimum priority.
        min: i32,
        /// Policy maximum priority.
        max: i32,
    },

    /// Real-time scheduling was denied with `EPERM`.
    #[error("unable to set scheduling parameters: elevated real-time scheduling privilege required (CAP_SYS_NICE); re-run with sufficient privilege")]
    PrivilegeRequired,

    /// Any other scheduler failure.
    #[error("unable to set scheduling parameters: {0}")]
    Scheduler(#[source] io::Error),

    /// `clock_gettime` failed.
    #[error("clock read failed: {0}")]
    Clock(#[source] io::Error),

    /// Mutex attribute or mutex initialisation failed.
    #[error("unable to initialise mutex: {0}")]
    MutexInit(#[source] io::Error),

    /// Blocking lock failed.
    #[error("unable to lock mutex: {0}")]
    Lock(#[source] io::Error),

    /// Barrier initialisation failed.
    #[error("unable to initialise barrier: {0}")]
    BarrierInit(#[source] io::Error),

    /// Barrier wait failed.
    #[error("barrier wait failed: {0}")]
    Barrier(#[source] io::Error),
}

/// Result type for platform operations.
pub type PlatformResult<T> = Result<T, PlatformError>;

/// pthread functions return the error code instead of setting `errno`.
pub(crate) fn pthread_result(rc: libc::c_int) -> io::Result<()> {
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::from_raw_os_error(rc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pthread_result_maps_code() {
        assert!(pthread_result(0).is_ok());
        let err = pthread_result(libc::ETIMEDOUT).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::ETIMEDOUT));
    }

    #[test]
    fn test_privilege_message_is_actionable() {
        let msg = PlatformError::PrivilegeRequired.to_string();
        assert!(msg.contains("privilege required"));
        assert!(msg.contains("re-run"));
    }
}
