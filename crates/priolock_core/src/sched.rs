//! # Real-Time Scheduling
//!
//! Puts the **calling** thread into a real-time class at
//! `policy minimum + level`. Level 0 is the lowest usable real-time
//! priority, level 1 is one step above it, and so on.
//!
//! There is deliberately no variant taking a thread handle: each thread
//! elevates itself as the first thing it does.

#![allow(unsafe_code)]

use std::io;

use serde::Deserialize;

use crate::error::{PlatformError, PlatformResult};

/// Real-time scheduling class.
#[allow(clippy::unsafe_derive_deserialize)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
pub enum SchedPolicy {
    /// `SCHED_FIFO`: run until blocked or preempted by a higher priority.
    #[default]
    #[serde(rename = "fifo")]
    Fifo,
    /// `SCHED_RR`: FIFO with a time slice among equal priorities.
    #[serde(rename = "rr")]
    RoundRobin,
}

impl SchedPolicy {
    /// The raw libc policy constant.
    #[inline]
    #[must_use]
    pub const fn as_raw(self) -> libc::c_int {
        match self {
            Self::Fifo => libc::SCHED_FIFO,
            Self::RoundRobin => libc::SCHED_RR,
        }
    }

    /// Short name used in logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Fifo => "SCHED_FIFO",
            Self::RoundRobin => "SCHED_RR",
        }
    }

    /// Inclusive priority range of the policy.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::Scheduler`] if the kernel does not know the
    /// policy.
    pub fn priority_range(self) -> PlatformResult<(i32, i32)> {
        // SAFETY: plain queries without pointers.
        let (min, max) = unsafe {
            (
                libc::sched_get_priority_min(self.as_raw()),
                libc::sched_get_priority_max(self.as_raw()),
            )
        };
        if min < 0 || max < 0 {
            return Err(PlatformError::Scheduler(io::Error::last_os_error()));
        }
        Ok((min, max))
    }

    /// Absolute priority for an offset above the policy minimum.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::InvalidPriority`] if the result leaves the
    /// policy range.
    pub fn priority_for_level(self, level: i32) -> PlatformResult<i32> {
        let (min, max) = self.priority_range()?;
        match min.checked_add(level) {
            Some(priority) if level >= 0 && priority <= max => Ok(priority),
            _ => Err(PlatformError::InvalidPriority { level, min, max }),
        }
    }
}

/// Applies `policy` at `level` to the calling thread.
///
/// Returns the absolute priority now in effect.
///
/// # Errors
///
/// - [`PlatformError::PrivilegeRequired`] on `EPERM` (no `CAP_SYS_NICE`,
///   or `RLIMIT_RTPRIO` too low)
/// - [`PlatformError::InvalidPriority`] if the level is out of range
/// - [`PlatformError::Scheduler`] for anything else
pub fn elevate_current_thread(policy: SchedPolicy, level: i32) -> PlatformResult<i32> {
    let priority = policy.priority_for_level(level)?;

    // SAFETY: all-zero is a valid sched_param (musl carries padding fields).
    let mut param: libc::sched_param = unsafe { std::mem::zeroed() };
    param.sched_priority = priority;

    // SAFETY: `param` outlives the call; pthread_self() is always valid.
    let rc = unsafe { libc::pthread_setschedparam(libc::pthread_self(), policy.as_raw(), &param) };
    match rc {
        0 => {
            tracing::debug!(policy = policy.name(), level, priority, "real-time priority applied");
            Ok(priority)
        }
        libc::EPERM => Err(PlatformError::PrivilegeRequired),
        code => Err(PlatformError::Scheduler(io::Error::from_raw_os_error(code))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_range() {
        let (min, max) = SchedPolicy::Fifo.priority_range().unwrap();
        assert!(min >= 1);
        assert!(max > min);
    }

    #[test]
    fn test_level_offsets_minimum() {
        let (min, _) = SchedPolicy::Fifo.priority_range().unwrap();
        assert_eq!(SchedPolicy::Fifo.priority_for_level(0).unwrap(), min);
        assert_eq!(SchedPolicy::Fifo.priority_for_level(1).unwrap(), min + 1);
    }

    #[test]
    fn test_level_out_of_range() {
        assert!(matches!(
            SchedPolicy::Fifo.priority_for_level(-1),
            Err(PlatformError::InvalidPriority { level: -1, .. })
        ));
        assert!(matches!(
            SchedPolicy::RoundRobin.priority_for_level(10_000),
            Err(PlatformError::InvalidPriority { .. })
        ));
    }

    #[test]
    fn test_invalid_level_rejected_before_syscall() {
        assert!(matches!(
            elevate_current_thread(SchedPolicy::Fifo, i32::MAX),
            Err(PlatformError::InvalidPriority { .. })
        ));
    }
}
