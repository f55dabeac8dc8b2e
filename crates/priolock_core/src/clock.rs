//! # Clock
//!
//! Two time sources, two jobs:
//!
//! - [`ProcessClock`] is monotonic (`Instant`). It stamps log lines and
//!   measures how long a lock attempt actually waited.
//! - [`Deadline`] is absolute `CLOCK_REALTIME`, because that is the clock
//!   `pthread_mutex_timedlock` measures its timeout against.

#![allow(unsafe_code)]

use std::io;
use std::time::{Duration, Instant};

use crate::error::{PlatformError, PlatformResult};

/// Monotonic clock anchored at process start.
#[derive(Clone, Copy, Debug)]
pub struct ProcessClock {
    start: Instant,
}

impl ProcessClock {
    /// Starts a clock at the current instant.
    #[must_use]
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Time elapsed since the clock started.
    #[inline]
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Elapsed seconds as a float, for log columns.
    #[inline]
    #[must_use]
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed().as_secs_f64()
    }

    /// The instant the clock was started.
    #[inline]
    #[must_use]
    pub const fn started_at(&self) -> Instant {
        self.start
    }
}

/// Reads `CLOCK_REALTIME` as a duration since the Unix epoch.
///
/// # Errors
///
/// Returns [`PlatformError::Clock`] if `clock_gettime` fails or reports a
/// time before the epoch.
pub fn realtime_now() -> PlatformResult<Duration> {
    // SAFETY: all-zero is a valid timespec (musl carries padding fields).
    let mut ts: libc::timespec = unsafe { std::mem::zeroed() };
    // SAFETY: `ts` is a valid out-pointer for the duration of the call.
    let rc = unsafe { libc::clock_gettime(libc::CLOCK_REALTIME, &mut ts) };
    if rc != 0 {
        return Err(PlatformError::Clock(io::Error::last_os_error()));
    }

    let secs = u64::try_from(ts.tv_sec)
        .map_err(|_| PlatformError::Clock(io::Error::from(io::ErrorKind::InvalidData)))?;
    let nanos = u32::try_from(ts.tv_nsec)
        .map_err(|_| PlatformError::Clock(io::Error::from(io::ErrorKind::InvalidData)))?;
    Ok(Duration::new(secs, nanos))
}

/// Absolute point in `CLOCK_REALTIME` time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Deadline {
    since_epoch: Duration,
}

impl Deadline {
    /// Deadline `timeout` from now.
    ///
    /// # Errors
    ///
    /// Propagates clock read failures.
    pub fn after(timeout: Duration) -> PlatformResult<Self> {
        Ok(Self {
            since_epoch: realtime_now()? + timeout,
        })
    }

    /// Deadline at an explicit offset from the Unix epoch.
    #[must_use]
    pub const fn at(since_epoch: Duration) -> Self {
        Self { since_epoch }
    }

    /// Offset from the Unix epoch.
    #[inline]
    #[must_use]
    pub const fn since_epoch(&self) -> Duration {
        self.since_epoch
    }

    /// Whether the realtime clock has reached this deadline.
    ///
    /// # Errors
    ///
    /// Propagates clock read failures.
    pub fn has_passed(&self) -> PlatformResult<bool> {
        Ok(realtime_now()? >= self.since_epoch)
    }

    /// Converts to the absolute timespec pthread expects.
    pub(crate) fn to_timespec(self) -> libc::timespec {
        // SAFETY: all-zero is a valid timespec.
        let mut ts: libc::timespec = unsafe { std::mem::zeroed() };
        ts.tv_sec = libc::time_t::try_from(self.since_epoch.as_secs()).unwrap_or(libc::time_t::MAX);
        // Always below 1e9, fits every tv_nsec width.
        ts.tv_nsec = self.since_epoch.subsec_nanos().try_into().unwrap_or(0);
        ts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_realtime_is_after_epoch() {
        let now = realtime_now().unwrap();
        // Sometime after 2020.
        assert!(now.as_secs() > 1_577_836_800);
    }

    #[test]
    fn test_process_clock_monotonic() {
        let clock = ProcessClock::start();
        let a = clock.elapsed();
        std::thread::sleep(Duration::from_millis(2));
        let b = clock.elapsed();
        assert!(b >= a);
        assert!(clock.elapsed_secs() >= 0.002);
    }

    #[test]
    fn test_deadline_ordering() {
        let near = Deadline::after(Duration::from_millis(10)).unwrap();
        let far = Deadline::after(Duration::from_secs(10)).unwrap();
        assert!(near < far);
        assert!(!far.has_passed().unwrap());

        std::thread::sleep(Duration::from_millis(20));
        assert!(near.has_passed().unwrap());
    }

    #[test]
    fn test_timespec_conversion() {
        let deadline = Deadline::at(Duration::new(42, 123_456_789));
        let ts = deadline.to_timespec();
        assert_eq!(ts.tv_sec, 42);
        assert_eq!(ts.tv_nsec, 123_456_789);
    }
}
