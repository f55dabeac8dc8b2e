//! # Priority-Inheritance Mutex
//!
//! A `pthread_mutex_t` created with `PTHREAD_PRIO_INHERIT`. While a
//! low-priority thread holds it and a high-priority thread blocks on it,
//! the kernel runs the holder at the waiter's priority. That boost is the
//! host's job; this type only selects the protocol and exposes the three
//! operations the scenario needs: blocking lock, timed lock, release.
//!
//! ## Safety Note
//!
//! The raw mutex sits in a `Box<UnsafeCell<_>>` so it has a stable address
//! from `pthread_mutex_init` until `pthread_mutex_destroy`. Guards are
//! `!Send`: a mutex must be unlocked by the thread that locked it.

#![allow(unsafe_code)]

use std::cell::UnsafeCell;
use std::fmt;
use std::io;
use std::marker::PhantomData;
use std::mem::MaybeUninit;

use serde::Deserialize;

use crate::clock::Deadline;
use crate::error::{pthread_result, PlatformError, PlatformResult};

/// Locking protocol selected at construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutexProtocol {
    /// `PTHREAD_PRIO_NONE`: plain mutex, inversion is unbounded.
    None,
    /// `PTHREAD_PRIO_INHERIT`: holder inherits the highest waiter priority.
    #[default]
    Inherit,
}

impl MutexProtocol {
    /// The raw libc protocol constant.
    #[inline]
    #[must_use]
    pub const fn as_raw(self) -> libc::c_int {
        match self {
            Self::None => libc::PTHREAD_PRIO_NONE,
            Self::Inherit => libc::PTHREAD_PRIO_INHERIT,
        }
    }

    /// Short name used in logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "PTHREAD_PRIO_NONE",
            Self::Inherit => "PTHREAD_PRIO_INHERIT",
        }
    }
}

/// Mutex with a configurable pthread locking protocol.
pub struct PiMutex {
    raw: Box<UnsafeCell<libc::pthread_mutex_t>>,
    protocol: MutexProtocol,
}

// SAFETY: pthread mutexes are designed to be shared between threads; all
// access to `raw` goes through pthread calls.
unsafe impl Send for PiMutex {}
// SAFETY: see above.
unsafe impl Sync for PiMutex {}

impl PiMutex {
    /// Creates a mutex using `protocol`.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::MutexInit`] if the attribute or the mutex
    /// cannot be initialised (for example `ENOTSUP` when the protocol is
    /// not available).
    pub fn new(protocol: MutexProtocol) -> PlatformResult<Self> {
        let mut attr = MaybeUninit::<libc::pthread_mutexattr_t>::uninit();
        // SAFETY: `attr` is a valid out-pointer.
        pthread_result(unsafe { libc::pthread_mutexattr_init(attr.as_mut_ptr()) })
            .map_err(PlatformError::MutexInit)?;

        let raw = Box::new(UnsafeCell::new(libc::PTHREAD_MUTEX_INITIALIZER));

        // SAFETY: `attr` was initialised above and is destroyed exactly once;
        // `raw` is boxed and does not move afterwards.
        let rc = unsafe {
            let mut rc = libc::pthread_mutexattr_setprotocol(attr.as_mut_ptr(), protocol.as_raw());
            if rc == 0 {
                rc = libc::pthread_mutex_init(raw.get(), attr.as_ptr());
            }
            libc::pthread_mutexattr_destroy(attr.as_mut_ptr());
            rc
        };
        pthread_result(rc).map_err(PlatformError::MutexInit)?;

        tracing::debug!(protocol = protocol.name(), "mutex initialised");
        Ok(Self { raw, protocol })
    }

    /// Protocol the mutex was created with.
    #[inline]
    #[must_use]
    pub const fn protocol(&self) -> MutexProtocol {
        self.protocol
    }

    /// Blocks until the mutex is free, then takes it.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::Lock`] on unrecoverable failures such as
    /// `EDEADLK` or a priority above the mutex ceiling.
    pub fn lock(&self) -> PlatformResult<PiMutexGuard<'_>> {
        // SAFETY: `raw` was initialised in `new` and lives as long as `self`.
        pthread_result(unsafe { libc::pthread_mutex_lock(self.raw.get()) })
            .map_err(PlatformError::Lock)?;
        Ok(PiMutexGuard::new(self))
    }

    /// Blocks until the mutex is free or `deadline` passes.
    ///
    /// A free mutex is always acquired, even with a deadline in the past.
    #[must_use = "dropping an acquired attempt releases the lock immediately"]
    pub fn try_lock_until(&self, deadline: Deadline) -> LockAttempt<'_> {
        let ts = deadline.to_timespec();
        // SAFETY: `raw` is initialised; `ts` outlives the call.
        let rc = unsafe { libc::pthread_mutex_timedlock(self.raw.get(), &ts) };
        match rc {
            0 => LockAttempt::Acquired(PiMutexGuard::new(self)),
            libc::ETIMEDOUT => LockAttempt::TimedOut,
            code => LockAttempt::Failed(io::Error::from_raw_os_error(code)),
        }
    }
}

impl Drop for PiMutex {
    fn drop(&mut self) {
        // SAFETY: no guard can outlive the borrow of `self`, so the mutex
        // is unlocked here.
        unsafe {
            libc::pthread_mutex_destroy(self.raw.get());
        }
    }
}

impl fmt::Debug for PiMutex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PiMutex")
            .field("protocol", &self.protocol)
            .finish_non_exhaustive()
    }
}

/// Outcome of a bounded lock attempt.
///
/// Timing out is an outcome, not an error: callers must be able to tell it
/// apart from every other failure.
#[derive(Debug)]
pub enum LockAttempt<'a> {
    /// The mutex was taken before the deadline.
    Acquired(PiMutexGuard<'a>),
    /// The deadline passed while the mutex was still held.
    TimedOut,
    /// Any other pthread error.
    Failed(io::Error),
}

impl LockAttempt<'_> {
    /// Whether the attempt ended with `ETIMEDOUT`.
    #[inline]
    #[must_use]
    pub const fn is_timed_out(&self) -> bool {
        matches!(self, Self::TimedOut)
    }

    /// Whether the attempt took the lock.
    #[inline]
    #[must_use]
    pub const fn is_acquired(&self) -> bool {
        matches!(self, Self::Acquired(_))
    }
}

/// Held lock. Dropping it releases the mutex.
pub struct PiMutexGuard<'a> {
    mutex: &'a PiMutex,
    // Unlock must happen on the locking thread.
    _not_send: PhantomData<*const ()>,
}

impl<'a> PiMutexGuard<'a> {
    fn new(mutex: &'a PiMutex) -> Self {
        Self {
            mutex,
            _not_send: PhantomData,
        }
    }

    /// Releases the mutex.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for PiMutexGuard<'_> {
    fn drop(&mut self) {
        // SAFETY: this guard exists only while the current thread holds
        // the mutex.
        unsafe {
            libc::pthread_mutex_unlock(self.mutex.raw.get());
        }
    }
}

impl fmt::Debug for PiMutexGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PiMutexGuard")
            .field("protocol", &self.mutex.protocol)
            .finish()
    }
}
