//! # Rendezvous Barrier
//!
//! A `pthread_barrier_t` with a fixed party count. Every party blocks in
//! [`Rendezvous::wait`] until the last one arrives, then all are released
//! together. There is no timeout: a party that never arrives blocks the
//! others forever.

#![allow(unsafe_code)]

use std::cell::UnsafeCell;
use std::fmt;
use std::io;
use std::mem;

use crate::error::{pthread_result, PlatformError, PlatformResult};

/// Fixed-capacity thread barrier.
pub struct Rendezvous {
    raw: Box<UnsafeCell<libc::pthread_barrier_t>>,
    parties: u32,
}

// SAFETY: pthread barriers are designed for cross-thread use; `raw` is only
// touched through pthread calls.
unsafe impl Send for Rendezvous {}
// SAFETY: see above.
unsafe impl Sync for Rendezvous {}

/// What a single [`Rendezvous::wait`] call observed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RendezvousWait {
    leader: bool,
}

impl RendezvousWait {
    /// Exactly one party per round gets `PTHREAD_BARRIER_SERIAL_THREAD`.
    #[inline]
    #[must_use]
    pub const fn is_leader(&self) -> bool {
        self.leader
    }
}

impl Rendezvous {
    /// Creates a barrier for `parties` threads.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::BarrierInit`] with `EINVAL` for zero parties,
    /// or whatever `pthread_barrier_init` reports.
    pub fn new(parties: u32) -> PlatformResult<Self> {
        if parties == 0 {
            return Err(PlatformError::BarrierInit(io::Error::from_raw_os_error(
                libc::EINVAL,
            )));
        }

        // SAFETY: all-zero storage; `pthread_barrier_init` overwrites it.
        let raw: Box<UnsafeCell<libc::pthread_barrier_t>> =
            Box::new(UnsafeCell::new(unsafe { mem::zeroed() }));

        // SAFETY: `raw` is boxed and stays put; a null attr means defaults.
        pthread_result(unsafe { libc::pthread_barrier_init(raw.get(), std::ptr::null(), parties) })
            .map_err(PlatformError::BarrierInit)?;

        Ok(Self { raw, parties })
    }

    /// Two-party barrier: one worker, one coordinator.
    ///
    /// # Errors
    ///
    /// See [`Rendezvous::new`].
    pub fn pair() -> PlatformResult<Self> {
        Self::new(2)
    }

    /// Party count fixed at construction.
    #[inline]
    #[must_use]
    pub const fn parties(&self) -> u32 {
        self.parties
    }

    /// Blocks until all parties have called `wait`.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::Barrier`] if `pthread_barrier_wait` fails.
    pub fn wait(&self) -> PlatformResult<RendezvousWait> {
        // SAFETY: `raw` was initialised in `new`.
        let rc = unsafe { libc::pthread_barrier_wait(self.raw.get()) };
        match rc {
            0 => Ok(RendezvousWait { leader: false }),
            libc::PTHREAD_BARRIER_SERIAL_THREAD => Ok(RendezvousWait { leader: true }),
            code => Err(PlatformError::Barrier(io::Error::from_raw_os_error(code))),
        }
    }
}

impl Drop for Rendezvous {
    fn drop(&mut self) {
        // SAFETY: `&mut self` proves no thread is inside `wait`.
        unsafe {
            libc::pthread_barrier_destroy(self.raw.get());
        }
    }
}

impl fmt::Debug for Rendezvous {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rendezvous")
            .field("parties", &self.parties)
            .finish_non_exhaustive()
    }
}
