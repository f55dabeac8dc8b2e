//! # PRIOLOCK Core
//!
//! Safe wrappers over the Linux real-time API needed to stage a
//! priority inversion on purpose:
//!
//! - **Clock**: monotonic log timestamps, `CLOCK_REALTIME` lock deadlines
//! - **Affinity**: confine the caller to exactly one logical CPU
//! - **Scheduler**: `SCHED_FIFO` / `SCHED_RR` priority for the calling thread
//! - **`PiMutex`**: pthread mutex configured with `PTHREAD_PRIO_INHERIT`
//! - **Rendezvous**: pthread barrier
//!
//! ## Architecture Rules
//!
//! 1. **The host does the inheritance** - we configure the protocol, the
//!    kernel boosts the holder. Nothing here reimplements it.
//! 2. **Self-only scheduling** - priorities are applied to the calling
//!    thread. There is no API taking a foreign thread handle.
//! 3. **No fallbacks** - if the platform lacks a primitive, we do not build.
//!
//! ## Example
//!
//! ```rust,ignore
//! use priolock_core::{Deadline, LockAttempt, MutexProtocol, PiMutex};
//! use std::time::Duration;
//!
//! let mutex = PiMutex::new(MutexProtocol::Inherit)?;
//! match mutex.try_lock_until(Deadline::after(Duration::from_secs(1))?) {
//!     LockAttempt::Acquired(guard) => guard.release(),
//!     LockAttempt::TimedOut => println!("still held"),
//!     LockAttempt::Failed(err) => eprintln!("{err}"),
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

#[cfg(not(target_os = "linux"))]
compile_error!("PRIOLOCK needs sched_setaffinity, SCHED_FIFO and PTHREAD_PRIO_INHERIT. Linux only.");

pub mod affinity;
pub mod clock;
pub mod error;
pub mod sched;
pub mod sync;

pub use affinity::{allowed_cpus, pin_to_single_core, MAX_CPUS};
pub use clock::{realtime_now, Deadline, ProcessClock};
pub use error::{PlatformError, PlatformResult};
pub use sched::{elevate_current_thread, SchedPolicy};
pub use sync::{LockAttempt, MutexProtocol, PiMutex, PiMutexGuard, Rendezvous, RendezvousWait};
