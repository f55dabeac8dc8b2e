//! # Synchronization Primitives
//!
//! Two pthread objects, each living in a `Box` so its address never moves
//! after `*_init`:
//!
//! ```text
//!   aux (low prio)                      main (high prio)
//!   ──────────────                      ────────────────
//!   PiMutex::lock()
//!   Rendezvous::wait() ───────────────► Rendezvous::wait()
//!   spin, holding lock                  PiMutex::try_lock_until(deadline)
//!     (boosted to main's priority)        ... blocks ...
//!                                       LockAttempt::TimedOut
//!   guard dropped (unlock)
//! ```

mod barrier;
mod mutex;

pub use barrier::{Rendezvous, RendezvousWait};
pub use mutex::{LockAttempt, MutexProtocol, PiMutex, PiMutexGuard};
