//! # Real-Time Host
//!
//! The two privileged, process-visible side effects of a run sit behind
//! one trait so the scenario can be staged on machines without
//! `CAP_SYS_NICE`:
//!
//! - confining execution to one CPU
//! - switching the **calling** thread to a real-time class
//!
//! [`LinuxHost`] performs them for real. The lock, barrier, clock and stop
//! flag are never routed through here.

use priolock_core::{PlatformResult, SchedPolicy};

/// Privileged scheduling operations.
pub trait RealtimeHost: Send + Sync {
    /// Restricts the calling thread, and threads it spawns, to `cpu`.
    ///
    /// # Errors
    ///
    /// Fails when the kernel rejects the affinity mask.
    fn pin_to_single_core(&self, cpu: usize) -> PlatformResult<()>;

    /// Puts the calling thread into `policy` at `level` above its minimum.
    ///
    /// Returns the absolute priority applied.
    ///
    /// # Errors
    ///
    /// Fails with `PrivilegeRequired` when real-time scheduling is denied.
    fn elevate_current_thread(&self, policy: SchedPolicy, level: i32) -> PlatformResult<i32>;
}

/// Host backed by `sched_setaffinity` and `pthread_setschedparam`.
#[derive(Clone, Copy, Debug, Default)]
pub struct LinuxHost;

impl RealtimeHost for LinuxHost {
    fn pin_to_single_core(&self, cpu: usize) -> PlatformResult<()> {
        priolock_core::pin_to_single_core(cpu)
    }

    fn elevate_current_thread(&self, policy: SchedPolicy, level: i32) -> PlatformResult<i32> {
        priolock_core::elevate_current_thread(policy, level)
    }
}
