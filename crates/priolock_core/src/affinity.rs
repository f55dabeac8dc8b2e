//! # CPU Affinity
//!
//! Confines the caller to one logical CPU so two threads can never run
//! truly in parallel. With a single core, the real-time scheduler alone
//! decides who runs, which is the whole point.
//!
//! On Linux `sched_setaffinity(0, ..)` applies to the calling thread;
//! threads spawned afterwards inherit the mask. Pin before spawning.

#![allow(unsafe_code)]

use std::io;
use std::mem;

use crate::error::{PlatformError, PlatformResult};

/// Number of CPUs representable in a `cpu_set_t`.
#[allow(clippy::cast_sign_loss)]
pub const MAX_CPUS: usize = libc::CPU_SETSIZE as usize;

/// Restricts the calling thread (and every thread it spawns later) to `cpu`.
///
/// # Errors
///
/// - [`PlatformError::InvalidCpu`] if `cpu` does not fit in a `cpu_set_t`
/// - [`PlatformError::Affinity`] if the kernel refuses the mask (CPU
///   offline, outside the cgroup's cpuset, missing permission)
pub fn pin_to_single_core(cpu: usize) -> PlatformResult<()> {
    if cpu >= MAX_CPUS {
        return Err(PlatformError::InvalidCpu {
            cpu,
            max: MAX_CPUS - 1,
        });
    }

    // SAFETY: all-zero is a valid, empty cpu_set_t.
    let mut set: libc::cpu_set_t = unsafe { mem::zeroed() };
    // SAFETY: `cpu` was bounds-checked against CPU_SETSIZE above.
    unsafe {
        libc::CPU_ZERO(&mut set);
        libc::CPU_SET(cpu, &mut set);
    }

    // SAFETY: `set` outlives the call and the size matches its type.
    let rc = unsafe { libc::sched_setaffinity(0, mem::size_of::<libc::cpu_set_t>(), &set) };
    if rc != 0 {
        return Err(PlatformError::Affinity(io::Error::last_os_error()));
    }

    tracing::debug!(cpu, "restricted execution to a single core");
    Ok(())
}

/// CPUs the calling thread is currently allowed to run on.
///
/// # Errors
///
/// Returns [`PlatformError::Affinity`] if `sched_getaffinity` fails.
pub fn allowed_cpus() -> PlatformResult<Vec<usize>> {
    // SAFETY: all-zero is a valid, empty cpu_set_t.
    let mut set: libc::cpu_set_t = unsafe { mem::zeroed() };
    // SAFETY: `set` is a valid out-pointer of the advertised size.
    let rc = unsafe { libc::sched_getaffinity(0, mem::size_of::<libc::cpu_set_t>(), &mut set) };
    if rc != 0 {
        return Err(PlatformError::Affinity(io::Error::last_os_error()));
    }

    // SAFETY: every index is below CPU_SETSIZE.
    Ok((0..MAX_CPUS)
        .filter(|&cpu| unsafe { libc::CPU_ISSET(cpu, &set) })
        .collect())
}
