//! End-to-end runs of the coordinator and worker.
//!
//! The mutex, rendezvous, clock and stop flag are the real ones. Only the
//! privileged host calls are replaced, so these pass without
//! `CAP_SYS_NICE`. The full run on the real host is `#[ignore]`d:
//!
//! Run with: sudo -E cargo test --test scenario_test -- --ignored --nocapture

use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use priolock::{
    CaptureBuffer, ConfigError, Coordinator, CoordinatorPhase, EventLog, LinuxHost, LogEntry,
    Outcome, RealtimeHost, ScenarioConfig, ScenarioError, EXIT_MISMATCH, EXIT_TIMED_OUT,
    LOG_HEADER,
};
use priolock_core::{PlatformError, PlatformResult, SchedPolicy};

/// Records requests and pretends they succeeded.
#[derive(Default)]
struct PermissiveHost {
    pins: Mutex<Vec<usize>>,
    elevations: Mutex<Vec<(SchedPolicy, i32)>>,
}

impl RealtimeHost for PermissiveHost {
    fn pin_to_single_core(&self, cpu: usize) -> PlatformResult<()> {
        self.pins.lock().push(cpu);
        Ok(())
    }

    fn elevate_current_thread(&self, policy: SchedPolicy, level: i32) -> PlatformResult<i32> {
        self.elevations.lock().push((policy, level));
        policy.priority_for_level(level)
    }
}

/// Host without `CAP_SYS_NICE`.
#[derive(Default)]
struct DeniedHost {
    elevations: Mutex<Vec<i32>>,
}

impl RealtimeHost for DeniedHost {
    fn pin_to_single_core(&self, _cpu: usize) -> PlatformResult<()> {
        Ok(())
    }

    fn elevate_current_thread(&self, _policy: SchedPolicy, level: i32) -> PlatformResult<i32> {
        self.elevations.lock().push(level);
        Err(PlatformError::PrivilegeRequired)
    }
}

// Same value on every Linux architecture.
const EINVAL: i32 = 22;

/// Host whose calls fail with a plain OS error.
#[derive(Default)]
struct FaultyHost {
    pin_errno: Option<i32>,
    sched_errno: Option<i32>,
    pins: Mutex<Vec<usize>>,
    elevations: Mutex<Vec<i32>>,
}

impl RealtimeHost for FaultyHost {
    fn pin_to_single_core(&self, cpu: usize) -> PlatformResult<()> {
        self.pins.lock().push(cpu);
        match self.pin_errno {
            Some(code) => Err(PlatformError::Affinity(io::Error::from_raw_os_error(code))),
            None => Ok(()),
        }
    }

    fn elevate_current_thread(&self, policy: SchedPolicy, level: i32) -> PlatformResult<i32> {
        self.elevations.lock().push(level);
        match self.sched_errno {
            Some(code) => Err(PlatformError::Scheduler(io::Error::from_raw_os_error(code))),
            None => policy.priority_for_level(level),
        }
    }
}

fn config(work_time_ms: u64, lock_timeout_ms: u64) -> ScenarioConfig {
    ScenarioConfig {
        work_time_ms,
        lock_timeout_ms,
        ..ScenarioConfig::default()
    }
}

fn position(entries: &[LogEntry], tag: &str, prefix: &str) -> usize {
    entries
        .iter()
        .position(|e| e.tag == tag && e.message.starts_with(prefix))
        .unwrap_or_else(|| panic!("no {tag} line starting with {prefix:?}"))
}

#[test]
fn test_scenario_a_times_out() {
    let buffer = CaptureBuffer::new();
    let host = Arc::new(PermissiveHost::default());
    let log = Arc::new(EventLog::with_sink(buffer.clone()));
    let mut coordinator = Coordinator::new(config(2_000, 200), host.clone(), log);

    let report = coordinator.run().unwrap();

    assert_eq!(report.outcome, Outcome::TimedOut);
    assert_eq!(report.exit_code(), EXIT_TIMED_OUT);
    assert!(report.waited >= Duration::from_millis(190), "waited {:?}", report.waited);
    assert_eq!(coordinator.phase(), CoordinatorPhase::Done);

    let contents = buffer.contents();
    assert_eq!(contents.lines().next(), Some(LOG_HEADER));
    assert!(!contents.contains("ERROR"));

    let entries = buffer.entries();
    let locked = position(&entries, "aux", "Locked mutex");
    let rendezvoused = position(&entries, "main", "barrier wait done");
    let attempt = position(&entries, "main", "timedlock(");
    let verdict = position(&entries, "main", "timedlock: timed out");
    let unlocked = position(&entries, "aux", "Unlocked mutex");
    assert!(locked < rendezvoused);
    assert!(rendezvoused < attempt);
    assert!(attempt < verdict);
    assert!(verdict < unlocked);
}

#[test]
fn test_scenario_b_zero_hold_is_reported_as_mismatch() {
    let buffer = CaptureBuffer::new();
    let host = Arc::new(PermissiveHost::default());
    let log = Arc::new(EventLog::with_sink(buffer.clone()));
    let mut coordinator = Coordinator::new(config(0, 1_000), host, log);

    let report = coordinator.run().unwrap();

    assert_eq!(report.outcome, Outcome::Acquired);
    assert_eq!(report.exit_code(), EXIT_MISMATCH);
    assert!(report.waited < Duration::from_secs(1));
    // Mismatch is not fatal: aux is still joined.
    assert_eq!(coordinator.phase(), CoordinatorPhase::Done);

    let entries = buffer.entries();
    let error = position(&entries, "main", "ERROR: Expected timedlock to time out");
    let verdict = position(&entries, "main", "timedlock: succeeded, not timed out");
    assert!(error < verdict);
    position(&entries, "aux", "Unlocked mutex");
}

#[test]
fn test_scenario_c_privilege_denied_before_spawn() {
    let buffer = CaptureBuffer::new();
    let host = Arc::new(DeniedHost::default());
    let log = Arc::new(EventLog::with_sink(buffer.clone()));
    let mut coordinator = Coordinator::new(ScenarioConfig::default(), host.clone(), log);

    let err = coordinator.run().unwrap_err();

    assert!(matches!(
        err,
        ScenarioError::Setup(PlatformError::PrivilegeRequired)
    ));
    assert!(coordinator.phase() < CoordinatorPhase::WorkerSpawned);
    // Only main ever asked.
    assert_eq!(*host.elevations.lock(), vec![1]);

    let entries = buffer.entries();
    assert!(entries.iter().all(|e| e.tag == "main"));
    assert!(buffer.contents().contains("re-run with sufficient privilege"));
}

#[test]
fn test_affinity_failure_is_fatal_before_elevation() {
    let buffer = CaptureBuffer::new();
    let host = Arc::new(FaultyHost {
        pin_errno: Some(EINVAL),
        ..FaultyHost::default()
    });
    let log = Arc::new(EventLog::with_sink(buffer.clone()));
    let mut coordinator = Coordinator::new(ScenarioConfig::default(), host.clone(), log);

    let err = coordinator.run().unwrap_err();

    assert!(matches!(
        err,
        ScenarioError::Setup(PlatformError::Affinity(_))
    ));
    assert_eq!(coordinator.phase(), CoordinatorPhase::Init);
    assert_eq!(*host.pins.lock(), vec![1]);
    assert!(host.elevations.lock().is_empty());

    let entries = buffer.entries();
    assert!(entries.iter().all(|e| e.tag == "main"));
    let last = entries.last().unwrap();
    assert!(last.message.starts_with("unable to set cpu affinity"), "{}", last.message);
    assert!(last.message.contains(&io::Error::from_raw_os_error(EINVAL).to_string()));
}

#[test]
fn test_scheduler_failure_other_than_privilege_is_fatal() {
    let buffer = CaptureBuffer::new();
    let host = Arc::new(FaultyHost {
        sched_errno: Some(EINVAL),
        ..FaultyHost::default()
    });
    let log = Arc::new(EventLog::with_sink(buffer.clone()));
    let mut coordinator = Coordinator::new(ScenarioConfig::default(), host.clone(), log);

    let err = coordinator.run().unwrap_err();

    assert!(matches!(
        err,
        ScenarioError::Setup(PlatformError::Scheduler(_))
    ));
    assert_eq!(coordinator.phase(), CoordinatorPhase::LockConfigured);
    assert_eq!(*host.elevations.lock(), vec![1]);

    let contents = buffer.contents();
    assert!(contents.contains("unable to set scheduling parameters"));
    assert!(!contents.contains("re-run with sufficient privilege"));
    assert!(buffer.entries().iter().all(|e| e.tag == "main"));
}

#[test]
fn test_inverted_levels_rejected_before_any_host_call() {
    let buffer = CaptureBuffer::new();
    let host = Arc::new(FaultyHost::default());
    let log = Arc::new(EventLog::with_sink(buffer.clone()));
    let scenario = ScenarioConfig {
        worker_level: 5,
        coordinator_level: 1,
        ..config(300, 50)
    };
    let mut coordinator = Coordinator::new(scenario, host.clone(), log);

    let err = coordinator.run().unwrap_err();

    assert!(matches!(
        err,
        ScenarioError::Config(ConfigError::InvertedPriorities {
            worker: 5,
            coordinator: 1
        })
    ));
    assert_eq!(coordinator.phase(), CoordinatorPhase::Init);
    assert!(host.pins.lock().is_empty());
    assert!(host.elevations.lock().is_empty());
    assert!(buffer.contents().contains("must be strictly above worker level"));
}

#[test]
fn test_rejected_scenario_file_is_reported_in_the_run_log() {
    let buffer = CaptureBuffer::new();
    let log = EventLog::with_sink(buffer.clone());

    let err = ScenarioConfig::from_toml_str("worker_level = 4\ncoordinator_level = 4\n").unwrap_err();
    log.record_startup_failure(&err);

    let contents = buffer.contents();
    assert_eq!(contents.lines().next(), Some(LOG_HEADER));
    let entries = buffer.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].tag, "main");
    assert_eq!(entries[0].message, err.to_string());
}

#[test]
fn test_stop_flag_cuts_long_hold_short() {
    let buffer = CaptureBuffer::new();
    let host = Arc::new(PermissiveHost::default());
    let log = Arc::new(EventLog::with_sink(buffer.clone()));
    let mut coordinator = Coordinator::new(config(60_000, 100), host, log);

    let start = Instant::now();
    let report = coordinator.run().unwrap();

    assert!(report.is_expected());
    assert!(start.elapsed() < Duration::from_secs(20), "took {:?}", start.elapsed());

    let entries = buffer.entries();
    position(&entries, "aux", "Stop requested");
    position(&entries, "aux", "Unlocked mutex");
}

#[test]
fn test_host_sees_configured_cpu_and_levels() {
    let host = Arc::new(PermissiveHost::default());
    let log = Arc::new(EventLog::with_sink(CaptureBuffer::new()));
    let scenario = ScenarioConfig {
        cpu: 0,
        policy: SchedPolicy::RoundRobin,
        worker_level: 2,
        coordinator_level: 5,
        ..config(300, 50)
    };
    let mut coordinator = Coordinator::new(scenario, host.clone(), log);

    coordinator.run().unwrap();

    assert_eq!(*host.pins.lock(), vec![0]);
    // main elevates itself before aux exists.
    assert_eq!(
        *host.elevations.lock(),
        vec![(SchedPolicy::RoundRobin, 5), (SchedPolicy::RoundRobin, 2)]
    );
}

#[test]
fn test_repeated_runs_are_stable() {
    for _ in 0..3 {
        let host = Arc::new(PermissiveHost::default());
        let log = Arc::new(EventLog::with_sink(CaptureBuffer::new()));
        let report = Coordinator::new(config(400, 50), host, log).run().unwrap();
        assert_eq!(report.exit_code(), EXIT_TIMED_OUT);
    }
}

#[test]
#[ignore = "needs CAP_SYS_NICE and a cpu 1"]
fn test_default_scenario_on_real_host() {
    let buffer = CaptureBuffer::new();
    let log = Arc::new(EventLog::with_sink(buffer.clone()));
    let mut coordinator = Coordinator::new(ScenarioConfig::default(), Arc::new(LinuxHost), log);

    let report = coordinator.run().unwrap();
    print!("{}", buffer.contents());

    assert_eq!(report.outcome, Outcome::TimedOut);
    assert!(report.waited >= Duration::from_millis(990));
}
