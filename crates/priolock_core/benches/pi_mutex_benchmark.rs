//! # PI Mutex Benchmark
//!
//! What does the inheritance protocol cost when nobody contends?
//!
//! 1. lock + unlock, `PTHREAD_PRIO_NONE` vs `PTHREAD_PRIO_INHERIT`
//! 2. timed lock on a free mutex (deadline already passed)
//!
//! PI mutexes take a kernel round trip only under contention, so both
//! should stay in the same ballpark.

#![allow(missing_docs)]

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;
use priolock_core::{Deadline, MutexProtocol, PiMutex};
use std::time::Duration;

fn bench_lock_unlock(c: &mut Criterion) {
    let mut group = c.benchmark_group("pi_mutex_lock_unlock");

    for protocol in [MutexProtocol::None, MutexProtocol::Inherit] {
        let mutex = PiMutex::new(protocol).expect("mutex init");
        group.bench_with_input(
            BenchmarkId::from_parameter(protocol.name()),
            &mutex,
            |b, mutex| {
                b.iter(|| {
                    drop(black_box(mutex.lock().expect("lock")));
                });
            },
        );
    }

    group.finish();
}

fn bench_timed_lock_free(c: &mut Criterion) {
    let mut group = c.benchmark_group("pi_mutex_timed_lock_free");
    let expired = Deadline::at(Duration::ZERO);

    for protocol in [MutexProtocol::None, MutexProtocol::Inherit] {
        let mutex = PiMutex::new(protocol).expect("mutex init");
        group.bench_with_input(
            BenchmarkId::from_parameter(protocol.name()),
            &mutex,
            |b, mutex| {
                b.iter(|| {
                    let attempt = mutex.try_lock_until(black_box(expired));
                    assert!(attempt.is_acquired());
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_lock_unlock, bench_timed_lock_free);
criterion_main!(benches);
