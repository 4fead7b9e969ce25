//! Scenario tests for the three PVM meter sequences.
//!
//! These run against the real host accounting through `sysinfo`, except where
//! a failing host is simulated with a scripted `CpuProbe`.

use std::sync::mpsc;
use std::thread;

use pvm_agent::handle::ProcessHandle;
use pvm_agent::probe::CpuProbe;
use pvm_agent::{CpuUtilization, Metric, MetricsError, ProcessMetricsSource, ThreadRegistry};

/// Probe that fails on one specific call and succeeds on every other.
struct FlakyProbe {
    calls: usize,
    fail_on: usize,
}

impl FlakyProbe {
    fn failing_on(call: usize) -> Self {
        Self {
            calls: 0,
            fail_on: call,
        }
    }

    fn tick(&mut self, metric: Metric) -> Result<f32, MetricsError> {
        self.calls += 1;
        if self.calls == self.fail_on {
            Err(MetricsError::unavailable(metric, "accounting read failed"))
        } else {
            Ok(self.calls as f32)
        }
    }
}

impl CpuProbe for FlakyProbe {
    fn system_cpu_usage(&mut self) -> Result<f32, MetricsError> {
        self.tick(Metric::TotalCpuUtilization)
    }

    fn process_cpu_usage(&mut self, _: &ProcessHandle) -> Result<f32, MetricsError> {
        self.tick(Metric::ProcessCpuUtilization)
    }
}

// ── CPU utilization ─────────────────────────────────────────────────

#[test]
fn test_system_cpu_readings_non_negative() {
    let source = ProcessMetricsSource::new().expect("process accounting available");

    for reading in source.system_cpu_utilization().take(3) {
        let usage = reading.expect("system cpu reading");
        thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        assert!(usage.is_finite());
        assert!((0.0..=100.0).contains(&usage), "got {usage}");
    }
}

#[test]
fn test_process_cpu_first_pull_may_be_zero() {
    let source = ProcessMetricsSource::new().unwrap();
    let mut sequence = source.process_cpu_utilization();

    // Warm-up: no previous sample, so 0.0 is a legitimate first value.
    let first = sequence.next().unwrap().unwrap();
    assert!(first >= 0.0);

    // Burn some CPU so later readings have something to measure.
    let mut acc = 0u64;
    for i in 0..2_000_000u64 {
        acc = acc.wrapping_add(i * i);
    }
    std::hint::black_box(acc);

    for reading in sequence.take(3) {
        thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        let usage = reading.unwrap();
        assert!(usage.is_finite() && usage >= 0.0, "got {usage}");
    }
}

#[test]
fn test_failure_on_third_pull_does_not_end_sequence() {
    let mut sequence = CpuUtilization::system(FlakyProbe::failing_on(3));

    assert_eq!(sequence.next(), Some(Ok(1.0)));
    assert_eq!(sequence.next(), Some(Ok(2.0)));

    match sequence.next() {
        Some(Err(MetricsError::MetricUnavailable { metric, .. })) => {
            assert_eq!(metric, Metric::TotalCpuUtilization);
        }
        other => panic!("expected MetricUnavailable, got {other:?}"),
    }

    // Facility recovered.
    assert_eq!(sequence.next(), Some(Ok(4.0)));
}

#[test]
fn test_process_failure_names_process_meter() {
    let handle = ProcessHandle::current().unwrap();
    let mut sequence = CpuUtilization::process(FlakyProbe::failing_on(1), handle);

    let err = sequence.next().unwrap().unwrap_err();
    assert_eq!(err.metric(), Some(Metric::ProcessCpuUtilization));
    assert!(sequence.next().unwrap().is_ok());
}

// ── Thread count ────────────────────────────────────────────────────

#[test]
fn test_thread_count_never_terminates() {
    let source = ProcessMetricsSource::new().unwrap();
    let mut sequence = source.active_thread_count();

    for _ in 0..1_000 {
        let count = sequence
            .next()
            .expect("sequence must not terminate")
            .expect("runtime count never fails");
        assert!(count >= 1);
    }
}

#[test]
fn test_thread_count_tracks_workers() {
    let registry = ThreadRegistry::new();
    let source = ProcessMetricsSource::new()
        .unwrap()
        .with_registry(registry.clone());
    let mut count = source.active_thread_count();

    let before = count.next().unwrap().unwrap();
    assert_eq!(before, 1);

    let mut stops = Vec::new();
    let mut workers = Vec::new();
    for _ in 0..5 {
        let (tx, rx) = mpsc::channel::<()>();
        stops.push(tx);
        workers.push(registry.spawn(move || rx.recv().ok()).unwrap());
    }

    let during = count.next().unwrap().unwrap();
    assert!(during >= 6, "expected at least 6, got {during}");

    drop(stops);
    for worker in workers {
        worker.join().unwrap();
    }

    let after = count.next().unwrap().unwrap();
    assert_eq!(after, during - 5);
}

#[test]
fn test_thread_count_includes_runtime_workers() {
    let registry = ThreadRegistry::new();
    let runtime = registry.tokio_runtime(Some(4)).unwrap();
    let source = ProcessMetricsSource::new()
        .unwrap()
        .with_registry(registry.clone());

    let count = runtime.block_on(async move {
        let mut count = source.active_thread_count();
        // Workers register from their own threads; give them a moment.
        for _ in 0..500 {
            let n = count.next().unwrap().unwrap();
            if n >= 5 {
                return n;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        count.next().unwrap().unwrap()
    });
    assert!(count >= 5, "4 workers plus main thread, got {count}");
}

// ── Concurrency ─────────────────────────────────────────────────────

#[test]
fn test_two_sources_pulled_concurrently() {
    let a = ProcessMetricsSource::new().unwrap();
    let b = ProcessMetricsSource::new().unwrap();

    thread::scope(|s| {
        let handles = [&a, &b].map(|source| {
            s.spawn(move || {
                let mut system = source.system_cpu_utilization();
                let mut process = source.process_cpu_utilization();
                let mut threads = source.active_thread_count();
                for _ in 0..5 {
                    assert!(system.next().unwrap().is_ok());
                    assert!(process.next().unwrap().is_ok());
                    assert!(threads.next().unwrap().unwrap() >= 1);
                    thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
                }
            })
        });
        for handle in handles {
            handle.join().unwrap();
        }
    });
}

#[test]
fn test_sequences_of_one_source_are_independent() {
    let source = ProcessMetricsSource::new().unwrap();
    let mut first = source.system_cpu_utilization();
    let mut second = source.system_cpu_utilization();

    // Pulling one sequence must not advance or disturb the other.
    for _ in 0..3 {
        assert!(first.next().unwrap().is_ok());
        thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
    }
    assert!(second.next().unwrap().is_ok());
}
