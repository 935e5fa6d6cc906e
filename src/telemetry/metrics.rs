//! Metrics collection for launches and memory.

use hdrhistogram::Histogram;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Context-wide metrics collector
#[derive(Debug)]
pub struct Metrics {
    // Launch counters
    launches_completed: AtomicU64,
    launches_failed: AtomicU64,
    groups_executed: AtomicU64,
    work_items_executed: AtomicU64,
    barrier_phases: AtomicU64,

    // Launch latency histogram (protected by RwLock for interior mutability)
    latency_histogram: RwLock<Histogram<u64>>,

    // Memory metrics
    bytes_allocated: AtomicU64,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        // 3 significant figures, max value of 1 hour in nanoseconds
        let histogram = Histogram::new_with_max(3_600_000_000_000, 3)
            .expect("histogram bounds are valid");

        Self {
            launches_completed: AtomicU64::new(0),
            launches_failed: AtomicU64::new(0),
            groups_executed: AtomicU64::new(0),
            work_items_executed: AtomicU64::new(0),
            barrier_phases: AtomicU64::new(0),
            latency_histogram: RwLock::new(histogram),
            bytes_allocated: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a launch that ran to completion
    pub fn record_launch(&self, groups: usize, work_items: usize, phases: usize, elapsed: Duration) {
        self.launches_completed.fetch_add(1, Ordering::Relaxed);
        self.groups_executed.fetch_add(groups as u64, Ordering::Relaxed);
        self.work_items_executed
            .fetch_add(work_items as u64, Ordering::Relaxed);
        self.barrier_phases.fetch_add(phases as u64, Ordering::Relaxed);

        let nanos = elapsed.as_nanos().min(u64::MAX as u128) as u64;
        if let Some(mut hist) = self.latency_histogram.try_write() {
            let _ = hist.record(nanos);
        }
    }

    pub fn record_failure(&self) {
        self.launches_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_allocation(&self, bytes: usize) {
        self.bytes_allocated.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let histogram = self.latency_histogram.read();

        MetricsSnapshot {
            uptime: self.start_time.elapsed(),
            launches_completed: self.launches_completed.load(Ordering::Relaxed),
            launches_failed: self.launches_failed.load(Ordering::Relaxed),
            groups_executed: self.groups_executed.load(Ordering::Relaxed),
            work_items_executed: self.work_items_executed.load(Ordering::Relaxed),
            barrier_phases: self.barrier_phases.load(Ordering::Relaxed),
            avg_latency_ns: if histogram.len() > 0 {
                histogram.mean() as u64
            } else {
                0
            },
            p50_latency_ns: histogram.value_at_quantile(0.50),
            p99_latency_ns: histogram.value_at_quantile(0.99),
            max_latency_ns: histogram.max(),
            bytes_allocated: self.bytes_allocated.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.launches_completed.store(0, Ordering::Relaxed);
        self.launches_failed.store(0, Ordering::Relaxed);
        self.groups_executed.store(0, Ordering::Relaxed);
        self.work_items_executed.store(0, Ordering::Relaxed);
        self.barrier_phases.store(0, Ordering::Relaxed);
        self.bytes_allocated.store(0, Ordering::Relaxed);

        self.latency_histogram.write().reset();
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    pub uptime: Duration,
    pub launches_completed: u64,
    pub launches_failed: u64,
    pub groups_executed: u64,
    pub work_items_executed: u64,
    pub barrier_phases: u64,
    pub avg_latency_ns: u64,
    pub p50_latency_ns: u64,
    pub p99_latency_ns: u64,
    pub max_latency_ns: u64,
    pub bytes_allocated: u64,
}

impl MetricsSnapshot {
    /// Work-items per second of uptime
    pub fn work_items_per_second(&self) -> f64 {
        let seconds = self.uptime.as_secs_f64();
        if seconds == 0.0 {
            return 0.0;
        }
        self.work_items_executed as f64 / seconds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_basic() {
        let metrics = Metrics::new();

        metrics.record_launch(2, 16, 3, Duration::from_micros(10));
        metrics.record_launch(1, 4, 2, Duration::from_micros(30));
        metrics.record_failure();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.launches_completed, 2);
        assert_eq!(snapshot.launches_failed, 1);
        assert_eq!(snapshot.groups_executed, 3);
        assert_eq!(snapshot.work_items_executed, 20);
        assert_eq!(snapshot.barrier_phases, 5);
        assert!(snapshot.avg_latency_ns > 0);
    }

    #[test]
    fn test_metrics_reset() {
        let metrics = Metrics::new();

        metrics.record_launch(1, 1, 0, Duration::from_micros(1));
        metrics.record_allocation(64);
        assert_eq!(metrics.snapshot().launches_completed, 1);

        metrics.reset();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.launches_completed, 0);
        assert_eq!(snapshot.bytes_allocated, 0);
    }
}
