//! Launch and memory metrics.
//!
//! With the `telemetry` feature disabled the collector is a no-op with the
//! same API.

#[cfg(feature = "telemetry")]
pub mod metrics;

#[cfg(feature = "telemetry")]
pub use metrics::{Metrics, MetricsSnapshot};

// Stub implementations when telemetry is disabled
#[cfg(not(feature = "telemetry"))]
pub mod metrics {
    use std::time::Duration;

    #[derive(Debug, Clone, Default)]
    pub struct Metrics;

    impl Metrics {
        pub fn new() -> Self {
            Self
        }
        pub fn record_launch(&self, _: usize, _: usize, _: usize, _: Duration) {}
        pub fn record_failure(&self) {}
        pub fn record_allocation(&self, _: usize) {}
        pub fn snapshot(&self) -> MetricsSnapshot {
            MetricsSnapshot::default()
        }
        pub fn reset(&self) {}
    }

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
        pub fn work_items_per_second(&self) -> f64 {
            let seconds = self.uptime.as_secs_f64();
            if seconds == 0.0 {
                return 0.0;
            }
            self.work_items_executed as f64 / seconds
        }
    }
}

#[cfg(not(feature = "telemetry"))]
pub use metrics::{Metrics, MetricsSnapshot};
