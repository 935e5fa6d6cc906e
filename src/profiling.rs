//! Stream-ordered profiling markers and the host-side stopwatch they are
//! compared against.

use crate::error::{Error, Result};
use crate::sync::Completion;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A timestamp taken on a context's stream.
///
/// The stream stamps the marker only after every launch queued before it
/// has finished, so the difference between two markers brackets exactly the
/// work issued between them.
#[derive(Clone)]
pub struct ProfilingMarker {
    pub(crate) context: u64,
    pub(crate) seq: u64,
    pub(crate) recorded: Arc<Completion<Instant>>,
}

impl ProfilingMarker {
    /// Issue order within the owning context.
    pub fn sequence(&self) -> u64 {
        self.seq
    }

    pub fn is_recorded(&self) -> bool {
        self.recorded.is_complete()
    }

    /// Blocks until the stream has reached this marker.
    pub fn timestamp(&self) -> Instant {
        self.recorded.wait()
    }

    /// The timestamp if the stream has already reached this marker.
    pub fn try_timestamp(&self) -> Option<Instant> {
        self.recorded.try_get()
    }

    /// Time between `start` and this marker. `start` must come from the same
    /// context and must not have been issued after `self`.
    pub fn elapsed_since(&self, start: &ProfilingMarker) -> Result<Duration> {
        if self.context != start.context {
            return Err(Error::profiling(
                "markers belong to different execution contexts",
            ));
        }
        if self.seq < start.seq {
            return Err(Error::profiling(format!(
                "end marker #{} was issued before start marker #{}",
                self.seq, start.seq
            )));
        }
        let begin = start.timestamp();
        let end = self.timestamp();
        Ok(end.saturating_duration_since(begin))
    }
}

impl fmt::Debug for ProfilingMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProfilingMarker")
            .field("context", &self.context)
            .field("seq", &self.seq)
            .field("recorded", &self.is_recorded())
            .finish()
    }
}

/// Host-only wall-clock timer for baseline measurements.
#[derive(Debug, Clone, Copy)]
pub struct HostStopwatch {
    start: Instant,
    stopped: Option<Duration>,
}

impl HostStopwatch {
    pub fn start_new() -> Self {
        Self {
            start: Instant::now(),
            stopped: None,
        }
    }

    pub fn stop(&mut self) -> Duration {
        let start = self.start;
        *self.stopped.get_or_insert_with(|| start.elapsed())
    }

    pub fn elapsed(&self) -> Duration {
        self.stopped.unwrap_or_else(|| self.start.elapsed())
    }

    /// Run `f` and return its result with the time it took.
    pub fn time<R, F: FnOnce() -> R>(f: F) -> (R, Duration) {
        let mut watch = Self::start_new();
        let result = f();
        (result, watch.stop())
    }
}

/// Device run next to the equivalent host run.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison<T> {
    pub device_result: T,
    pub device_time: Duration,
    pub host_result: T,
    pub host_time: Duration,
}

impl<T: PartialEq> Comparison<T> {
    pub fn results_match(&self) -> bool {
        self.device_result == self.host_result
    }

    /// How many times faster the device run was (`> 1.0` means faster).
    pub fn speedup(&self) -> f64 {
        let device = self.device_time.as_secs_f64();
        if device == 0.0 {
            return f64::INFINITY;
        }
        self.host_time.as_secs_f64() / device
    }
}

impl<T: fmt::Display + PartialEq> fmt::Display for Comparison<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "device: result {} in {:?}", self.device_result, self.device_time)?;
        writeln!(f, "host:   result {} in {:?}", self.host_result, self.host_time)?;
        write!(
            f,
            "match: {}, speedup: {:.2}x",
            self.results_match(),
            self.speedup()
        )
    }
}
