pub use crate::config::{Config, ConfigBuilder, ExecutionStrategy};
pub use crate::context::ExecutionContext;
pub use crate::error::{Error, Result};
pub use crate::index::{Extent, Index2D, IndexSpace};
pub use crate::kernel::{Kernel, KernelFn, WorkItem};
pub use crate::launch::{LaunchHandle, LaunchReport};
pub use crate::memory::{ArrayView, Buffer, Element};
pub use crate::profiling::{Comparison, HostStopwatch, ProfilingMarker};

pub use crate::telemetry::MetricsSnapshot;
