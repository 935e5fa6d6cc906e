//! groupsync - a small data-parallel kernel engine with group barriers
//!
//! Kernels run once per index of a 1D or 2D index space. The space is cut
//! into groups; work-items of one group run concurrently and can meet at a
//! barrier, which detects members that skip it.
//!
//! # Quick Start
//!
//! ```no_run
//! use groupsync_rs::prelude::*;
//! use groupsync_rs::kernels::device_sum;
//!
//! let ctx = ExecutionContext::with_defaults().unwrap();
//!
//! let report = device_sum(&ctx, &[1, 2, 3, 4, 5, 6], 8).unwrap();
//! assert_eq!(report.result, 21);
//! println!("device time: {:?}", report.device_time);
//! ```
//!
//! # Features
//!
//! - **Buffers**: host and device copies, synchronized by explicit transfers
//! - **Index spaces**: 1D and row-major 2D, partitioned into groups
//! - **Group barriers**: phase-counted, with divergence and timeout detection
//! - **Ordered stream**: launches and profiling markers complete in issue order
//! - **Telemetry**: launch counters and latency histogram (optional)

#![warn(missing_debug_implementations)]

pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod index;
pub mod kernel;
pub mod kernels;
pub mod launch;
pub mod memory;
pub mod prelude;
pub mod profiling;
mod stream;
pub mod sync;
pub mod telemetry;

pub use config::{Config, ConfigBuilder, ExecutionStrategy};
pub use context::ExecutionContext;
pub use error::{Error, Result};
pub use index::{Extent, Index2D, IndexSpace};
pub use kernel::{Kernel, KernelFn, WorkItem};
pub use launch::{LaunchHandle, LaunchReport};
pub use memory::{ArrayView, Buffer};
pub use profiling::{Comparison, HostStopwatch, ProfilingMarker};
