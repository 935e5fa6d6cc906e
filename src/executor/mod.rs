//! Work execution infrastructure.
//!
//! The worker pool runs one task per group; each group fans its work-items
//! out to scoped threads that meet at the group barrier.

pub mod cpu_pool;
pub(crate) mod dispatch;
pub(crate) mod group;
pub mod panic_handler;
pub mod task;
pub mod worker;

pub use cpu_pool::{CpuPool, PoolStats};
pub use panic_handler::{KernelPanic, PanicHandler, PanicStrategy};
