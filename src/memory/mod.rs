//! Device memory: capacity-limited allocation and host/device buffers.

pub mod allocator;
pub mod buffer;

pub use allocator::{AllocationLease, DeviceAllocator};
pub use buffer::{ArrayView, Buffer, BufferId, Element};
