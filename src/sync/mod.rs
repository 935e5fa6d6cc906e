//! Synchronization primitives used by the execution engine.

pub mod barrier;
pub mod cancel;
pub mod completion;

pub use barrier::GroupBarrier;
pub use cancel::CancelToken;
pub use completion::Completion;
