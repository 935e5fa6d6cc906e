//! Kernels and the per-work-item context they run with.

use crate::error::Result;
use crate::index::{Index2D, IndexSpace};
use crate::sync::{CancelToken, GroupBarrier};
use std::fmt;
use std::sync::Arc;

/// Work-item logic dispatched over an index space.
///
/// Kernels reach buffers through [`ArrayView`](crate::memory::ArrayView)s
/// they own. A kernel returning `Err` (or panicking) aborts the whole launch.
pub trait Kernel: Send + Sync + 'static {
    fn execute(&self, item: &WorkItem) -> Result<()>;

    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// A named kernel backed by a closure.
///
/// ```
/// use groupsync_rs::kernel::KernelFn;
///
/// let kernel = KernelFn::new("noop", |_item| Ok(()));
/// # let _ = kernel;
/// ```
pub struct KernelFn<F> {
    name: &'static str,
    func: F,
}

impl<F> KernelFn<F>
where
    F: Fn(&WorkItem) -> Result<()> + Send + Sync + 'static,
{
    pub fn new(name: &'static str, func: F) -> Self {
        Self { name, func }
    }
}

impl<F> Kernel for KernelFn<F>
where
    F: Fn(&WorkItem) -> Result<()> + Send + Sync + 'static,
{
    fn execute(&self, item: &WorkItem) -> Result<()> {
        (self.func)(item)
    }

    fn name(&self) -> &str {
        self.name
    }
}

impl<F> fmt::Debug for KernelFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KernelFn").field("name", &self.name).finish()
    }
}

/// What one work-item knows about itself.
pub struct WorkItem {
    pub(crate) index: usize,
    pub(crate) local: usize,
    pub(crate) group: usize,
    pub(crate) group_base: usize,
    pub(crate) group_len: usize,
    pub(crate) space: IndexSpace,
    pub(crate) barrier: Arc<GroupBarrier>,
    pub(crate) cancel: CancelToken,
}

impl WorkItem {
    /// Global linear index.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Global index as a coordinate of a 2D space (`y == 0` for 1D spaces).
    pub fn index_2d(&self) -> Index2D {
        self.space.index_2d(self.index)
    }

    /// Index within the group, `0..group_len()`.
    pub fn local_index(&self) -> usize {
        self.local
    }

    pub fn group_index(&self) -> usize {
        self.group
    }

    /// Global index of the group's first work-item.
    pub fn group_base(&self) -> usize {
        self.group_base
    }

    /// Number of work-items in this group. The last group may be short.
    pub fn group_len(&self) -> usize {
        self.group_len
    }

    pub fn space(&self) -> IndexSpace {
        self.space
    }

    /// Wait until every work-item of the group has called `barrier` as many
    /// times as this one. Must be reached unconditionally by all members.
    pub fn barrier(&self) -> Result<()> {
        self.barrier.arrive(self.local)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl fmt::Debug for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkItem")
            .field("index", &self.index)
            .field("local", &self.local)
            .field("group", &self.group)
            .finish()
    }
}
