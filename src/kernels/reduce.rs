//! Group-local tree reduction and its host baseline.
//!
//! Each group folds its slice of the buffer in `ceil(log2(size))` barrier
//! phases. After the launch the first slot of every group holds that group's
//! sum; [`device_sum`] folds those partials on the host.

use crate::context::ExecutionContext;
use crate::error::{Error, Result};
use crate::index::IndexSpace;
use crate::kernel::{Kernel, WorkItem};
use crate::launch::LaunchReport;
use crate::memory::ArrayView;
use crate::profiling::{Comparison, HostStopwatch};
use std::time::Duration;

/// The tree-sum kernel over `view`, launched with groups of `size`.
pub fn tree_sum_kernel(view: ArrayView<i64>, size: usize) -> TreeSum {
    TreeSum { data: view, size }
}

/// Same fold with the barrier moved inside the branch. Members that skip the
/// branch never reach the barrier, so the group diverges.
pub fn divergent_tree_sum_kernel(view: ArrayView<i64>, size: usize) -> DivergentTreeSum {
    DivergentTreeSum { data: view, size }
}

#[derive(Debug, Clone)]
pub struct TreeSum {
    data: ArrayView<i64>,
    size: usize,
}

impl Kernel for TreeSum {
    fn execute(&self, item: &WorkItem) -> Result<()> {
        check_group_fits(self.size, item)?;
        let local = item.local_index();
        let len = item.group_len();
        let index = item.index();

        let mut stride = 1;
        while stride < self.size {
            if local % (2 * stride) == 0 && local + stride < len {
                let right = self.data.get(index + stride)?;
                self.data.update(index, |left| left.wrapping_add(right))?;
            }
            item.barrier()?;
            stride *= 2;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "tree_sum"
    }
}

#[derive(Debug, Clone)]
pub struct DivergentTreeSum {
    data: ArrayView<i64>,
    size: usize,
}

impl Kernel for DivergentTreeSum {
    fn execute(&self, item: &WorkItem) -> Result<()> {
        check_group_fits(self.size, item)?;
        let local = item.local_index();
        let len = item.group_len();
        let index = item.index();

        let mut stride = 1;
        while stride < self.size {
            if local % (2 * stride) == 0 && local + stride < len {
                let right = self.data.get(index + stride)?;
                self.data.update(index, |left| left.wrapping_add(right))?;
                item.barrier()?;
            }
            stride *= 2;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "divergent_tree_sum"
    }
}

// Every member sees the same group length, so either all of them fail here
// or none do and the barrier counts stay equal.
fn check_group_fits(size: usize, item: &WorkItem) -> Result<()> {
    if size < item.group_len() {
        return Err(Error::index_space(format!(
            "tree sum built for groups of {} launched with group {} of {} work-items",
            size,
            item.group_index(),
            item.group_len()
        )));
    }
    Ok(())
}

/// Barrier phases the tree needs for a group of `size`.
pub fn reduction_steps(size: usize) -> usize {
    if size <= 1 {
        0
    } else {
        size.next_power_of_two().trailing_zeros() as usize
    }
}

/// Result of [`device_sum`].
#[derive(Debug, Clone)]
pub struct ReductionReport {
    pub result: i64,
    /// First slot of each group after the launch.
    pub partials: Vec<i64>,
    pub groups: usize,
    pub group_size: usize,
    pub steps: usize,
    /// Marker-to-marker time, or the launch's own wall time when profiling
    /// is disabled.
    pub device_time: Duration,
    pub launch: LaunchReport,
}

/// Sequential sum with the time it took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostBaseline {
    pub result: i64,
    pub elapsed: Duration,
}

pub fn host_sum(data: &[i64]) -> HostBaseline {
    let (result, elapsed) =
        HostStopwatch::time(|| data.iter().fold(0i64, |acc, &v| acc.wrapping_add(v)));
    HostBaseline { result, elapsed }
}

/// Upload `data`, run the tree sum between two profiling markers and fold
/// the per-group partials.
pub fn device_sum(ctx: &ExecutionContext, data: &[i64], max_group: usize) -> Result<ReductionReport> {
    if data.is_empty() {
        return Err(Error::index_space("cannot reduce an empty sequence"));
    }
    if max_group == 0 {
        return Err(Error::config("max_group must be > 0"));
    }

    let group_size = max_group
        .min(data.len())
        .min(ctx.config().max_group_size);

    let mut buffer = ctx.allocate::<i64>(data.len())?;
    buffer.upload(data)?;
    let space = IndexSpace::from_extent(buffer.extent())?;
    let kernel = tree_sum_kernel(buffer.view(), group_size);

    let profiling = ctx.config().enable_profiling;
    let start = if profiling { Some(ctx.mark()?) } else { None };
    let handle = ctx.launch_async(kernel, space, group_size)?;
    let end = if profiling { Some(ctx.mark()?) } else { None };

    // waits on this launch only; unrelated unwaited failures stay queued
    // for the next `synchronize`
    let launch = handle.wait()?;

    let device_time = match (&start, &end) {
        (Some(start), Some(end)) => ctx.elapsed(start, end)?,
        _ => launch.elapsed,
    };

    let out = buffer.download();
    let partials: Vec<i64> = out.iter().step_by(group_size).copied().collect();
    let result = partials.iter().fold(0i64, |acc, &v| acc.wrapping_add(v));

    tracing::debug!(
        len = data.len(),
        group_size,
        groups = partials.len(),
        result,
        ?device_time,
        "device sum finished"
    );

    Ok(ReductionReport {
        result,
        groups: partials.len(),
        partials,
        group_size,
        steps: reduction_steps(group_size),
        device_time,
        launch,
    })
}

/// Run the same sum on the device and on the host.
pub fn compare_with_host(ctx: &ExecutionContext, data: &[i64], max_group: usize) -> Result<Comparison<i64>> {
    let device = device_sum(ctx, data, max_group)?;
    let host = host_sum(data);
    Ok(Comparison {
        device_result: device.result,
        device_time: device.device_time,
        host_result: host.result,
        host_time: host.elapsed,
    })
}
