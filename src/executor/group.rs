//! Running one group of work-items.
//!
//! Every member of a group gets its own thread so a member blocked at the
//! barrier is suspended by the OS instead of holding a pool worker hostage.
//! The calling thread runs member 0 itself.

use super::panic_handler::PanicHandler;
use crate::error::{keep_root_cause, Error, Result};
use crate::index::{GroupRange, IndexSpace};
use crate::kernel::{Kernel, WorkItem};
use crate::sync::{CancelToken, GroupBarrier};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub(crate) struct GroupJob {
    pub range: GroupRange,
    pub space: IndexSpace,
    pub kernel: Arc<dyn Kernel>,
    pub cancel: CancelToken,
    pub barrier_timeout: Duration,
    pub stack_size: usize,
    pub thread_name_prefix: String,
}

#[derive(Debug)]
pub(crate) struct GroupOutcome {
    pub group: usize,
    pub work_items: usize,
    pub phases: usize,
    pub result: Result<()>,
}

pub(crate) fn run_group(job: &GroupJob, panics: &PanicHandler) -> GroupOutcome {
    let range = job.range;

    if job.cancel.is_cancelled() {
        return GroupOutcome {
            group: range.id,
            work_items: 0,
            phases: 0,
            result: Err(Error::Cancelled),
        };
    }

    let barrier = Arc::new(GroupBarrier::new(
        range.id,
        range.start,
        range.len,
        job.barrier_timeout,
        job.cancel.clone(),
    ));
    let mut root: Option<Error> = None;

    if range.len == 1 {
        if let Err(err) = run_work_item(job, &barrier, panics, 0) {
            keep_root_cause(&mut root, err);
        }
    } else {
        thread::scope(|scope| {
            let mut handles = Vec::with_capacity(range.len - 1);

            for local in 1..range.len {
                let barrier = &barrier;
                let spawned = thread::Builder::new()
                    .name(format!(
                        "{}-g{}-{}",
                        job.thread_name_prefix, range.id, local
                    ))
                    .stack_size(job.stack_size)
                    .spawn_scoped(scope, move || run_work_item(job, barrier, panics, local));

                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(e) => {
                        keep_root_cause(
                            &mut root,
                            Error::executor(format!(
                                "failed to spawn work-item {}: {}",
                                range.start + local,
                                e
                            )),
                        );
                        job.cancel.cancel();
                        barrier.abort(local);
                        break;
                    }
                }
            }

            if let Err(err) = run_work_item(job, &barrier, panics, 0) {
                keep_root_cause(&mut root, err);
            }

            for handle in handles {
                match handle.join() {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => keep_root_cause(&mut root, err),
                    Err(_) => keep_root_cause(
                        &mut root,
                        Error::executor(format!("work-item thread of group {} died", range.id)),
                    ),
                }
            }
        });
    }

    let result = match root {
        Some(err) => Err(err),
        None => barrier.verify(),
    };

    GroupOutcome {
        group: range.id,
        work_items: range.len,
        phases: barrier.phases(),
        result,
    }
}

fn run_work_item(
    job: &GroupJob,
    barrier: &Arc<GroupBarrier>,
    panics: &PanicHandler,
    local: usize,
) -> Result<()> {
    let index = job.range.start + local;
    let item = WorkItem {
        index,
        local,
        group: job.range.id,
        group_base: job.range.start,
        group_len: job.range.len,
        space: job.space,
        barrier: barrier.clone(),
        cancel: job.cancel.clone(),
    };

    let result = match panics.execute(|| job.kernel.execute(&item)) {
        Ok(result) => result.map_err(|err| err.at_work_item(index)),
        Err(panic) => Err(Error::fault(
            Some(index),
            format!("panicked: {}", panic.message),
        )),
    };

    if let Err(err) = &result {
        if !err.is_barrier_error() && *err != Error::Cancelled {
            tracing::warn!(
                kernel = job.kernel.name(),
                work_item = index,
                error = %err,
                "work-item failed, aborting launch"
            );
            job.cancel.cancel();
        }
        barrier.abort(local);
    }
    barrier.depart(local);

    result
}
