//! Splitting a launch into groups and running them.

use super::group::{run_group, GroupJob, GroupOutcome};
use super::{CpuPool, PanicHandler};
use crate::config::{Config, ExecutionStrategy};
use crate::error::{keep_root_cause, Error, Result};
use crate::launch::{LaunchReport, LaunchRequest};
use crossbeam_channel::unbounded;
use std::sync::Arc;
use std::time::Instant;

pub(crate) struct DispatchEnv {
    pub pool: Arc<CpuPool>,
    pub panics: Arc<PanicHandler>,
    pub config: Config,
}

#[derive(Default)]
struct Tally {
    groups: usize,
    work_items: usize,
    barrier_phases: usize,
    root: Option<Error>,
}

impl Tally {
    fn record(&mut self, outcome: GroupOutcome, request: &LaunchRequest) {
        self.groups += 1;
        self.work_items += outcome.work_items;
        self.barrier_phases = self.barrier_phases.max(outcome.phases);
        if let Err(err) = outcome.result {
            if err != Error::Cancelled {
                tracing::debug!(launch = request.id, group = outcome.group, error = %err, "group failed");
            }
            // no point starting groups whose results are undefined anyway
            request.cancel.cancel();
            keep_root_cause(&mut self.root, err);
        }
    }
}

pub(crate) fn dispatch(request: &LaunchRequest, env: &DispatchEnv) -> Result<LaunchReport> {
    let start = Instant::now();
    let group_count = request.space.group_count(request.group_size);

    tracing::debug!(
        launch = request.id,
        kernel = request.kernel.name(),
        space = %request.space,
        group_size = request.group_size,
        groups = group_count,
        "launch started"
    );

    let jobs = request.space.groups(request.group_size).map(|range| GroupJob {
        range,
        space: request.space,
        kernel: request.kernel.clone(),
        cancel: request.cancel.clone(),
        barrier_timeout: env.config.barrier_timeout,
        stack_size: env.config.work_item_stack_size,
        thread_name_prefix: env.config.thread_name_prefix.clone(),
    });

    let mut tally = Tally::default();

    match env.config.strategy {
        ExecutionStrategy::Sequential => {
            for job in jobs {
                let outcome = run_group(&job, &env.panics);
                tally.record(outcome, request);
            }
        }
        ExecutionStrategy::Parallel => {
            let (tx, rx) = unbounded();
            for job in jobs {
                let tx = tx.clone();
                let panics = env.panics.clone();
                env.pool.execute(move || {
                    let outcome = run_group(&job, &panics);
                    let _ = tx.send(outcome);
                });
            }
            drop(tx);

            for _ in 0..group_count {
                match rx.recv() {
                    Ok(outcome) => tally.record(outcome, request),
                    Err(_) => {
                        keep_root_cause(
                            &mut tally.root,
                            Error::executor("a group task was lost before reporting"),
                        );
                        break;
                    }
                }
            }
        }
    }

    let elapsed = start.elapsed();

    if let Some(err) = tally.root {
        tracing::warn!(
            launch = request.id,
            kernel = request.kernel.name(),
            error = %err,
            "launch failed"
        );
        return Err(err);
    }

    tracing::debug!(
        launch = request.id,
        kernel = request.kernel.name(),
        work_items = tally.work_items,
        barrier_phases = tally.barrier_phases,
        elapsed_us = elapsed.as_micros() as u64,
        "launch finished"
    );

    Ok(LaunchReport {
        id: request.id,
        kernel: request.kernel.name().to_string(),
        space: request.space,
        group_size: request.group_size,
        groups: tally.groups,
        work_items: tally.work_items,
        barrier_phases: tally.barrier_phases,
        elapsed,
    })
}
