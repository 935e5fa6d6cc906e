//! The in-order command stream behind every context.
//!
//! Launches, profiling markers and fences are processed one at a time on a
//! dedicated thread, so a marker is stamped only after every launch queued
//! before it has finished.

use crate::error::{Error, Result};
use crate::executor::dispatch::{dispatch, DispatchEnv};
use crate::launch::{DeferredErrors, LaunchRequest};
use crate::sync::Completion;
use crate::telemetry::Metrics;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

pub(crate) enum Command {
    Launch(LaunchRequest),
    Mark(Arc<Completion<Instant>>),
    Fence(Arc<Completion<()>>),
    Shutdown,
}

pub(crate) struct Stream {
    sender: Sender<Command>,
    thread: Option<JoinHandle<()>>,
}

impl Stream {
    pub fn start(env: DispatchEnv, deferred: DeferredErrors, metrics: Arc<Metrics>) -> Result<Self> {
        let (sender, receiver) = unbounded();
        let name = format!("{}-stream", env.config.thread_name_prefix);

        let thread = thread::Builder::new()
            .name(name)
            .spawn(move || stream_loop(receiver, env, deferred, metrics))
            .map_err(|e| Error::executor(format!("failed to start stream thread: {}", e)))?;

        Ok(Self {
            sender,
            thread: Some(thread),
        })
    }

    pub fn send(&self, command: Command) -> Result<()> {
        self.sender
            .send(command)
            .map_err(|_| Error::executor("stream thread is no longer running"))
    }
}

impl Drop for Stream {
    fn drop(&mut self) {
        // queued work drains first, the channel is FIFO
        let _ = self.sender.send(Command::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("stream thread panicked");
            }
        }
    }
}

fn stream_loop(
    receiver: Receiver<Command>,
    env: DispatchEnv,
    deferred: DeferredErrors,
    metrics: Arc<Metrics>,
) {
    while let Ok(command) = receiver.recv() {
        match command {
            Command::Launch(request) => {
                let result = dispatch(&request, &env);
                match &result {
                    Ok(report) => metrics.record_launch(
                        report.groups,
                        report.work_items,
                        report.barrier_phases,
                        report.elapsed,
                    ),
                    Err(err) => {
                        metrics.record_failure();
                        deferred.lock().insert(request.id, err.clone());
                    }
                }
                request.completion.complete(result);
            }
            Command::Mark(slot) => {
                slot.complete(Instant::now());
            }
            Command::Fence(done) => {
                done.complete(());
            }
            Command::Shutdown => break,
        }
    }
    tracing::debug!("stream stopped");
}
