//! Group barrier with divergence detection.

use super::CancelToken;
use crate::error::{Error, Result};
use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug)]
struct BarrierState {
    waiting: usize,
    phase: usize,
    arrivals: Vec<usize>,
    departed: Option<usize>,
    broken: Option<Error>,
}

/// Rendezvous point for the work-items of one group.
///
/// Cycles `Idle -> Waiting(k of N) -> Released -> Idle` once per phase. The
/// state lock doubles as the memory fence between phases: everything a
/// work-item wrote before [`arrive`](GroupBarrier::arrive) is visible to all
/// members once their own `arrive` returns.
///
/// A barrier that can never be released (a member returned early, a member
/// faulted, or the wait outlived `timeout`) is *broken*: every current and
/// future waiter gets the same error instead of hanging.
#[derive(Debug)]
pub struct GroupBarrier {
    group: usize,
    base: usize,
    size: usize,
    timeout: Duration,
    cancel: CancelToken,
    state: Mutex<BarrierState>,
    released: Condvar,
}

impl GroupBarrier {
    /// `base` is the global index of the group's first work-item.
    pub fn new(group: usize, base: usize, size: usize, timeout: Duration, cancel: CancelToken) -> Self {
        Self {
            group,
            base,
            size,
            timeout,
            cancel,
            state: Mutex::new(BarrierState {
                waiting: 0,
                phase: 0,
                arrivals: vec![0; size],
                departed: None,
                broken: None,
            }),
            released: Condvar::new(),
        }
    }

    pub fn group(&self) -> usize {
        self.group
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of phases released so far.
    pub fn phases(&self) -> usize {
        self.state.lock().phase
    }

    pub fn is_broken(&self) -> bool {
        self.state.lock().broken.is_some()
    }

    /// Block the work-item with group-local index `local` until every member
    /// has arrived.
    pub fn arrive(&self, local: usize) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(err) = &state.broken {
            return Err(err.clone());
        }

        state.arrivals[local] += 1;

        if let Some(gone) = state.departed {
            let err = Error::BarrierMismatch {
                group: self.group,
                index: self.base + gone,
                arrivals: state.arrivals[gone],
                expected: state.arrivals[local],
            };
            return Err(self.break_with(&mut state, err));
        }

        state.waiting += 1;
        if state.waiting == self.size {
            state.waiting = 0;
            // sampled once per phase so every member sees the same decision
            if self.cancel.is_cancelled() {
                return Err(self.break_with(&mut state, Error::Cancelled));
            }
            state.phase += 1;
            self.released.notify_all();
            return Ok(());
        }

        let phase = state.phase;
        let deadline = Instant::now() + self.timeout;
        loop {
            if state.phase != phase {
                return Ok(());
            }
            if let Some(err) = &state.broken {
                return Err(err.clone());
            }
            if self.released.wait_until(&mut state, deadline).timed_out() {
                if state.phase != phase {
                    return Ok(());
                }
                if let Some(err) = &state.broken {
                    return Err(err.clone());
                }
                let err = Error::Timeout {
                    group: self.group,
                    waited: self.timeout,
                };
                return Err(self.break_with(&mut state, err));
            }
        }
    }

    /// Record that `local` returned from the kernel. Peers still waiting can
    /// never be released, so the barrier breaks with a mismatch.
    pub fn depart(&self, local: usize) {
        let mut state = self.state.lock();
        if state.departed.is_none() {
            state.departed = Some(local);
        }
        if state.waiting > 0 && state.broken.is_none() {
            let expected = state.arrivals.iter().copied().max().unwrap_or(0);
            let err = Error::BarrierMismatch {
                group: self.group,
                index: self.base + local,
                arrivals: state.arrivals[local],
                expected,
            };
            self.break_with(&mut state, err);
        }
    }

    /// Release every waiter because `local` failed; peers observe `Cancelled`.
    pub fn abort(&self, local: usize) {
        let mut state = self.state.lock();
        if state.broken.is_none() {
            tracing::debug!(
                group = self.group,
                work_item = self.base + local,
                "aborting group barrier"
            );
            self.break_with(&mut state, Error::Cancelled);
        }
    }

    /// Final check once every member returned: all must have arrived equally often.
    pub fn verify(&self) -> Result<()> {
        let state = self.state.lock();
        let expected = state.arrivals.iter().copied().max().unwrap_or(0);
        match state.arrivals.iter().position(|&n| n != expected) {
            Some(local) => Err(Error::BarrierMismatch {
                group: self.group,
                index: self.base + local,
                arrivals: state.arrivals[local],
                expected,
            }),
            None => Ok(()),
        }
    }

    fn break_with(&self, state: &mut BarrierState, err: Error) -> Error {
        if state.broken.is_none() {
            if !matches!(err, Error::Cancelled) {
                tracing::warn!(group = self.group, error = %err, "group barrier broken");
            }
            state.broken = Some(err);
            self.released.notify_all();
        }
        state.broken.clone().unwrap_or(Error::Cancelled)
    }
}
