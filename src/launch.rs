//! Launch results and handles for asynchronous launches.

use crate::error::{Error, Result};
use crate::index::IndexSpace;
use crate::kernel::Kernel;
use crate::sync::{CancelToken, Completion};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub type LaunchId = u64;

/// Errors of finished launches nobody has waited on yet, keyed by launch.
pub(crate) type DeferredErrors = Arc<Mutex<BTreeMap<LaunchId, Error>>>;

/// Summary of a completed launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchReport {
    pub id: LaunchId,
    pub kernel: String,
    pub space: IndexSpace,
    pub group_size: usize,
    pub groups: usize,
    pub work_items: usize,
    /// Most barrier phases any group went through.
    pub barrier_phases: usize,
    pub elapsed: Duration,
}

pub(crate) struct LaunchRequest {
    pub id: LaunchId,
    pub kernel: Arc<dyn Kernel>,
    pub space: IndexSpace,
    pub group_size: usize,
    pub cancel: CancelToken,
    pub completion: Arc<Completion<Result<LaunchReport>>>,
}

/// A launch queued on a context's stream.
///
/// Buffer contents written by the launch are undefined until
/// [`wait`](LaunchHandle::wait) (or the context's `synchronize`) returns.
/// Dropping the handle does not cancel the launch; its error, if any, is
/// reported by the next `synchronize`.
pub struct LaunchHandle {
    pub(crate) id: LaunchId,
    pub(crate) kernel: String,
    pub(crate) cancel: CancelToken,
    pub(crate) completion: Arc<Completion<Result<LaunchReport>>>,
    pub(crate) deferred: DeferredErrors,
}

impl LaunchHandle {
    pub fn id(&self) -> LaunchId {
        self.id
    }

    pub fn kernel(&self) -> &str {
        &self.kernel
    }

    /// Ask the launch to stop at the next barrier release. Groups that have
    /// not started yet are skipped.
    pub fn cancel(&self) {
        tracing::debug!(launch = self.id, kernel = %self.kernel, "cancel requested");
        self.cancel.cancel();
    }

    pub fn is_complete(&self) -> bool {
        self.completion.is_complete()
    }

    /// Block until every work-item has terminated.
    pub fn wait(self) -> Result<LaunchReport> {
        let result = self.completion.wait();
        self.deferred.lock().remove(&self.id);
        result
    }

    /// Like [`wait`](LaunchHandle::wait) but gives up after `timeout`.
    /// `None` leaves the launch running and its outcome unclaimed.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<LaunchReport>> {
        let result = self.completion.wait_timeout(timeout)?;
        self.deferred.lock().remove(&self.id);
        Some(result)
    }
}

impl fmt::Debug for LaunchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LaunchHandle")
            .field("id", &self.id)
            .field("kernel", &self.kernel)
            .field("complete", &self.is_complete())
            .finish()
    }
}
