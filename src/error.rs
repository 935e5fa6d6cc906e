use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("allocation error: {0}")]
    Allocation(String),

    #[error(
        "kernel fault{}: {message}",
        .index.map(|i| format!(" at work-item {}", i)).unwrap_or_default()
    )]
    KernelFault {
        index: Option<usize>,
        message: String,
    },

    #[error(
        "barrier mismatch in group {group}: work-item {index} reached the barrier {arrivals} time(s), peers reached it {expected} time(s)"
    )]
    BarrierMismatch {
        group: usize,
        index: usize,
        arrivals: usize,
        expected: usize,
    },

    #[error("index space error: {0}")]
    IndexSpace(String),

    #[error("barrier timeout in group {group} after {waited:?}")]
    Timeout { group: usize, waited: Duration },

    #[error("launch cancelled")]
    Cancelled,

    #[error("config error: {0}")]
    Config(String),

    #[error("executor error: {0}")]
    Executor(String),

    #[error("profiling error: {0}")]
    Profiling(String),
}

impl Error {
    pub fn allocation<S: Into<String>>(msg: S) -> Self {
        Error::Allocation(msg.into())
    }

    pub fn fault<S: Into<String>>(index: Option<usize>, msg: S) -> Self {
        Error::KernelFault {
            index,
            message: msg.into(),
        }
    }

    pub fn index_space<S: Into<String>>(msg: S) -> Self {
        Error::IndexSpace(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    pub fn executor<S: Into<String>>(msg: S) -> Self {
        Error::Executor(msg.into())
    }

    pub fn profiling<S: Into<String>>(msg: S) -> Self {
        Error::Profiling(msg.into())
    }

    /// Attach the offending work-item to a fault raised without one.
    pub(crate) fn at_work_item(self, work_item: usize) -> Self {
        match self {
            Error::KernelFault {
                index: None,
                message,
            } => Error::KernelFault {
                index: Some(work_item),
                message,
            },
            other => other,
        }
    }

    /// How likely this error is to be the root cause when several work-items
    /// fail in the same launch. A fault in one work-item breaks the barrier of
    /// its peers, which then report `Cancelled`.
    pub(crate) fn rank(&self) -> u8 {
        match self {
            Error::KernelFault { .. } => 4,
            Error::BarrierMismatch { .. } => 3,
            Error::Timeout { .. } => 2,
            Error::Executor(_) => 2,
            Error::Cancelled => 0,
            _ => 1,
        }
    }

    pub fn is_barrier_error(&self) -> bool {
        matches!(self, Error::BarrierMismatch { .. } | Error::Timeout { .. })
    }
}

/// Keep the highest-ranked error, first one wins on ties.
pub(crate) fn keep_root_cause(slot: &mut Option<Error>, candidate: Error) {
    match slot {
        Some(current) if current.rank() >= candidate.rank() => {}
        _ => *slot = Some(candidate),
    }
}
