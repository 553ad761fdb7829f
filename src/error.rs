use std::{io, os::fd::RawFd};

use crate::task::TaskId;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The descriptor failed with something other than "would block" or an interruption.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// A second request was issued on a descriptor that already has a parked request.
    #[error("descriptor {fd} already has a parked request")]
    ConflictingRequest { fd: RawFd },

    /// The task has completed (or its id was never handed out by this scheduler).
    #[error("task {0:?} has already completed")]
    TaskCompleted(TaskId),

    /// The task is being polled right now, further up the stack.
    #[error("task {0:?} is already running")]
    TaskRunning(TaskId),

    /// A request would block but there is no scheduler on this thread to park it with.
    #[error("no scheduler is running on this thread")]
    NoScheduler,
}

impl Error {
    /// The OS error code carried by this error, if any.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Error::Io(err) => err.raw_os_error(),
            _ => None,
        }
    }

    /// Returns `true` if this error came from the descriptor itself.
    pub fn is_io(&self) -> bool {
        matches!(self, Error::Io(_))
    }
}
