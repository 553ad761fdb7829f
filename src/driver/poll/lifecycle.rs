use std::{io, task::Waker};

pub(crate) enum Lifecycle {
    /// The request is parked in the readiness table; the waker belongs to the task awaiting it
    Waiting(Waker),

    /// A retry completed the request. The result is held until the awaiting future picks it up
    Completed(io::Result<usize>),
}

impl Lifecycle {
    /// Stores the result of a successful retry and returns the waker of the task to resume.
    pub(super) fn complete(&mut self, result: io::Result<usize>) -> Option<Waker> {
        match std::mem::replace(self, Lifecycle::Completed(result)) {
            Lifecycle::Waiting(waker) => Some(waker),
            Lifecycle::Completed(..) => unreachable!("invalid operation state"),
        }
    }
}
