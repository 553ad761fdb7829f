use crate::{executor::executor::LOCAL_EX, task::Schedule, task::TaskId};

/// Hands woken tasks back to the scheduler with id `scheduler`.
///
/// Wakers only work on the scheduler's thread while it is entered. A wake from anywhere else has
/// nowhere to go and is dropped.
pub(crate) struct LocalScheduler {
    scheduler: usize,
}

impl LocalScheduler {
    pub(crate) fn new(scheduler: usize) -> Self {
        Self { scheduler }
    }
}

impl Schedule for LocalScheduler {
    fn schedule(&self, task: TaskId) {
        if !LOCAL_EX.is_set() {
            tracing::warn!(?task, "task woken outside of its scheduler; wake ignored");
            return;
        }

        LOCAL_EX.with(|ex| {
            if ex.id() == self.scheduler {
                ex.schedule(task)
            } else {
                tracing::warn!(?task, "task woken on another scheduler; wake ignored");
            }
        })
    }
}
