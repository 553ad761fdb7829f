use std::future::Future;

use crate::task::JoinHandle;

use super::executor::LOCAL_EX;

pub trait FutureExt: Future + Sized + 'static {
    /// Spawns this future as a task on the current scheduler.
    ///
    /// If called from a task running on a [`Scheduler`](crate::Scheduler), the task is spawned
    /// onto it. Otherwise, this method panics.
    fn spawn(self) -> JoinHandle<<Self as Future>::Output> {
        spawn(self)
    }
}

impl<F> FutureExt for F where F: Future + 'static {}

/// Spawns a task onto the scheduler running on this thread.
///
/// The task starts running immediately and returns control to the caller at its first
/// suspension point.
///
/// # Panics
///
/// Panics when called outside of a task, as there is no scheduler to spawn onto. Use
/// [`Scheduler::spawn`](crate::Scheduler::spawn) from the outside.
pub fn spawn<T>(future: impl Future<Output = T> + 'static) -> JoinHandle<T>
where
    T: 'static,
{
    assert!(
        LOCAL_EX.is_set(),
        "spawn called outside of a task; use Scheduler::spawn"
    );
    LOCAL_EX.with(|ex| ex.spawn(future))
}
