use std::{
    cell::RefCell,
    fmt,
    future::Future,
    pin::Pin,
    rc::Rc,
    task::{Context, Poll, Waker},
};

use super::TaskId;

struct JoinState<T> {
    output: Option<T>,
    finished: bool,

    /// The task that is blocked on the `JoinHandle`
    awaiter: Option<Waker>,
}

/// Awaits the output of a spawned task.
///
/// The handle is a future, so one task can wait for another. The driver loop
/// [`Scheduler::run_until`](crate::Scheduler::run_until) uses it as its completion signal.
/// Dropping the handle does not stop the task.
pub struct JoinHandle<T> {
    id: TaskId,
    state: Rc<RefCell<JoinState<T>>>,
}

/// The task's end of a [`JoinHandle`].
pub(crate) struct JoinSlot<T> {
    state: Rc<RefCell<JoinState<T>>>,
}

impl<T> JoinHandle<T> {
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Returns `true` once the task's future has returned.
    pub fn is_finished(&self) -> bool {
        self.state.borrow().finished
    }

    /// Takes the task's output if it has finished and the output was not taken yet.
    pub fn try_take(&self) -> Option<T> {
        self.state.borrow_mut().output.take()
    }
}

impl<T> JoinSlot<T> {
    pub(crate) fn new() -> Self {
        JoinSlot {
            state: Rc::new(RefCell::new(JoinState {
                output: None,
                finished: false,
                awaiter: None,
            })),
        }
    }

    /// Another reference to the same slot.
    pub(crate) fn share(&self) -> Self {
        JoinSlot {
            state: self.state.clone(),
        }
    }

    /// A handle on this slot for the task `id`.
    pub(crate) fn handle(&self, id: TaskId) -> JoinHandle<T> {
        JoinHandle {
            id,
            state: self.state.clone(),
        }
    }

    pub(crate) fn complete(self, output: T) {
        let awaiter = {
            let mut state = self.state.borrow_mut();
            state.output = Some(output);
            state.finished = true;
            state.awaiter.take()
        };

        if let Some(waker) = awaiter {
            waker.wake();
        }
    }
}

impl<T> Future for JoinHandle<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        let mut state = self.state.borrow_mut();
        if let Some(output) = state.output.take() {
            return Poll::Ready(output);
        }

        assert!(!state.finished, "JoinHandle polled after its output was taken");
        match &state.awaiter {
            Some(waker) if waker.will_wake(cx.waker()) => {}
            _ => state.awaiter = Some(cx.waker().clone()),
        }
        Poll::Pending
    }
}

impl<T> fmt::Debug for JoinHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinHandle")
            .field("id", &self.id)
            .field("finished", &self.is_finished())
            .finish()
    }
}
