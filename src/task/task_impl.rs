use std::{future::Future, pin::Pin, task::Waker};

use slotmap::SlotMap;

use crate::driver::Parking;

use super::{
    state::{State, TaskState},
    waker_fn::task_waker,
    JoinHandle, JoinSlot, Schedule, TaskId,
};

pub(crate) type BoxFuture = Pin<Box<dyn Future<Output = ()>>>;

/// A task's slot in the scheduler.
pub(crate) struct TaskCell {
    pub(crate) state: State,

    /// Wakes this task on the scheduler that owns it
    pub(crate) waker: Waker,

    /// The request this task is suspended on, if it still waits in the readiness table
    pub(crate) parked: Option<Parking>,

    /// `None` while the future is being polled
    future: Option<BoxFuture>,
}

impl TaskCell {
    /// Takes the future out for polling, so that no borrow of the slot is held meanwhile.
    pub(crate) fn take_future(&mut self) -> Option<BoxFuture> {
        self.future.take()
    }

    pub(crate) fn put_future(&mut self, future: BoxFuture) {
        debug_assert!(self.future.is_none());
        self.future = Some(future);
    }
}

/// Every live task of one scheduler.
pub(crate) struct Tasks {
    slots: SlotMap<TaskId, TaskCell>,
}

impl Tasks {
    pub(crate) fn new() -> Self {
        Self {
            slots: SlotMap::with_key(),
        }
    }

    /// Allocates a slot for `future` and returns the handle awaiting its output.
    pub(crate) fn insert<F, T, S>(&mut self, future: F, scheduler: S) -> JoinHandle<T>
    where
        F: Future<Output = T> + 'static,
        T: 'static,
        S: Schedule,
    {
        let slot = JoinSlot::new();
        let receiver = slot.share();
        let id = self.slots.insert_with_key(|id| TaskCell {
            state: State::new(),
            waker: task_waker(scheduler, id),
            parked: None,
            future: Some(Box::pin(run_to_slot(future, slot))),
        });
        receiver.handle(id)
    }

    pub(crate) fn get_mut(&mut self, id: TaskId) -> Option<&mut TaskCell> {
        self.slots.get_mut(id)
    }

    pub(crate) fn remove(&mut self, id: TaskId) -> Option<TaskCell> {
        self.slots.remove(id)
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn state(&self, id: TaskId) -> TaskState {
        self.slots
            .get(id)
            .map_or(TaskState::Completed, |cell| cell.state.snapshot())
    }
}

async fn run_to_slot<F: Future>(future: F, slot: JoinSlot<F::Output>) {
    slot.complete(future.await)
}
