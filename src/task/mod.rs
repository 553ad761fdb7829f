//! Task abstraction for the scheduler.
//!
//! # Spawning
//!
//! A task is a future boxed into a slot owned by the scheduler, together with its lifecycle
//! state. Spawning runs the future right away, up to its first suspension point or its
//! completion, whichever comes first.
//!
//! # Suspension
//!
//! A task suspends when its future returns `Poll::Pending`, normally because a request would
//! block and was parked in the readiness table. The parked request keeps the task's waker. When a
//! pump completes the request, the waker pushes the task onto the run queue and the scheduler
//! polls it again.
//!
//! # Completion
//!
//! When the future returns, its output is handed to the [`JoinHandle`] and the task's slot is
//! released. A completed task can never be resumed again.

mod join;
pub(crate) mod state;
pub(crate) mod task_impl;
pub(crate) mod waker_fn;
mod yield_now;

pub use join::JoinHandle;
pub use state::TaskState;
pub use yield_now::{yield_now, YieldNow};

pub(crate) use join::JoinSlot;

slotmap::new_key_type! {
    /// Identifies a task within the scheduler that spawned it.
    pub struct TaskId;
}

pub(crate) trait Schedule: Send + Sync + 'static {
    /// Schedule the task
    fn schedule(&self, task: TaskId);
}
