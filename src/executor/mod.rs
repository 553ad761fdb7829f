//! The scheduler and its driver loop.
//!
//! A [`Scheduler`] owns three things: the slots of its tasks, a run queue of woken tasks, and
//! the readiness driver holding parked requests. Tasks run on the thread that owns the
//! scheduler and only while the scheduler is entered, i.e. inside [`Scheduler::spawn`],
//! [`Scheduler::resume`] and [`Scheduler::pump_events`].

#[allow(clippy::module_inception)]
mod executor;
mod queue;
mod scheduler;
mod task;

pub use executor::Scheduler;
pub use task::{spawn, FutureExt};

pub(crate) use executor::LOCAL_EX;
