use core::fmt;
use std::os::fd::RawFd;

/// Set if the task is running.
///
/// A task is in the running state while its future is being polled.
const RUNNING: u8 = 1 << 0;

/// Set if the task is scheduled for running.
///
/// A task is scheduled while it sits in the run queue. It can also be set while the task is
/// running, in which case the task goes back to the queue as soon as polling finishes.
const SCHEDULED: u8 = 1 << 1;

/// Set if the last poll returned `Pending` and nothing has woken the task since.
const SUSPENDED: u8 = 1 << 2;

/// A new task is about to run, so it starts runnable
const INITIAL_STATE: u8 = 0;

/// Observable lifecycle of a task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskState {
    /// Running, or queued to run.
    Runnable,

    /// Waiting to be woken. Holds the descriptor it is parked on, if it is waiting on I/O.
    Suspended(Option<RawFd>),

    /// The task's future returned. It will never run again.
    Completed,
}

#[must_use]
pub(crate) enum TransitionToRunning {
    AlreadyRunning,
    Running,
}

#[must_use]
pub(crate) enum TransitionToIdle {
    DoNothing,
    Schedule,
}

#[must_use]
pub(crate) enum TransitionToScheduled {
    DoNothing,
    Submit,
}

pub(crate) struct State {
    flags: u8,

    // Descriptor the task suspended on, meaningful only with `SUSPENDED`
    parked_on: Option<RawFd>,
}

impl State {
    pub(crate) fn new() -> Self {
        State {
            flags: INITIAL_STATE,
            parked_on: None,
        }
    }

    fn is(&self, flag: u8) -> bool {
        self.flags & flag == flag
    }

    /// Transitions the lifecycle to `Running`.
    ///
    /// This unsets the scheduled bit so wakes during the poll can be detected.
    pub(crate) fn transition_to_running(&mut self) -> TransitionToRunning {
        if self.is(RUNNING) {
            return TransitionToRunning::AlreadyRunning;
        }

        self.flags = RUNNING;
        self.parked_on = None;
        TransitionToRunning::Running
    }

    /// Transitions the task from `RUNNING` to idle after its future returned `Pending`.
    pub(crate) fn transition_to_idle(&mut self, parked_on: Option<RawFd>) -> TransitionToIdle {
        debug_assert!(self.is(RUNNING));
        self.flags &= !RUNNING;

        if self.is(SCHEDULED) {
            // Woken while running, whoever woke it left the queueing to us
            TransitionToIdle::Schedule
        } else {
            self.flags |= SUSPENDED;
            self.parked_on = parked_on;
            TransitionToIdle::DoNothing
        }
    }

    /// Transitions the state to `SCHEDULED`.
    pub(crate) fn transition_to_scheduled(&mut self) -> TransitionToScheduled {
        if self.is(SCHEDULED) {
            // Already queued, or will be once the running poll finishes
            return TransitionToScheduled::DoNothing;
        }

        self.flags = (self.flags & !SUSPENDED) | SCHEDULED;
        self.parked_on = None;
        if self.is(RUNNING) {
            TransitionToScheduled::DoNothing
        } else {
            TransitionToScheduled::Submit
        }
    }

    pub(crate) fn snapshot(&self) -> TaskState {
        if self.is(SUSPENDED) {
            TaskState::Suspended(self.parked_on)
        } else {
            TaskState::Runnable
        }
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "r:{}|s:{}|p:{}|fd:{:?}",
            self.is(RUNNING) as i32,
            self.is(SCHEDULED) as i32,
            self.is(SUSPENDED) as i32,
            self.parked_on
        )
    }
}
