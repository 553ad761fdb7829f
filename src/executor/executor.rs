use std::{
    cell::RefCell,
    future::Future,
    os::fd::RawFd,
    panic::{RefUnwindSafe, UnwindSafe},
    task::{Context, Poll},
    time::Duration,
};

use scopeguard::ScopeGuard;

use crate::{
    driver::PollDriver,
    task::{
        state::{TransitionToIdle, TransitionToRunning, TransitionToScheduled},
        task_impl::Tasks,
        JoinHandle, TaskId, TaskState,
    },
    utils::id::gen_id,
    Error, Result,
};

use super::{queue::LocalQueue, scheduler::LocalScheduler};

scoped_tls::scoped_thread_local!(pub(crate) static LOCAL_EX: Scheduler);

/// A single-threaded cooperative scheduler.
///
/// Tasks issue reads and writes with [`request_read`](crate::request_read) and
/// [`request_write`](crate::request_write). A request that would block is parked, one per
/// descriptor, and its task suspended; [`pump_events`](Scheduler::pump_events) waits for
/// readiness, retries the parked requests and resumes the tasks whose requests completed.
pub struct Scheduler {
    id: usize,
    tasks: RefCell<Tasks>,
    pub(super) local_queue: LocalQueue,
    driver: PollDriver,
}

impl UnwindSafe for Scheduler {}

impl RefUnwindSafe for Scheduler {}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            id: gen_id(),
            tasks: RefCell::new(Tasks::new()),
            local_queue: LocalQueue::new(),
            driver: PollDriver::new(),
        }
    }

    pub(crate) fn id(&self) -> usize {
        self.id
    }

    /// Runs `f` with this scheduler as the current one.
    fn enter<R>(&self, f: impl FnOnce() -> R) -> R {
        if LOCAL_EX.is_set() {
            let current = LOCAL_EX.with(|ex| std::ptr::eq(ex, self));
            assert!(current, "There is already a Scheduler running on this thread.");
            f()
        } else {
            LOCAL_EX.set(self, || self.driver.with(f))
        }
    }

    /// Spawns `future` as a new task and runs it until it first suspends or completes.
    pub fn spawn<T>(&self, future: impl Future<Output = T> + 'static) -> JoinHandle<T>
    where
        T: 'static,
    {
        self.enter(|| {
            let handle = self
                .tasks
                .borrow_mut()
                .insert(future, LocalScheduler::new(self.id));
            tracing::trace!(task = ?handle.id(), "spawned");

            if let Err(err) = self.run_task(handle.id()) {
                tracing::debug!(task = ?handle.id(), %err, "new task did not run");
            }
            handle
        })
    }

    /// Polls the task `id` once.
    ///
    /// Fails with [`Error::TaskCompleted`] if the task has completed, and with
    /// [`Error::TaskRunning`] if it is the task being polled right now.
    pub fn resume(&self, id: TaskId) -> Result<()> {
        self.enter(|| self.run_task(id))
    }

    pub fn task_state(&self, id: TaskId) -> TaskState {
        self.tasks.borrow().state(id)
    }

    /// Number of tasks that have not completed.
    pub fn num_tasks(&self) -> usize {
        self.tasks.borrow().len()
    }

    /// Descriptors with a parked request, in ascending order.
    pub fn parked_descriptors(&self) -> Vec<RawFd> {
        self.driver.parked_descriptors()
    }

    /// Runs one iteration of the event loop.
    ///
    /// Blocks until at least one parked descriptor is ready, retries the parked requests of the
    /// ready descriptors, then resumes the tasks whose requests completed in ascending
    /// descriptor order. Tasks are resumed only after every ready descriptor was processed, so a
    /// resumed task may immediately park a new request on the same descriptor.
    ///
    /// With nothing parked and nothing queued this blocks indefinitely. An interrupted wait
    /// returns `Ok` without resuming anything.
    pub fn pump_events(&self) -> Result<()> {
        self.enter(|| -> Result<()> {
            let wakers = if self.local_queue.is_empty() {
                self.driver.park()?
            } else {
                // Queued tasks are runnable right now, only pick up what is already ready
                self.driver.park_timeout(Duration::ZERO)?
            };

            tracing::trace!(
                ready = wakers.len(),
                queued = self.local_queue.len(),
                parked = self.driver.num_parked(),
                "pump"
            );
            for waker in wakers {
                waker.wake();
            }

            self.run_queue();
            Ok(())
        })
    }

    /// Drives the event loop until `handle`'s task completes, and returns its output.
    ///
    /// Stops at the first failed readiness wait and returns that error.
    ///
    /// # Panics
    ///
    /// Panics when called from a task, or if the handle's output was already taken.
    pub fn run_until<T>(&self, handle: &JoinHandle<T>) -> Result<T> {
        assert!(
            !LOCAL_EX.is_set(),
            "There is already a Scheduler running on this thread."
        );

        loop {
            if handle.is_finished() {
                return Ok(handle
                    .try_take()
                    .expect("JoinHandle output was already taken"));
            }

            if let Err(err) = self.pump_events() {
                tracing::error!(%err, "readiness wait failed; stopping the event loop");
                return Err(err);
            }
        }
    }

    /// Spawns `future` and drives the event loop until it completes.
    pub fn block_on<T: 'static>(&self, future: impl Future<Output = T> + 'static) -> Result<T> {
        let handle = self.spawn(future);
        self.run_until(&handle)
    }

    /// Queues the task `id` for running, unless it already is queued or has completed.
    pub(crate) fn schedule(&self, id: TaskId) {
        let mut tasks = self.tasks.borrow_mut();
        let cell = match tasks.get_mut(id) {
            Some(cell) => cell,
            None => return,
        };

        match cell.state.transition_to_scheduled() {
            TransitionToScheduled::Submit => {
                drop(tasks);
                self.local_queue.push(id);
            }
            TransitionToScheduled::DoNothing => {}
        }
    }

    fn run_queue(&self) {
        // Consume queued tasks (with max round so a task that keeps yielding can't starve io)
        let mut max_round = self.local_queue.len() * 2;
        while let Some(id) = self.local_queue.pop() {
            if let Err(err) = self.run_task(id) {
                tracing::debug!(task = ?id, %err, "skipped queued task");
            }

            if max_round == 0 {
                break;
            } else {
                max_round -= 1;
            }
        }
    }

    fn run_task(&self, id: TaskId) -> Result<()> {
        let (mut future, waker, previous) = {
            let mut tasks = self.tasks.borrow_mut();
            let cell = tasks.get_mut(id).ok_or(Error::TaskCompleted(id))?;
            match cell.state.transition_to_running() {
                TransitionToRunning::AlreadyRunning => return Err(Error::TaskRunning(id)),
                TransitionToRunning::Running => {}
            }
            let future = cell.take_future().ok_or(Error::TaskRunning(id))?;
            (future, cell.waker.clone(), cell.parked.take())
        };

        let _span = tracing::trace_span!("task", ?id).entered();
        // A task spawned from a running task must not clobber the spawner's registration
        let outer = self.driver.take_last_registered();
        let cx = &mut Context::from_waker(&waker);

        // A task that panics is released instead of being left in the running state
        let guard = scopeguard::guard_on_unwind(id, |id| {
            let released = self.tasks.borrow_mut().remove(id);
            drop(released);
        });
        let poll = future.as_mut().poll(cx);
        let id = ScopeGuard::into_inner(guard);
        let registered = self.driver.replace_last_registered(outer);

        match poll {
            Poll::Ready(()) => {
                let released = self.tasks.borrow_mut().remove(id);
                drop(released);
                tracing::trace!("completed");
            }
            Poll::Pending => {
                // A poll that parked nothing new is still suspended on its earlier request
                let parked = registered.or_else(|| previous.filter(|p| self.driver.is_parked(*p)));
                let parked_on = parked.map(|p| p.fd);

                let mut tasks = self.tasks.borrow_mut();
                let cell = tasks.get_mut(id).ok_or(Error::TaskCompleted(id))?;
                cell.put_future(future);
                cell.parked = parked;

                match cell.state.transition_to_idle(parked_on) {
                    TransitionToIdle::Schedule => {
                        drop(tasks);
                        self.local_queue.push(id);
                    }
                    TransitionToIdle::DoNothing => tracing::trace!(?parked_on, "suspended"),
                }
            }
        }

        Ok(())
    }
}
