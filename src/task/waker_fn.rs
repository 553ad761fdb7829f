use std::{
    sync::Arc,
    task::{Wake, Waker},
};

use super::{Schedule, TaskId};

struct TaskWaker<S> {
    scheduler: S,
    task: TaskId,
}

impl<S: Schedule> Wake for TaskWaker<S> {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref()
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.scheduler.schedule(self.task)
    }
}

/// Creates the waker of `task`, which hands the task back to `scheduler` when woken.
pub(crate) fn task_waker<S: Schedule>(scheduler: S, task: TaskId) -> Waker {
    Waker::from(Arc::new(TaskWaker { scheduler, task }))
}

#[cfg(test)]
mod test {
    use std::sync::Mutex;

    use slotmap::SlotMap;

    use super::*;

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<TaskId>>>);

    impl Schedule for Recorder {
        fn schedule(&self, task: TaskId) {
            self.0.lock().unwrap().push(task);
        }
    }

    #[test]
    fn wakes_schedule_the_task() {
        let mut ids = SlotMap::<TaskId, ()>::with_key();
        let task = ids.insert(());
        let recorder = Recorder::default();

        let waker = task_waker(recorder.clone(), task);
        waker.wake_by_ref();
        let other = waker.clone();
        assert!(other.will_wake(&waker));
        other.wake();

        assert_eq!(*recorder.0.lock().unwrap(), [task, task]);
    }
}
