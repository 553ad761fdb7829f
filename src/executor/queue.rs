use std::{cell::RefCell, collections::VecDeque};

use crate::task::TaskId;

/// Tasks woken and waiting to be polled, in wake order.
#[derive(Debug)]
pub(super) struct LocalQueue {
    queue: RefCell<VecDeque<TaskId>>,
}

impl Default for LocalQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalQueue {
    pub(crate) fn new() -> Self {
        const DEFAULT_TASK_QUEUE_SIZE: usize = 64;
        Self::new_with_capacity(DEFAULT_TASK_QUEUE_SIZE)
    }

    pub(crate) fn new_with_capacity(capacity: usize) -> Self {
        Self {
            queue: RefCell::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn push(&self, task: TaskId) {
        self.queue.borrow_mut().push_back(task)
    }

    pub(crate) fn pop(&self) -> Option<TaskId> {
        self.queue.borrow_mut().pop_front()
    }
}
