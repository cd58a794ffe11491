//! Task queue
//!
//! A growable ring buffer of tasks. Pushes go to the tail, pops come from
//! the head; entries are never reordered.

use super::task::Task;
use std::collections::VecDeque;

/// Capacity the queue starts with before it has to grow
pub const DEFAULT_CAPACITY: usize = 32;

/// FIFO queue of pending tasks
pub struct TaskQueue {
    tasks: VecDeque<Task>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            tasks: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a task at the tail, growing the buffer if it is full
    pub fn push(&mut self, task: Task) {
        self.tasks.push_back(task);
    }

    /// Remove the oldest task
    pub fn pop(&mut self) -> Option<Task> {
        self.tasks.pop_front()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Number of tasks the queue can hold without reallocating
    pub fn capacity(&self) -> usize {
        self.tasks.capacity()
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue")
            .field("len", &self.tasks.len())
            .field("capacity", &self.tasks.capacity())
            .finish()
    }
}
