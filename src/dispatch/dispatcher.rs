//! The dispatcher - drains queued tasks in bounded batches
//!
//! Lifecycle of a drain:
//! - `submit` pushes a task and arms the dispatcher
//! - arming registers exactly one deferred callback with the host, unless a
//!   drain is already scheduled or running
//! - the drain clears `queued`, runs at most `batch_size` tasks, clears
//!   `running`, and arms again if anything is left
//!
//! A drain never calls itself. Work left over, or submitted by the tasks it
//! ran, is picked up on a later host turn, so a task that keeps resubmitting
//! itself cannot starve the host.

use super::config::DispatchConfig;
use super::error::DispatchResult;
use super::queue::TaskQueue;
use super::task::Task;
use crate::console_log;
use crate::platform::{Host, TimerHandle};
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

/// Combined view of the `running` and `queued` flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    /// Nothing scheduled, nothing running
    Idle,
    /// A drain is scheduled with the host but has not started
    Armed,
    /// A drain is running tasks
    ///
    /// The next drain is armed only after this one finishes, so there is no
    /// "draining and armed" state.
    Draining,
}

/// Counters describing what the dispatcher has done
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    /// Tasks accepted by `submit`
    pub submitted: u64,
    /// Drains registered with the host
    pub arms: u64,
    /// Drain cycles started
    pub drains: u64,
    /// Tasks run to completion
    pub executed: u64,
    /// Drains that stopped at the batch limit with work left
    pub yields: u64,
    /// Drains that were cut short by a panicking task
    pub aborted: u64,
    /// Tasks handed to the host timer
    pub delayed: u64,
}

/// Batch-draining task dispatcher
///
/// Single-threaded: all state sits in `Cell`/`RefCell` and the type is
/// neither `Send` nor `Sync`. Share it as `Rc<Dispatcher>`.
pub struct Dispatcher {
    host: Rc<dyn Host>,
    tasks: RefCell<TaskQueue>,
    /// True while a drain is running tasks
    running: Cell<bool>,
    /// True while a drain is scheduled but not started
    queued: Cell<bool>,
    batch_size: usize,
    stats: RefCell<DispatchStats>,
}

impl Dispatcher {
    /// Create a dispatcher that schedules itself on `host`
    pub fn new(host: Rc<dyn Host>, config: DispatchConfig) -> DispatchResult<Rc<Self>> {
        config.validate()?;
        Ok(Rc::new(Self {
            host,
            tasks: RefCell::new(TaskQueue::with_capacity(config.initial_capacity)),
            running: Cell::new(false),
            queued: Cell::new(false),
            batch_size: config.batch_size,
            stats: RefCell::new(DispatchStats::default()),
        }))
    }

    /// Queue a task to run on a later host turn
    ///
    /// Never runs the task synchronously and never blocks. Safe to call from
    /// inside a running task.
    pub fn submit<F>(self: &Rc<Self>, task: F)
    where
        F: FnOnce() + 'static,
    {
        self.submit_task(Box::new(task));
    }

    /// Queue an already boxed task
    pub fn submit_task(self: &Rc<Self>, task: Task) {
        self.tasks.borrow_mut().push(task);
        self.stats.borrow_mut().submitted += 1;
        self.queue_dispatcher();
    }

    /// Run `task` once after at least `delay`
    ///
    /// Goes straight to the host timer: the task skips the queue and does not
    /// count against any batch.
    pub fn queue_delay<F>(&self, task: F, delay: Duration) -> DispatchResult<TimerHandle>
    where
        F: FnOnce() + 'static,
    {
        let handle = self.host.set_timeout(Box::new(task), delay)?;
        self.stats.borrow_mut().delayed += 1;
        Ok(handle)
    }

    /// Cancel a delayed task, if the host still has it
    pub fn cancel_delay(&self, handle: TimerHandle) -> bool {
        self.host.clear_timeout(handle)
    }

    /// Arm: schedule a drain unless one is pending or running
    fn queue_dispatcher(self: &Rc<Self>) {
        if self.queued.get() || self.running.get() {
            return;
        }

        self.queued.set(true);
        let this = Rc::clone(self);
        match self.host.defer(Box::new(move || this.process_messages())) {
            Ok(()) => self.stats.borrow_mut().arms += 1,
            Err(e) => {
                // Let the next submit try again
                self.queued.set(false);
                console_log!("[dispatch] {} host refused drain: {}", self.host.name(), e);
            }
        }
    }

    /// Drain: run up to `batch_size` tasks, then yield
    fn process_messages(self: &Rc<Self>) {
        self.running.set(true);
        self.queued.set(false);
        self.stats.borrow_mut().drains += 1;

        let mut guard = DrainGuard {
            dispatcher: self,
            completed: false,
        };

        let mut processed = 0;
        while processed < self.batch_size {
            let Some(task) = self.tasks.borrow_mut().pop() else {
                break;
            };
            task();
            processed += 1;
            self.stats.borrow_mut().executed += 1;
        }

        if processed == self.batch_size && !self.tasks.borrow().is_empty() {
            self.stats.borrow_mut().yields += 1;
        }
        guard.completed = true;
    }

    /// Number of tasks waiting in the queue
    pub fn pending(&self) -> usize {
        self.tasks.borrow().len()
    }

    /// Check if a drain is currently running tasks
    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    /// Check if a drain is scheduled but has not started
    pub fn is_queued(&self) -> bool {
        self.queued.get()
    }

    pub fn state(&self) -> DispatchState {
        if self.running.get() {
            DispatchState::Draining
        } else if self.queued.get() {
            DispatchState::Armed
        } else {
            DispatchState::Idle
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn stats(&self) -> DispatchStats {
        *self.stats.borrow()
    }

    pub fn host(&self) -> &Rc<dyn Host> {
        &self.host
    }
}

/// Ends a drain however it exits
///
/// Clears `running` and re-arms if tasks remain, also when a task panics
/// and unwinds through the drain. The tasks left in the aborted batch run on
/// a later turn instead of being stranded behind a stuck `running` flag.
struct DrainGuard<'a> {
    dispatcher: &'a Rc<Dispatcher>,
    completed: bool,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        let dispatcher = self.dispatcher;
        dispatcher.running.set(false);

        if !self.completed {
            dispatcher.stats.borrow_mut().aborted += 1;
            console_log!(
                "[dispatch] task panicked mid-batch, {} task(s) left queued",
                dispatcher.pending()
            );
        }

        if dispatcher.pending() > 0 {
            dispatcher.queue_dispatcher();
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("host", &self.host.name())
            .field("state", &self.state())
            .field("pending", &self.pending())
            .field("batch_size", &self.batch_size)
            .finish()
    }
}
