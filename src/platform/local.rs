//! Local Host Implementation
//!
//! An in-process event loop that nothing drives but its owner. Used as the
//! native host and as the deterministic host in tests:
//!
//! - Deferred callbacks run FIFO, one per [`LocalHost::run_next_deferred`]
//! - Timers fire in deadline order; after every timer callback the deferred
//!   queue is drained, the way a browser runs microtasks after each task
//! - Time is either virtual (moved only by [`LocalHost::advance`] and
//!   [`LocalHost::run_until_idle`]) or the system monotonic clock

use super::timer::TimerQueue;
use super::{Callback, Host, PlatformResult, TimerHandle};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::time::Duration;

#[cfg(not(all(target_arch = "wasm32", target_os = "unknown")))]
use std::{rc::Rc, time::Instant};

thread_local! {
    /// The calling thread's host, used when no host was installed
    #[cfg(not(all(target_arch = "wasm32", target_os = "unknown")))]
    static THREAD_HOST: Rc<LocalHost> = Rc::new(LocalHost::with_system_clock());
}

/// Shared handle to the calling thread's default host
#[cfg(not(all(target_arch = "wasm32", target_os = "unknown")))]
pub fn thread_host() -> Rc<LocalHost> {
    THREAD_HOST.with(Rc::clone)
}

/// Where the host gets its time from
enum Clock {
    /// Moves only when the host is told to
    Virtual(Cell<Duration>),
    /// Monotonic wall time since the host was created
    #[cfg(not(all(target_arch = "wasm32", target_os = "unknown")))]
    System(Instant),
}

impl Clock {
    fn now(&self) -> Duration {
        match self {
            Clock::Virtual(now) => now.get(),
            #[cfg(not(all(target_arch = "wasm32", target_os = "unknown")))]
            Clock::System(start) => start.elapsed(),
        }
    }

    /// Move time forward to at least `deadline`
    fn wait_until(&self, deadline: Duration) {
        match self {
            Clock::Virtual(now) => {
                if deadline > now.get() {
                    now.set(deadline);
                }
            }
            #[cfg(not(all(target_arch = "wasm32", target_os = "unknown")))]
            Clock::System(start) => {
                let elapsed = start.elapsed();
                if deadline > elapsed {
                    std::thread::sleep(deadline - elapsed);
                }
            }
        }
    }
}

/// Explicitly driven host
pub struct LocalHost {
    /// Callbacks waiting for the next turn
    deferred: RefCell<VecDeque<Callback>>,
    /// One-shot timers
    timers: RefCell<TimerQueue>,
    clock: Clock,
    /// Total number of `defer` registrations ever made
    registrations: Cell<u64>,
}

impl LocalHost {
    /// Create a host with a virtual clock starting at zero
    pub fn new() -> Self {
        Self::with_clock(Clock::Virtual(Cell::new(Duration::ZERO)))
    }

    /// Create a host that follows the system monotonic clock
    ///
    /// [`LocalHost::advance`] and [`LocalHost::run_until_idle`] sleep the
    /// thread until timers are due.
    #[cfg(not(all(target_arch = "wasm32", target_os = "unknown")))]
    pub fn with_system_clock() -> Self {
        Self::with_clock(Clock::System(Instant::now()))
    }

    fn with_clock(clock: Clock) -> Self {
        Self {
            deferred: RefCell::new(VecDeque::new()),
            timers: RefCell::new(TimerQueue::new()),
            clock,
            registrations: Cell::new(0),
        }
    }

    /// Time since the host was created
    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    /// Number of `defer` calls the host has accepted so far
    pub fn deferred_registrations(&self) -> u64 {
        self.registrations.get()
    }

    /// Number of deferred callbacks waiting to run
    pub fn pending_deferred(&self) -> usize {
        self.deferred.borrow().len()
    }

    /// Number of timers that have not fired or been cancelled
    pub fn pending_timers(&self) -> usize {
        self.timers.borrow().len()
    }

    /// Check if there is nothing left to run, now or later
    pub fn is_idle(&self) -> bool {
        self.pending_deferred() == 0 && self.pending_timers() == 0
    }

    /// Run the oldest deferred callback, if any
    ///
    /// Returns false if there was nothing to run.
    pub fn run_next_deferred(&self) -> bool {
        let Some(callback) = self.deferred.borrow_mut().pop_front() else {
            return false;
        };
        callback();
        true
    }

    /// Run deferred callbacks until none are left, including ones
    /// registered along the way. Returns how many ran.
    ///
    /// Does not return while callbacks keep deferring more work.
    pub fn run_deferred(&self) -> usize {
        let mut ran = 0;
        while self.run_next_deferred() {
            ran += 1;
        }
        ran
    }

    /// Move time forward by `by`, firing every timer that comes due on the
    /// way in deadline order. Returns the number of callbacks run.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.now() + by;
        let mut ran = self.run_deferred();

        while let Some(deadline) = self.next_deadline().filter(|d| *d <= target) {
            self.clock.wait_until(deadline);
            ran += self.fire_due_timers();
        }

        self.clock.wait_until(target);
        ran + self.fire_due_timers()
    }

    /// Run until no deferred callbacks or timers remain, jumping (or
    /// sleeping) to each timer deadline. Returns the number of callbacks run.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        loop {
            ran += self.run_deferred();
            let Some(deadline) = self.next_deadline() else {
                break;
            };
            self.clock.wait_until(deadline);
            ran += self.fire_due_timers();
        }
        ran
    }

    fn next_deadline(&self) -> Option<Duration> {
        self.timers.borrow_mut().next_deadline()
    }

    /// Fire every timer due at the current time, draining deferred work
    /// after each one
    fn fire_due_timers(&self) -> usize {
        let mut ran = 0;
        loop {
            let now = self.clock.now();
            let Some(callback) = self.timers.borrow_mut().pop_expired(now) else {
                break;
            };
            callback();
            ran += 1 + self.run_deferred();
        }
        ran
    }
}

impl Default for LocalHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Host for LocalHost {
    fn name(&self) -> &'static str {
        "local"
    }

    fn defer(&self, callback: Callback) -> PlatformResult<()> {
        self.deferred.borrow_mut().push_back(callback);
        self.registrations.set(self.registrations.get() + 1);
        Ok(())
    }

    fn set_timeout(&self, callback: Callback, delay: Duration) -> PlatformResult<TimerHandle> {
        let deadline = self.now() + delay;
        Ok(self.timers.borrow_mut().schedule(deadline, callback))
    }

    fn clear_timeout(&self, handle: TimerHandle) -> bool {
        self.timers.borrow_mut().cancel(handle)
    }

    fn now_ms(&self) -> f64 {
        self.now().as_secs_f64() * 1000.0
    }
}
