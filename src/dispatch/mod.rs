//! Task dispatch - the batch-draining trampoline
//!
//! One [`Dispatcher`] per thread serves the free functions in this module.
//! It is created either explicitly with [`install`], or on first use with
//! the platform's default host and [`DispatchConfig::default`].

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod queue;
pub mod task;
pub mod timeout;

pub use config::DispatchConfig;
pub use dispatcher::{DispatchState, DispatchStats, Dispatcher};
pub use error::{DispatchError, DispatchResult};
pub use task::Task;
pub use timeout::{Delay, Timeout, TimeoutError};

use crate::console_log;
use crate::platform::{self, Host, TimerHandle};
use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

thread_local! {
    /// The thread's dispatcher, once installed
    static DISPATCHER: RefCell<Option<Rc<Dispatcher>>> = const { RefCell::new(None) };
}

/// Install the thread's dispatcher
///
/// Must run before anything else on this thread touches the dispatcher;
/// fails with [`DispatchError::AlreadyInstalled`] afterwards.
pub fn install(host: Rc<dyn Host>, config: DispatchConfig) -> DispatchResult<Rc<Dispatcher>> {
    DISPATCHER.with(|slot| {
        let mut slot = slot.borrow_mut();
        if slot.is_some() {
            return Err(DispatchError::AlreadyInstalled);
        }

        let dispatcher = Dispatcher::new(host, config)?;
        console_log!(
            "[dispatch] installed on {} host (batch size {})",
            dispatcher.host().name(),
            dispatcher.batch_size()
        );
        *slot = Some(Rc::clone(&dispatcher));
        Ok(dispatcher)
    })
}

/// The thread's dispatcher, installing the default one if needed
pub fn current() -> DispatchResult<Rc<Dispatcher>> {
    let installed = DISPATCHER.with(|slot| slot.borrow().clone());
    match installed {
        Some(dispatcher) => Ok(dispatcher),
        None => install(platform::default_host()?, DispatchConfig::default()),
    }
}

/// Queue a task on the thread's dispatcher
///
/// If no host is available the task is dropped and the failure logged.
pub fn run<F>(task: F)
where
    F: FnOnce() + 'static,
{
    match current() {
        Ok(dispatcher) => dispatcher.submit(task),
        Err(e) => console_log!("[dispatch] dropping task: {}", e),
    }
}

/// Run `task` once after `delay`, bypassing the queue
pub fn queue_delay<F>(task: F, delay: Duration) -> DispatchResult<TimerHandle>
where
    F: FnOnce() + 'static,
{
    current()?.queue_delay(task, delay)
}

/// A future that completes after `duration`
pub fn delay(duration: Duration) -> DispatchResult<Delay> {
    current()?.delay(duration)
}

/// Wrap `future` so it gives up after `duration`
pub fn timeout<F: Future>(future: F, duration: Duration) -> DispatchResult<Timeout<F>> {
    current()?.timeout(future, duration)
}

/// Drive the thread's [`LocalHost`](crate::platform::local::LocalHost)
/// until it has nothing left to do
///
/// Only meaningful when the thread's dispatcher runs on the default host.
#[cfg(not(all(target_arch = "wasm32", target_os = "unknown")))]
pub fn run_until_idle() -> usize {
    platform::local::thread_host().run_until_idle()
}
