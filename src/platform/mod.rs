//! Host Abstraction Layer
//!
//! The dispatcher never runs anything on its own. It relies on two
//! primitives from whatever event loop hosts it:
//!
//! - "run this callback on the next turn", ahead of timers
//! - "run this callback once, after a delay"
//!
//! Each host implements [`Host`] to provide them:
//!
//! - Browser / worker WASM via `MessageChannel` and `setTimeout` ([`web`])
//! - An explicitly driven in-process loop, used natively and in tests ([`local`])

#[cfg(target_arch = "wasm32")]
#[cfg(target_os = "unknown")] // Browser WASM (no WASI)
pub mod web;

pub mod local;
mod timer;

use std::rc::Rc;
use std::time::Duration;

/// Result type for host operations
pub type PlatformResult<T> = Result<T, PlatformError>;

/// Host-specific errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// Feature not supported on this host
    NotSupported(String),
    /// Initialization failed
    InitFailed(String),
    /// The host refused to register a callback
    Callback(String),
}

impl std::fmt::Display for PlatformError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlatformError::NotSupported(s) => write!(f, "Not supported: {}", s),
            PlatformError::InitFailed(s) => write!(f, "Init failed: {}", s),
            PlatformError::Callback(s) => write!(f, "Callback rejected: {}", s),
        }
    }
}

impl std::error::Error for PlatformError {}

/// A zero-argument callback handed to the host
pub type Callback = Box<dyn FnOnce() + 'static>;

/// Handle for a pending one-shot timer
///
/// Opaque outside the host that issued it. The generation keeps a stale
/// handle from cancelling a later timer that reused the same slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle {
    slot: usize,
    generation: u64,
}

impl TimerHandle {
    pub(crate) fn new(slot: usize, generation: u64) -> Self {
        Self { slot, generation }
    }

    pub(crate) fn slot(&self) -> usize {
        self.slot
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }
}

/// Host abstraction trait
///
/// Callbacks are always invoked later, from the host's own loop, never from
/// inside the registering call. Hosts run one callback at a time.
pub trait Host {
    /// Short name for log lines
    fn name(&self) -> &'static str {
        "host"
    }

    /// Run `callback` as soon as possible after the current call stack
    /// unwinds, ahead of any timers.
    fn defer(&self, callback: Callback) -> PlatformResult<()>;

    /// Run `callback` once, no sooner than `delay` from now
    fn set_timeout(&self, callback: Callback, delay: Duration) -> PlatformResult<TimerHandle>;

    /// Cancel a pending timer
    ///
    /// Returns true if the timer was pending and will no longer fire.
    fn clear_timeout(&self, handle: TimerHandle) -> bool;

    /// Current time in milliseconds since some host-specific epoch
    fn now_ms(&self) -> f64;
}

/// The host used when nothing was installed explicitly
///
/// In the browser this is a fresh [`web::WebHost`]; everywhere else it is
/// the calling thread's [`local::LocalHost`].
pub fn default_host() -> PlatformResult<Rc<dyn Host>> {
    #[cfg(all(target_arch = "wasm32", target_os = "unknown"))]
    {
        Ok(Rc::new(web::WebHost::new()?))
    }

    #[cfg(not(all(target_arch = "wasm32", target_os = "unknown")))]
    {
        Ok(local::thread_host())
    }
}
