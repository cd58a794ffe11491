//! nexttick - a cooperative task dispatcher for single-threaded event loops
//!
//! Work items ("tasks") are queued FIFO and drained in bounded batches on the
//! host's next turn, so a burst of work never starves the rest of the event
//! loop. This is the trampoline a channel runtime sits on: every continuation
//! that becomes runnable is handed to [`dispatch::run`].
//!
//! Platform support:
//! - Browser / worker (wasm32-unknown-unknown): MessageChannel turns, setTimeout timers
//! - Everything else: [`platform::local::LocalHost`], an explicitly driven loop

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

pub mod dispatch;
pub mod platform;

pub use dispatch::{DispatchConfig, DispatchError, Dispatcher};
pub use platform::{Host, TimerHandle};

/// Initialize panic hook for better error messages in browser console
///
/// A task that panics inside a drain is not caught by the dispatcher; on the
/// web this hook is what reports it.
#[cfg(target_arch = "wasm32")]
pub fn init_panic_hook() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Console logging helper
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
extern "C" {
    #[doc(hidden)]
    #[wasm_bindgen(js_namespace = console)]
    pub fn log(s: &str);
}

/// Log to browser console (WASM)
#[cfg(target_arch = "wasm32")]
#[macro_export]
macro_rules! console_log {
    ($($t:tt)*) => {
        $crate::log(&format!($($t)*))
    };
}

/// Log to stderr (native)
#[cfg(not(target_arch = "wasm32"))]
#[macro_export]
macro_rules! console_log {
    ($($t:tt)*) => {
        eprintln!($($t)*)
    };
}
