//! Browser Host Implementation
//!
//! Provides the two host primitives in browsers, workers, and other JS
//! runtimes:
//! - Next turn: one `MessageChannel` message per callback (a task that runs
//!   ahead of clamped timers but after pending input), falling back to
//!   `queueMicrotask` where `MessageChannel` does not exist
//! - Timers: the global `setTimeout` / `clearTimeout`

use super::{Callback, Host, PlatformError, PlatformResult, TimerHandle};
use crate::console_log;
use slab::Slab;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};
use std::time::Duration;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_name = setTimeout, catch)]
    fn set_timeout_js(handler: &JsValue, timeout: i32) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(js_name = clearTimeout)]
    fn clear_timeout_js(id: &JsValue);

    #[wasm_bindgen(js_name = queueMicrotask, catch)]
    fn queue_microtask_js(callback: &JsValue) -> Result<(), JsValue>;
}

/// Callbacks waiting for their channel message
type Pending = Rc<RefCell<VecDeque<Callback>>>;

/// A timer registered with `setTimeout`
struct JsTimer {
    generation: u64,
    id: JsValue,
    /// Handler passed to `setTimeout`; dropping it frees the callback
    _handler: Closure<dyn FnMut()>,
}

/// Live timers by slot
type Timers = Rc<RefCell<Slab<JsTimer>>>;

/// A message channel whose port1 runs one pending callback per message
struct Channel {
    channel: web_sys::MessageChannel,
    /// Handler for port1 (stored to prevent GC)
    _on_message: Closure<dyn FnMut()>,
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.channel.port1().set_onmessage(None);
    }
}

/// Browser host state
pub struct WebHost {
    pending: Pending,
    /// None when the runtime has no MessageChannel
    channel: Option<Channel>,
    timers: Timers,
    next_generation: Cell<u64>,
}

impl WebHost {
    /// Bind to the current JS global scope
    ///
    /// Also installs the panic hook, so a task that panics inside a drain
    /// is reported on the console.
    pub fn new() -> PlatformResult<Self> {
        crate::init_panic_hook();

        let global = js_sys::global();
        for name in ["setTimeout", "clearTimeout"] {
            let present = js_sys::Reflect::has(&global, &JsValue::from_str(name)).unwrap_or(false);
            if !present {
                return Err(PlatformError::InitFailed(format!("global {} is missing", name)));
            }
        }

        let pending: Pending = Rc::new(RefCell::new(VecDeque::new()));
        let channel = match open_channel(&pending) {
            Ok(channel) => Some(channel),
            Err(e) => {
                console_log!("[host] MessageChannel unavailable ({:?}), using microtasks", e);
                None
            }
        };

        console_log!(
            "[host] web host ready ({})",
            if channel.is_some() { "message channel" } else { "microtask" }
        );

        Ok(Self {
            pending,
            channel,
            timers: Rc::new(RefCell::new(Slab::new())),
            next_generation: Cell::new(1),
        })
    }

    /// Number of timers registered through this host that have not fired
    /// or been cleared
    pub fn pending_timers(&self) -> usize {
        self.timers.borrow().len()
    }
}

impl Drop for WebHost {
    fn drop(&mut self) {
        let timers: Vec<JsTimer> = self.timers.borrow_mut().drain().collect();
        for timer in &timers {
            clear_timeout_js(&timer.id);
        }
    }
}

/// Remove a firing timer from the registry, unless it was cleared or the
/// host is gone
fn take_timer(
    registry: &Weak<RefCell<Slab<JsTimer>>>,
    slot: usize,
    generation: u64,
) -> Option<JsTimer> {
    let registry = registry.upgrade()?;
    let mut timers = registry.borrow_mut();
    let live = timers.get(slot).is_some_and(|t| t.generation == generation);
    live.then(|| timers.remove(slot))
}

/// Create the channel and wire port1 to the pending queue
fn open_channel(pending: &Pending) -> Result<Channel, JsValue> {
    let channel = web_sys::MessageChannel::new()?;

    let pending = pending.clone();
    let on_message = Closure::wrap(Box::new(move || {
        let callback = pending.borrow_mut().pop_front();
        if let Some(callback) = callback {
            callback();
        }
    }) as Box<dyn FnMut()>);

    channel
        .port1()
        .set_onmessage(Some(on_message.as_ref().unchecked_ref()));

    Ok(Channel {
        channel,
        _on_message: on_message,
    })
}

impl Host for WebHost {
    fn name(&self) -> &'static str {
        "web"
    }

    fn defer(&self, callback: Callback) -> PlatformResult<()> {
        match &self.channel {
            Some(channel) => {
                self.pending.borrow_mut().push_back(callback);
                channel
                    .channel
                    .port2()
                    .post_message(&JsValue::UNDEFINED)
                    .map_err(|e| {
                        self.pending.borrow_mut().pop_back();
                        let message = format!("postMessage failed: {:?}", e);
                        web_sys::console::error_1(&format!("[host] {}", message).into());
                        PlatformError::Callback(message)
                    })
            }
            None => {
                let handler = Closure::once_into_js(move || callback());
                queue_microtask_js(&handler)
                    .map_err(|e| PlatformError::Callback(format!("queueMicrotask failed: {:?}", e)))
            }
        }
    }

    fn set_timeout(&self, callback: Callback, delay: Duration) -> PlatformResult<TimerHandle> {
        let generation = self.next_generation.get();
        self.next_generation.set(generation + 1);

        let mut timers = self.timers.borrow_mut();
        let entry = timers.vacant_entry();
        let slot = entry.key();

        let registry = Rc::downgrade(&self.timers);
        let handler = Closure::once(move || {
            let timer = take_timer(&registry, slot, generation);
            callback();
            // Holds this handler; freed once the call returns
            drop(timer);
        });

        let millis = delay.as_millis().min(i32::MAX as u128) as i32;
        let id = set_timeout_js(handler.as_ref(), millis)
            .map_err(|e| PlatformError::Callback(format!("setTimeout failed: {:?}", e)))?;
        entry.insert(JsTimer {
            generation,
            id,
            _handler: handler,
        });

        Ok(TimerHandle::new(slot, generation))
    }

    fn clear_timeout(&self, handle: TimerHandle) -> bool {
        let mut timers = self.timers.borrow_mut();
        let live = timers
            .get(handle.slot())
            .is_some_and(|t| t.generation == handle.generation());
        if !live {
            return false;
        }
        let timer = timers.remove(handle.slot());
        drop(timers);
        clear_timeout_js(&timer.id);
        true
    }

    fn now_ms(&self) -> f64 {
        js_sys::Date::now()
    }
}
