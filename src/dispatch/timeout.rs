//! Delay and timeout futures
//!
//! Both ride on delayed submission: a timer task completes a oneshot
//! channel. Whatever executor polls them, the host's timer is what wakes
//! them up.

use super::dispatcher::Dispatcher;
use super::error::DispatchResult;
use crate::platform::{Host, TimerHandle};
use futures::channel::oneshot;
use pin_project_lite::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};
use std::time::Duration;

/// Error returned when a timeout expires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutError;

impl std::fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "operation timed out")
    }
}

impl std::error::Error for TimeoutError {}

/// Future that completes once its timer fires
///
/// Also completes if the host drops the timer without firing it. Dropping
/// an unfinished `Delay` cancels the timer.
pub struct Delay {
    fired: oneshot::Receiver<()>,
    /// Cleared once the timer has fired
    timer: Option<(Rc<dyn Host>, TimerHandle)>,
}

impl Future for Delay {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        match Pin::new(&mut self.fired).poll(cx) {
            Poll::Ready(_) => {
                self.timer = None;
                Poll::Ready(())
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for Delay {
    fn drop(&mut self) {
        if let Some((host, handle)) = self.timer.take() {
            host.clear_timeout(handle);
        }
    }
}

pin_project! {
    /// Future that wraps another future with a deadline
    ///
    /// Resolves to `Ok(output)` if the inner future finishes first, or
    /// `Err(TimeoutError)` once the delay elapses.
    pub struct Timeout<F> {
        #[pin]
        future: F,
        delay: Delay,
    }
}

impl<F: Future> Future for Timeout<F> {
    type Output = Result<F::Output, TimeoutError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();

        // A ready result wins over an expired deadline
        if let Poll::Ready(output) = this.future.poll(cx) {
            return Poll::Ready(Ok(output));
        }

        match Pin::new(this.delay).poll(cx) {
            Poll::Ready(()) => Poll::Ready(Err(TimeoutError)),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Dispatcher {
    /// A future that completes after `duration`
    pub fn delay(&self, duration: Duration) -> DispatchResult<Delay> {
        let (tx, fired) = oneshot::channel();
        let handle = self.queue_delay(
            move || {
                let _ = tx.send(());
            },
            duration,
        )?;

        Ok(Delay {
            fired,
            timer: Some((Rc::clone(self.host()), handle)),
        })
    }

    /// Wrap `future` so it gives up after `duration`
    ///
    /// # Example
    /// ```ignore
    /// match dispatcher.timeout(reply, Duration::from_secs(1))?.await {
    ///     Ok(value) => handle(value),
    ///     Err(TimeoutError) => retry(),
    /// }
    /// ```
    pub fn timeout<F: Future>(&self, future: F, duration: Duration) -> DispatchResult<Timeout<F>> {
        Ok(Timeout {
            future,
            delay: self.delay(duration)?,
        })
    }
}
