//! A one-shot readiness signal for a single waiter.
//!
//! See the documentation for the [`SingleConsumerEvent`] type for details.
use std::fmt;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::continuation::ContinuationSlot;

const LOG: &str = "skuld_task::event";

/// A one-shot event with at most one waiter.
///
/// An event starts out unset, unless constructed with
/// [`SingleConsumerEvent::new(true)`](SingleConsumerEvent::new). Awaiting an
/// unset event suspends the waiter until some other party calls
/// [`set`](SingleConsumerEvent::set); awaiting a set event completes
/// immediately. Once set, an event stays set.
///
/// [`set`](SingleConsumerEvent::set) may be called from any thread. Everything
/// the setter did before calling it is visible to the waiter once it resumes.
///
/// Only one waiter may be pending at a time. A second concurrent waiter is a
/// usage error; it is detected when both register at the same instant and
/// panics, otherwise the earlier waiter is silently replaced and never woken.
///
/// ```rust
/// use std::sync::Arc;
/// use skuld_task::{SingleConsumerEvent, Task};
///
/// let event = Arc::new(SingleConsumerEvent::default());
/// let task = Task::new({
///     let event = event.clone();
///     async move {
///         event.wait().await;
///         "done"
///     }
/// });
/// assert!(!task.is_ready());
///
/// // Setting the event resumes the task on this thread.
/// event.set();
/// assert!(task.is_ready());
/// ```
pub struct SingleConsumerEvent {
    slot: ContinuationSlot,
}

impl SingleConsumerEvent {
    /// Returns a new event, set if `initially_set` is `true`.
    #[must_use]
    pub const fn new(initially_set: bool) -> Self {
        let slot = if initially_set {
            ContinuationSlot::fired()
        } else {
            ContinuationSlot::new()
        };
        Self { slot }
    }

    /// Returns `true` if the event has been set.
    pub fn is_set(&self) -> bool {
        self.slot.is_fired()
    }

    /// Set the event, waking the waiter if there is one.
    ///
    /// The waiter's waker is woken exactly once, on the calling thread,
    /// before this returns. When the waiter is a [`Task`](crate::Task), that
    /// wake resumes its body right here. Setting an event which is already
    /// set does nothing.
    pub fn set(&self) {
        log::trace!(target: LOG, "event.set");
        self.slot.fire();
    }

    /// Wait for the event to be set.
    ///
    /// This is what `(&event).await` does.
    pub fn wait(&self) -> Wait<'_> {
        Wait { event: self }
    }
}

impl Default for SingleConsumerEvent {
    /// Returns a new, unset event.
    fn default() -> Self {
        Self::new(false)
    }
}

impl fmt::Debug for SingleConsumerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingleConsumerEvent")
            .field("set", &self.is_set())
            .finish()
    }
}

impl<'a> IntoFuture for &'a SingleConsumerEvent {
    type Output = ();
    type IntoFuture = Wait<'a>;

    fn into_future(self) -> Self::IntoFuture {
        self.wait()
    }
}

/// Future returned from [`SingleConsumerEvent::wait()`].
///
/// This future is fused, so once it has completed, any future calls to poll
/// will immediately return [`Poll::Ready`].
#[derive(Debug)]
#[must_use = "futures do nothing unless `.await`ed or `poll`ed"]
pub struct Wait<'a> {
    event: &'a SingleConsumerEvent,
}

impl Future for Wait<'_> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.event.slot.poll_fired(cx)
    }
}
