use std::fmt;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use crate::task_cell::{CoreRef, TaskCell};
use crate::{Panic, TaskError};

/// A handle to an eagerly started asynchronous computation.
///
/// [`Task::new`] polls the body right away, on the calling thread, until it
/// first suspends or finishes. Whenever a [`Waker`] the body handed out is
/// woken, the body is resumed inline on the waking thread. There is no
/// scheduler: the task never runs anywhere but where it was created or woken.
///
/// A [`Task`] produces its outcome to a single consumer:
///
/// - `task.await` consumes the handle and moves the value out.
/// - `(&task).await`, or equivalently [`task.get().await`](Task::get),
///   borrows the value stored in the task.
/// - [`task.when_ready().await`](Task::when_ready) waits for the body to
///   finish without looking at its outcome.
///
/// If the body panics, the panic is caught and handed to the consumer as a
/// [`TaskError`]. A default constructed task has no body at all; it is
/// always ready, and awaiting it yields a broken promise error.
///
/// Dropping a handle whose body has not finished detaches the body. It keeps
/// running for as long as something holds one of its wakers, and its output
/// is dropped when it finishes.
///
/// ```rust
/// use skuld_task::Task;
///
/// let task = Task::new(async { 1 + 1 });
/// // The body has no suspension points, so it already ran to completion.
/// assert!(task.is_ready());
///
/// let value = futures::executor::block_on(task).unwrap();
/// assert_eq!(value, 2);
/// ```
///
/// [`Waker`]: std::task::Waker
#[must_use = "dropping a task detaches its body and discards its outcome"]
pub struct Task<T> {
    inner: Option<CoreRef<T>>,
}

impl<T> Task<T> {
    /// Start running `future` as a task.
    ///
    /// Returns once the body has suspended for the first time or finished.
    /// Any code before the first suspension point has run by the time this
    /// returns.
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        Self {
            inner: Some(TaskCell::allocate(future)),
        }
    }

    /// Returns `true` if awaiting the task would not suspend.
    ///
    /// This is the case when the body finished, whether it returned or
    /// panicked, and for a task with no body.
    pub fn is_ready(&self) -> bool {
        match &self.inner {
            Some(core) => core.is_complete(),
            None => true,
        }
    }

    /// Await the task by reference.
    ///
    /// The returned future resolves to a reference to the stored value, or to
    /// a [`TaskError`] borrowing the stored panic. The task keeps its
    /// outcome, so awaiting it again yields the same value at the same
    /// address.
    ///
    /// This is what `(&task).await` does.
    ///
    /// # Panics
    /// The returned future panics if the value was already moved out by a
    /// consuming `task.await`.
    pub fn get(&self) -> Get<'_, T> {
        Get { task: self }
    }

    /// Wait for the task to finish without retrieving its outcome.
    ///
    /// The returned future never surfaces a panic from the body and resolves
    /// immediately for a task with no body. Await the task itself afterwards
    /// to observe the outcome.
    pub fn when_ready(&self) -> WhenReady<'_, T> {
        WhenReady { task: self }
    }
}

impl<T> Default for Task<T> {
    /// Returns a task with no body.
    fn default() -> Self {
        Self { inner: None }
    }
}

// A `Task` is only a pointer to its record.
impl<T> Unpin for Task<T> {}

impl<T> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.inner {
            None => "broken",
            Some(core) if core.is_complete() => "complete",
            Some(_) => "running",
        };
        f.debug_struct("Task").field("state", &state).finish()
    }
}

impl<T> Future for Task<T> {
    type Output = Result<T, TaskError>;

    /// Resolves to the task's outcome, moving it out of the task.
    ///
    /// # Panics
    /// Panics if polled again after resolving.
    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let Some(core) = self.get_mut().inner.as_mut() else {
            return Poll::Ready(Err(TaskError::broken_promise()));
        };
        ready!(core.poll_complete(cx));
        // Safety: the task is complete, and we have exclusive access to the handle.
        let outcome = unsafe { core.take_result() };
        Poll::Ready(outcome.map_err(TaskError::panicked))
    }
}

impl<'a, T> IntoFuture for &'a Task<T> {
    type Output = Result<&'a T, TaskError<&'a Panic>>;
    type IntoFuture = Get<'a, T>;

    fn into_future(self) -> Self::IntoFuture {
        self.get()
    }
}

/// Future returned from [`Task::get`] and from awaiting a `&Task`.
///
/// # Panics
/// Panics when polled if the value was already moved out of the task.
#[must_use = "futures do nothing unless `.await`ed or `poll`ed"]
pub struct Get<'a, T> {
    task: &'a Task<T>,
}

impl<'a, T> Future for Get<'a, T> {
    type Output = Result<&'a T, TaskError<&'a Panic>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let task: &'a Task<T> = self.task;
        let Some(core) = &task.inner else {
            return Poll::Ready(Err(TaskError::broken_promise()));
        };
        ready!(core.poll_complete(cx));
        // Safety: the task is complete, and the result lives as long as the
        //         borrowed handle.
        let outcome = unsafe { core.result() };
        Poll::Ready(outcome.map_err(TaskError::panicked))
    }
}

impl<T> fmt::Debug for Get<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Get").field("task", self.task).finish()
    }
}

/// Future returned from [`Task::when_ready`].
#[must_use = "futures do nothing unless `.await`ed or `poll`ed"]
pub struct WhenReady<'a, T> {
    task: &'a Task<T>,
}

impl<T> Future for WhenReady<'_, T> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &self.task.inner {
            Some(core) => core.poll_complete(cx),
            None => Poll::Ready(()),
        }
    }
}

impl<T> fmt::Debug for WhenReady<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WhenReady").field("task", self.task).finish()
    }
}
