//! Provides a single-threaded executor for driving a [`Future`]
//! to completion from synchronous code.
//!
//! Tasks from `skuld_task` run themselves: they resume on whichever thread
//! wakes them. Something still has to wait for the outermost one. That is
//! what [`LocalExecutor::block_on`] and [`sync_wait`] are for. They poll a
//! single root future and block the calling thread through a [`park::Park`]
//! until the root is woken.
//!
//! # Modules
//! - [`park`]: parking and unparking abstractions plus built-in implementations.
#![deny(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    clippy::missing_safety_doc
)]
use std::future::{Future, IntoFuture};
use std::pin::pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};

/// Parking abstractions and built-in park implementations.
pub mod park;

use park::{Park, ParkMode, Unpark};

const LOG: &str = "skuld_executor";

/// A single-threaded executor for driving a [`Future`] to completion.
///
/// [`LocalExecutor`] can be driven by calling [`LocalExecutor::block_on`].
pub struct LocalExecutor<P: Park> {
    park: P,
}

impl<P: Park> std::fmt::Debug for LocalExecutor<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalExecutor").finish_non_exhaustive()
    }
}

impl<P: Park> LocalExecutor<P> {
    /// Construct a new [`LocalExecutor`] with the given [`Park`].
    ///
    /// The [`LocalExecutor`] will use the given [`Park`] to block the
    /// driver thread while the root future is waiting to be woken.
    pub fn new(park: P) -> Self {
        Self { park }
    }

    /// Blocks the current thread until the provided [`Future`], or anything
    /// which turns into one, has completed.
    ///
    /// The future is polled on this thread. Whenever it returns
    /// [`Poll::Pending`] the thread parks until the future's waker is woken,
    /// from this thread or any other.
    ///
    /// ### Panics
    /// Panics if [`Park::park`] returns an error.
    pub fn block_on<F>(&mut self, fut: F) -> F::Output
    where
        F: IntoFuture,
    {
        let mut fut = pin!(fut.into_future());
        let root = Arc::new(RootWaker {
            notified: AtomicBool::new(true),
            unparker: self.park.unparker(),
        });
        let waker = Waker::from(root.clone());
        let mut cx = Context::from_waker(&waker);

        loop {
            if root.take_notified() {
                log::trace!(target: LOG, "executor.poll");
                if let Poll::Ready(output) = fut.as_mut().poll(&mut cx) {
                    return output;
                }
            }
            let mode = if root.is_notified() {
                ParkMode::NoPark
            } else {
                ParkMode::NextCompletion
            };
            if let Err(err) = self.park.park(mode) {
                panic!("failed to park executor thread: {err}");
            }
        }
    }
}

/// Blocks the current thread until `fut` has completed, and returns its
/// output.
///
/// This is a [`LocalExecutor`] over a [`park::ThreadPark`] for the calling
/// thread.
///
/// ```rust
/// use skuld_task::Task;
///
/// let task = Task::new(async { 40 + 2 });
/// assert_eq!(skuld_executor::sync_wait(task).unwrap(), 42);
/// ```
pub fn sync_wait<F>(fut: F) -> F::Output
where
    F: IntoFuture,
{
    LocalExecutor::new(park::ThreadPark::new()).block_on(fut)
}

/// Waker handed to the root future of [`LocalExecutor::block_on`].
struct RootWaker<U> {
    notified: AtomicBool,
    unparker: U,
}

impl<U> RootWaker<U> {
    fn take_notified(&self) -> bool {
        self.notified.swap(false, Ordering::Acquire)
    }

    fn is_notified(&self) -> bool {
        self.notified.load(Ordering::Acquire)
    }
}

impl<U> Wake for RootWaker<U>
where
    U: Unpark + Send + Sync + 'static,
{
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.notified.store(true, Ordering::Release);
        self.unparker.unpark();
    }
}

#[cfg(test)]
mod tests {
    use std::future;
    use std::io;
    use std::sync::atomic::AtomicUsize;
    use std::thread;
    use std::time::Duration;

    use skuld_task::{SingleConsumerEvent, Task};

    use crate::park::{SpinPark, ThreadPark};

    use super::*;

    fn init_logging() {
        let _ = env_logger::builder()
            .filter_level(log::LevelFilter::Trace)
            .is_test(true)
            .try_init();
    }

    #[test]
    fn block_on() {
        let mut executor = LocalExecutor::new(SpinPark);

        let res = executor.block_on(async { 1 + 1 });
        assert_eq!(res, 2);
    }

    #[test]
    fn block_on_ready_task() {
        let mut executor = LocalExecutor::new(SpinPark);
        let task = Task::new(async { 1 + 1 });
        assert!(task.is_ready());

        let res = executor.block_on(task);
        assert_eq!(res.unwrap(), 2);
    }

    #[test]
    fn block_on_task_by_reference() {
        let task = Task::new(async { String::from("value") });
        let value = sync_wait(task.get()).unwrap();
        assert_eq!(value, "value");
        // The task keeps its value.
        assert_eq!(sync_wait(&task).unwrap(), "value");
    }

    #[test]
    fn block_on_broken_task() {
        let task: Task<()> = Task::default();
        let err = sync_wait(task).unwrap_err();
        assert!(err.is_broken_promise());
    }

    #[test]
    fn sync_wait_for_event_set_on_other_thread() {
        init_logging();
        let event = Arc::new(SingleConsumerEvent::default());
        let value = Arc::new(AtomicUsize::new(0));

        let task = Task::new({
            let event = event.clone();
            let value = value.clone();
            async move {
                event.wait().await;
                value.load(Ordering::Relaxed)
            }
        });
        assert!(!task.is_ready());

        let setter = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            value.store(7, Ordering::Relaxed);
            event.set();
        });

        assert_eq!(sync_wait(task).unwrap(), 7);
        setter.join().unwrap();
    }

    #[test]
    fn block_on_when_ready() {
        let event = Arc::new(SingleConsumerEvent::default());
        let task = Task::new({
            let event = event.clone();
            async move {
                event.wait().await;
                if event.is_set() {
                    panic!("body failed");
                }
                0u8
            }
        });

        let setter = thread::spawn(move || event.set());
        let mut executor = LocalExecutor::new(ThreadPark::new());
        executor.block_on(task.when_ready());
        setter.join().unwrap();

        let err = executor.block_on(task).unwrap_err();
        assert_eq!(err.panic().and_then(|p| p.message()), Some("body failed"));
    }

    #[test]
    fn root_woken_during_poll_is_polled_again() {
        let mut polls = 0;
        let mut executor = LocalExecutor::new(ThreadPark::new());
        executor.block_on(future::poll_fn(|cx| {
            polls += 1;
            if polls < 3 {
                cx.waker().wake_by_ref();
                Poll::Pending
            } else {
                Poll::Ready(())
            }
        }));
        assert_eq!(polls, 3);
    }

    #[test]
    fn block_on_panics_on_park_error() {
        #[derive(Clone, Copy, Debug)]
        struct TestUnparker;

        impl park::Unpark for TestUnparker {
            fn unpark(&self) {}
        }

        #[derive(Debug)]
        struct FailingPark;

        impl park::Park for FailingPark {
            type Unparker = TestUnparker;

            fn park(&mut self, _: park::ParkMode) -> io::Result<()> {
                Err(io::Error::other("park failed"))
            }

            fn unparker(&self) -> Self::Unparker {
                TestUnparker
            }
        }

        let mut executor = LocalExecutor::new(FailingPark);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            executor.block_on(async {
                future::pending::<()>().await;
            })
        }));
        assert!(result.is_err(), "block_on should panic on park error");
    }
}
