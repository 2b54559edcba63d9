use std::cell::Cell;
use std::future::Future;
use std::pin::{pin, Pin};
use std::task::Poll;

use crate::Task;

mod threads;

pub(crate) fn init_logging() {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Trace)
        .is_test(true)
        .try_init();
}

/// Poll `fut` once with a no-op waker.
pub(crate) fn poll_once<F: Future>(fut: Pin<&mut F>) -> Poll<F::Output> {
    fut.poll(&mut futures_test::task::noop_context())
}

/// Take the value out of a finished task, re-raising a panic from its body.
///
/// Assertions inside task bodies are caught by the task, so every test task
/// is finished through this to make those assertions count.
#[track_caller]
pub(crate) fn finish<T>(task: Task<T>) -> T {
    assert!(task.is_ready(), "task did not run to completion");
    match poll_once(pin!(task)) {
        Poll::Ready(Ok(value)) => value,
        Poll::Ready(Err(err)) => err.resume_unwind(),
        Poll::Pending => panic!("ready task returned pending"),
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Counts {
    pub(crate) constructed: usize,
    pub(crate) cloned: usize,
    pub(crate) dropped: usize,
}

impl Counts {
    pub(crate) fn active(&self) -> usize {
        self.constructed + self.cloned - self.dropped
    }
}

thread_local! {
    static COUNTS: Cell<Counts> = Cell::new(Counts::default());
}

/// A value which counts its constructions, clones and drops on the current
/// thread.
#[derive(Debug)]
pub(crate) struct Counted(());

impl Counted {
    pub(crate) fn new() -> Self {
        Self::update(|c| c.constructed += 1);
        Self(())
    }

    pub(crate) fn reset() {
        COUNTS.with(|c| c.set(Counts::default()));
    }

    pub(crate) fn counts() -> Counts {
        COUNTS.with(Cell::get)
    }

    fn update(f: impl FnOnce(&mut Counts)) {
        COUNTS.with(|c| {
            let mut counts = c.get();
            f(&mut counts);
            c.set(counts);
        });
    }
}

impl Clone for Counted {
    fn clone(&self) -> Self {
        Self::update(|c| c.cloned += 1);
        Self(())
    }
}

impl Drop for Counted {
    fn drop(&mut self) {
        Self::update(|c| c.dropped += 1);
    }
}
