//! [`ResultCell`] stores the outcome of a task body.
//!
//! The cell is written at most once, by the poller which observed the body
//! finish, and only ever moves forward: `Empty` becomes `Value` or `Panicked`,
//! and either of those becomes `Taken` once the outcome is moved out or
//! destroyed. Synchronization is provided by the task state: the write
//! happens while the writer holds `RUNNING` and before `COMPLETE` is
//! published, readers only look at the cell after observing `COMPLETE`.
use std::cell::UnsafeCell;
use std::{fmt, mem};

use crate::util::abort_on_panic;
use crate::Panic;

pub(crate) struct ResultCell<T> {
    inner: UnsafeCell<Outcome<T>>,
}

enum Outcome<T> {
    Empty,
    Value(T),
    Panicked(Panic),
    Taken,
}

impl<T> ResultCell<T> {
    pub(crate) const fn new() -> Self {
        Self {
            inner: UnsafeCell::new(Outcome::Empty),
        }
    }

    /// Store the outcome of the body.
    ///
    /// # Panic
    /// Panics if an outcome was already stored.
    ///
    /// # Safety
    /// The caller must hold the task's `RUNNING` flag and must not have
    /// published `COMPLETE` yet.
    pub(crate) unsafe fn store(&self, outcome: Result<T, Panic>) {
        let this = unsafe { &mut *self.inner.get() };
        assert!(
            matches!(this, Outcome::Empty),
            "task result written more than once"
        );
        *this = match outcome {
            Ok(value) => Outcome::Value(value),
            Err(panic) => Outcome::Panicked(panic),
        };
    }

    /// Borrow the stored outcome.
    ///
    /// # Panic
    /// Panics if no outcome was stored, or if it was already taken.
    ///
    /// # Safety
    /// The caller must have observed `COMPLETE` and must hold the task
    /// handle for at least the lifetime of the returned reference.
    pub(crate) unsafe fn get(&self) -> Result<&T, &Panic> {
        let this = unsafe { &*self.inner.get() };
        match this {
            Outcome::Value(value) => Ok(value),
            Outcome::Panicked(panic) => Err(panic),
            Outcome::Empty => panic!("task result read before the task completed"),
            Outcome::Taken => panic!("task result read after it was moved out"),
        }
    }

    /// Move the stored outcome out of the cell.
    ///
    /// # Panic
    /// Panics if no outcome was stored, or if it was already taken.
    ///
    /// # Safety
    /// The caller must have observed `COMPLETE` and must have exclusive
    /// access to the task handle.
    pub(crate) unsafe fn take(&self) -> Result<T, Panic> {
        let this = unsafe { &mut *self.inner.get() };
        match mem::replace(this, Outcome::Taken) {
            Outcome::Value(value) => Ok(value),
            Outcome::Panicked(panic) => Err(panic),
            Outcome::Empty => panic!("task result taken before the task completed"),
            Outcome::Taken => panic!("task result taken twice"),
        }
    }

    /// Drop the stored outcome, if any.
    ///
    /// # Abort
    /// This will abort if dropping the outcome panics.
    ///
    /// # Safety
    /// The caller must be the single party responsible for the output, as
    /// decided by the task state (`DropOutput`).
    pub(crate) unsafe fn destroy(&self) {
        let this = unsafe { &mut *self.inner.get() };
        let old = match this {
            Outcome::Empty => return,
            _ => mem::replace(this, Outcome::Taken),
        };
        abort_on_panic(|| drop(old));
    }
}

impl<T> fmt::Debug for ResultCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultCell").finish_non_exhaustive()
    }
}
