//! Task state transitions.
//!
//! The state of a task record is a single atomic word. The low bits hold a set
//! of [`Flags`], the remaining bits hold the reference count. Every transition
//! is a pure function over [`State`] applied with a compare-and-swap loop, so a
//! wakeup racing with a poll or with the handle being dropped always observes a
//! consistent snapshot.
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    struct Flags: usize {
        /// The body is being polled. Only the holder of this flag may
        /// touch the body or write the result.
        const RUNNING  = 1 << 0;
        /// The task was woken while it was running and must be polled again.
        const NOTIFIED = 1 << 1;
        /// The body has finished and the result cell has been written.
        const COMPLETE = 1 << 2;
        /// Indicates the presence of a [`Task`] handle.
        ///
        /// [`Task`]: crate::Task
        const HANDLE   = 1 << 3;
    }
}

const REF_SHIFT: u32 = 4;
const REF_ONE: usize = 1 << REF_SHIFT;
const FLAG_MASK: usize = REF_ONE - 1;

/// [`StateCell`] is a cell that tracks the state of a task.
///
/// [`StateCell`] combines a refcount with a set of flags to track
/// the state of a task.
pub(crate) struct StateCell {
    state: AtomicUsize,
}

impl StateCell {
    /// Build a new [`StateCell`] for a task whose body is about to be
    /// polled for the first time.
    ///
    /// The [`HANDLE`] and [`RUNNING`] flags are set and the reference count,
    /// owned by the handle, is one.
    pub(crate) fn new() -> Self {
        let state = State::new();
        Self {
            state: AtomicUsize::new(state.0),
        }
    }

    /// Update the state in this [`StateCell`].
    ///
    /// `f` may run more than once if the state is concurrently modified, so it
    /// must not have side effects beyond the [`State`] it is given. Invalid
    /// transitions assert, and since a half-applied transition would leave
    /// the task unsound, a panic here aborts the program.
    #[inline]
    pub(crate) fn update<U>(&self, mut f: impl FnMut(&mut State) -> U) -> U {
        crate::util::abort_on_panic(|| {
            let mut current = self.state.load(Ordering::Acquire);
            loop {
                let mut next = State(current);
                let res = f(&mut next);
                if next.0 == current {
                    return res;
                }
                match self.state.compare_exchange_weak(
                    current,
                    next.0,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                ) {
                    Ok(_) => return res,
                    Err(actual) => current = actual,
                }
            }
        })
    }

    /// Returns true if the task is complete.
    ///
    /// When this returns true, the result cell has been written and the write
    /// is visible to the caller.
    #[inline]
    pub(crate) fn is_complete(&self) -> bool {
        self.load().flags().contains(Flags::COMPLETE)
    }

    #[inline]
    fn load(&self) -> State {
        State(self.state.load(Ordering::Acquire))
    }
}

impl fmt::Debug for StateCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.load().fmt(f)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) struct State(usize);

impl State {
    fn new() -> Self {
        let flags = Flags::HANDLE | Flags::RUNNING;
        Self(flags.bits() | REF_ONE)
    }

    #[inline]
    fn flags(self) -> Flags {
        Flags::from_bits_retain(self.0 & FLAG_MASK)
    }

    #[inline]
    fn set_flags(&mut self, flags: Flags) {
        self.0 = (self.0 & !FLAG_MASK) | flags.bits();
    }

    #[inline]
    fn refcount(self) -> usize {
        self.0 >> REF_SHIFT
    }

    /// Notify the task.
    ///
    /// If the task is idle this acquires the [`RUNNING`] flag and the caller
    /// must resume the body. If the task is already running, the poller is
    /// told to poll again once the current poll returns.
    #[inline]
    pub(crate) fn notify(&mut self) -> NotifyResult {
        assert!(self.refcount() > 0);
        let mut flags = self.flags();
        if flags.contains(Flags::COMPLETE) {
            return NotifyResult::DoNothing;
        }
        if flags.contains(Flags::RUNNING) {
            flags.insert(Flags::NOTIFIED);
            self.set_flags(flags);
            return NotifyResult::DoNothing;
        }
        flags.insert(Flags::RUNNING);
        self.set_flags(flags);
        NotifyResult::Resume
    }

    /// Conclude a poll which returned [`Poll::Pending`].
    ///
    /// If the task was notified during the poll, the [`RUNNING`] flag is kept
    /// and the poller must poll again.
    ///
    /// [`Poll::Pending`]: std::task::Poll::Pending
    #[inline]
    pub(crate) fn complete_poll(&mut self) -> CompletePollResult {
        let mut flags = self.flags();
        assert!(flags.contains(Flags::RUNNING));
        assert!(!flags.contains(Flags::COMPLETE));

        let res = if flags.contains(Flags::NOTIFIED) {
            flags.remove(Flags::NOTIFIED);
            CompletePollResult::NotifiedDuringPoll
        } else {
            flags.remove(Flags::RUNNING);
            CompletePollResult::Ok
        };
        self.set_flags(flags);
        res
    }

    /// Mark the task as complete.
    ///
    /// Returns whether the output should be dropped or if the continuation
    /// slot should be fired.
    #[inline]
    pub(crate) fn complete_task(&mut self) -> CompleteTaskResult {
        assert!(self.refcount() > 0);
        let mut flags = self.flags();
        assert!(flags.contains(Flags::RUNNING));
        assert!(!flags.contains(Flags::COMPLETE));
        flags.insert(Flags::COMPLETE);
        flags.remove(Flags::RUNNING | Flags::NOTIFIED);
        self.set_flags(flags);

        if flags.contains(Flags::HANDLE) {
            CompleteTaskResult::NotifyContinuation
        } else {
            CompleteTaskResult::DropOutput
        }
    }

    /// Mark the task as having its [`Task`] handle dropped.
    ///
    /// If the task already completed, the caller now owns the output and must
    /// drop it.
    ///
    /// [`Task`]: crate::Task
    #[inline]
    pub(crate) fn drop_handle(&mut self) -> DropHandleResult {
        assert!(self.refcount() > 0);
        let mut flags = self.flags();
        assert!(flags.contains(Flags::HANDLE));
        flags.remove(Flags::HANDLE);
        self.set_flags(flags);

        if flags.contains(Flags::COMPLETE) {
            DropHandleResult::DropOutput
        } else {
            DropHandleResult::Detached
        }
    }

    /// Increment the reference count.
    #[inline]
    pub(crate) fn clone_ref(&mut self) {
        assert!(self.refcount() > 0);
        self.0 = self.0.checked_add(REF_ONE).expect("overflow");
    }

    /// Decrement the reference count.
    ///
    /// Returns whether the task should be dropped.
    #[inline]
    pub(crate) fn drop_ref(&mut self) -> DropRefResult {
        assert!(self.refcount() > 0);
        self.0 -= REF_ONE;
        if self.refcount() == 0 {
            assert!(!self.flags().contains(Flags::HANDLE));
            return DropRefResult::DropTask;
        }
        DropRefResult::KeepTask
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("flags", &self.flags())
            .field("refcount", &self.refcount())
            .finish()
    }
}

#[must_use = "this `NotifyResult` may be a `Resume` variant, which must be handled"]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum NotifyResult {
    DoNothing,
    Resume,
}

#[must_use = "this `CompletePollResult` must be handled"]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum CompletePollResult {
    NotifiedDuringPoll,
    Ok,
}

#[must_use = "this `CompleteTaskResult` must be handled"]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum CompleteTaskResult {
    NotifyContinuation,
    DropOutput,
}

#[must_use = "this `DropHandleResult` must be handled"]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum DropHandleResult {
    DropOutput,
    Detached,
}

#[must_use = "this `DropRefResult` must be handled"]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum DropRefResult {
    DropTask,
    KeepTask,
}
