//! [`ContinuationSlot`] holds the [`Waker`] of the single computation waiting
//! on a producer, and fires it exactly once when the producer finishes.
//!
//! The registration protocol follows the [`AtomicWaker`] strategy used by
//! Tokio and `maitake`: a registering consumer and a firing producer negotiate
//! ownership of the stored waker through a small atomic state word, so neither
//! side ever blocks. Unlike an `AtomicWaker`, firing is terminal: once fired,
//! every later registration reports [`Registration::Fired`] immediately.
//!
//! [`AtomicWaker`]: https://docs.rs/futures/latest/futures/task/struct.AtomicWaker.html
use std::cell::UnsafeCell;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll, Waker};

const LOG: &str = "skuld_task::continuation";

/// No waker is being touched.
const WAITING: usize = 0;
/// A consumer is storing its waker.
const REGISTERING: usize = 1 << 0;
/// The producer is taking the waker.
const WAKING: usize = 1 << 1;
/// The producer has finished. Never cleared.
const FIRED: usize = 1 << 2;

/// A single-assignment slot for one pending continuation.
pub(crate) struct ContinuationSlot {
    state: AtomicUsize,
    waker: UnsafeCell<Option<Waker>>,
}

/// Outcome of [`ContinuationSlot::register`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Registration {
    /// The waker was stored and will be woken when the slot fires.
    Armed,
    /// The slot has already fired; the caller should not wait.
    Fired,
    /// Another consumer is concurrently registering its waker.
    Busy,
}

// Safety: access to `waker` is serialized by the REGISTERING and WAKING bits.
unsafe impl Send for ContinuationSlot {}
// Safety: see above.
unsafe impl Sync for ContinuationSlot {}

impl ContinuationSlot {
    /// Returns an empty slot.
    pub(crate) const fn new() -> Self {
        Self {
            state: AtomicUsize::new(WAITING),
            waker: UnsafeCell::new(None),
        }
    }

    /// Returns a slot that has already fired.
    pub(crate) const fn fired() -> Self {
        Self {
            state: AtomicUsize::new(FIRED),
            waker: UnsafeCell::new(None),
        }
    }

    /// Returns `true` once [`fire`](Self::fire) has been called.
    ///
    /// Everything the producer did before firing is visible to a caller that
    /// observes `true`.
    #[inline]
    pub(crate) fn is_fired(&self) -> bool {
        self.state.load(Ordering::Acquire) & FIRED != 0
    }

    /// Store `waker` to be woken when the slot fires.
    ///
    /// Re-registering the same consumer replaces its previous waker without
    /// waking it.
    pub(crate) fn register(&self, waker: &Waker) -> Registration {
        match self
            .state
            .compare_exchange(WAITING, REGISTERING, Ordering::AcqRel, Ordering::Acquire)
        {
            Err(actual) if actual & FIRED != 0 => return Registration::Fired,
            Err(_) => return Registration::Busy,
            Ok(_) => {}
        }

        log::trace!(target: LOG, "continuation.register");
        // Safety: holding REGISTERING grants exclusive access to the waker.
        unsafe {
            let slot = &mut *self.waker.get();
            match slot {
                Some(old) if old.will_wake(waker) => {}
                _ => *slot = Some(waker.clone()),
            }
        }

        match self
            .state
            .compare_exchange(REGISTERING, WAITING, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => Registration::Armed,
            Err(actual) => {
                // The producer fired while we held the waker. It left the
                // waker to us, and we are running right now, so just take it
                // back and report completion.
                debug_assert!(actual & FIRED != 0, "unexpected state {actual:#b}");
                log::trace!(target: LOG, "continuation.register.fired_concurrently");
                // Safety: WAKING was set while we held REGISTERING, so the
                // producer did not touch the waker.
                let waker = unsafe { (*self.waker.get()).take() };
                self.state.fetch_and(FIRED, Ordering::AcqRel);
                drop(waker);
                Registration::Fired
            }
        }
    }

    /// Poll for the slot to fire, registering the context's waker if it has
    /// not.
    ///
    /// # Panics
    /// Panics if another consumer is registering at the same time. The slot
    /// holds a single continuation, so concurrent waiters are a usage error.
    pub(crate) fn poll_fired(&self, cx: &mut Context<'_>) -> Poll<()> {
        if self.is_fired() {
            return Poll::Ready(());
        }
        match self.register(cx.waker()) {
            Registration::Armed => Poll::Pending,
            Registration::Fired => Poll::Ready(()),
            Registration::Busy => {
                panic!("concurrent waiters on a single-consumer continuation slot")
            }
        }
    }

    /// Fire the slot, waking the registered continuation if there is one.
    ///
    /// Returns `true` if a continuation was woken. Firing an already fired
    /// slot does nothing.
    pub(crate) fn fire(&self) -> bool {
        let prev = self.state.fetch_or(WAKING | FIRED, Ordering::AcqRel);
        if prev & (WAKING | REGISTERING | FIRED) != 0 {
            log::trace!(target: LOG, "continuation.fire.skipped state={prev:#b}");
            return false;
        }

        // Safety: we set WAKING from the WAITING state, no one else may touch
        // the waker until it is cleared.
        let waker = unsafe { (*self.waker.get()).take() };
        self.state.fetch_and(!WAKING, Ordering::Release);

        if let Some(waker) = waker {
            log::trace!(target: LOG, "continuation.fire.wake");
            waker.wake();
            true
        } else {
            log::trace!(target: LOG, "continuation.fire.empty");
            false
        }
    }
}

impl Default for ContinuationSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ContinuationSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContinuationSlot")
            .field("fired", &self.is_fired())
            .finish()
    }
}
