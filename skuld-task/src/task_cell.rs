//! The core module works by using the [`TaskCell`] to allocate a task
//! and build a vtable. The vtable is then stored in the header.
//!
//! This allows us to use the header pointer to access the vtable
//! and call any [`TaskCell`] methods via the type-erased `NonNull<Header>` pointer.
//!
//! A task record is laid out as
//!
//! ```text
//! TaskCell<F> = [ Core<F::Output> = [ Header | ResultCell<F::Output> ] | body: F ]
//! ```
//!
//! Every struct is `repr(C)`, so a `NonNull<Header>` can be cast to a
//! `NonNull<Core<T>>` by a [`Task<T>`](crate::Task) handle which does not know
//! the type of the body.
//!
//! There is no scheduler. A task's [`Waker`] *is* its resumption mechanism:
//! waking it polls the body inline, on the waking thread, until the body
//! suspends again or finishes.
use std::cell::UnsafeCell;
use std::future::Future;
use std::marker::PhantomData;
use std::mem::ManuallyDrop;
use std::pin::Pin;
use std::ptr::NonNull;
use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

use crate::header::Header;
use crate::result_cell::ResultCell;
use crate::state::{self, DropHandleResult, DropRefResult, State};
use crate::util::{abort_on_panic, catch};
use crate::Panic;

const LOG: &str = "skuld_task::task";

/// The part of a task record which does not depend on the body type.
#[repr(C)]
pub(crate) struct Core<T> {
    header: Header,
    result: ResultCell<T>,
}

/// [`TaskCell`] serves as the allocated type which holds the body
/// [`Future`] and all related data.
#[repr(C)]
pub(crate) struct TaskCell<F>
where
    F: Future,
{
    core: Core<F::Output>,
    body: UnsafeCell<Option<F>>,
}

impl<F> TaskCell<F>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    const TASK_VTABLE: VTable = VTable {
        dealloc: Self::dealloc,
    };
    const WAKER_VTABLE: RawWakerVTable = Self::waker_vtable();

    /// Allocate a record for `future` and drive the body until it first
    /// suspends or finishes.
    pub(crate) fn allocate(future: F) -> CoreRef<F::Output> {
        let task = TaskCell {
            core: Core {
                header: Header::new(&Self::TASK_VTABLE),
                result: ResultCell::new(),
            },
            body: UnsafeCell::new(Some(future)),
        };
        let raw = Box::into_raw(Box::new(task));
        // Safety: `raw` is a valid pointer to a `TaskCell`, which is `repr(C)`.
        //         This means that `raw` is a valid pointer to a `Header`.
        let ptr = unsafe { NonNull::new_unchecked(raw.cast::<Header>()) };
        let handle = CoreRef::from_ptr(ptr);

        log::trace!(target: LOG, "task.create");
        // Safety: a new record starts with the RUNNING flag held by us, and
        //         `handle` keeps the record alive.
        unsafe { Self::run(ptr) };
        handle
    }

    const fn waker_vtable() -> RawWakerVTable {
        RawWakerVTable::new(
            Self::waker_clone,
            Self::waker_wake_val,
            Self::waker_wake_ref,
            Self::waker_drop,
        )
    }

    #[inline]
    fn header(&self) -> &Header {
        &self.core.header
    }

    unsafe fn waker_clone(ptr: *const ()) -> RawWaker {
        let header = unsafe { &*(ptr as *const Header) };
        header.state().update(State::clone_ref);
        RawWaker::new(ptr, &Self::WAKER_VTABLE)
    }

    unsafe fn waker_wake_val(ptr: *const ()) {
        // This is a combined wake and drop. The waker's reference keeps the
        // record alive while the body is resumed.
        unsafe {
            Self::waker_wake_ref(ptr);
            Self::waker_drop(ptr);
        }
    }

    unsafe fn waker_wake_ref(ptr: *const ()) {
        let ptr = unsafe { NonNull::new_unchecked(ptr as *mut Header) };
        unsafe { Self::resume(ptr) }
    }

    unsafe fn waker_drop(ptr: *const ()) {
        let ptr = unsafe { NonNull::new_unchecked(ptr as *mut Header) };
        let header = unsafe { ptr.as_ref() };
        match header.state().update(State::drop_ref) {
            // Safety: The reference count is zero so it is safe to drop the task.
            DropRefResult::DropTask => unsafe { (header.vtable().dealloc)(ptr) },
            DropRefResult::KeepTask => {}
        }
    }

    /// Create a borrowed [`Waker`] from the provided `ptr`.
    ///
    /// Unlike an owned waker, this does not adjust the task refcount. This is
    /// used only while polling the body and never moved out of this scope.
    ///
    /// # Safety
    /// Callers must ensure that `ptr` is valid for the lifetime of the returned
    /// waker and that the returned waker is not moved out and dropped.
    unsafe fn borrowed_waker(ptr: NonNull<Header>) -> ManuallyDrop<Waker> {
        let raw = RawWaker::new(ptr.as_ptr() as *const (), &Self::WAKER_VTABLE);
        ManuallyDrop::new(unsafe { Waker::from_raw(raw) })
    }

    /// Resume the body after a wakeup.
    ///
    /// If the body is currently being polled on another thread, or by a
    /// caller further up this stack, that poller is told to poll again and
    /// this returns immediately.
    ///
    /// # Safety
    /// The caller must own a reference to the record.
    unsafe fn resume(ptr: NonNull<Header>) {
        let header = unsafe { ptr.as_ref() };
        match header.state().update(State::notify) {
            state::NotifyResult::Resume => {
                log::trace!(target: LOG, "task.resume");
                unsafe { Self::run(ptr) }
            }
            state::NotifyResult::DoNothing => {
                log::trace!(target: LOG, "task.resume.skipped");
            }
        }
    }

    /// Poll the body until it suspends without being notified, or finishes.
    ///
    /// # Safety
    /// The caller must own a reference to the record and must hold the
    /// `RUNNING` flag.
    unsafe fn run(ptr: NonNull<Header>) {
        let this = unsafe { Self::from_raw_header(ptr).as_ref() };
        loop {
            let waker = unsafe { Self::borrowed_waker(ptr) };
            let mut cx = Context::from_waker(&waker);
            match unsafe { this.poll_body(&mut cx) } {
                Poll::Ready(outcome) => {
                    unsafe { this.complete(outcome) };
                    return;
                }
                Poll::Pending => match this.header().state().update(State::complete_poll) {
                    state::CompletePollResult::NotifiedDuringPoll => {
                        log::trace!(target: LOG, "task.poll.notified_during_poll");
                    }
                    state::CompletePollResult::Ok => {
                        log::trace!(target: LOG, "task.suspend");
                        return;
                    }
                },
            }
        }
    }

    /// Poll the body once, catching a panic as the task's failure.
    ///
    /// The body is dropped as soon as it finishes.
    ///
    /// # Safety
    /// The caller must hold the `RUNNING` flag.
    unsafe fn poll_body(&self, cx: &mut Context<'_>) -> Poll<Result<F::Output, Panic>> {
        // Safety: RUNNING grants exclusive access to the body.
        let body = unsafe { &mut *self.body.get() };
        let Some(future) = body.as_mut() else {
            unreachable!("task body polled after it finished")
        };
        // Safety: the body lives in a heap allocation that is never moved, and
        //         is only dropped in place.
        let future = unsafe { Pin::new_unchecked(future) };
        let outcome = match catch(|| future.poll(cx)) {
            Ok(Poll::Pending) => return Poll::Pending,
            Ok(Poll::Ready(value)) => Ok(value),
            Err(payload) => {
                log::trace!(target: LOG, "task.poll.panicked");
                Err(Panic::new(payload))
            }
        };
        let finished = body.take();
        abort_on_panic(|| drop(finished));
        Poll::Ready(outcome)
    }

    /// Publish the outcome of the body and fire the continuation.
    ///
    /// # Safety
    /// The caller must hold the `RUNNING` flag and the body must have finished.
    unsafe fn complete(&self, outcome: Result<F::Output, Panic>) {
        let header = self.header();
        unsafe { self.core.result.store(outcome) };
        match header.state().update(State::complete_task) {
            state::CompleteTaskResult::NotifyContinuation => {
                log::trace!(target: LOG, "task.complete");
                header.continuation().fire();
            }
            state::CompleteTaskResult::DropOutput => {
                log::trace!(target: LOG, "task.complete.detached");
                // Safety: the handle is gone, we are the only party left
                //         responsible for the output.
                unsafe { self.core.result.destroy() };
            }
        }
    }

    unsafe fn dealloc(ptr: NonNull<Header>) {
        log::trace!(target: LOG, "task.dealloc");
        let this = unsafe { Self::from_raw_header(ptr) };
        abort_on_panic(|| drop(unsafe { Box::from_raw(this.as_ptr()) }));
    }

    #[inline]
    unsafe fn from_raw_header(ptr: NonNull<Header>) -> NonNull<Self> {
        ptr.cast()
    }
}

/// The owning reference held by a [`Task`](crate::Task) handle.
///
/// Dropping it releases the handle's claim on the output and its share of
/// the reference count.
pub(crate) struct CoreRef<T> {
    ptr: NonNull<Header>,
    _p: PhantomData<T>,
}

impl<T> CoreRef<T> {
    fn from_ptr(ptr: NonNull<Header>) -> Self {
        Self {
            ptr,
            _p: PhantomData,
        }
    }

    fn header(&self) -> &Header {
        // Safety: CoreRef is only constructed from a NonNull<Header>,
        //         and it is guaranteed to be valid as long as we have a CoreRef
        //         due to refcounting.
        unsafe { self.ptr.as_ref() }
    }

    fn core(&self) -> &Core<T> {
        // Safety: every record starts with a `Core<T>` for the output type
        //         of its body, and the handle was created with that `T`.
        unsafe { self.ptr.cast::<Core<T>>().as_ref() }
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.header().state().is_complete()
    }

    /// Poll for the body to finish, registering the waker from `cx` as the
    /// continuation if it has not.
    pub(crate) fn poll_complete(&self, cx: &mut Context<'_>) -> Poll<()> {
        if self.is_complete() {
            return Poll::Ready(());
        }
        match self.header().continuation().poll_fired(cx) {
            Poll::Ready(()) => {
                debug_assert!(self.is_complete(), "continuation fired before completion");
                Poll::Ready(())
            }
            Poll::Pending => Poll::Pending,
        }
    }

    /// Borrow the outcome of the body.
    ///
    /// # Safety
    /// [`CoreRef::is_complete`] must have returned `true`.
    pub(crate) unsafe fn result(&self) -> Result<&T, &Panic> {
        unsafe { self.core().result.get() }
    }

    /// Move the outcome of the body out of the record.
    ///
    /// # Safety
    /// [`CoreRef::is_complete`] must have returned `true`.
    pub(crate) unsafe fn take_result(&mut self) -> Result<T, Panic> {
        unsafe { self.core().result.take() }
    }
}

impl<T> Drop for CoreRef<T> {
    fn drop(&mut self) {
        let header = self.header();
        match header.state().update(State::drop_handle) {
            DropHandleResult::DropOutput => {
                // Safety: the body finished, and now that the handle is gone
                //         no one can read the output.
                unsafe { self.core().result.destroy() }
            }
            DropHandleResult::Detached => {
                log::trace!(target: LOG, "task.detach");
            }
        }
        match header.state().update(State::drop_ref) {
            // Safety: The task is valid as long as we have a CoreRef. We are the
            //         last reference as indicated by the return value of `drop_ref`.
            //         So we can safely deallocate the task.
            DropRefResult::DropTask => unsafe { (header.vtable().dealloc)(self.ptr) },
            DropRefResult::KeepTask => {}
        }
    }
}

// Safety: the record is only shared through atomically synchronized state,
//         and the body is required to be `Send`.
unsafe impl<T: Send> Send for CoreRef<T> {}
// Safety: a shared `CoreRef` only hands out `&T`.
unsafe impl<T: Send + Sync> Sync for CoreRef<T> {}

pub(crate) struct VTable {
    pub(crate) dealloc: unsafe fn(NonNull<Header>),
}
