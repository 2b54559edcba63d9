use std::any::Any;
use std::borrow::Borrow;
use std::fmt;

/// [`TaskError`] indicates that awaiting a [`Task`] did not produce a value.
///
/// Awaiting a task fails for one of two reasons. Either the task has no body
/// at all (a default constructed, "broken" task), or the body panicked. Users
/// can check which of these two reasons caused the failure via
/// [`TaskError::is_broken_promise`] and [`TaskError::is_panic`].
///
/// The panic is held as `P`. Consuming awaits yield a `TaskError<Panic>`
/// which owns the payload, borrowing awaits yield a `TaskError<&Panic>`
/// pointing at the payload stored in the task, so repeated borrowing awaits
/// observe the very same payload.
///
/// [`Task`]: crate::Task
#[derive(thiserror::Error)]
#[error(transparent)]
pub struct TaskError<P: Borrow<Panic> = Panic> {
    kind: Kind<P>,
}

#[derive(thiserror::Error)]
enum Kind<P: Borrow<Panic>> {
    #[error("broken promise: the task has no body")]
    BrokenPromise,
    #[error("task panicked")]
    Panicked(P),
}

impl<P: Borrow<Panic>> TaskError<P> {
    pub(crate) fn broken_promise() -> Self {
        Self {
            kind: Kind::BrokenPromise,
        }
    }

    pub(crate) fn panicked(panic: P) -> Self {
        Self {
            kind: Kind::Panicked(panic),
        }
    }

    /// Returns `true` if the awaited task had no body.
    pub fn is_broken_promise(&self) -> bool {
        matches!(self.kind, Kind::BrokenPromise)
    }

    /// Returns `true` if the task panicked.
    pub fn is_panic(&self) -> bool {
        matches!(self.kind, Kind::Panicked(_))
    }

    /// Returns the panic which terminated the task, if any.
    pub fn panic(&self) -> Option<&Panic> {
        match &self.kind {
            Kind::Panicked(panic) => Some(Borrow::<Panic>::borrow(panic)),
            Kind::BrokenPromise => None,
        }
    }

    /// Consumes the error, returning the panic which terminated the task.
    ///
    /// Returns the error back if the task did not panic.
    pub fn try_into_panic(self) -> Result<P, Self> {
        match self.kind {
            Kind::Panicked(panic) => Ok(panic),
            kind => Err(Self { kind }),
        }
    }
}

impl TaskError<Panic> {
    /// Resume unwinding with the original panic payload.
    ///
    /// This makes a failed task look exactly like a synchronous call that
    /// panicked at the await. A broken promise is raised as a new panic.
    pub fn resume_unwind(self) -> ! {
        match self.kind {
            Kind::Panicked(panic) => panic.resume_unwind(),
            Kind::BrokenPromise => panic!("awaited a task with a broken promise"),
        }
    }
}

impl<P: Borrow<Panic>> fmt::Debug for TaskError<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.kind, f)
    }
}

impl<P: Borrow<Panic>> fmt::Debug for Kind<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::BrokenPromise => write!(f, "TaskError::BrokenPromise"),
            Kind::Panicked(panic) => f
                .debug_tuple("TaskError::Panicked")
                .field(Borrow::<Panic>::borrow(panic))
                .finish(),
        }
    }
}

/// The payload of a panic which unwound out of a task body.
///
/// The payload is the exact value passed to [`panic!`] or
/// [`std::panic::panic_any`], so its type is preserved and can be recovered
/// with [`Panic::downcast_ref`].
pub struct Panic {
    payload: Box<dyn Any + Send + 'static>,
}

impl Panic {
    pub(crate) fn new(payload: Box<dyn Any + Send + 'static>) -> Self {
        Self { payload }
    }

    /// Returns `true` if the payload is of type `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.payload.is::<T>()
    }

    /// Returns a reference to the payload if it is of type `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }

    /// Returns the panic message, if the payload is a string.
    pub fn message(&self) -> Option<&str> {
        crate::util::panic_message(&*self.payload)
    }

    /// Consumes the [`Panic`], returning the raw payload.
    pub fn into_payload(self) -> Box<dyn Any + Send + 'static> {
        self.payload
    }

    /// Resume unwinding with the original payload.
    pub fn resume_unwind(self) -> ! {
        std::panic::resume_unwind(self.payload)
    }
}

impl fmt::Debug for Panic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.message() {
            Some(msg) => f.debug_tuple("Panic").field(&msg).finish(),
            None => f.debug_tuple("Panic").field(&format_args!("..")).finish(),
        }
    }
}
