//! Contains the [`Park`] and [`Unpark`] traits.
//!
//! The [`LocalExecutor`] uses a [`Park`] to give up the thread while
//! the future it drives is waiting for someone else to wake it.
//!
//! [`LocalExecutor`]: crate::LocalExecutor
//! [`Park`]: crate::park::Park
//! [`Unpark`]: crate::park::Unpark
use std::io;
use std::sync::Arc;

mod spin;
mod thread;

pub use spin::{SpinPark, SpinUnparker};
pub use thread::{ThreadPark, ThreadUnparker};

/// Indicates under what conditions a [`Park`] operation
/// should return.
///
/// Note it is always valid to return from a [`Park`] operation
/// early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParkMode {
    /// The [`Park`] operation should return immediately.
    NoPark,

    /// The [`Park`] operation should return once the associated
    /// [`Unpark`] has been triggered.
    NextCompletion,
}

/// The [`Park`] trait provides a way to block the thread driving
/// a [`LocalExecutor`](crate::LocalExecutor) until there is
/// something for it to do.
///
/// A [`ParkMode`] is passed to [`Park::park`] to indicate
/// under what conditions control flow must be passed back.
///
/// ## Unparker
///
/// The [`Park::unparker`] method returns a [`Unpark`] that
/// can be used to force a wakeup from another thread.
pub trait Park {
    /// The [`Park::Unparker`] associated with this [`Park`] instance.
    type Unparker: Unpark + Clone + Send + Sync + 'static;

    /// Trigger a park operation.
    ///
    /// Implementations must respect the [`ParkMode`] passed to this method.
    /// An unpark which happened since the last park must make the next
    /// park return without blocking.
    fn park(&mut self, mode: ParkMode) -> Result<(), io::Error>;

    /// Returns an unparker associated with this [`Park`] instance.
    fn unparker(&self) -> Self::Unparker;
}

/// The [`Unpark`] trait provides a way to force a wakeup
/// of a thread which is blocked in a [`Park::park`] operation.
pub trait Unpark {
    /// Unpark the associated [`Park`] instance.
    fn unpark(&self);
}

impl<T> Unpark for &T
where
    T: Unpark,
{
    fn unpark(&self) {
        (**self).unpark()
    }
}

impl<T> Unpark for Arc<T>
where
    T: Unpark,
{
    fn unpark(&self) {
        (**self).unpark()
    }
}
