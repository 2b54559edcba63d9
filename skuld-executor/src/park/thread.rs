use std::io;
use std::thread::{self, Thread};

use super::{Park, ParkMode, Unpark};

const LOG: &str = "skuld_executor::park";

/// A [`Park`] which blocks the OS thread it was created on.
///
/// Built on [`std::thread::park`], so an unpark delivered before the thread
/// parks is not lost: the next park returns right away.
#[derive(Debug)]
pub struct ThreadPark {
    thread: Thread,
}

/// The [`Unpark`] handle of a [`ThreadPark`].
#[derive(Debug, Clone)]
pub struct ThreadUnparker {
    thread: Thread,
}

impl ThreadPark {
    /// Returns a [`ThreadPark`] for the current thread.
    pub fn new() -> Self {
        Self {
            thread: thread::current(),
        }
    }
}

impl Default for ThreadPark {
    fn default() -> Self {
        Self::new()
    }
}

impl Park for ThreadPark {
    type Unparker = ThreadUnparker;

    /// Block the current thread.
    ///
    /// Fails if called from a thread other than the one the
    /// [`ThreadPark`] was created on, since its unparker could never wake
    /// the caller.
    fn park(&mut self, mode: ParkMode) -> Result<(), io::Error> {
        if thread::current().id() != self.thread.id() {
            return Err(io::Error::other("parked from a foreign thread"));
        }
        match mode {
            ParkMode::NoPark => {}
            ParkMode::NextCompletion => {
                log::trace!(target: LOG, "park.thread");
                thread::park();
            }
        }
        Ok(())
    }

    fn unparker(&self) -> Self::Unparker {
        ThreadUnparker {
            thread: self.thread.clone(),
        }
    }
}

impl Unpark for ThreadUnparker {
    fn unpark(&self) {
        self.thread.unpark();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn unpark_before_park_is_not_lost() {
        let mut park = ThreadPark::new();
        park.unparker().unpark();
        park.park(ParkMode::NextCompletion).unwrap();
    }

    #[test]
    fn unpark_from_other_thread() {
        let mut park = ThreadPark::new();
        let unparker = park.unparker();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            unparker.unpark();
        });
        park.park(ParkMode::NextCompletion).unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn park_from_foreign_thread_fails() {
        let park = ThreadPark::new();
        let err = thread::spawn(move || {
            let mut park = park;
            park.park(ParkMode::NoPark).unwrap_err()
        })
        .join()
        .unwrap();
        assert_eq!(err.kind(), io::ErrorKind::Other);
    }
}
