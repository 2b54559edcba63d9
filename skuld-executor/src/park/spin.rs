use std::io;

use super::{Park, ParkMode, Unpark};

/// A [`Park`] which never blocks.
///
/// Parking only hints to the processor that the thread is busy waiting.
/// Useful when the wakeup is known to arrive shortly, or from the thread
/// doing the parking.
#[derive(Debug, Default, Clone, Copy)]
pub struct SpinPark;

/// The [`Unpark`] handle of a [`SpinPark`]. Does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct SpinUnparker;

impl Park for SpinPark {
    type Unparker = SpinUnparker;

    fn park(&mut self, mode: ParkMode) -> Result<(), io::Error> {
        if mode != ParkMode::NoPark {
            std::hint::spin_loop();
        }
        Ok(())
    }

    fn unparker(&self) -> Self::Unparker {
        SpinUnparker
    }
}

impl Unpark for SpinUnparker {
    fn unpark(&self) {}
}
