//! Eagerly started, single-consumer asynchronous tasks.
//!
//! A [`Task`] starts running its body the moment it is created and hands its
//! outcome, a value or the panic that ended it, to whoever awaits it. There
//! is no scheduler: a task's body runs on the thread that created it until it
//! first suspends, and afterwards on whichever thread wakes it. Awaiting a
//! task that has not finished registers the awaiter as the task's single
//! continuation, which the task wakes as soon as its body finishes.
//!
//! [`SingleConsumerEvent`] is the simplest thing a task body can suspend on:
//! a one-shot flag that resumes its single waiter when set, from any thread.
//!
//! # Components
//! - [`Task`]: handle to an eagerly started computation.
//! - [`Get`] and [`WhenReady`]: borrowing awaiters for a [`Task`].
//! - [`SingleConsumerEvent`] and [`Wait`]: one-shot readiness signal.
//! - [`TaskError`] and [`Panic`]: why awaiting a task produced no value.
#![deny(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    clippy::missing_safety_doc
)]
mod continuation;
mod error;
mod event;
mod header;
mod result_cell;
mod state;
mod task;
mod task_cell;
mod util;

#[cfg(test)]
mod tests;

pub use error::{Panic, TaskError};
pub use event::{SingleConsumerEvent, Wait};
pub use task::{Get, Task, WhenReady};
