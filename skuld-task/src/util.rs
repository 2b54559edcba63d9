use std::panic;

/// Run `f`, aborting the process if it panics.
///
/// Used around code that must not unwind, such as state transitions and
/// dropping a task body, where unwinding would leave the task record in an
/// inconsistent state.
#[inline]
pub(crate) fn abort_on_panic<R>(f: impl FnOnce() -> R) -> R {
    struct Bomb;

    impl Drop for Bomb {
        fn drop(&mut self) {
            std::process::abort();
        }
    }

    let bomb = Bomb;
    let res = f();
    std::mem::forget(bomb);
    res
}

/// Returns a printable message for a panic payload, if it carries one.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> Option<&str> {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        Some(msg)
    } else {
        payload.downcast_ref::<String>().map(String::as_str)
    }
}

/// Run `f`, catching any panic that unwinds out of it.
pub(crate) fn catch<R>(f: impl FnOnce() -> R) -> std::thread::Result<R> {
    panic::catch_unwind(panic::AssertUnwindSafe(f))
}
