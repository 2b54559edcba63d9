use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use super::init_logging;
use crate::{SingleConsumerEvent, Task};

#[test]
fn event_set_from_another_thread_resumes_task() {
    init_logging();
    let event = Arc::new(SingleConsumerEvent::default());
    let task = Task::new({
        let event = event.clone();
        async move {
            event.wait().await;
            thread::current().id()
        }
    });
    assert!(!task.is_ready());

    let setter = thread::spawn({
        let event = event.clone();
        move || {
            event.set();
            thread::current().id()
        }
    });

    let resumed_on = futures::executor::block_on(task).unwrap();
    let setter_id = setter.join().unwrap();
    // The body resumes inline on whichever thread set the event.
    assert_eq!(resumed_on, setter_id);
}

#[test]
fn writes_before_set_are_visible_after_resume() {
    let event = Arc::new(SingleConsumerEvent::default());
    let data = Arc::new(Mutex::new(Vec::new()));

    let task = Task::new({
        let event = event.clone();
        let data = data.clone();
        async move {
            event.wait().await;
            data.lock().unwrap().len()
        }
    });

    let setter = thread::spawn({
        let data = data.clone();
        move || {
            data.lock().unwrap().extend([1, 2, 3]);
            event.set();
        }
    });

    assert_eq!(futures::executor::block_on(task).unwrap(), 3);
    setter.join().unwrap();
}

#[test]
fn chained_tasks_complete_across_threads() {
    const ROUNDS: usize = 200;
    let completed = Arc::new(AtomicUsize::new(0));

    for _ in 0..ROUNDS {
        let event = Arc::new(SingleConsumerEvent::default());
        let inner = Task::new({
            let event = event.clone();
            async move {
                event.wait().await;
                1
            }
        });
        let outer = Task::new({
            let completed = completed.clone();
            async move {
                let value = inner.await.unwrap();
                completed.fetch_add(value, Ordering::SeqCst);
                value
            }
        });

        // Race the setter against the main thread registering as the
        // outer task's continuation.
        let setter = thread::spawn(move || event.set());
        assert_eq!(futures::executor::block_on(outer).unwrap(), 1);
        setter.join().unwrap();
    }

    assert_eq!(completed.load(Ordering::SeqCst), ROUNDS);
}

#[test]
fn awaiting_task_on_other_thread() {
    let event = Arc::new(SingleConsumerEvent::default());
    let task = Task::new({
        let event = event.clone();
        async move {
            event.wait().await;
            String::from("done")
        }
    });

    let consumer = thread::spawn(move || futures::executor::block_on(task).unwrap());
    event.set();
    assert_eq!(consumer.join().unwrap(), "done");
}
