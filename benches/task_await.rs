use std::borrow::Cow;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bencher::{run_tests_console, Bencher, TestDesc, TestDescAndFn, TestFn, TestOpts};
use skuld_task::{SingleConsumerEvent, Task};

/// Await a chain of `depth` nested tasks, each of which yields `yields`
/// times before awaiting the next one.
struct ChainBench {
    depth: usize,
    yields: usize,
}

impl ChainBench {
    fn new(depth: usize, yields: usize) -> Self {
        Self { depth, yields }
    }
}

impl bencher::TDynBenchFn for ChainBench {
    fn run(&self, b: &mut Bencher) {
        let depth = self.depth;
        let yields = self.yields;
        b.iter(|| skuld_executor::sync_wait(chain(depth, yields)).unwrap())
    }
}

fn chain(depth: usize, yields: usize) -> Task<usize> {
    Task::new(async move {
        for _ in 0..yields {
            yield_now().await;
        }
        match depth {
            0 => 0,
            _ => chain(depth - 1, yields).await.unwrap_or(0) + 1,
        }
    })
}

/// Suspend `waiters` tasks on events, then resume each of them by setting
/// its event.
struct EventBench {
    waiters: usize,
}

impl bencher::TDynBenchFn for EventBench {
    fn run(&self, b: &mut Bencher) {
        let waiters = self.waiters;
        b.iter(|| {
            let pending: Vec<_> = (0..waiters)
                .map(|_| {
                    let event = Arc::new(SingleConsumerEvent::default());
                    let task = Task::new({
                        let event = event.clone();
                        async move { event.wait().await }
                    });
                    (event, task)
                })
                .collect();
            for (event, task) in pending {
                event.set();
                assert!(task.is_ready());
            }
        })
    }
}

async fn yield_now() {
    struct YieldNow(bool);
    impl std::future::Future for YieldNow {
        type Output = ();

        fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
            if self.0 {
                Poll::Ready(())
            } else {
                self.get_mut().0 = true;
                cx.waker().wake_by_ref();
                Poll::Pending
            }
        }
    }

    YieldNow(false).await;
}

pub fn benches() -> Vec<TestDescAndFn> {
    let mut benches = vec![];
    for depth in [1, 8, 64] {
        for yields in [0, 8] {
            benches.push(TestDescAndFn {
                desc: TestDesc {
                    name: Cow::from(format!(
                        "bench_task_chain/depth={}/yields={}",
                        depth, yields
                    )),
                    ignore: false,
                },
                testfn: TestFn::DynBenchFn(Box::new(ChainBench::new(depth, yields))),
            });
        }
    }
    for waiters in [1, 32, 128] {
        benches.push(TestDescAndFn {
            desc: TestDesc {
                name: Cow::from(format!("bench_event_set/waiters={}", waiters)),
                ignore: false,
            },
            testfn: TestFn::DynBenchFn(Box::new(EventBench { waiters })),
        });
    }
    benches
}

fn main() {
    let mut test_opts = TestOpts::default();
    if let Some(arg) = std::env::args().skip(1).find(|arg| *arg != "--bench") {
        test_opts.filter = Some(arg);
    }

    run_tests_console(&test_opts, benches()).unwrap();
}
