use std::{
    future::Future,
    panic::{catch_unwind, AssertUnwindSafe},
    pin::Pin,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    time::Duration,
};

use tokio::sync::Notify;

use super::ErrorHandler;
use crate::{Error, Result};

type BoxFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;
type Task = Arc<dyn Fn() -> BoxFuture + Send + Sync>;

/// State of a single start/stop cycle.
struct Run {
    running: AtomicBool,
    stop: Notify,
}

/// A poller that runs its task on the current tokio runtime.
///
/// Each tick is spawned as its own task, so a panicking tick is reported to the error handler as
/// [`Error::PollerPanicked`] and the poller keeps going. A panicking error handler is caught as
/// well. Dropping the poller stops it.
pub struct AsyncPoller {
    interval: Duration,
    task: Task,
    on_error: ErrorHandler,
    run: Mutex<Option<Arc<Run>>>,
}

impl AsyncPoller {
    /// Create a stopped poller that runs `task` every `interval` and passes its errors to
    /// `on_error`.
    pub fn new<F, Fut>(
        interval: Duration,
        task: F,
        on_error: impl Fn(Error) + Send + Sync + 'static,
    ) -> AsyncPoller
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        AsyncPoller {
            interval,
            task: Arc::new(move || Box::pin(task()) as BoxFuture),
            on_error: Arc::new(on_error),
            run: Mutex::new(None),
        }
    }

    /// Start ticking. The first tick happens one interval from now. No-op if already running.
    ///
    /// # Errors
    ///
    /// - [`Error::NoRuntime`] if called outside of a tokio runtime.
    pub fn start(&self) -> Result<()> {
        let mut slot = self.run();
        if slot.as_ref().is_some_and(|run| run.running.load(Ordering::SeqCst)) {
            return Ok(());
        }

        let handle = tokio::runtime::Handle::try_current().map_err(|_| Error::NoRuntime)?;
        let run = Arc::new(Run {
            running: AtomicBool::new(true),
            stop: Notify::new(),
        });

        {
            let run = run.clone();
            let interval = self.interval;
            let task = self.task.clone();
            let on_error = self.on_error.clone();

            handle.spawn(async move {
                loop {
                    tokio::select! {
                        _ = tokio::time::sleep(interval) => {}
                        _ = run.stop.notified() => return,
                    }

                    if !run.running.load(Ordering::SeqCst) {
                        return;
                    }
                    let result = match tokio::spawn(task()).await {
                        Ok(result) => result,
                        Err(_join_error) => Err(Error::PollerPanicked),
                    };
                    if let Err(err) = result {
                        let _ = catch_unwind(AssertUnwindSafe(|| on_error(err)));
                    }
                }
            });
        }

        *slot = Some(run);
        Ok(())
    }

    /// Stop ticking. Idempotent.
    ///
    /// An in-flight tick is allowed to finish, but no further tick is started.
    pub fn stop(&self) {
        if let Some(run) = self.run().take() {
            run.running.store(false, Ordering::SeqCst);
            // Stores a permit if the loop is busy with a tick, so it exits right after.
            run.stop.notify_one();
        }
    }

    /// Whether the poller has been started and not stopped since.
    pub fn is_running(&self) -> bool {
        self.run()
            .as_ref()
            .is_some_and(|run| run.running.load(Ordering::SeqCst))
    }

    fn run(&self) -> MutexGuard<'_, Option<Arc<Run>>> {
        self.run.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for AsyncPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc, Mutex,
        },
        time::{Duration, Instant},
    };

    use tokio::time::sleep;

    use super::AsyncPoller;
    use crate::Error;

    fn counting_poller(interval: Duration) -> (Arc<AtomicUsize>, AsyncPoller) {
        let count = Arc::new(AtomicUsize::new(0));
        let poller = {
            let count = count.clone();
            AsyncPoller::new(
                interval,
                move || {
                    let count = count.clone();
                    async move {
                        count.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                },
                |_| {},
            )
        };
        (count, poller)
    }

    #[tokio::test]
    async fn executes_task_periodically() {
        let (count, poller) = counting_poller(Duration::from_millis(50));

        poller.start().unwrap();
        sleep(Duration::from_millis(175)).await;
        poller.stop();

        assert!(count.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn failing_task_reports_and_keeps_ticking() {
        let errors = Arc::new(Mutex::new(Vec::new()));
        let on_error = {
            let errors = errors.clone();
            move |err: Error| errors.lock().unwrap().push(err.to_string())
        };
        let poller = AsyncPoller::new(
            Duration::from_millis(50),
            || async { Err(Error::custom(std::io::Error::other("boom"))) },
            on_error,
        );

        poller.start().unwrap();
        sleep(Duration::from_millis(175)).await;
        poller.stop();

        let errors = errors.lock().unwrap();
        assert!(errors.len() >= 2);
        assert!(errors[0].contains("boom"));
    }

    #[tokio::test]
    async fn panicking_task_is_reported_as_error() {
        let errors = Arc::new(AtomicUsize::new(0));
        let on_error = {
            let errors = errors.clone();
            move |err: Error| {
                if matches!(err, Error::PollerPanicked) {
                    errors.fetch_add(1, Ordering::SeqCst);
                }
            }
        };
        let poller = AsyncPoller::new(
            Duration::from_millis(50),
            || async {
                if true {
                    panic!("tick");
                }
                Ok(())
            },
            on_error,
        );

        poller.start().unwrap();
        sleep(Duration::from_millis(175)).await;
        poller.stop();

        assert!(errors.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn panicking_error_handler_keeps_ticking() {
        let errors = Arc::new(AtomicUsize::new(0));
        let on_error = {
            let errors = errors.clone();
            move |_: Error| {
                errors.fetch_add(1, Ordering::SeqCst);
                panic!("handler");
            }
        };
        let poller = AsyncPoller::new(
            Duration::from_millis(50),
            || async { Err(Error::custom(std::io::Error::other("boom"))) },
            on_error,
        );

        poller.start().unwrap();
        sleep(Duration::from_millis(175)).await;

        assert!(poller.is_running());
        poller.stop();
        assert!(errors.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn slow_tick_delays_next_tick() {
        let starts = Arc::new(Mutex::new(Vec::new()));
        let poller = {
            let starts = starts.clone();
            AsyncPoller::new(
                Duration::from_millis(30),
                move || {
                    starts.lock().unwrap().push(Instant::now());
                    async {
                        sleep(Duration::from_millis(80)).await;
                        Ok(())
                    }
                },
                |_| {},
            )
        };

        poller.start().unwrap();
        sleep(Duration::from_millis(300)).await;
        poller.stop();

        let starts = starts.lock().unwrap();
        assert!(starts.len() >= 2);
        for pair in starts.windows(2) {
            // Tick duration plus one full interval.
            assert!(pair[1] - pair[0] >= Duration::from_millis(110));
        }
    }

    #[tokio::test]
    async fn no_tick_after_stop_while_in_flight() {
        let count = Arc::new(AtomicUsize::new(0));
        let poller = {
            let count = count.clone();
            AsyncPoller::new(
                Duration::from_millis(20),
                move || {
                    count.fetch_add(1, Ordering::SeqCst);
                    async {
                        sleep(Duration::from_millis(100)).await;
                        Ok(())
                    }
                },
                |_| {},
            )
        };

        poller.start().unwrap();
        sleep(Duration::from_millis(60)).await;
        poller.stop();
        let after_stop = count.load(Ordering::SeqCst);
        sleep(Duration::from_millis(250)).await;

        assert_eq!(after_stop, 1);
        assert_eq!(count.load(Ordering::SeqCst), after_stop);
    }

    #[tokio::test]
    async fn stop_right_after_start_prevents_any_tick() {
        let (count, poller) = counting_poller(Duration::from_millis(50));

        poller.start().unwrap();
        poller.stop();
        sleep(Duration::from_millis(150)).await;

        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn start_is_idempotent() {
        let (count, poller) = counting_poller(Duration::from_millis(50));

        poller.start().unwrap();
        poller.start().unwrap();
        sleep(Duration::from_millis(130)).await;
        poller.stop();

        assert!(count.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn running_reflects_state() {
        let (_, poller) = counting_poller(Duration::from_secs(1));
        assert!(!poller.is_running());
        poller.stop();

        poller.start().unwrap();
        assert!(poller.is_running());

        poller.stop();
        poller.stop();
        assert!(!poller.is_running());
    }

    #[tokio::test]
    async fn dropping_stops_ticks() {
        let (count, poller) = counting_poller(Duration::from_millis(30));

        poller.start().unwrap();
        drop(poller);
        sleep(Duration::from_millis(100)).await;

        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn start_outside_runtime_fails() {
        let (_, poller) = counting_poller(Duration::from_millis(30));

        assert!(matches!(poller.start(), Err(Error::NoRuntime)));
        assert!(!poller.is_running());
    }
}
