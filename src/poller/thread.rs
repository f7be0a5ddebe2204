use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{RecvTimeoutError, SyncSender},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    time::Duration,
};

use super::ErrorHandler;
use crate::{Error, Result};

type Task = Arc<dyn Fn() -> Result<()> + Send + Sync>;

/// State of a single start/stop cycle.
struct Run {
    running: Arc<AtomicBool>,
    /// Used to send a stop command to the poller thread.
    stop_sender: SyncSender<()>,
}

/// A poller that runs its task on a dedicated background thread.
///
/// # Examples
/// ```
/// # use std::time::Duration;
/// # use edgeflags::Poller;
/// let poller = Poller::new(
///     Duration::from_secs(60),
///     || Ok(()),
///     |err| eprintln!("poll failed: {err}"),
/// );
/// poller.start()?;
/// assert!(poller.is_running());
/// poller.stop();
/// # Ok::<(), edgeflags::Error>(())
/// ```
pub struct Poller {
    interval: Duration,
    task: Task,
    on_error: ErrorHandler,
    run: Mutex<Option<Run>>,
}

impl Poller {
    /// Create a stopped poller that runs `task` every `interval` and passes its errors to
    /// `on_error`.
    pub fn new(
        interval: Duration,
        task: impl Fn() -> Result<()> + Send + Sync + 'static,
        on_error: impl Fn(Error) + Send + Sync + 'static,
    ) -> Poller {
        Poller {
            interval,
            task: Arc::new(task),
            on_error: Arc::new(on_error),
            run: Mutex::new(None),
        }
    }

    /// Start ticking. The first tick happens one interval from now. No-op if already running.
    ///
    /// # Errors
    ///
    /// - [`Error::Io`] if the poller thread failed to spawn.
    pub fn start(&self) -> Result<()> {
        let mut run = self.run();
        if run.as_ref().is_some_and(|run| run.running.load(Ordering::SeqCst)) {
            return Ok(());
        }

        // Using `sync_channel` here as it makes `stop_sender` `Sync`. Buffer size of 1 is enough:
        // a second stop command can be dropped as the thread stops anyway.
        let (stop_sender, stop_receiver) = std::sync::mpsc::sync_channel::<()>(1);
        let running = Arc::new(AtomicBool::new(true));

        {
            let running = running.clone();
            let interval = self.interval;
            let task = self.task.clone();
            let on_error = self.on_error.clone();

            std::thread::Builder::new()
                .name("edgeflags-poller".to_owned())
                .spawn(move || loop {
                    match stop_receiver.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            // Timed out. Run the next tick.
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                            // Stop command received or the poller was dropped.
                            return;
                        }
                    }

                    if !running.load(Ordering::SeqCst) {
                        return;
                    }
                    tick(&task, &on_error);
                })?;
        }

        *run = Some(Run {
            running,
            stop_sender,
        });
        Ok(())
    }

    /// Stop ticking. Idempotent.
    ///
    /// This function does not wait for an in-flight tick to finish.
    pub fn stop(&self) {
        if let Some(run) = self.run().take() {
            run.running.store(false, Ordering::SeqCst);
            // Error means that the thread has exited already or that the buffer is full because a
            // stop command was sent before. Both are fine.
            let _ = run.stop_sender.try_send(());
        }
    }

    /// Whether the poller has been started and not stopped since.
    pub fn is_running(&self) -> bool {
        self.run()
            .as_ref()
            .is_some_and(|run| run.running.load(Ordering::SeqCst))
    }

    fn run(&self) -> MutexGuard<'_, Option<Run>> {
        self.run.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}

fn tick(task: &Task, on_error: &ErrorHandler) {
    let result = catch_unwind(AssertUnwindSafe(|| task())).unwrap_or(Err(Error::PollerPanicked));
    if let Err(err) = result {
        // A panicking error handler must not take the poller thread down with it.
        let _ = catch_unwind(AssertUnwindSafe(|| on_error(err)));
    }
}
