use std::{fmt, sync::Arc};

use log::Level;

/// Log target used for all SDK messages forwarded to the `log` crate.
pub const LOG_TARGET: &str = "edgeflags";

/// A sink for SDK log messages.
///
/// By default, messages are forwarded to the [`log`](https://docs.rs/log) crate under the
/// `edgeflags` target. Provide your own implementation (or a closure) via
/// [`ClientConfig::logger`](crate::ClientConfig::logger) to route them elsewhere.
///
/// ```
/// # use edgeflags::ClientConfig;
/// let config = ClientConfig::new("token", "https://flags.example.com")
///     .debug(true)
///     .logger(|level: log::Level, message: &str| eprintln!("{level}: {message}"));
/// ```
pub trait Logger {
    /// Record `message` at `level`.
    fn log(&self, level: Level, message: &str);
}

/// Forwards messages to the `log` crate.
pub(crate) struct LogFacade;
impl Logger for LogFacade {
    fn log(&self, level: Level, message: &str) {
        log::log!(target: LOG_TARGET, level, "[EdgeFlags] {message}");
    }
}

impl<T: Fn(Level, &str)> Logger for T {
    fn log(&self, level: Level, message: &str) {
        self(level, message);
    }
}

/// Per-client logger. Messages are dropped unless the client was configured with `debug(true)`.
#[derive(Clone)]
pub(crate) struct ClientLogger {
    sink: Arc<dyn Logger + Send + Sync>,
    enabled: bool,
}

impl ClientLogger {
    pub(crate) fn new(sink: Arc<dyn Logger + Send + Sync>, enabled: bool) -> ClientLogger {
        ClientLogger { sink, enabled }
    }

    pub(crate) fn debug(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Debug, args);
    }

    pub(crate) fn warn(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Warn, args);
    }

    pub(crate) fn error(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Error, args);
    }

    fn log(&self, level: Level, args: fmt::Arguments<'_>) {
        if self.enabled {
            self.sink.log(level, &args.to_string());
        }
    }
}
