//! Client lifecycle: construct, initialize, serve reads, refresh (manually or polled), identify,
//! destroy.
//!
//! The lifecycle rules live in [`ClientCore`], which owns the cache, the emitter and the
//! per-client logger, and serves reads and subscriptions. [`Client`] and [`AsyncClient`] deref to
//! it and only decide how fetches and the poller are driven (blocking calls and a poller thread
//! vs. futures and a tokio task), feeding the outcome back into the core.
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        PoisonError, RwLock,
    },
    time::Duration,
};

use crate::{
    fetcher::{EvaluationResponse, FetcherConfig},
    logger::ClientLogger,
    Cache, ChangeEvent, ClientConfig, ConfigValue, Configs, Emitter, Error, EvaluationContext,
    Event, EventKind, FlagValue, Flags, Result, Subscription,
};

mod blocking;
mod nonblocking;

pub use blocking::Client;
pub use nonblocking::AsyncClient;

/// Everything a client needs besides its fetcher and poller, pulled apart from [`ClientConfig`].
pub(crate) struct ClientParts {
    pub(crate) core: ClientCore,
    pub(crate) polling_interval: Duration,
    /// `None` in mock mode.
    pub(crate) fetcher_config: Option<FetcherConfig>,
}

impl ClientParts {
    pub(crate) fn new(config: ClientConfig) -> ClientParts {
        let fetcher_config = config
            .mock
            .is_none()
            .then(|| FetcherConfig::new(config.base_url.clone(), config.token.clone()));

        ClientParts {
            polling_interval: config.polling_interval,
            fetcher_config,
            core: ClientCore::new(config),
        }
    }
}

/// State and read surface shared by [`Client`] and [`AsyncClient`].
///
/// Both clients dereference to `ClientCore`, so everything here is available directly on a
/// client:
///
/// ```
/// # use edgeflags::{mock_client, FlagValue};
/// let client = mock_client([("beta".to_owned(), true.into())].into(), Default::default());
/// assert_eq!(client.flag("beta"), Some(FlagValue::Boolean(true)));
/// assert_eq!(client.flag_or("missing", "off"), FlagValue::from("off"));
/// ```
pub struct ClientCore {
    cache: Cache,
    emitter: Emitter,
    pub(crate) logger: ClientLogger,
    context: RwLock<EvaluationContext>,
    ready: AtomicBool,
    mock: bool,
}

impl ClientCore {
    fn new(config: ClientConfig) -> ClientCore {
        let core = ClientCore {
            cache: Cache::new(),
            emitter: Emitter::new(),
            logger: ClientLogger::new(config.logger, config.debug),
            context: RwLock::new(config.context),
            ready: AtomicBool::new(false),
            mock: config.mock.is_some(),
        };

        if let Some(mock) = config.mock {
            core.cache.seed(mock.flags, mock.configs);
            core.ready.store(true, Ordering::SeqCst);
            core.logger.debug(format_args!("Mock client created"));
        } else if let Some(bootstrap) = config.bootstrap {
            core.cache.seed(bootstrap.flags, bootstrap.configs);
            core.logger.debug(format_args!("Bootstrap data loaded"));
        }

        core
    }

    pub(crate) fn is_mock(&self) -> bool {
        self.mock
    }

    /// Whether the client has data to serve: initialized, degraded with bootstrap data, or mock.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Current evaluation context.
    pub fn context(&self) -> EvaluationContext {
        self.context
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn set_context(&self, context: EvaluationContext) {
        *self.context.write().unwrap_or_else(PoisonError::into_inner) = context;
        self.logger.debug(format_args!("Context updated"));
    }

    /// Mock clients are ready from construction; `init` only announces it.
    pub(crate) fn mock_initialized(&self) {
        self.emitter.emit(&Event::Ready);
    }

    /// Whether the client has been torn down.
    pub(crate) fn is_destroyed(&self) -> bool {
        self.cache.is_closed()
    }

    /// Returns `false` if the client was torn down meanwhile; polling must not start then.
    pub(crate) fn initialized(&self, response: EvaluationResponse) -> bool {
        self.cache.seed(response.flags, response.configs);
        self.ready.store(true, Ordering::SeqCst);
        // `teardown` closes the cache before clearing `ready`, so one of the two sides wins.
        if self.is_destroyed() {
            self.ready.store(false, Ordering::SeqCst);
            return false;
        }
        self.logger.debug(format_args!("Initialized"));
        self.emitter.emit(&Event::Ready);
        true
    }

    /// Falls back to bootstrap data if there is any, otherwise hands the error back to the caller.
    pub(crate) fn init_failed(&self, err: Error) -> Result<()> {
        self.logger.error(format_args!("Init failed: {err}"));
        self.emitter.emit(&Event::Error(err.clone()));

        if self.cache.has_flags() {
            self.ready.store(true, Ordering::SeqCst);
            self.logger
                .warn(format_args!("Using bootstrap data after init failure"));
            self.emitter.emit(&Event::Ready);
            Ok(())
        } else {
            Err(err)
        }
    }

    pub(crate) fn polling_started(&self, interval: Duration) {
        self.logger
            .debug(format_args!("Polling started ({}s)", interval.as_secs_f64()));
    }

    /// Responses arriving after teardown are dropped by the closed cache.
    pub(crate) fn refreshed(&self, response: EvaluationResponse) {
        if let Some(changes) = self.cache.update(response.flags, response.configs) {
            self.logger.debug(format_args!(
                "Changes detected ({} flags, {} configs)",
                changes.flags.len(),
                changes.configs.len()
            ));
            self.emitter.emit(&Event::Change(changes));
        }
    }

    pub(crate) fn poll_failed(&self, err: Error) {
        self.logger.error(format_args!("Polling error: {err}"));
        self.emitter.emit(&Event::Error(err));
    }

    pub(crate) fn teardown(&self) {
        self.cache.close();
        self.emitter.remove_all();
        self.ready.store(false, Ordering::SeqCst);
        self.logger.debug(format_args!("Destroyed"));
    }

    /// Cached value of flag `key`.
    pub fn flag(&self, key: &str) -> Option<FlagValue> {
        self.cache.get_flag(key)
    }

    /// Cached value of flag `key`, or `default` if the flag is unknown.
    pub fn flag_or(&self, key: &str, default: impl Into<FlagValue>) -> FlagValue {
        self.cache.get_flag(key).unwrap_or_else(|| default.into())
    }

    /// Cached value of config `key`.
    pub fn config(&self, key: &str) -> Option<ConfigValue> {
        self.cache.get_config(key)
    }

    /// Cached value of config `key`, or `default` if the config is unknown.
    pub fn config_or(&self, key: &str, default: impl Into<ConfigValue>) -> ConfigValue {
        self.cache.get_config(key).unwrap_or_else(|| default.into())
    }

    /// A copy of all cached flags.
    pub fn all_flags(&self) -> Flags {
        self.cache.all_flags()
    }

    /// A copy of all cached configs.
    pub fn all_configs(&self) -> Configs {
        self.cache.all_configs()
    }

    /// Subscribe `handler` to events of `kind`.
    ///
    /// Handlers run synchronously wherever the event is emitted: the calling thread, the poller
    /// thread or a tokio worker. They must not block. A panicking handler prevents delivery of
    /// that event to later handlers.
    pub fn on(
        &self,
        kind: EventKind,
        handler: impl Fn(&Event) + Send + Sync + 'static,
    ) -> Subscription {
        self.emitter.on(kind, handler)
    }

    /// Subscribe to [`Event::Ready`].
    pub fn on_ready(&self, handler: impl Fn() + Send + Sync + 'static) -> Subscription {
        self.emitter.on(EventKind::Ready, move |_| handler())
    }

    /// Subscribe to [`Event::Change`].
    pub fn on_change(
        &self,
        handler: impl Fn(&ChangeEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.emitter.on(EventKind::Change, move |event| {
            if let Event::Change(changes) = event {
                handler(changes);
            }
        })
    }

    /// Subscribe to [`Event::Error`].
    pub fn on_error(&self, handler: impl Fn(&Error) + Send + Sync + 'static) -> Subscription {
        self.emitter.on(EventKind::Error, move |event| {
            if let Event::Error(err) = event {
                handler(err);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use log::Level;
    use reqwest::StatusCode;
    use serde_json::json;

    use super::ClientParts;
    use crate::{
        fetcher::EvaluationResponse, Bootstrap, ClientConfig, Error, FlagValue, Flags,
    };

    fn response(flags: serde_json::Value, configs: serde_json::Value) -> EvaluationResponse {
        serde_json::from_value(json!({"flags": flags, "configs": configs})).unwrap()
    }

    #[test]
    fn mock_mode_is_ready_without_fetcher() {
        let parts = ClientParts::new(
            ClientConfig::new("tok", "http://localhost").mock(Bootstrap::new(
                [("dark_mode".to_owned(), FlagValue::Boolean(true))].into(),
                Default::default(),
            )),
        );

        assert!(parts.fetcher_config.is_none());
        assert!(parts.core.is_mock());
        assert!(parts.core.is_ready());
        assert_eq!(parts.core.flag("dark_mode"), Some(FlagValue::Boolean(true)));
    }

    #[test]
    fn bootstrap_is_seeded_but_not_ready() {
        let parts = ClientParts::new(ClientConfig::new("tok", "http://localhost/").bootstrap(
            Bootstrap::new([("fallback".to_owned(), true.into())].into(), Default::default()),
        ));

        assert!(!parts.core.is_ready());
        assert_eq!(parts.core.flag("fallback"), Some(FlagValue::Boolean(true)));
        assert_eq!(
            parts.fetcher_config.unwrap().base_url,
            "http://localhost/".to_owned()
        );
    }

    #[test]
    fn init_failure_without_flags_returns_error() {
        let parts = ClientParts::new(ClientConfig::new("tok", "http://localhost"));
        let errors = Arc::new(Mutex::new(0));
        {
            let errors = errors.clone();
            parts.core.on_error(move |_| *errors.lock().unwrap() += 1);
        }

        let err = parts
            .core
            .init_failed(Error::from(StatusCode::INTERNAL_SERVER_ERROR))
            .unwrap_err();

        assert_eq!(err.status(), Some(500));
        assert_eq!(*errors.lock().unwrap(), 1);
        assert!(!parts.core.is_ready());
    }

    #[test]
    fn refresh_emits_only_real_changes() {
        let parts = ClientParts::new(ClientConfig::new("tok", "http://localhost"));
        parts
            .core
            .initialized(response(json!({"a": true}), json!({"x": {"k": [1, 2]}})));
        let changes = Arc::new(Mutex::new(Vec::new()));
        {
            let changes = changes.clone();
            parts
                .core
                .on_change(move |event| changes.lock().unwrap().push(event.clone()));
        }

        parts
            .core
            .refreshed(response(json!({"a": true}), json!({"x": {"k": [1, 2]}})));
        parts
            .core
            .refreshed(response(json!({"a": false}), json!({"x": {"k": [1, 2]}})));

        let changes = changes.lock().unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].flags.len(), 1);
        assert!(changes[0].configs.is_empty());
    }

    #[test]
    fn teardown_clears_state_and_subscriptions() {
        let parts = ClientParts::new(ClientConfig::new("tok", "http://localhost"));
        parts.core.initialized(response(json!({"a": true}), json!({})));
        let readies = Arc::new(Mutex::new(0));
        {
            let readies = readies.clone();
            parts.core.on_ready(move || *readies.lock().unwrap() += 1);
        }

        parts.core.teardown();
        parts.core.mock_initialized();

        assert!(!parts.core.is_ready());
        assert_eq!(parts.core.all_flags(), Flags::new());
        assert_eq!(parts.core.flag_or("a", false), FlagValue::Boolean(false));
        assert_eq!(*readies.lock().unwrap(), 0);
    }

    #[test]
    fn logs_lifecycle_when_debug_is_enabled() {
        let messages = Arc::new(Mutex::new(Vec::new()));
        let logger = {
            let messages = messages.clone();
            move |level: Level, message: &str| {
                messages.lock().unwrap().push((level, message.to_owned()))
            }
        };
        let parts = ClientParts::new(
            ClientConfig::new("tok", "http://localhost")
                .debug(true)
                .logger(logger),
        );

        parts.core.initialized(response(json!({}), json!({})));
        let _ = parts.core.init_failed(Error::Closed);

        let messages = messages.lock().unwrap();
        assert_eq!(messages[0], (Level::Debug, "Initialized".to_owned()));
        assert_eq!(
            messages[1],
            (Level::Error, "Init failed: fetcher is closed".to_owned())
        );
    }
}
