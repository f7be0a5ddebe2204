use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    logger::LogFacade, AsyncClient, Client, Configs, EvaluationContext, Flags, Logger, Result,
};

/// A snapshot of flags and configs supplied up front.
///
/// Used to pre-seed a client before its first fetch (and as a fallback if that fetch fails), or as
/// the complete data set of a [mock client](crate::mock_client).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bootstrap {
    /// Flags to serve.
    #[serde(default)]
    pub flags: Flags,
    /// Configs to serve.
    #[serde(default)]
    pub configs: Configs,
}

impl Bootstrap {
    /// Bundle `flags` and `configs`.
    pub fn new(flags: Flags, configs: Configs) -> Bootstrap {
        Bootstrap { flags, configs }
    }
}

/// Configuration for [`Client`] and [`AsyncClient`].
///
/// # Examples
/// ```
/// # use std::time::Duration;
/// # use edgeflags::{ClientConfig, EvaluationContext};
/// let client = ClientConfig::new("token", "https://flags.example.com/")
///     .context(EvaluationContext::new().user_id("user-42"))
///     .polling_interval(Duration::from_secs(30))
///     .to_client()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ClientConfig {
    pub(crate) token: String,
    pub(crate) base_url: String,
    pub(crate) context: EvaluationContext,
    pub(crate) polling_interval: Duration,
    pub(crate) bootstrap: Option<Bootstrap>,
    pub(crate) debug: bool,
    pub(crate) logger: Arc<dyn Logger + Send + Sync>,
    pub(crate) mock: Option<Bootstrap>,
}

impl ClientConfig {
    /// Default interval between background refreshes.
    pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_secs(60);

    /// Create a default configuration using the specified token and EdgeFlags service URL.
    ///
    /// ```
    /// # use edgeflags::ClientConfig;
    /// ClientConfig::new("token", "https://flags.example.com");
    /// ```
    pub fn new(token: impl Into<String>, base_url: impl Into<String>) -> Self {
        ClientConfig {
            token: token.into(),
            base_url: base_url.into(),
            context: EvaluationContext::default(),
            polling_interval: ClientConfig::DEFAULT_POLLING_INTERVAL,
            bootstrap: None,
            debug: false,
            logger: Arc::new(LogFacade),
            mock: None,
        }
    }

    /// Set the initial evaluation context.
    pub fn context(mut self, context: EvaluationContext) -> Self {
        self.context = context;
        self
    }

    /// Set the interval between background refreshes.
    pub fn polling_interval(mut self, polling_interval: Duration) -> Self {
        self.polling_interval = polling_interval;
        self
    }

    /// Seed the client with `bootstrap` before the first fetch. If the first fetch fails and the
    /// bootstrap contains at least one flag, the client still becomes ready.
    pub fn bootstrap(mut self, bootstrap: Bootstrap) -> Self {
        self.bootstrap = Some(bootstrap);
        self
    }

    /// Enable SDK logging. Disabled by default.
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Route SDK log messages to `logger` instead of the `log` crate.
    pub fn logger(mut self, logger: impl Logger + Send + Sync + 'static) -> Self {
        self.logger = Arc::new(logger);
        self
    }

    /// Serve `data` without ever contacting the EdgeFlags service. Intended for tests and offline
    /// operation; see also [`mock_client`](crate::mock_client).
    pub fn mock(mut self, data: Bootstrap) -> Self {
        self.mock = Some(data);
        self
    }

    /// Create a new [`Client`] using the specified configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidBaseUrl`](crate::Error::InvalidBaseUrl) if the base URL is not a valid URL.
    /// - [`Error::Network`](crate::Error::Network) if the HTTP client cannot be created.
    pub fn to_client(self) -> Result<Client> {
        Client::new(self)
    }

    /// Create a new [`AsyncClient`] using the specified configuration.
    ///
    /// # Errors
    ///
    /// Same as [`ClientConfig::to_client`].
    pub fn to_async_client(self) -> Result<AsyncClient> {
        AsyncClient::new(self)
    }
}
