use std::{
    ops::Deref,
    sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock},
    time::Duration,
};

use super::{ClientCore, ClientParts};
use crate::{
    AsyncFetcher, AsyncHttpFetcher, AsyncPoller, ClientConfig, Error, EvaluationContext, Result,
};

/// An async client for the EdgeFlags service, driven by the tokio runtime.
///
/// Same lifecycle as [`Client`](crate::Client), except that fetching is async and polling runs
/// as a tokio task. [`AsyncClient::init`] must be awaited from within a tokio runtime for
/// polling to start. Reads and subscriptions come from [`ClientCore`], which the client
/// dereferences to.
///
/// # Examples
/// ```no_run
/// # async fn run() -> edgeflags::Result<()> {
/// # use edgeflags::ClientConfig;
/// let client = ClientConfig::new("token", "https://flags.example.com").to_async_client()?;
/// client.init().await?;
/// let limits = client.config_or("limits", serde_json::json!({}));
/// client.close();
/// # Ok(())
/// # }
/// ```
pub struct AsyncClient {
    inner: Arc<Inner>,
}

struct Inner {
    core: ClientCore,
    /// `None` in mock mode and after `close`.
    fetcher: RwLock<Option<Arc<dyn AsyncFetcher>>>,
    poller: Mutex<Option<AsyncPoller>>,
    polling_interval: Duration,
}

impl Inner {
    fn fetcher(&self) -> Option<Arc<dyn AsyncFetcher>> {
        self.fetcher
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn refresh(&self) -> Result<()> {
        if self.core.is_destroyed() {
            return Ok(());
        }
        let Some(fetcher) = self.fetcher() else {
            return Ok(());
        };

        self.core.logger.debug(format_args!("Fetching evaluations"));
        let context = self.core.context();
        let response = fetcher.fetch_all(&context).await?;
        self.core.refreshed(response);
        Ok(())
    }

    fn poller(&self) -> MutexGuard<'_, Option<AsyncPoller>> {
        self.poller.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AsyncClient {
    /// Create a new `AsyncClient` using the specified configuration.
    ///
    /// See [`ClientConfig::to_async_client`].
    pub fn new(config: ClientConfig) -> Result<AsyncClient> {
        let parts = ClientParts::new(config);
        let fetcher = match &parts.fetcher_config {
            Some(fetcher_config) => Some(
                Arc::new(AsyncHttpFetcher::new(fetcher_config.clone())?) as Arc<dyn AsyncFetcher>
            ),
            None => None,
        };
        Ok(AsyncClient::from_parts(parts, fetcher))
    }

    /// Create a new `AsyncClient` that fetches evaluations from `fetcher` instead of over HTTP.
    ///
    /// The fetcher is ignored if `config` is in mock mode.
    pub fn with_fetcher(config: ClientConfig, fetcher: impl AsyncFetcher + 'static) -> AsyncClient {
        let parts = ClientParts::new(config);
        let fetcher = parts
            .fetcher_config
            .is_some()
            .then(|| Arc::new(fetcher) as Arc<dyn AsyncFetcher>);
        AsyncClient::from_parts(parts, fetcher)
    }

    pub(crate) fn from_parts(
        parts: ClientParts,
        fetcher: Option<Arc<dyn AsyncFetcher>>,
    ) -> AsyncClient {
        AsyncClient {
            inner: Arc::new(Inner {
                core: parts.core,
                fetcher: RwLock::new(fetcher),
                poller: Mutex::new(None),
                polling_interval: parts.polling_interval,
            }),
        }
    }

    /// Fetch evaluations for the current context, emit [`Event::Ready`](crate::Event::Ready) and
    /// start polling.
    ///
    /// If the fetch fails, an [`Event::Error`](crate::Event::Error) is emitted first. When
    /// bootstrap data is available the client then becomes ready with it (without polling) and
    /// `init` succeeds.
    ///
    /// # Errors
    ///
    /// - The fetch error if it failed and there was no bootstrap data to fall back to.
    /// - [`Error::Closed`] if the client has been closed.
    pub async fn init(&self) -> Result<()> {
        let core = &self.inner.core;
        if core.is_mock() {
            core.mock_initialized();
            return Ok(());
        }

        let Some(fetcher) = self.inner.fetcher().filter(|_| !core.is_destroyed()) else {
            return Err(Error::Closed);
        };

        core.logger.debug(format_args!("Fetching evaluations"));
        let context = core.context();
        match fetcher.fetch_all(&context).await {
            Ok(response) => {
                if core.initialized(response) {
                    self.start_polling();
                }
                Ok(())
            }
            Err(err) => core.init_failed(err),
        }
    }

    fn start_polling(&self) {
        let mut slot = self.inner.poller();
        if self.inner.core.is_destroyed() {
            return;
        }
        let poller = slot.get_or_insert_with(|| {
            // The polling task must not keep the client alive.
            let task = {
                let inner = Arc::downgrade(&self.inner);
                move || {
                    let inner = inner.upgrade();
                    async move {
                        match inner {
                            Some(inner) => inner.refresh().await,
                            None => Ok(()),
                        }
                    }
                }
            };
            let on_error = {
                let inner = Arc::downgrade(&self.inner);
                move |err| {
                    if let Some(inner) = inner.upgrade() {
                        inner.core.poll_failed(err);
                    }
                }
            };
            AsyncPoller::new(self.inner.polling_interval, task, on_error)
        });

        let started = poller.start();
        drop(slot);

        // Handlers may call back into the client, so no lock may be held here.
        match started {
            Ok(()) => self.inner.core.polling_started(self.inner.polling_interval),
            Err(err) => self.inner.core.poll_failed(err),
        }
    }

    /// Fetch evaluations for the current context and emit [`Event::Change`](crate::Event::Change)
    /// if anything changed.
    ///
    /// No-op in mock mode and after [`AsyncClient::destroy`]. Errors are returned to the caller
    /// and are not emitted as [`Event::Error`](crate::Event::Error).
    pub async fn refresh(&self) -> Result<()> {
        self.inner.refresh().await
    }

    /// Replace the evaluation context. If the client is ready, evaluations are refetched
    /// immediately.
    ///
    /// # Errors
    ///
    /// Same as [`AsyncClient::refresh`]. The new context is kept even if the refetch fails.
    pub async fn identify(&self, context: EvaluationContext) -> Result<()> {
        self.inner.core.set_context(context);
        if self.inner.core.is_ready() {
            self.inner.refresh().await?;
        }
        Ok(())
    }

    /// Stop polling, clear the cache and remove all handlers. Idempotent.
    ///
    /// A destroyed client serves no data: a poll tick still in flight completes, but its result is
    /// discarded. `init` fails with [`Error::Closed`] and `refresh` is a no-op afterwards. The
    /// fetcher itself stays open; see [`AsyncClient::close`].
    pub fn destroy(&self) {
        self.inner.core.teardown();
        if let Some(poller) = self.inner.poller().take() {
            poller.stop();
        }
    }

    /// [`AsyncClient::destroy`] the client and release the fetcher's connections. Idempotent.
    pub fn close(&self) {
        self.destroy();
        let fetcher = self
            .inner
            .fetcher
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(fetcher) = fetcher {
            fetcher.close();
        }
    }
}

impl Deref for AsyncClient {
    type Target = ClientCore;

    fn deref(&self) -> &ClientCore {
        &self.inner.core
    }
}
