use std::{
    ops::Deref,
    sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak},
    time::Duration,
};

use super::{ClientCore, ClientParts};
use crate::{ClientConfig, Error, EvaluationContext, Fetcher, HttpFetcher, Poller, Result};

/// A blocking client for the EdgeFlags service.
///
/// Network calls happen on the calling thread (`init`, `refresh`, `identify`) or on a dedicated
/// poller thread started by a successful [`Client::init`]. Reads are served from an in-memory
/// cache and never block on the network.
///
/// Reads and subscriptions (`flag`, `config`, `on_change`, ...) come from [`ClientCore`], which
/// the client dereferences to.
///
/// Dropping the client stops the poller. Call [`Client::destroy`] to also clear the cache and
/// remove all handlers while other threads may still hold a reference.
///
/// # Examples
/// ```no_run
/// # use edgeflags::ClientConfig;
/// let client = ClientConfig::new("token", "https://flags.example.com").to_client()?;
/// client.init()?;
/// if client.flag_or("dark_mode", false).as_bool() == Some(true) {
///     // ...
/// }
/// client.destroy();
/// # Ok::<(), edgeflags::Error>(())
/// ```
pub struct Client {
    inner: Arc<Inner>,
}

struct Inner {
    core: ClientCore,
    /// `None` in mock mode and after `destroy`.
    fetcher: RwLock<Option<Arc<dyn Fetcher>>>,
    poller: Mutex<Option<Poller>>,
    polling_interval: Duration,
}

impl Inner {
    fn fetcher(&self) -> Option<Arc<dyn Fetcher>> {
        self.fetcher
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn refresh(&self) -> Result<()> {
        if self.core.is_destroyed() {
            return Ok(());
        }
        let Some(fetcher) = self.fetcher() else {
            return Ok(());
        };

        self.core.logger.debug(format_args!("Fetching evaluations"));
        let response = fetcher.fetch_all(&self.core.context())?;
        self.core.refreshed(response);
        Ok(())
    }

    fn poller(&self) -> MutexGuard<'_, Option<Poller>> {
        self.poller.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Client {
    /// Create a new `Client` using the specified configuration.
    ///
    /// See [`ClientConfig::to_client`].
    pub fn new(config: ClientConfig) -> Result<Client> {
        let parts = ClientParts::new(config);
        let fetcher = match &parts.fetcher_config {
            Some(fetcher_config) => {
                Some(Arc::new(HttpFetcher::new(fetcher_config.clone())?) as Arc<dyn Fetcher>)
            }
            None => None,
        };
        Ok(Client::from_parts(parts, fetcher))
    }

    /// Create a new `Client` that fetches evaluations from `fetcher` instead of over HTTP.
    ///
    /// The fetcher is ignored if `config` is in mock mode.
    ///
    /// ```
    /// # use edgeflags::{ClientConfig, Client, EvaluationContext, EvaluationResponse, Result};
    /// let client = Client::with_fetcher(
    ///     ClientConfig::new("token", "https://flags.example.com"),
    ///     |_: &EvaluationContext| -> Result<EvaluationResponse> { Ok(EvaluationResponse::default()) },
    /// );
    /// client.init()?;
    /// assert!(client.is_ready());
    /// # client.destroy();
    /// # Ok::<(), edgeflags::Error>(())
    /// ```
    pub fn with_fetcher(config: ClientConfig, fetcher: impl Fetcher + 'static) -> Client {
        let parts = ClientParts::new(config);
        let fetcher = parts
            .fetcher_config
            .is_some()
            .then(|| Arc::new(fetcher) as Arc<dyn Fetcher>);
        Client::from_parts(parts, fetcher)
    }

    pub(crate) fn from_parts(parts: ClientParts, fetcher: Option<Arc<dyn Fetcher>>) -> Client {
        Client {
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
    /// - [`Error::Closed`] if the client has been destroyed.
    pub fn init(&self) -> Result<()> {
        let core = &self.inner.core;
        if core.is_mock() {
            core.mock_initialized();
            return Ok(());
        }

        let Some(fetcher) = self.inner.fetcher().filter(|_| !core.is_destroyed()) else {
            return Err(Error::Closed);
        };

        core.logger.debug(format_args!("Fetching evaluations"));
        match fetcher.fetch_all(&core.context()) {
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
            // The poller thread must not keep the client alive.
            let task = {
                let inner = Arc::downgrade(&self.inner);
                move || Weak::upgrade(&inner).map_or(Ok(()), |inner| inner.refresh())
            };
            let on_error = {
                let inner = Arc::downgrade(&self.inner);
                move |err| {
                    if let Some(inner) = inner.upgrade() {
                        inner.core.poll_failed(err);
                    }
                }
            };
            Poller::new(self.inner.polling_interval, task, on_error)
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
    /// No-op in mock mode and after [`Client::destroy`]. Errors are returned to the caller and are
    /// not emitted as [`Event::Error`](crate::Event::Error).
    pub fn refresh(&self) -> Result<()> {
        self.inner.refresh()
    }

    /// Replace the evaluation context. If the client is ready, evaluations are refetched
    /// immediately.
    ///
    /// # Errors
    ///
    /// Same as [`Client::refresh`]. The new context is kept even if the refetch fails.
    pub fn identify(&self, context: EvaluationContext) -> Result<()> {
        self.inner.core.set_context(context);
        if self.inner.core.is_ready() {
            self.inner.refresh()?;
        }
        Ok(())
    }

    /// Stop polling, close the fetcher, clear the cache and remove all handlers. Idempotent.
    ///
    /// A destroyed client serves no data: a poll tick still in flight completes, but its result is
    /// discarded. `init` fails with [`Error::Closed`] and `refresh` is a no-op afterwards.
    pub fn destroy(&self) {
        self.inner.core.teardown();
        if let Some(poller) = self.inner.poller().take() {
            poller.stop();
        }
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

impl Deref for Client {
    type Target = ClientCore;

    fn deref(&self) -> &ClientCore {
        &self.inner.core
    }
}
