use std::sync::{PoisonError, RwLock};

use reqwest::Url;

use super::{EvaluationRequest, EvaluationResponse, Fetcher, FetcherConfig, USER_AGENT};
use crate::{Error, EvaluationContext, Result};

/// A blocking HTTP client that fetches evaluations from the EdgeFlags service.
///
/// Must not be used from within an async runtime; use
/// [`AsyncHttpFetcher`](super::AsyncHttpFetcher) there.
pub struct HttpFetcher {
    // Client holds a connection pool internally, so we're reusing the client between requests.
    // `None` once the fetcher is closed.
    client: RwLock<Option<reqwest::blocking::Client>>,
    url: Url,
    token: String,
}

impl HttpFetcher {
    /// # Errors
    ///
    /// - [`Error::InvalidBaseUrl`] if `config.base_url` is not a valid URL.
    /// - [`Error::Network`] if the HTTP client cannot be initialized.
    pub fn new(config: FetcherConfig) -> Result<HttpFetcher> {
        let url = config.evaluate_url()?;
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(HttpFetcher {
            client: RwLock::new(Some(client)),
            url,
            token: config.token,
        })
    }

    fn client(&self) -> Result<reqwest::blocking::Client> {
        self.client
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(Error::Closed)
    }
}

impl Fetcher for HttpFetcher {
    fn fetch_all(&self, context: &EvaluationContext) -> Result<EvaluationResponse> {
        let response = self
            .client()?
            .post(self.url.clone())
            .bearer_auth(&self.token)
            .json(&EvaluationRequest { context })
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::from(status));
        }

        Ok(response.json()?)
    }

    fn close(&self) {
        self.client
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}
