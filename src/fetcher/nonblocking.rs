use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use reqwest::Url;

use super::{AsyncFetcher, EvaluationRequest, EvaluationResponse, FetcherConfig, USER_AGENT};
use crate::{Error, EvaluationContext, Result};

/// An async HTTP client that fetches evaluations from the EdgeFlags service.
pub struct AsyncHttpFetcher {
    // `None` once the fetcher is closed.
    client: RwLock<Option<reqwest::Client>>,
    url: Url,
    token: String,
}

impl AsyncHttpFetcher {
    /// # Errors
    ///
    /// - [`Error::InvalidBaseUrl`] if `config.base_url` is not a valid URL.
    /// - [`Error::Network`] if the HTTP client cannot be initialized.
    pub fn new(config: FetcherConfig) -> Result<AsyncHttpFetcher> {
        let url = config.evaluate_url()?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(AsyncHttpFetcher {
            client: RwLock::new(Some(client)),
            url,
            token: config.token,
        })
    }

    fn client(&self) -> Result<reqwest::Client> {
        self.client
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(Error::Closed)
    }
}

#[async_trait]
impl AsyncFetcher for AsyncHttpFetcher {
    async fn fetch_all(&self, context: &EvaluationContext) -> Result<EvaluationResponse> {
        let request = self
            .client()?
            .post(self.url.clone())
            .bearer_auth(&self.token)
            .json(&EvaluationRequest { context });

        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::from(status));
        }

        Ok(response.json().await?)
    }

    fn close(&self) {
        self.client
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}
