//! HTTP clients that fetch flag evaluations from the EdgeFlags service.
//!
//! The service exposes a single endpoint: `POST {base_url}/api/v1/evaluate` with a JSON body
//! `{"context": ...}`, answering `{"flags": {...}, "configs": {...}}`.
use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Deserializer, Serialize};

use crate::{Configs, Error, EvaluationContext, FlagValue, Flags, Result};

mod blocking;
mod nonblocking;

pub use blocking::HttpFetcher;
pub use nonblocking::AsyncHttpFetcher;

pub(crate) const EVALUATE_ENDPOINT: &str = "/api/v1/evaluate";

const USER_AGENT: &str = concat!("edgeflags-rust/", env!("CARGO_PKG_VERSION"));

/// Configuration for [`HttpFetcher`] and [`AsyncHttpFetcher`].
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Base URL of the service. The evaluation endpoint path is appended to it.
    pub base_url: String,
    /// API token, sent as a bearer token.
    pub token: String,
    /// Request timeout.
    ///
    /// Defaults to [`FetcherConfig::DEFAULT_TIMEOUT`].
    pub timeout: Duration,
}

impl FetcherConfig {
    /// Default value for [`FetcherConfig::timeout`].
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Create a config with the default timeout.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> FetcherConfig {
        FetcherConfig {
            base_url: base_url.into(),
            token: token.into(),
            timeout: FetcherConfig::DEFAULT_TIMEOUT,
        }
    }

    /// Full URL of the evaluation endpoint. Trailing slashes of the base URL are ignored.
    fn evaluate_url(&self) -> Result<Url> {
        let base_url = self.base_url.trim_end_matches('/');
        Url::parse(&format!("{base_url}{EVALUATE_ENDPOINT}")).map_err(Error::InvalidBaseUrl)
    }
}

#[derive(Debug, Serialize)]
struct EvaluationRequest<'a> {
    context: &'a EvaluationContext,
}

/// Flags and configs evaluated by the service for a context.
///
/// Flags whose value is not a valid [`FlagValue`] (`null`, arrays) are skipped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResponse {
    /// Evaluated flags by key.
    #[serde(default, deserialize_with = "deserialize_flags")]
    pub flags: Flags,
    /// Evaluated configs by key.
    #[serde(default)]
    pub configs: Configs,
}

fn deserialize_flags<'de, D>(deserializer: D) -> std::result::Result<Flags, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<HashMap<String, serde_json::Value>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(key, value)| {
            serde_json::from_value::<FlagValue>(value)
                .ok()
                .map(|value| (key, value))
        })
        .collect())
}

/// A blocking source of flag evaluations, used by [`Client`](crate::Client).
pub trait Fetcher: Send + Sync {
    /// Evaluate all flags and configs for `context`.
    fn fetch_all(&self, context: &EvaluationContext) -> Result<EvaluationResponse>;

    /// Release underlying connections. Subsequent fetches may fail.
    fn close(&self) {}
}

impl<T: Fn(&EvaluationContext) -> Result<EvaluationResponse> + Send + Sync> Fetcher for T {
    fn fetch_all(&self, context: &EvaluationContext) -> Result<EvaluationResponse> {
        self(context)
    }
}

/// An async source of flag evaluations, used by [`AsyncClient`](crate::AsyncClient).
#[async_trait]
pub trait AsyncFetcher: Send + Sync {
    /// Evaluate all flags and configs for `context`.
    async fn fetch_all(&self, context: &EvaluationContext) -> Result<EvaluationResponse>;

    /// Release underlying connections. Subsequent fetches may fail.
    fn close(&self) {}
}
