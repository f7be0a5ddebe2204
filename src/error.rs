use std::sync::Arc;

/// Represents a result type for operations in the EdgeFlags SDK.
pub type Result<T> = std::result::Result<T, Error>;

/// Enum representing possible errors that can occur in the EdgeFlags SDK.
///
/// Errors are cheap to clone so that the same failure can be delivered to `error` subscribers and
/// returned to the caller.
#[derive(thiserror::Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// The evaluation service answered with a non-success status code.
    #[error("evaluation request failed: {status} {reason}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Canonical reason phrase for the status, if known.
        reason: String,
    },

    /// Network error (connection failure, timeout, malformed response body).
    #[error(transparent)]
    Network(Arc<reqwest::Error>),

    /// Invalid base URL configuration.
    #[error("invalid base_url configuration")]
    InvalidBaseUrl(#[source] url::ParseError),

    /// The fetcher was closed and can no longer issue requests.
    #[error("fetcher is closed")]
    Closed,

    /// An I/O error, e.g. failure to spawn the poller thread.
    #[error(transparent)]
    // std::io::Error is not clonable, so we're wrapping it in an Arc.
    Io(Arc<std::io::Error>),

    /// The async poller was started outside of a tokio runtime.
    #[error("async poller must be started from within a tokio runtime")]
    NoRuntime,

    /// A poll tick panicked.
    #[error("poller tick panicked")]
    PollerPanicked,

    /// Any other failure reported by a fetcher implementation.
    #[error(transparent)]
    Custom(Arc<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Wrap an arbitrary error. Useful for custom [`Fetcher`](crate::Fetcher) implementations.
    pub fn custom(err: impl std::error::Error + Send + Sync + 'static) -> Error {
        Error::Custom(Arc::new(err))
    }

    /// HTTP status code associated with this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Status { status, .. } => Some(*status),
            Error::Network(err) => err.status().map(|status| status.as_u16()),
            _ => None,
        }
    }

    /// Returns `true` if the error originates from the transport (HTTP status or network).
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Status { .. } | Error::Network(_))
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(Arc::new(value))
    }
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        Error::Network(Arc::new(value.without_url()))
    }
}

impl From<reqwest::StatusCode> for Error {
    fn from(status: reqwest::StatusCode) -> Self {
        Error::Status {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_owned(),
        }
    }
}
