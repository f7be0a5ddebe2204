//! The Rust SDK for EdgeFlags, a feature flag and remote configuration service.
//!
//! # Overview
//!
//! The SDK revolves around a [`Client`] (or its tokio-based twin [`AsyncClient`]) that fetches
//! flag and config values evaluated by the EdgeFlags service for an [`EvaluationContext`], keeps
//! them in a local [`Cache`] and serves reads from memory. Once initialized, the client polls the
//! service in the background and notifies subscribers through [`Event`]s:
//!
//! - [`Event::Ready`] when initial data is available,
//! - [`Event::Change`] with a [`ChangeEvent`] whenever a refresh changes any value,
//! - [`Event::Error`] when initialization or a background poll fails.
//!
//! Change detection compares values structurally ([`deep_equal`], [`flags_equal`]), so a refresh
//! that returns identical data announces nothing.
//!
//! For tests and offline use, [`mock_client`] builds a client that serves fixed data and never
//! touches the network.
//!
//! # Error Handling
//!
//! Errors are represented by the [`Error`] enum.
//!
//! Reads never fail: unknown keys return `None` or the supplied default. Only network operations
//! (`init`, `refresh`, `identify`) return errors. If bootstrap data was supplied, a failed `init`
//! still leaves the client ready with that data.
//!
//! # Logging
//!
//! The package uses the [`log`](https://docs.rs/log/latest/log/) crate for logging messages under
//! the [`LOG_TARGET`] target. Messages are only produced when the client is configured with
//! [`ClientConfig::debug`]. A custom [`Logger`] can be installed with [`ClientConfig::logger`].
//!
//! # Examples
//!
//! A runnable example lives in the `demos/` directory of the crate repository.

#![warn(rustdoc::missing_crate_level_docs)]
#![warn(missing_docs)]

mod cache;
mod client;
mod config;
mod context;
mod emitter;
mod equality;
mod error;
mod events;
pub mod fetcher;
mod logger;
mod mock;
pub mod poller;
mod value;

pub use cache::Cache;
pub use client::{AsyncClient, Client, ClientCore};
pub use config::{Bootstrap, ClientConfig};
pub use context::EvaluationContext;
pub use emitter::{Emitter, Handler, Subscription};
pub use equality::{deep_equal, flags_equal};
pub use error::{Error, Result};
pub use events::{ChangeEvent, ConfigChange, Event, EventKind, FlagChange};
pub use fetcher::{
    AsyncFetcher, AsyncHttpFetcher, EvaluationResponse, Fetcher, FetcherConfig, HttpFetcher,
};
pub use logger::{Logger, LOG_TARGET};
pub use mock::{mock_async_client, mock_client};
pub use poller::{AsyncPoller, Poller};
pub use value::{ConfigValue, Configs, FlagValue, Flags};
