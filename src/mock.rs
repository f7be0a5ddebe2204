//! Clients that serve fixed data and never touch the network.
use crate::{
    client::ClientParts, AsyncClient, Bootstrap, Client, ClientConfig, Configs, Flags,
};

const MOCK_TOKEN: &str = "mock_token";
const MOCK_BASE_URL: &str = "http://localhost";

fn mock_config(flags: Flags, configs: Configs) -> ClientConfig {
    ClientConfig::new(MOCK_TOKEN, MOCK_BASE_URL).mock(Bootstrap::new(flags, configs))
}

/// A [`Client`] that is ready immediately and always serves `flags` and `configs`.
///
/// `init` only emits [`Event::Ready`](crate::Event::Ready), `refresh` and `identify` never fetch.
///
/// # Examples
/// ```
/// # use edgeflags::{mock_client, FlagValue};
/// let client = mock_client(
///     [("dark_mode".to_owned(), FlagValue::from(true))].into(),
///     Default::default(),
/// );
/// assert!(client.is_ready());
/// assert_eq!(client.flag("dark_mode"), Some(FlagValue::Boolean(true)));
/// ```
pub fn mock_client(flags: Flags, configs: Configs) -> Client {
    Client::from_parts(ClientParts::new(mock_config(flags, configs)), None)
}

/// Async counterpart of [`mock_client`].
pub fn mock_async_client(flags: Flags, configs: Configs) -> AsyncClient {
    AsyncClient::from_parts(ClientParts::new(mock_config(flags, configs)), None)
}
