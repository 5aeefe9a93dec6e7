use super::ChatSession;
use crate::config::SessionConfig;
use crate::network::NetworkMonitor;
use crate::transport::{AskClient, HttpTransport, Transport};

/// [`ChatSession`] builder.
pub struct ChatSessionBuilder {
    pub(super) client: AskClient,
    pub(super) config: SessionConfig,
    pub(super) network: Option<NetworkMonitor>,
}

impl ChatSessionBuilder {
    /// Creates a new builder with the specified transport.
    #[inline]
    pub fn with_transport<T: Transport>(transport: T) -> Self {
        Self {
            client: AskClient::new(transport),
            config: SessionConfig::default(),
            network: None,
        }
    }

    /// Creates a new builder talking HTTP to the gateway at `server_url`.
    #[inline]
    pub fn with_server_url(server_url: &str) -> Self {
        Self::with_transport(HttpTransport::new(server_url))
    }

    /// Replaces the default config.
    #[inline]
    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the network monitor. Without one the network is assumed to be
    /// always online.
    #[inline]
    pub fn with_network_monitor(mut self, network: NetworkMonitor) -> Self {
        self.network = Some(network);
        self
    }

    /// Builds the session. Must be called within a tokio runtime.
    #[inline]
    pub fn build(self) -> ChatSession {
        ChatSession::spawn_from_builder(self)
    }
}
