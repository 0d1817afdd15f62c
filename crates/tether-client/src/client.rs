//! Application-facing client handle.

use std::sync::Arc;

use tether_core::Message;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::ClientConfig;
use crate::connectivity::{ConnectivityState, ConnectivityWatch};
use crate::errors::ClientError;
use crate::queue::MessageQueue;
use crate::supervisor::Supervisor;
use crate::transport::Connector;
use crate::transport::websocket::WsConnector;

/// A self-healing session to one endpoint.
///
/// Build it, take whatever handles the application needs (queues,
/// connectivity watch, shutdown token), then hand it to [`run`](Self::run)
/// or [`spawn`](Self::spawn). The queues outlive every reconnect.
pub struct TetherClient {
    url: String,
    config: ClientConfig,
    connector: Arc<dyn Connector>,
    outbound: MessageQueue,
    inbound: MessageQueue,
    connectivity: ConnectivityState,
    shutdown: CancellationToken,
}

impl TetherClient {
    /// A client speaking WebSocket to `url`.
    pub fn new(url: impl Into<String>, config: ClientConfig) -> Self {
        Self::with_connector(url, config, Arc::new(WsConnector))
    }

    /// A client using a custom transport.
    pub fn with_connector(url: impl Into<String>, config: ClientConfig, connector: Arc<dyn Connector>) -> Self {
        let (connectivity, _watch) = ConnectivityState::new();
        Self {
            url: url.into(),
            outbound: MessageQueue::with_high_water_mark("outbound", config.outbound_high_water_mark),
            inbound: MessageQueue::new("inbound"),
            config,
            connector,
            connectivity,
            shutdown: CancellationToken::new(),
        }
    }

    /// Stop when `token` is cancelled instead of a private token.
    #[must_use]
    pub fn with_shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Target endpoint.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Timing configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Queue drained by the send worker.
    pub fn outbound(&self) -> &MessageQueue {
        &self.outbound
    }

    /// Queue filled by the recv worker.
    pub fn inbound(&self) -> &MessageQueue {
        &self.inbound
    }

    /// Read handle on the connectivity flag.
    pub fn connectivity(&self) -> ConnectivityWatch {
        self.connectivity.watch()
    }

    /// Token that stops the supervisor when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Queue a message for sending. Never blocks, even while disconnected.
    pub fn send(&self, message: Message) {
        self.outbound.push(message);
    }

    /// Run the supervisor until shutdown (`Ok`) or a fatal error.
    pub async fn run(self) -> Result<(), ClientError> {
        Supervisor {
            url: self.url,
            config: self.config,
            connector: self.connector,
            outbound: self.outbound,
            inbound: self.inbound,
            connectivity: self.connectivity,
            shutdown: self.shutdown,
        }
        .run()
        .await
    }

    /// Run the supervisor on a new task.
    pub fn spawn(self) -> JoinHandle<Result<(), ClientError>> {
        tokio::spawn(self.run())
    }
}

impl std::fmt::Debug for TetherClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TetherClient")
            .field("url", &self.url)
            .field("config", &self.config)
            .field("connectivity", &self.connectivity.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::Connectivity;
    use crate::transport::mock::MockConnector;
    use std::time::Duration;

    fn mock_client() -> TetherClient {
        TetherClient::with_connector("ws://localhost:5555", ClientConfig::default(), Arc::new(MockConnector::default()))
    }

    #[test]
    fn starts_disconnected_with_empty_queues() {
        let client = mock_client();
        assert_eq!(client.connectivity().current(), Connectivity::Disconnected);
        assert!(client.outbound().is_empty());
        assert!(client.inbound().is_empty());
        assert_eq!(client.url(), "ws://localhost:5555");
    }

    #[test]
    fn send_queues_on_outbound() {
        let client = mock_client();
        let outbound = client.outbound().clone();
        client.send(Message::new("bob", "hi"));
        assert_eq!(outbound.len(), 1);
        assert!(client.inbound().is_empty());
    }

    #[test]
    fn external_shutdown_token_is_used() {
        let token = CancellationToken::new();
        let client = mock_client().with_shutdown_token(token.clone());
        token.cancel();
        assert!(client.shutdown_token().is_cancelled());
    }

    #[test]
    fn high_water_mark_from_config() {
        let config = ClientConfig {
            outbound_high_water_mark: Some(3),
            ..ClientConfig::default()
        };
        let client = TetherClient::with_connector("ws://x", config, Arc::new(MockConnector::default()));
        assert_eq!(client.config().outbound_high_water_mark, Some(3));
        assert_eq!(client.outbound().name(), "outbound");
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_client_stops_on_cancel() {
        let client = mock_client();
        let token = client.shutdown_token();
        token.cancel();
        let handle = client.spawn();
        let result = tokio::time::timeout(Duration::from_secs(1), handle).await;
        assert!(result.unwrap().unwrap().is_ok());
    }

    #[test]
    fn debug_output() {
        let debug = format!("{:?}", mock_client());
        assert!(debug.contains("ws://localhost:5555"));
        assert!(debug.contains("Disconnected"));
    }
}
