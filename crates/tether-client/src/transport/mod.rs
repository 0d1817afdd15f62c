//! Transport contract consumed by the connection lifecycle.
//!
//! The core never speaks the wire protocol itself. It acquires a
//! [`Connection`] from a [`Connector`] and drives it through four
//! operations. Both workers of a lifecycle use the same handle concurrently,
//! so every operation takes `&self`.
//!
//! - [`websocket`]: the production implementation over `tokio-tungstenite`
//! - [`mock`]: a scripted in-memory implementation for tests

pub mod mock;
pub mod websocket;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::TransportError;

/// Establishes connections to an endpoint.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a new connection to `url`.
    ///
    /// Name-resolution failures must be reported as
    /// [`TransportError::AddressResolution`]; the supervisor retries those.
    async fn connect(&self, url: &str) -> Result<Box<dyn Connection>, TransportError>;
}

/// One live transport session.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Transmit one payload.
    async fn send(&self, payload: Vec<u8>) -> Result<(), TransportError>;

    /// Wait for the next inbound payload.
    ///
    /// Must be cancel safe: dropping the future must not lose a frame.
    async fn recv(&self) -> Result<Vec<u8>, TransportError>;

    /// Send a liveness probe and resolve when it is acknowledged.
    async fn ping(&self) -> Result<(), TransportError>;

    /// Close the session. Idempotent.
    async fn close(&self);
}

impl fmt::Debug for dyn Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Connection")
    }
}

#[async_trait]
impl<T: Connection + ?Sized> Connection for Arc<T> {
    async fn send(&self, payload: Vec<u8>) -> Result<(), TransportError> {
        (**self).send(payload).await
    }

    async fn recv(&self) -> Result<Vec<u8>, TransportError> {
        (**self).recv().await
    }

    async fn ping(&self) -> Result<(), TransportError> {
        (**self).ping().await
    }

    async fn close(&self) {
        (**self).close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    use mock::{ConnectStep, MockConnection, MockConnector};

    #[tokio::test]
    async fn connect_results_are_debug() {
        let connector = MockConnector::new(vec![
            ConnectStep::Connect(MockConnection::new().shared()),
            ConnectStep::Fail(TransportError::Closed),
        ]);

        let ok = connector.connect("ws://test").await;
        assert_eq!(format!("{ok:?}"), "Ok(Connection)");
        assert_matches!(connector.connect("ws://test").await, Err(TransportError::Closed));
    }
}
