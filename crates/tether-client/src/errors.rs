//! Transport and client error types.
//!
//! - [`TransportError`]: failures reported by a [`Connector`](crate::transport::Connector)
//!   or [`Connection`](crate::transport::Connection)
//! - [`ClientError`]: the fatal outcome that stops the supervisor for good

use thiserror::Error;

/// Failures reported by the transport layer.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The endpoint URL could not be used.
    #[error("invalid endpoint url '{url}': {reason}")]
    InvalidUrl {
        /// The rejected URL.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The endpoint host name could not be resolved.
    #[error("failed to resolve '{host}': {reason}")]
    AddressResolution {
        /// Host that failed to resolve.
        host: String,
        /// Resolver diagnostic.
        reason: String,
    },

    /// The connection or handshake failed after the host resolved.
    #[error("connection failed: {0}")]
    Connect(String),

    /// An I/O operation did not finish within its bound.
    #[error("operation timed out")]
    Timeout,

    /// The connection is closed.
    #[error("connection closed")]
    Closed,

    /// Any other transport failure.
    #[error("transport error: {0}")]
    Other(String),
}

impl TransportError {
    /// Whether this is a stall (timeout or closed connection) that the
    /// workers answer with a liveness probe.
    pub fn is_stall(&self) -> bool {
        matches!(self, Self::Timeout | Self::Closed)
    }

    /// Whether this is a name-resolution failure.
    pub fn is_address_resolution(&self) -> bool {
        matches!(self, Self::AddressResolution { .. })
    }
}

/// Fatal outcome of the connection supervisor.
///
/// Once returned, no further reconnect attempts are made.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Connecting failed with an error that is not retried.
    #[error("cannot connect to {url}: {source}")]
    Connect {
        /// Target endpoint.
        url: String,
        /// Underlying transport failure.
        #[source]
        source: TransportError,
    },

    /// A worker hit a transport failure outside the liveness-probe path.
    #[error("connection lifecycle failed: {0}")]
    Lifecycle(#[source] TransportError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stall_classification() {
        assert!(TransportError::Timeout.is_stall());
        assert!(TransportError::Closed.is_stall());
        assert!(!TransportError::Connect("refused".into()).is_stall());
        assert!(!TransportError::Other("tls".into()).is_stall());
    }

    #[test]
    fn address_resolution_classification() {
        let err = TransportError::AddressResolution {
            host: "nowhere.invalid".into(),
            reason: "no such host".into(),
        };
        assert!(err.is_address_resolution());
        assert!(!err.is_stall());
        assert!(!TransportError::Timeout.is_address_resolution());
    }

    #[test]
    fn transport_error_display() {
        let err = TransportError::InvalidUrl {
            url: "http://x".into(),
            reason: "scheme must be ws or wss".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid endpoint url 'http://x': scheme must be ws or wss"
        );
        assert_eq!(TransportError::Closed.to_string(), "connection closed");
    }

    #[test]
    fn client_error_display_and_source() {
        let err = ClientError::Connect {
            url: "ws://localhost:5555".into(),
            source: TransportError::Connect("refused".into()),
        };
        assert_eq!(
            err.to_string(),
            "cannot connect to ws://localhost:5555: connection failed: refused"
        );
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "connection failed: refused");
    }
}
