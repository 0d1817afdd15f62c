//! WebSocket transport over `tokio-tungstenite`.
//!
//! [`WsConnector`] resolves the endpoint host before the handshake so that a
//! name-resolution failure surfaces as [`TransportError::AddressResolution`]
//! rather than a generic connect error.
//!
//! [`WsConnection`] splits the socket. A background reader task owns the read
//! half and:
//! - forwards text/binary frames into a channel drained by `recv()`
//! - acknowledges outstanding pings when their pong arrives (a pong also
//!   acknowledges every earlier outstanding ping)
//! - marks the connection closed on close frame, EOF, or read error, failing
//!   any ping still waiting
//!
//! Incoming pings are answered by tungstenite itself on the next read.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::http::Uri;
use tokio_tungstenite::tungstenite::{self, Message as WsMessage};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::debug;
use uuid::Uuid;

use super::{Connection, Connector};
use crate::errors::TransportError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Upper bound on the close handshake.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Opens [`WsConnection`]s.
#[derive(Clone, Copy, Debug, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Connection>, TransportError> {
        let endpoint = Endpoint::parse(url)?;
        endpoint.resolve().await?;

        let (ws, _response) = connect_async(url).await.map_err(|e| match e {
            tungstenite::Error::Url(reason) => TransportError::InvalidUrl {
                url: url.to_string(),
                reason: reason.to_string(),
            },
            other => TransportError::Connect(other.to_string()),
        })?;

        let connection = WsConnection::new(ws);
        debug!(connection = %connection.id, url, "websocket handshake complete");
        Ok(Box::new(connection))
    }
}

/// Host and port extracted from a `ws://` / `wss://` URL.
#[derive(Debug, PartialEq, Eq)]
struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    fn parse(url: &str) -> Result<Self, TransportError> {
        let invalid = |reason: String| TransportError::InvalidUrl {
            url: url.to_string(),
            reason,
        };

        let uri: Uri = url.parse().map_err(|e| invalid(format!("{e}")))?;
        let default_port = match uri.scheme_str() {
            Some("ws") => 80,
            Some("wss") => 443,
            _ => return Err(invalid("scheme must be ws or wss".into())),
        };
        let host = uri
            .host()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| invalid("missing host".into()))?;

        Ok(Self {
            host: host.trim_start_matches('[').trim_end_matches(']').to_string(),
            port: uri.port_u16().unwrap_or(default_port),
        })
    }

    async fn resolve(&self) -> Result<(), TransportError> {
        let failed = |reason: String| TransportError::AddressResolution {
            host: self.host.clone(),
            reason,
        };

        let mut addrs = tokio::net::lookup_host((self.host.as_str(), self.port))
            .await
            .map_err(|e| failed(e.to_string()))?;
        if addrs.next().is_none() {
            return Err(failed("no addresses returned".into()));
        }
        Ok(())
    }
}

/// Map a write-side tungstenite error. Anything that means the socket is
/// unusable becomes [`TransportError::Closed`].
fn map_write_error(err: tungstenite::Error) -> TransportError {
    match err {
        tungstenite::Error::ConnectionClosed
        | tungstenite::Error::AlreadyClosed
        | tungstenite::Error::Io(_)
        | tungstenite::Error::Protocol(_) => TransportError::Closed,
        other => TransportError::Other(other.to_string()),
    }
}

struct PendingPing {
    payload: Bytes,
    ack: oneshot::Sender<()>,
}

/// State shared between the connection and its reader task.
#[derive(Default)]
struct Shared {
    closed: AtomicBool,
    pending_pings: parking_lot::Mutex<VecDeque<PendingPing>>,
}

impl Shared {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn register_ping(&self, payload: Bytes, ack: oneshot::Sender<()>) -> Result<(), TransportError> {
        let mut pending = self.pending_pings.lock();
        // Checked under the lock so mark_closed cannot strand the waiter
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        pending.push_back(PendingPing { payload, ack });
        Ok(())
    }

    fn ack_pings(&self, payload: &[u8]) {
        let mut pending = self.pending_pings.lock();
        if !pending.iter().any(|p| p.payload[..] == *payload) {
            return;
        }
        while let Some(ping) = pending.pop_front() {
            let matched = ping.payload[..] == *payload;
            let _ = ping.ack.send(());
            if matched {
                break;
            }
        }
    }

    fn forget_ping(&self, payload: &[u8]) {
        self.pending_pings.lock().retain(|p| p.payload[..] != *payload);
    }

    fn mark_closed(&self) {
        let mut pending = self.pending_pings.lock();
        self.closed.store(true, Ordering::Release);
        // Dropping the senders fails every waiting ping
        pending.clear();
    }
}

/// Drops the pending entry of a ping that ends without its pong, whether it
/// failed to write or its future was dropped by a timeout.
struct PingGuard<'a> {
    shared: &'a Shared,
    payload: Bytes,
}

impl Drop for PingGuard<'_> {
    fn drop(&mut self) {
        self.shared.forget_ping(&self.payload);
    }
}

/// A live WebSocket session.
pub struct WsConnection {
    id: String,
    sink: Mutex<SplitSink<WsStream, WsMessage>>,
    frames: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    shared: Arc<Shared>,
    next_ping: AtomicU64,
    close_started: AtomicBool,
    reader: JoinHandle<()>,
}

impl WsConnection {
    fn new(ws: WsStream) -> Self {
        let id = Uuid::now_v7().to_string();
        let (sink, stream) = ws.split();
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared::default());
        let reader = tokio::spawn(read_loop(id.clone(), stream, frames_tx, shared.clone()));

        Self {
            id,
            sink: Mutex::new(sink),
            frames: Mutex::new(frames_rx),
            shared,
            next_ping: AtomicU64::new(0),
            close_started: AtomicBool::new(false),
            reader,
        }
    }

    /// Connection ID used in log lines.
    pub fn id(&self) -> &str {
        &self.id
    }

    async fn write(&self, message: WsMessage) -> Result<(), TransportError> {
        if self.shared.is_closed() {
            return Err(TransportError::Closed);
        }
        self.sink
            .lock()
            .await
            .send(message)
            .await
            .map_err(map_write_error)
    }
}

#[async_trait]
impl Connection for WsConnection {
    async fn send(&self, payload: Vec<u8>) -> Result<(), TransportError> {
        let message = match String::from_utf8(payload) {
            Ok(text) => WsMessage::text(text),
            Err(e) => WsMessage::binary(e.into_bytes()),
        };
        self.write(message).await
    }

    async fn recv(&self) -> Result<Vec<u8>, TransportError> {
        self.frames
            .lock()
            .await
            .recv()
            .await
            .ok_or(TransportError::Closed)
    }

    async fn ping(&self) -> Result<(), TransportError> {
        let seq = self.next_ping.fetch_add(1, Ordering::Relaxed);
        let payload = Bytes::copy_from_slice(&seq.to_be_bytes());
        let (ack_tx, ack_rx) = oneshot::channel();

        self.shared.register_ping(payload.clone(), ack_tx)?;
        let _guard = PingGuard {
            shared: &self.shared,
            payload: payload.clone(),
        };
        self.write(WsMessage::Ping(payload)).await?;
        ack_rx.await.map_err(|_| TransportError::Closed)
    }

    async fn close(&self) {
        if self.close_started.swap(true, Ordering::AcqRel) {
            return;
        }

        let handshake = async { self.sink.lock().await.close().await };
        match tokio::time::timeout(CLOSE_TIMEOUT, handshake).await {
            Ok(Ok(())) => debug!(connection = %self.id, "connection closed"),
            Ok(Err(err)) => debug!(connection = %self.id, error = %err, "close handshake failed"),
            Err(_) => debug!(connection = %self.id, "close handshake timed out"),
        }

        self.shared.mark_closed();
        self.reader.abort();
    }
}

impl Drop for WsConnection {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn read_loop(
    id: String,
    mut stream: SplitStream<WsStream>,
    frames: mpsc::UnboundedSender<Vec<u8>>,
    shared: Arc<Shared>,
) {
    while let Some(item) = stream.next().await {
        match item {
            Ok(message @ (WsMessage::Text(_) | WsMessage::Binary(_))) => {
                if frames.send(message.into_data().to_vec()).is_err() {
                    break;
                }
            }
            Ok(WsMessage::Pong(payload)) => shared.ack_pings(&payload),
            Ok(WsMessage::Close(frame)) => {
                debug!(connection = %id, ?frame, "peer closed connection");
                break;
            }
            Ok(WsMessage::Ping(_) | WsMessage::Frame(_)) => {}
            Err(err) => {
                debug!(connection = %id, error = %err, "read failed");
                break;
            }
        }
    }
    shared.mark_closed();
}
