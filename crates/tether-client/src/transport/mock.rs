//! Scripted in-memory transport for deterministic testing without a server.
//!
//! Each [`MockConnection`] replays per-operation scripts. When a script runs
//! out the operation falls back to a healthy default: `send` succeeds, `recv`
//! waits forever, `ping` is acknowledged.
//!
//! [`MockConnector`] hands out scripted connections in order and records every
//! attempt. Once its script is exhausted it fails with a non-retryable
//! [`TransportError::Connect`], which stops the supervisor.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tether_core::{Message, codec};
use tokio::time::Instant;

use super::{Connection, Connector};
use crate::errors::TransportError;

/// Scripted outcome of one `send` call.
#[derive(Clone, Debug)]
pub enum SendStep {
    /// Record the payload and succeed.
    Ok,
    /// Fail without recording the payload.
    Fail(TransportError),
    /// Never complete.
    Stall,
}

/// Scripted outcome of one `recv` call.
#[derive(Clone, Debug)]
pub enum RecvStep {
    /// Deliver this frame.
    Frame(Vec<u8>),
    /// Fail with this error.
    Fail(TransportError),
    /// Never complete.
    Stall,
}

impl RecvStep {
    /// A frame carrying the encoded form of `message`.
    pub fn message(message: &Message) -> Self {
        // Encoding a Message only fails on serializer bugs
        Self::Frame(codec::encode(message).unwrap_or_default())
    }
}

/// Scripted outcome of one `ping` call.
#[derive(Clone, Debug)]
pub enum PingStep {
    /// Acknowledge immediately.
    Ack,
    /// Fail with this error.
    Fail(TransportError),
    /// Never acknowledge.
    Stall,
}

/// A connection that replays scripted outcomes.
#[derive(Debug, Default)]
pub struct MockConnection {
    send_script: Mutex<VecDeque<SendStep>>,
    recv_script: Mutex<VecDeque<RecvStep>>,
    ping_script: Mutex<VecDeque<PingStep>>,
    sent: Mutex<Vec<Vec<u8>>>,
    send_calls: AtomicUsize,
    recv_calls: AtomicUsize,
    ping_calls: AtomicUsize,
    close_calls: AtomicUsize,
}

impl MockConnection {
    /// A healthy connection with empty scripts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the next `send` outcomes.
    #[must_use]
    pub fn with_sends(self, steps: impl IntoIterator<Item = SendStep>) -> Self {
        self.send_script.lock().extend(steps);
        self
    }

    /// Script the next `recv` outcomes.
    #[must_use]
    pub fn with_recvs(self, steps: impl IntoIterator<Item = RecvStep>) -> Self {
        self.recv_script.lock().extend(steps);
        self
    }

    /// Script the next `ping` outcomes.
    #[must_use]
    pub fn with_pings(self, steps: impl IntoIterator<Item = PingStep>) -> Self {
        self.ping_script.lock().extend(steps);
        self
    }

    /// Wrap in an `Arc` for sharing with a [`MockConnector`].
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Payloads accepted by `send`, in order.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().clone()
    }

    /// Accepted payloads decoded back into messages. Undecodable ones are skipped.
    pub fn sent_messages(&self) -> Vec<Message> {
        self.sent
            .lock()
            .iter()
            .filter_map(|payload| codec::decode(payload).ok())
            .collect()
    }

    /// Number of `send` calls, including failed and stalled ones.
    pub fn send_calls(&self) -> usize {
        self.send_calls.load(Ordering::Acquire)
    }

    /// Number of `recv` calls.
    pub fn recv_calls(&self) -> usize {
        self.recv_calls.load(Ordering::Acquire)
    }

    /// Number of `ping` calls.
    pub fn ping_calls(&self) -> usize {
        self.ping_calls.load(Ordering::Acquire)
    }

    /// Number of `close` calls.
    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::Acquire)
    }

    /// Whether `close` has been called at least once.
    pub fn is_closed(&self) -> bool {
        self.close_calls() > 0
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn send(&self, payload: Vec<u8>) -> Result<(), TransportError> {
        let _ = self.send_calls.fetch_add(1, Ordering::AcqRel);
        let step = self.send_script.lock().pop_front().unwrap_or(SendStep::Ok);
        match step {
            SendStep::Ok => {
                self.sent.lock().push(payload);
                Ok(())
            }
            SendStep::Fail(err) => Err(err),
            SendStep::Stall => std::future::pending().await,
        }
    }

    async fn recv(&self) -> Result<Vec<u8>, TransportError> {
        let _ = self.recv_calls.fetch_add(1, Ordering::AcqRel);
        let step = self.recv_script.lock().pop_front().unwrap_or(RecvStep::Stall);
        match step {
            RecvStep::Frame(frame) => Ok(frame),
            RecvStep::Fail(err) => Err(err),
            RecvStep::Stall => std::future::pending().await,
        }
    }

    async fn ping(&self) -> Result<(), TransportError> {
        let _ = self.ping_calls.fetch_add(1, Ordering::AcqRel);
        let step = self.ping_script.lock().pop_front().unwrap_or(PingStep::Ack);
        match step {
            PingStep::Ack => Ok(()),
            PingStep::Fail(err) => Err(err),
            PingStep::Stall => std::future::pending().await,
        }
    }

    async fn close(&self) {
        let _ = self.close_calls.fetch_add(1, Ordering::AcqRel);
    }
}

/// Scripted outcome of one `connect` call.
#[derive(Clone, Debug)]
pub enum ConnectStep {
    /// Hand out this connection.
    Connect(Arc<MockConnection>),
    /// Fail with this error.
    Fail(TransportError),
}

#[derive(Debug, Default)]
struct HandleTracker {
    live: AtomicUsize,
    max_live: AtomicUsize,
}

/// A connector that replays scripted connect outcomes.
#[derive(Debug, Default)]
pub struct MockConnector {
    script: Mutex<VecDeque<ConnectStep>>,
    attempts: Mutex<Vec<(String, Instant)>>,
    tracker: Arc<HandleTracker>,
}

impl MockConnector {
    /// A connector replaying `steps` in order.
    pub fn new(steps: impl IntoIterator<Item = ConnectStep>) -> Self {
        Self {
            script: Mutex::new(steps.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Number of `connect` calls so far.
    pub fn connect_calls(&self) -> usize {
        self.attempts.lock().len()
    }

    /// Instants of every `connect` call, on the tokio clock.
    pub fn connect_times(&self) -> Vec<Instant> {
        self.attempts.lock().iter().map(|(_, at)| *at).collect()
    }

    /// URLs passed to every `connect` call.
    pub fn connect_urls(&self) -> Vec<String> {
        self.attempts.lock().iter().map(|(url, _)| url.clone()).collect()
    }

    /// Handles handed out and not yet closed.
    pub fn live_handles(&self) -> usize {
        self.tracker.live.load(Ordering::Acquire)
    }

    /// Highest number of simultaneously live handles ever observed.
    pub fn max_live_handles(&self) -> usize {
        self.tracker.max_live.load(Ordering::Acquire)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Connection>, TransportError> {
        self.attempts.lock().push((url.to_string(), Instant::now()));
        let step = self.script.lock().pop_front();
        match step {
            Some(ConnectStep::Connect(inner)) => {
                let live = self.tracker.live.fetch_add(1, Ordering::AcqRel) + 1;
                let _ = self.tracker.max_live.fetch_max(live, Ordering::AcqRel);
                Ok(Box::new(TrackedConnection {
                    inner,
                    tracker: Arc::clone(&self.tracker),
                    released: AtomicBool::new(false),
                }))
            }
            Some(ConnectStep::Fail(err)) => Err(err),
            None => Err(TransportError::Connect("no scripted connection".into())),
        }
    }
}

/// Handle given to the caller; releases its live slot on the first close.
struct TrackedConnection {
    inner: Arc<MockConnection>,
    tracker: Arc<HandleTracker>,
    released: AtomicBool,
}

#[async_trait]
impl Connection for TrackedConnection {
    async fn send(&self, payload: Vec<u8>) -> Result<(), TransportError> {
        self.inner.send(payload).await
    }

    async fn recv(&self) -> Result<Vec<u8>, TransportError> {
        self.inner.recv().await
    }

    async fn ping(&self) -> Result<(), TransportError> {
        self.inner.ping().await
    }

    async fn close(&self) {
        self.inner.close().await;
        if !self.released.swap(true, Ordering::AcqRel) {
            let _ = self.tracker.live.fetch_sub(1, Ordering::AcqRel);
        }
    }
}
