//! The send/recv worker pair that moves traffic over one connection.
//!
//! Both workers share the lifecycle's connection handle and run until one of
//! them exits. A timed-out or closed I/O operation is never fatal on its own:
//! the worker first sends a liveness probe. An acknowledged probe means the
//! stall was transient and the loop continues; a failed probe marks the
//! session `Disconnected` and ends the lifecycle.

use std::fmt;
use std::time::Duration;

use tether_core::codec;
use tracing::{debug, trace, warn};

use crate::config::ClientConfig;
use crate::connectivity::{Connectivity, ConnectivityState};
use crate::errors::TransportError;
use crate::queue::MessageQueue;
use crate::transport::Connection;

/// Which direction a worker moves traffic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerKind {
    /// Outbound queue to connection.
    Send,
    /// Connection to inbound queue.
    Recv,
}

impl fmt::Display for WorkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Send => "send",
            Self::Recv => "recv",
        })
    }
}

/// Why a worker stopped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkerExit {
    /// A stall was followed by a failed liveness probe. Connectivity has
    /// already been set to `Disconnected`.
    LivenessLost,
    /// The outbound queue can no longer yield messages.
    QueueClosed,
    /// A transport error outside the probe path.
    Failed(TransportError),
}

/// Result of a liveness probe.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The peer acknowledged within the ping timeout.
    Ack,
    /// The ping errored or was not acknowledged in time.
    Failed(TransportError),
}

/// Ping the peer and wait at most `ping_timeout` for the acknowledgement.
pub async fn probe(conn: &dyn Connection, ping_timeout: Duration) -> ProbeOutcome {
    match tokio::time::timeout(ping_timeout, conn.ping()).await {
        Ok(Ok(())) => ProbeOutcome::Ack,
        Ok(Err(err)) => ProbeOutcome::Failed(err),
        Err(_) => ProbeOutcome::Failed(TransportError::Timeout),
    }
}

/// Bound `op` by `limit`, mapping expiry to [`TransportError::Timeout`].
async fn bounded<T>(
    limit: Duration,
    op: impl Future<Output = Result<T, TransportError>>,
) -> Result<T, TransportError> {
    tokio::time::timeout(limit, op)
        .await
        .unwrap_or(Err(TransportError::Timeout))
}

/// Everything a worker borrows from its lifecycle.
pub(crate) struct Workers<'a> {
    pub conn: &'a dyn Connection,
    pub config: &'a ClientConfig,
    pub connectivity: &'a ConnectivityState,
    pub lifecycle_id: &'a str,
}

impl Workers<'_> {
    /// Drain the outbound queue onto the connection, one message at a time.
    ///
    /// A dequeued message is consumed whatever the send outcome. If its send
    /// stalls and the probe is acknowledged, it is not retried. The message
    /// counts as in flight on `outbound` until its send has finished.
    pub async fn run_send(&self, outbound: &MessageQueue) -> WorkerExit {
        loop {
            let Some(delivery) = outbound.take().await else {
                return WorkerExit::QueueClosed;
            };
            let message = delivery.message();
            let payload = match codec::encode(message) {
                Ok(payload) => payload,
                Err(err) => {
                    warn!(lifecycle_id = self.lifecycle_id, error = %err, "dropping unencodable message");
                    continue;
                }
            };

            match bounded(self.config.write_timeout, self.conn.send(payload)).await {
                Ok(()) => trace!(lifecycle_id = self.lifecycle_id, "message sent"),
                Err(err) if err.is_stall() => {
                    warn!(
                        lifecycle_id = self.lifecycle_id,
                        sender = message.sender(),
                        "message may not have been delivered"
                    );
                    if let Some(exit) = self.on_stall(WorkerKind::Send, &err).await {
                        return exit;
                    }
                }
                Err(err) => return self.fail(WorkerKind::Send, err),
            }
        }
    }

    /// Move inbound frames onto the inbound queue in arrival order.
    ///
    /// Frames that do not decode are logged and dropped.
    pub async fn run_recv(&self, inbound: &MessageQueue) -> WorkerExit {
        loop {
            match bounded(self.config.read_timeout, self.conn.recv()).await {
                Ok(frame) => match codec::decode(&frame) {
                    Ok(message) => inbound.push(message),
                    Err(err) => {
                        warn!(
                            lifecycle_id = self.lifecycle_id,
                            bytes = frame.len(),
                            error = %err,
                            "dropping malformed frame"
                        );
                    }
                },
                Err(err) if err.is_stall() => {
                    if let Some(exit) = self.on_stall(WorkerKind::Recv, &err).await {
                        return exit;
                    }
                }
                Err(err) => return self.fail(WorkerKind::Recv, err),
            }
        }
    }

    /// Probe after a stall. `None` means keep going.
    async fn on_stall(&self, worker: WorkerKind, stall: &TransportError) -> Option<WorkerExit> {
        debug!(lifecycle_id = self.lifecycle_id, %worker, error = %stall, "I/O stalled, probing liveness");
        match probe(self.conn, self.config.ping_timeout).await {
            ProbeOutcome::Ack => {
                debug!(lifecycle_id = self.lifecycle_id, %worker, "probe acknowledged");
                None
            }
            ProbeOutcome::Failed(err) => {
                self.connectivity.set(Connectivity::Disconnected);
                debug!(lifecycle_id = self.lifecycle_id, %worker, error = %err, "probe failed, connection lost");
                Some(WorkerExit::LivenessLost)
            }
        }
    }

    fn fail(&self, worker: WorkerKind, err: TransportError) -> WorkerExit {
        self.connectivity.set(Connectivity::Disconnected);
        debug!(lifecycle_id = self.lifecycle_id, %worker, error = %err, "transport failed");
        WorkerExit::Failed(err)
    }
}
