//! Connection supervisor: connect, run the worker pair, tear down, repeat.
//!
//! ```text
//! Connecting ──ok──▶ Running ──worker exit──▶ Draining ──▶ Cooldown ──▶ Connecting
//!     │                                          │
//!     ├─ address resolution ──▶ Cooldown          └─ transport failure ──▶ fatal
//!     └─ any other error ──▶ fatal
//! ```
//!
//! Exactly one connection handle is alive at a time. Draining always closes
//! the handle before the next `connect`, on every exit path including
//! shutdown. The shutdown token interrupts any suspension point.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::connectivity::{Connectivity, ConnectivityState};
use crate::errors::{ClientError, TransportError};
use crate::queue::MessageQueue;
use crate::transport::{Connection, Connector};
use crate::worker::{WorkerExit, WorkerKind, Workers};

/// How one lifecycle ended.
#[derive(Debug, PartialEq, Eq)]
enum LifecycleExit {
    Shutdown,
    Worker(WorkerKind, WorkerExit),
}

/// What the supervisor does after a failed `connect`.
#[derive(Debug, PartialEq, Eq)]
enum ConnectFailure {
    Retry,
    Fatal,
}

fn classify_connect_error(err: &TransportError) -> ConnectFailure {
    if err.is_address_resolution() {
        ConnectFailure::Retry
    } else {
        ConnectFailure::Fatal
    }
}

/// Owns the connectivity writer and drives lifecycles until shutdown or a
/// fatal error.
pub(crate) struct Supervisor {
    pub url: String,
    pub config: ClientConfig,
    pub connector: Arc<dyn Connector>,
    pub outbound: MessageQueue,
    pub inbound: MessageQueue,
    pub connectivity: ConnectivityState,
    pub shutdown: CancellationToken,
}

impl Supervisor {
    pub async fn run(self) -> Result<(), ClientError> {
        let mut attempt: u64 = 0;

        loop {
            if self.shutdown.is_cancelled() {
                return self.stopped();
            }
            attempt += 1;
            debug!(attempt, url = %self.url, "connecting");

            let connected = tokio::select! {
                biased;
                () = self.shutdown.cancelled() => return self.stopped(),
                result = self.connector.connect(&self.url) => result,
            };

            let conn = match connected {
                Ok(conn) => conn,
                Err(err) => match classify_connect_error(&err) {
                    ConnectFailure::Retry => {
                        self.connectivity.set(Connectivity::Disconnected);
                        warn!(
                            attempt,
                            error = %err,
                            cooldown_ms = self.cooldown_ms(),
                            "address resolution failed, retrying after cooldown"
                        );
                        if !self.cooldown().await {
                            return self.stopped();
                        }
                        continue;
                    }
                    ConnectFailure::Fatal => {
                        self.connectivity.set(Connectivity::Disconnected);
                        error!(attempt, url = %self.url, error = %err, "connect failed, giving up");
                        return Err(ClientError::Connect {
                            url: self.url.clone(),
                            source: err,
                        });
                    }
                },
            };

            let lifecycle_id = Uuid::now_v7().to_string();
            self.connectivity.set(Connectivity::Connected);
            info!(%lifecycle_id, attempt, url = %self.url, "connection established");

            let exit = self.run_lifecycle(conn.as_ref(), &lifecycle_id).await;
            conn.close().await;
            drop(conn);

            match exit {
                LifecycleExit::Shutdown => return self.stopped(),
                LifecycleExit::Worker(worker, WorkerExit::LivenessLost) => {
                    info!(
                        %lifecycle_id,
                        %worker,
                        cooldown_ms = self.cooldown_ms(),
                        "connection lost, reconnecting after cooldown"
                    );
                    if !self.cooldown().await {
                        return self.stopped();
                    }
                }
                LifecycleExit::Worker(worker, WorkerExit::QueueClosed) => {
                    info!(%lifecycle_id, %worker, "outbound queue closed, stopping");
                    return self.stopped();
                }
                LifecycleExit::Worker(worker, WorkerExit::Failed(err)) => {
                    self.connectivity.set(Connectivity::Disconnected);
                    error!(%lifecycle_id, %worker, error = %err, "connection lifecycle failed, giving up");
                    return Err(ClientError::Lifecycle(err));
                }
            }
        }
    }

    /// Run both workers until the first exits or shutdown is requested.
    /// The losing futures are dropped, which cancels them.
    async fn run_lifecycle(&self, conn: &dyn Connection, lifecycle_id: &str) -> LifecycleExit {
        let workers = Workers {
            conn,
            config: &self.config,
            connectivity: &self.connectivity,
            lifecycle_id,
        };

        tokio::select! {
            () = self.shutdown.cancelled() => LifecycleExit::Shutdown,
            exit = workers.run_send(&self.outbound) => LifecycleExit::Worker(WorkerKind::Send, exit),
            exit = workers.run_recv(&self.inbound) => LifecycleExit::Worker(WorkerKind::Recv, exit),
        }
    }

    /// Sleep the reconnect cooldown. Returns `false` if shutdown cut it short.
    async fn cooldown(&self) -> bool {
        tokio::select! {
            () = self.shutdown.cancelled() => false,
            () = tokio::time::sleep(self.config.reconnect_cooldown) => true,
        }
    }

    fn cooldown_ms(&self) -> u64 {
        u64::try_from(self.config.reconnect_cooldown.as_millis()).unwrap_or(u64::MAX)
    }

    fn stopped(&self) -> Result<(), ClientError> {
        self.connectivity.set(Connectivity::Disconnected);
        info!(url = %self.url, "supervisor stopped");
        Ok(())
    }
}
