//! Process-wide connectivity flag.
//!
//! [`ConnectivityState`] is the single writer. It is owned by the
//! supervisor and lent to the workers of the running lifecycle.
//! [`ConnectivityWatch`] is the cloneable read side handed to the application,
//! which uses it to decide whether to keep waiting on the inbound queue.

use std::fmt;

use tokio::sync::watch;
use tracing::info;

/// Whether the session is currently usable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Connectivity {
    /// A connection is established and its workers are running.
    Connected,
    /// No usable connection.
    #[default]
    Disconnected,
}

impl fmt::Display for Connectivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
        })
    }
}

/// Writer side of the connectivity flag. Starts `Disconnected`.
#[derive(Debug)]
pub struct ConnectivityState {
    tx: watch::Sender<Connectivity>,
}

impl ConnectivityState {
    /// Create the flag and its first read handle.
    pub fn new() -> (Self, ConnectivityWatch) {
        let (tx, rx) = watch::channel(Connectivity::Disconnected);
        (Self { tx }, ConnectivityWatch { rx })
    }

    /// Publish a new state. Last write wins; transitions are logged.
    pub fn set(&self, state: Connectivity) {
        let previous = self.tx.send_replace(state);
        if previous != state {
            info!(from = %previous, to = %state, "connectivity changed");
        }
    }

    /// Current state.
    pub fn get(&self) -> Connectivity {
        *self.tx.borrow()
    }

    /// A new read handle.
    pub fn watch(&self) -> ConnectivityWatch {
        ConnectivityWatch {
            rx: self.tx.subscribe(),
        }
    }
}

/// Read-only, cloneable view of the connectivity flag.
#[derive(Clone, Debug)]
pub struct ConnectivityWatch {
    rx: watch::Receiver<Connectivity>,
}

impl ConnectivityWatch {
    /// Current state.
    pub fn current(&self) -> Connectivity {
        *self.rx.borrow()
    }

    /// Whether the session is currently connected.
    pub fn is_connected(&self) -> bool {
        self.current() == Connectivity::Connected
    }

    /// Wait for the next published state.
    ///
    /// Returns `None` once the writer is gone (the supervisor has stopped).
    pub async fn changed(&mut self) -> Option<Connectivity> {
        self.rx.changed().await.ok()?;
        Some(*self.rx.borrow_and_update())
    }

    /// Wait until the state equals `target`.
    ///
    /// Returns `false` if the writer is dropped first.
    pub async fn wait_for(&mut self, target: Connectivity) -> bool {
        self.rx.wait_for(|state| *state == target).await.is_ok()
    }
}
