//! # tether-client
//!
//! A WebSocket chat session that keeps itself alive.
//!
//! - **Supervisor**: connects, runs the worker pair, tears down, and
//!   reconnects after a cooldown; name-resolution failures are retried,
//!   anything else unexpected is fatal
//! - **Workers**: one drains the outbound queue onto the connection, the
//!   other moves inbound frames onto the inbound queue; a timed-out or closed
//!   I/O operation triggers a liveness probe before anything is torn down
//! - **Queues**: unbounded FIFO [`MessageQueue`]s that survive reconnects
//! - **Connectivity**: a single `Connected | Disconnected` flag readable
//!   through [`ConnectivityWatch`]
//! - **Transport**: [`Connector`] / [`Connection`] traits with a
//!   `tokio-tungstenite` implementation and a scripted mock
//!
//! [`TetherClient`] ties these together for the application.

#![deny(unsafe_code)]

pub mod client;
pub mod config;
pub mod connectivity;
pub mod errors;
pub mod queue;
pub mod shutdown;
mod supervisor;
pub mod transport;
pub mod worker;

pub use client::TetherClient;
pub use config::ClientConfig;
pub use connectivity::{Connectivity, ConnectivityState, ConnectivityWatch};
pub use errors::{ClientError, TransportError};
pub use queue::{Delivery, MessageQueue};
pub use shutdown::ShutdownCoordinator;
pub use transport::{Connection, Connector};
