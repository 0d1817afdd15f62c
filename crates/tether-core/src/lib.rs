//! # tether-core
//!
//! Foundation types shared by every tether crate:
//!
//! - **Messages**: [`Message`], the immutable unit of chat traffic
//! - **Codec**: [`codec::encode`] / [`codec::decode`] between messages and wire payloads
//! - **Errors**: [`CodecError`] via `thiserror`
//! - **Logging**: [`logging::init_subscriber`] for the `tracing` subscriber

#![deny(unsafe_code)]

pub mod codec;
pub mod errors;
pub mod logging;
pub mod message;

pub use errors::CodecError;
pub use message::Message;
