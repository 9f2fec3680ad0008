//! Streaming transport abstraction.
//!
//! The receive loop only needs to send text, receive text, and close.
//! [`ws`] implements that over a real WebSocket; [`channel`] implements it
//! in memory so the lifecycle can be driven deterministically.

use async_trait::async_trait;

use crate::errors::TransportError;

pub mod channel;
pub mod ws;

pub use channel::{ChannelConnector, ChannelPeer, ChannelTransport};
pub use ws::{WsConnector, WsTransport};

/// A bidirectional text stream.
#[async_trait]
pub trait Transport: Send {
    /// Send one text frame.
    async fn send(&mut self, text: String) -> Result<(), TransportError>;

    /// Next text frame, `None` once the stream has ended.
    ///
    /// Must be cancel-safe: dropping the future before completion loses no
    /// frame.
    async fn recv(&mut self) -> Option<Result<String, TransportError>>;

    /// Close the stream. Closing twice is not an error.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Opens transports to a gateway URL.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connect to `url`.
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>, TransportError>;
}
