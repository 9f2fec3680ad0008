//! In-memory transport.
//!
//! Every connection made through a [`ChannelConnector`] hands the far end, a
//! [`ChannelPeer`], to whoever holds the connector's receiver. The peer plays
//! the gateway: it pushes frames to the client and reads what the client sent.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{Connector, Transport};
use crate::errors::TransportError;

/// Create a connected transport / peer pair.
pub fn pair() -> (ChannelTransport, ChannelPeer) {
    let (to_client, incoming) = mpsc::unbounded_channel();
    let (outgoing, from_client) = mpsc::unbounded_channel();
    (
        ChannelTransport {
            incoming,
            outgoing: Some(outgoing),
        },
        ChannelPeer {
            to_client: Some(to_client),
            from_client,
        },
    )
}

/// Connector producing in-memory transports.
#[derive(Clone, Debug)]
pub struct ChannelConnector {
    peers: mpsc::UnboundedSender<(String, ChannelPeer)>,
}

impl ChannelConnector {
    /// Create a connector and the receiver of `(url, peer)` for each
    /// connection it opens.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(String, ChannelPeer)>) {
        let (peers, rx) = mpsc::unbounded_channel();
        (Self { peers }, rx)
    }
}

#[async_trait]
impl Connector for ChannelConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>, TransportError> {
        let (transport, peer) = pair();
        self.peers
            .send((url.to_string(), peer))
            .map_err(|_| TransportError::Closed)?;
        Ok(Box::new(transport))
    }
}

/// Client side of an in-memory connection.
#[derive(Debug)]
pub struct ChannelTransport {
    incoming: mpsc::UnboundedReceiver<String>,
    outgoing: Option<mpsc::UnboundedSender<String>>,
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        let tx = self.outgoing.as_ref().ok_or(TransportError::Closed)?;
        tx.send(text).map_err(|_| TransportError::Closed)
    }

    async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        self.incoming.recv().await.map(Ok)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.incoming.close();
        self.outgoing = None;
        Ok(())
    }
}

/// Gateway side of an in-memory connection.
#[derive(Debug)]
pub struct ChannelPeer {
    to_client: Option<mpsc::UnboundedSender<String>>,
    from_client: mpsc::UnboundedReceiver<String>,
}

impl ChannelPeer {
    /// Deliver a frame to the client. Returns `false` once the client closed.
    pub fn push(&self, text: impl Into<String>) -> bool {
        self.to_client
            .as_ref()
            .is_some_and(|tx| tx.send(text.into()).is_ok())
    }

    /// Deliver a JSON frame to the client.
    pub fn push_json(&self, frame: &serde_json::Value) -> bool {
        self.push(frame.to_string())
    }

    /// Next frame the client sent, `None` once the client closed.
    pub async fn next_sent(&mut self) -> Option<String> {
        self.from_client.recv().await
    }

    /// A frame the client already sent, without waiting.
    pub fn try_next_sent(&mut self) -> Option<String> {
        self.from_client.try_recv().ok()
    }

    /// End the stream from the gateway side.
    pub fn close(&mut self) {
        self.to_client = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frames_flow_both_ways() {
        let (mut transport, mut peer) = pair();
        assert!(peer.push("from-gateway"));
        assert_eq!(transport.recv().await.unwrap().unwrap(), "from-gateway");

        transport.send("from-client".into()).await.unwrap();
        assert_eq!(peer.next_sent().await.as_deref(), Some("from-client"));
        assert!(peer.try_next_sent().is_none());
    }

    #[tokio::test]
    async fn peer_close_ends_stream() {
        let (mut transport, mut peer) = pair();
        assert!(peer.push("last"));
        peer.close();
        assert_eq!(transport.recv().await.unwrap().unwrap(), "last");
        assert!(transport.recv().await.is_none());
        assert!(!peer.push("late"));
    }

    #[tokio::test]
    async fn client_close_is_idempotent() {
        let (mut transport, mut peer) = pair();
        transport.close().await.unwrap();
        transport.close().await.unwrap();
        assert!(transport.send("x".into()).await.is_err());
        assert!(peer.next_sent().await.is_none());
        assert!(!peer.push("ignored"));
    }

    #[tokio::test]
    async fn connector_hands_out_peers() {
        let (connector, mut peers) = ChannelConnector::new();
        let mut transport = connector.connect("wss://gateway.test").await.unwrap();
        let (url, peer) = peers.recv().await.unwrap();
        assert_eq!(url, "wss://gateway.test");
        assert!(peer.push("hi"));
        assert_eq!(transport.recv().await.unwrap().unwrap(), "hi");
    }
}
