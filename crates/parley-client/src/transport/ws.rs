//! WebSocket transport over `tokio-tungstenite`.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info};

use super::{Connector, Transport};
use crate::errors::TransportError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connects over `ws://` or `wss://`.
#[derive(Clone, Copy, Debug, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>, TransportError> {
        let (stream, response) = connect_async(url).await?;
        info!(%url, status = %response.status(), "websocket connected");
        Ok(Box::new(WsTransport { stream }))
    }
}

/// An open WebSocket.
pub struct WsTransport {
    stream: WsStream,
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.stream.send(Message::Text(text.into())).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => return Some(Ok(text)),
                    Err(_) => debug!(len = bytes.len(), "skipping non-UTF-8 binary frame"),
                },
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "websocket close frame received");
                    return None;
                }
                // Pings are answered by tungstenite itself.
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {}
                Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => return None,
                Err(e) => return Some(Err(e.into())),
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        match self.stream.close(None).await {
            Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
