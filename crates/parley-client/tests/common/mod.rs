//! Shared harness: a wiremock API plus an in-memory gateway.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use parley_client::transport::{ChannelConnector, ChannelPeer};
use parley_client::{Client, ClientConfig, Event};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TIMEOUT: Duration = Duration::from_secs(5);
pub const GATEWAY_URL: &str = "wss://gateway.test/";

pub struct Harness {
    pub server: MockServer,
    pub client: Client,
    pub peers: mpsc::UnboundedReceiver<(String, ChannelPeer)>,
}

/// API that accepts any login and points at [`GATEWAY_URL`].
pub async fn harness() -> Harness {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "tok"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gateway"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"url": GATEWAY_URL})))
        .mount(&server)
        .await;
    bare_harness(server)
}

/// Client against `server` with nothing mounted by the harness.
pub fn bare_harness(server: MockServer) -> Harness {
    let (connector, peers) = ChannelConnector::new();
    let config = ClientConfig {
        api_base: server.uri(),
        ..ClientConfig::default()
    };
    let client = Client::with_connector(config, Arc::new(connector));
    Harness {
        server,
        client,
        peers,
    }
}

impl Harness {
    /// Log in, start `connect` on its own task and consume the handshake.
    pub async fn connect(&mut self) -> (ChannelPeer, JoinHandle<parley_client::Result<()>>) {
        self.client.authenticate("me@example.com", "hunter2").await.unwrap();
        self.open().await
    }

    /// Start `connect` for an already logged-in client.
    pub async fn open(&mut self) -> (ChannelPeer, JoinHandle<parley_client::Result<()>>) {
        let client = self.client.clone();
        let task = tokio::spawn(async move { client.connect().await });
        let (url, mut peer) = timeout(TIMEOUT, self.peers.recv()).await.unwrap().unwrap();
        assert_eq!(url, GATEWAY_URL);

        let identify = parse(&timeout(TIMEOUT, peer.next_sent()).await.unwrap().unwrap());
        assert_eq!(identify["op"], 2);
        assert_eq!(identify["d"]["token"], "tok");
        (peer, task)
    }

    /// Connect and deliver READY, returning once the store reflects it.
    pub async fn ready(&mut self) -> (ChannelPeer, JoinHandle<parley_client::Result<()>>) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        self.client
            .on("ready", move |_event: Event| {
                let tx = tx.clone();
                async move {
                    let _ = tx.send(());
                    anyhow::Ok(())
                }
            })
            .unwrap();
        let (peer, task) = self.connect().await;
        assert!(peer.push_json(&ready_frame(45_000)));
        timeout(TIMEOUT, rx.recv()).await.unwrap().unwrap();
        (peer, task)
    }
}

pub fn parse(text: &str) -> Value {
    serde_json::from_str(text).unwrap()
}

pub fn dispatch(event: &str, data: Value) -> Value {
    json!({"op": 0, "t": event, "d": data})
}

/// READY for user `1` in server `100` (channel `10`), with an open private
/// channel `70` to user `7`.
pub fn ready_frame(heartbeat_ms: u64) -> Value {
    dispatch(
        "READY",
        json!({
            "heartbeat_interval": heartbeat_ms,
            "user": {"id": "1", "username": "me", "discriminator": "0001"},
            "guilds": [{
                "id": "100",
                "name": "guild",
                "owner_id": "1",
                "channels": [{"id": "10", "name": "general", "type": "text"}],
                "members": [{"user": {"id": "1", "username": "me"}, "roles": []}],
                "roles": []
            }],
            "private_channels": [
                {"id": "70", "recipient": {"id": "7", "username": "pal"}}
            ]
        }),
    )
}

pub fn message_json(id: &str, channel_id: &str, content: &str) -> Value {
    json!({
        "id": id,
        "channel_id": channel_id,
        "author": {"id": "2", "username": "other"},
        "content": content
    })
}
