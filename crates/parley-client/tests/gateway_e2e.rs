//! End-to-end lifecycle tests: wiremock for REST, an in-memory gateway for
//! the stream.

#![allow(missing_docs)]

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use assert_matches::assert_matches;
use parley_client::{ClientError, Event, EventKind, HandlerFailure, Phase};
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::{Instant, timeout};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{TIMEOUT, bare_harness, dispatch, harness, message_json, parse, ready_frame};

#[tokio::test]
async fn ready_starts_heartbeat_after_one_interval() {
    let mut h = harness().await;
    let (mut peer, task) = h.connect().await;
    assert_eq!(h.client.phase(), Phase::HandshakeSent);

    tokio::time::pause();
    let start = Instant::now();
    assert!(peer.push_json(&ready_frame(45_000)));

    let frame = parse(&peer.next_sent().await.unwrap());
    assert_eq!(start.elapsed(), Duration::from_secs(45));
    assert_eq!(frame["op"], 1);
    assert!(frame["d"].is_i64());
    assert!(peer.try_next_sent().is_none());

    assert_eq!(h.client.phase(), Phase::Streaming);
    assert_eq!(h.client.heartbeat_interval(), Some(Duration::from_secs(45)));
    assert_eq!(h.client.user().unwrap().id, "1");

    h.client.close().await;
    task.await.unwrap().unwrap();
    assert!(h.client.is_closed());
}

#[tokio::test]
async fn no_heartbeat_after_close() {
    let mut h = harness().await;
    let (mut peer, task) = h.connect().await;

    tokio::time::pause();
    assert!(peer.push_json(&ready_frame(10_000)));
    assert_eq!(parse(&peer.next_sent().await.unwrap())["op"], 1);

    h.client.close().await;
    task.await.unwrap().unwrap();

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(peer.try_next_sent().is_none());
    assert!(peer.next_sent().await.is_none());
}

#[tokio::test]
async fn second_ready_replaces_heartbeat() {
    let mut h = harness().await;
    let (mut peer, task) = h.connect().await;

    tokio::time::pause();
    let start = Instant::now();
    assert!(peer.push_json(&ready_frame(100_000)));
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(peer.push_json(&ready_frame(5_000)));

    let _ = peer.next_sent().await.unwrap();
    assert_eq!(start.elapsed(), Duration::from_secs(6));
    let _ = peer.next_sent().await.unwrap();
    assert_eq!(start.elapsed(), Duration::from_secs(11));
    assert_eq!(h.client.heartbeat_interval(), Some(Duration::from_secs(5)));

    h.client.close().await;
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn fractional_heartbeat_interval_is_honoured() {
    let mut h = harness().await;
    let (mut peer, task) = h.connect().await;

    tokio::time::pause();
    let start = Instant::now();
    let mut ready = ready_frame(0);
    ready["d"]["heartbeat_interval"] = json!(41_250.0);
    assert!(peer.push_json(&ready));

    assert_eq!(parse(&peer.next_sent().await.unwrap())["op"], 1);
    assert_eq!(start.elapsed(), Duration::from_millis(41_250));
    assert_eq!(h.client.heartbeat_interval(), Some(Duration::from_millis(41_250)));

    h.client.close().await;
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn login_rejected_keeps_phase() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&server)
        .await;
    let h = bare_harness(server);

    assert_matches!(
        h.client.authenticate("me@example.com", "wrong").await,
        Err(ClientError::Auth)
    );
    assert_eq!(h.client.phase(), Phase::Unauthenticated);
    assert!(!h.client.is_logged_in());
}

#[tokio::test]
async fn connect_before_login_touches_nothing() {
    let h = harness().await;
    assert_matches!(h.client.connect().await, Err(ClientError::NotAuthenticated));
    assert_eq!(h.client.phase(), Phase::Unauthenticated);
    assert!(h.server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn discovery_failure_is_endpoint_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "tok"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gateway"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let h = bare_harness(server);
    h.client.authenticate("me@example.com", "pw").await.unwrap();

    assert_matches!(
        h.client.connect().await,
        Err(ClientError::EndpointUnavailable { status: 503 })
    );
    assert_eq!(h.client.phase(), Phase::Authenticated);
    assert!(h.client.gateway().is_none());
}

#[tokio::test]
async fn message_without_callback_lands_in_history() {
    let mut h = harness().await;
    let (mut peer, task) = h.connect().await;

    assert!(peer.push_json(&ready_frame(45_000)));
    assert!(peer.push_json(&dispatch("MESSAGE_CREATE", message_json("500", "10", "hello"))));
    peer.close();
    timeout(TIMEOUT, task).await.unwrap().unwrap().unwrap();

    let messages = h.client.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].content, "hello");
    assert!(h.client.is_closed());
    assert_eq!(h.client.gateway().as_deref(), Some(common::GATEWAY_URL));
}

#[tokio::test]
async fn failing_callback_does_not_stop_stream() {
    let mut h = harness().await;
    let (seen_tx, mut seen) = mpsc::unbounded_channel();
    h.client
        .on("message_create", move |event: Event| {
            let seen_tx = seen_tx.clone();
            async move {
                let id = event.payload()["id"].as_str().unwrap_or_default().to_string();
                let _ = seen_tx.send(id.clone());
                anyhow::ensure!(id != "1", "poisoned message {id}");
                anyhow::Ok(())
            }
        })
        .unwrap();
    let (failed_tx, mut failed) = mpsc::unbounded_channel();
    h.client.set_error_handler(move |event: Event, failure: HandlerFailure| {
        let failed_tx = failed_tx.clone();
        async move {
            let _ = failed_tx.send((event.name(), event.payload()["id"].clone(), failure));
            anyhow::Ok(())
        }
    });

    let (mut peer, task) = h.connect().await;
    for id in ["1", "2", "3"] {
        assert!(peer.push_json(&dispatch("MESSAGE_CREATE", message_json(id, "10", "x"))));
    }
    peer.close();
    timeout(TIMEOUT, task).await.unwrap().unwrap().unwrap();
    h.client.wait_for_callbacks().await;

    let mut ids = Vec::new();
    while let Ok(id) = seen.try_recv() {
        ids.push(id);
    }
    ids.sort();
    assert_eq!(ids, ["1", "2", "3"]);

    let (name, id, failure) = failed.try_recv().unwrap();
    assert_eq!(name, "message_create");
    assert_eq!(id, "1");
    assert_matches!(failure, HandlerFailure::Error(e) if e.to_string() == "poisoned message 1");
    assert!(failed.try_recv().is_err());
    assert_eq!(h.client.messages().len(), 3);
}

#[tokio::test]
async fn socket_response_sees_every_decoded_frame() {
    let mut h = harness().await;
    let frames = Arc::new(AtomicUsize::new(0));
    let unknown = Arc::new(AtomicUsize::new(0));
    {
        let frames = Arc::clone(&frames);
        h.client.on_event(EventKind::SocketResponse, move |_event: Event| {
            let frames = Arc::clone(&frames);
            async move {
                let _ = frames.fetch_add(1, Ordering::SeqCst);
                anyhow::Ok(())
            }
        });
    }
    {
        let unknown = Arc::clone(&unknown);
        h.client
            .on("typing_start", move |_event: Event| {
                let unknown = Arc::clone(&unknown);
                async move {
                    let _ = unknown.fetch_add(1, Ordering::SeqCst);
                    anyhow::Ok(())
                }
            })
            .unwrap();
    }

    let (mut peer, task) = h.connect().await;
    assert!(peer.push_json(&dispatch("SOMETHING_NEW", json!({}))));
    assert!(peer.push_json(&dispatch("typing_start", json!({}))));
    assert!(peer.push_json(&json!({"op": 11, "d": null})));
    assert!(peer.push("not json at all"));
    peer.close();
    timeout(TIMEOUT, task).await.unwrap().unwrap().unwrap();
    h.client.wait_for_callbacks().await;

    assert_eq!(frames.load(Ordering::SeqCst), 3);
    assert_eq!(unknown.load(Ordering::SeqCst), 0);
    assert!(h.client.is_closed());
}

#[tokio::test]
async fn close_is_idempotent_and_reconnect_allowed() {
    let mut h = harness().await;
    let (_peer, task) = h.connect().await;

    assert_matches!(h.client.connect().await, Err(ClientError::AlreadyConnected));

    h.client.close().await;
    h.client.close().await;
    timeout(TIMEOUT, task).await.unwrap().unwrap().unwrap();
    assert_eq!(h.client.phase(), Phase::Closed);

    let (mut peer, task) = h.open().await;
    assert_eq!(h.client.phase(), Phase::HandshakeSent);
    peer.close();
    timeout(TIMEOUT, task).await.unwrap().unwrap().unwrap();
    assert!(h.client.is_closed());
}

#[tokio::test]
async fn logout_forgets_session() {
    let mut h = harness().await;
    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&h.server)
        .await;

    let (_peer, task) = h.connect().await;
    h.client.logout().await.unwrap();
    timeout(TIMEOUT, task).await.unwrap().unwrap().unwrap();

    assert_eq!(h.client.phase(), Phase::Unauthenticated);
    assert!(!h.client.is_logged_in());
    assert!(h.client.email().is_none());
    assert_matches!(h.client.connect().await, Err(ClientError::NotAuthenticated));
}

#[tokio::test]
async fn logout_rejected_still_forgets_session() {
    let mut h = harness().await;
    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&h.server)
        .await;

    let (mut peer, task) = h.connect().await;
    assert_matches!(
        h.client.logout().await,
        Err(ClientError::Protocol { status: 401, .. })
    );
    timeout(TIMEOUT, task).await.unwrap().unwrap().unwrap();
    assert!(timeout(TIMEOUT, peer.next_sent()).await.unwrap().is_none());

    assert_eq!(h.client.phase(), Phase::Unauthenticated);
    assert!(!h.client.is_logged_in());
    assert_matches!(h.client.connect().await, Err(ClientError::NotAuthenticated));
}

#[tokio::test]
async fn dropped_connect_releases_the_stream() {
    let mut h = harness().await;
    h.client.authenticate("me@example.com", "pw").await.unwrap();

    let mut peer = {
        let connecting = h.client.connect();
        tokio::pin!(connecting);
        let (_url, mut peer) = tokio::select! {
            finished = &mut connecting => panic!("connect returned early: {finished:?}"),
            opened = h.peers.recv() => opened.unwrap(),
        };
        let identify = tokio::select! {
            finished = &mut connecting => panic!("connect returned early: {finished:?}"),
            sent = peer.next_sent() => sent.unwrap(),
        };
        assert_eq!(parse(&identify)["op"], 2);
        assert!(peer.push_json(&ready_frame(45_000)));

        assert!(
            timeout(Duration::from_millis(200), &mut connecting)
                .await
                .is_err()
        );
        assert!(h.client.phase().is_open());
        peer
    };

    assert_eq!(h.client.phase(), Phase::Closed);
    assert!(timeout(TIMEOUT, peer.next_sent()).await.unwrap().is_none());

    h.client.close().await;
    let (mut peer, task) = h.open().await;
    assert_eq!(h.client.phase(), Phase::HandshakeSent);
    peer.close();
    timeout(TIMEOUT, task).await.unwrap().unwrap().unwrap();
    assert!(h.client.is_closed());
}
