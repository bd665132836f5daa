//! Persistent channel (`/ws`) protocol tests.

use std::sync::atomic::Ordering;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

mod common;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn connect(proxy: &common::TestProxy) -> Socket {
    let (socket, _) = connect_async(proxy.ws_url()).await.unwrap();
    socket
}

async fn send(socket: &mut Socket, frame: Value) {
    socket.send(Message::Text(frame.to_string().into())).await.unwrap();
}

/// Next text frame as JSON, skipping control frames.
async fn recv(socket: &mut Socket) -> Value {
    loop {
        match socket.next().await.unwrap().unwrap() {
            Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame: {:?}", other),
        }
    }
}

#[tokio::test]
async fn ping_needs_no_auth() {
    let proxy = common::start_proxy(|_| {}).await;
    let mut socket = connect(&proxy).await;

    send(&mut socket, json!({"type": "ping"})).await;
    assert_eq!(recv(&mut socket).await, json!({"status": "pong"}));
}

#[tokio::test]
async fn query_before_auth_is_rejected_without_backend_call() {
    let proxy = common::start_proxy(|_| {}).await;
    let mut socket = connect(&proxy).await;

    send(&mut socket, json!({"type": "query", "query": "{ q(func: has(name)) { uid } }"})).await;
    assert_eq!(recv(&mut socket).await, json!({"error": "unauthorized: authenticate first"}));
    assert_eq!(proxy.node.log.calls(), 0);
}

#[tokio::test]
async fn auth_then_query() {
    let proxy = common::start_proxy(|_| {}).await;
    let mut socket = connect(&proxy).await;

    send(&mut socket, json!({"type": "auth", "token": common::TOKEN})).await;
    assert_eq!(recv(&mut socket).await, json!({"status": "authenticated"}));

    send(&mut socket, json!({"type": "query", "query": "{ q(func: has(name)) { uid name } }"})).await;
    let reply = recv(&mut socket).await;
    assert_eq!(reply["q"][0]["name"], "Julian");

    send(
        &mut socket,
        json!({"type": "query", "query": "{ q(func: has(name)) { uid } }", "verbose": true}),
    )
    .await;
    let reply = recv(&mut socket).await;
    assert_eq!(reply["data"]["q"][0]["uid"], "0x1");
    assert_eq!(reply["latencyNs"], 35);
    assert_eq!(proxy.node.log.queries.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn verbose_mutation_reports_commit() {
    let proxy = common::start_proxy(|_| {}).await;
    let mut socket = connect(&proxy).await;

    send(&mut socket, json!({"type": "login", "token": common::TOKEN})).await;
    recv(&mut socket).await;

    send(
        &mut socket,
        json!({"type": "mutation", "mutation": "_:a <name> \"Julian\" .", "commitNow": true, "verbose": true}),
    )
    .await;
    let reply = recv(&mut socket).await;
    assert_eq!(reply["uids"]["a"], "0x2a");
    assert_eq!(reply["commitTs"], 13);
    assert_eq!(reply["predicates"], json!(["1-0-name"]));
    assert!(reply.get("data").is_some());
}

#[tokio::test]
async fn malformed_frames_keep_the_session() {
    let proxy = common::start_proxy(|_| {}).await;
    let mut socket = connect(&proxy).await;

    socket.send(Message::Text("not json".into())).await.unwrap();
    assert!(recv(&mut socket).await["error"].is_string());

    send(&mut socket, json!({"type": "mutation"})).await;
    assert!(recv(&mut socket).await["error"].is_string());

    send(&mut socket, json!({"type": "ping"})).await;
    assert_eq!(recv(&mut socket).await, json!({"status": "pong"}));
}

#[tokio::test]
async fn repeated_bad_tokens_close_the_channel() {
    let proxy = common::start_proxy(|_| {}).await;
    let mut socket = connect(&proxy).await;

    for _ in 0..3 {
        send(&mut socket, json!({"type": "auth", "token": "wrong"})).await;
        assert_eq!(recv(&mut socket).await, json!({"error": "invalid credentials"}));
    }

    match socket.next().await {
        Some(Ok(Message::Close(Some(frame)))) => assert_eq!(u16::from(frame.code), 1008),
        other => panic!("expected close frame, got {:?}", other),
    }
}
