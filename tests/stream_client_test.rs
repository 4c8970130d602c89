//! Integration tests for the websocket ingestion client against an in-process
//! acquisition service.

use std::net::SocketAddr;
use std::time::Duration;

use ecg_session_client::stream::{self, StreamCommand};
use ecg_session_client::{
    CommandPolicy, ConnectionStatus, Sample, StreamEvent, StreamSettings, StreamingClient,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{accept_async, tungstenite::Message, WebSocketStream};

const WAIT: Duration = Duration::from_secs(5);

fn settings(addr: SocketAddr) -> StreamSettings {
    let mut settings = StreamSettings::new(format!("ws://{addr}/ws"));
    settings.reconnect_delay = Duration::from_millis(50);
    settings
}

/// Accept the TCP connection only; the websocket handshake is left pending.
async fn accept_tcp(listener: &TcpListener) -> TcpStream {
    let (stream, _) = timeout(WAIT, listener.accept())
        .await
        .expect("client never connected")
        .unwrap();
    stream
}

async fn accept(listener: &TcpListener) -> WebSocketStream<TcpStream> {
    let stream = accept_tcp(listener).await;
    accept_async(stream).await.expect("handshake failed")
}

/// Skip status changes until the client reports it is connected.
async fn wait_connected(events: &mut mpsc::UnboundedReceiver<StreamEvent>) {
    loop {
        if let StreamEvent::Status(ConnectionStatus::Connected) = next_event(events).await {
            return;
        }
    }
}

/// Next text frame from the client, parsed as JSON.
async fn next_command(ws: &mut WebSocketStream<TcpStream>) -> serde_json::Value {
    loop {
        let message = timeout(WAIT, ws.next())
            .await
            .expect("no frame from client")
            .expect("client closed the socket")
            .unwrap();
        if let Ok(text) = message.to_text() {
            if !text.is_empty() {
                return serde_json::from_str(text).unwrap();
            }
        }
    }
}

async fn next_event(events: &mut mpsc::UnboundedReceiver<StreamEvent>) -> StreamEvent {
    timeout(WAIT, events.recv())
        .await
        .expect("no stream event")
        .expect("event queue closed")
}

/// Skip status changes until a disconnect is reported.
async fn wait_disconnected(events: &mut mpsc::UnboundedReceiver<StreamEvent>) {
    loop {
        if let StreamEvent::Status(ConnectionStatus::Disconnected(_)) = next_event(events).await {
            return;
        }
    }
}

/// A port with nothing listening on it.
async fn vacant_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

fn reading(time: f64, ecg: f64) -> Message {
    Message::text(json!({"event": "live_ecg_data", "data": {"time": time, "ecg": ecg}}).to_string())
}

#[tokio::test]
async fn test_commands_and_samples_flow() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let client = StreamingClient::spawn(settings(listener.local_addr().unwrap()));
    let mut events = client.take_events().unwrap();
    assert!(client.take_events().is_none());

    let mut ws = accept(&listener).await;
    assert_eq!(
        next_event(&mut events).await,
        StreamEvent::Status(ConnectionStatus::Connected)
    );

    client.send(StreamCommand::StartCollection);
    assert_eq!(next_command(&mut ws).await, json!({"event": "start_ecg"}));

    ws.send(reading(0.0, 410.0)).await.unwrap();
    ws.send(Message::text(r#"{"event":"heartbeat"}"#)).await.unwrap();
    ws.send(Message::text("not json")).await.unwrap();
    ws.send(reading(0.004, 415.5)).await.unwrap();
    ws.send(reading(0.008, 421.0)).await.unwrap();

    for expected in [
        Sample::new(0.0, 410.0),
        Sample::new(0.004, 415.5),
        Sample::new(0.008, 421.0),
    ] {
        assert_eq!(next_event(&mut events).await, StreamEvent::Sample(expected));
    }

    client.send(StreamCommand::StopCollection);
    assert_eq!(next_command(&mut ws).await, json!({"event": "stop_ecg"}));

    timeout(WAIT, client.shutdown()).await.unwrap();
}

#[tokio::test]
async fn test_command_held_until_reconnect() {
    let addr = vacant_addr().await;
    let client = StreamingClient::spawn(settings(addr));
    let mut events = client.take_events().unwrap();

    wait_disconnected(&mut events).await;
    client.send(StreamCommand::StartCollection);

    let listener = TcpListener::bind(addr).await.unwrap();
    let mut ws = accept(&listener).await;
    assert_eq!(next_command(&mut ws).await, json!({"event": "start_ecg"}));

    timeout(WAIT, client.shutdown()).await.unwrap();
}

#[tokio::test]
async fn test_held_commands_keep_newest_in_order() {
    let addr = vacant_addr().await;
    let mut settings = settings(addr);
    settings.max_queued_commands = 2;
    let client = StreamingClient::spawn(settings);
    let mut events = client.take_events().unwrap();

    wait_disconnected(&mut events).await;
    client.send(StreamCommand::StartCollection);
    client.send(StreamCommand::StopCollection);
    client.send(StreamCommand::StartCollection);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let listener = TcpListener::bind(addr).await.unwrap();
    let mut ws = accept(&listener).await;
    assert_eq!(next_command(&mut ws).await, json!({"event": "stop_ecg"}));
    assert_eq!(next_command(&mut ws).await, json!({"event": "start_ecg"}));

    wait_connected(&mut events).await;
    client.send(StreamCommand::StopCollection);
    assert_eq!(next_command(&mut ws).await, json!({"event": "stop_ecg"}));

    timeout(WAIT, client.shutdown()).await.unwrap();
}

#[tokio::test]
async fn test_drop_policy_applies_during_handshake() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let mut settings = settings(listener.local_addr().unwrap());
    settings.command_policy = CommandPolicy::Drop;
    let client = StreamingClient::spawn(settings);
    let mut events = client.take_events().unwrap();

    let pending = accept_tcp(&listener).await;
    client.send(StreamCommand::StartCollection);
    tokio::time::sleep(Duration::from_millis(200)).await;

    let mut ws = accept_async(pending).await.expect("handshake failed");
    wait_connected(&mut events).await;

    client.send(StreamCommand::StopCollection);
    assert_eq!(next_command(&mut ws).await, json!({"event": "stop_ecg"}));

    timeout(WAIT, client.shutdown()).await.unwrap();
}

#[tokio::test]
async fn test_queue_bound_applies_during_handshake() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let mut settings = settings(listener.local_addr().unwrap());
    settings.max_queued_commands = 1;
    let client = StreamingClient::spawn(settings);
    let mut events = client.take_events().unwrap();

    let pending = accept_tcp(&listener).await;
    client.send(StreamCommand::StartCollection);
    client.send(StreamCommand::StopCollection);
    client.send(StreamCommand::StartCollection);
    client.send(StreamCommand::StopCollection);
    tokio::time::sleep(Duration::from_millis(200)).await;

    let mut ws = accept_async(pending).await.expect("handshake failed");
    assert_eq!(next_command(&mut ws).await, json!({"event": "stop_ecg"}));

    wait_connected(&mut events).await;
    client.send(StreamCommand::StartCollection);
    assert_eq!(next_command(&mut ws).await, json!({"event": "start_ecg"}));

    timeout(WAIT, client.shutdown()).await.unwrap();
}

#[tokio::test]
async fn test_stalled_handshake_times_out_and_retries() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let mut settings = settings(listener.local_addr().unwrap());
    settings.connect_timeout = Duration::from_millis(100);
    let client = StreamingClient::spawn(settings);
    let mut events = client.take_events().unwrap();

    // Hold the socket open without ever answering the upgrade request.
    let _silent = accept_tcp(&listener).await;
    match next_event(&mut events).await {
        StreamEvent::Status(ConnectionStatus::Disconnected(reason)) => {
            assert!(reason.contains("handshake"), "unexpected reason: {reason}");
        }
        other => panic!("expected disconnect, got {other:?}"),
    }

    // The next attempt arrives after the reconnect delay.
    let mut ws = accept(&listener).await;
    wait_connected(&mut events).await;
    client.send(StreamCommand::StartCollection);
    assert_eq!(next_command(&mut ws).await, json!({"event": "start_ecg"}));

    timeout(WAIT, client.shutdown()).await.unwrap();
}

#[tokio::test]
async fn test_reconnects_after_server_closes() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let client = StreamingClient::spawn(settings(listener.local_addr().unwrap()));
    let mut events = client.take_events().unwrap();

    let mut first = accept(&listener).await;
    first.close(None).await.unwrap();
    wait_disconnected(&mut events).await;

    let mut second = accept(&listener).await;
    assert_eq!(
        next_event(&mut events).await,
        StreamEvent::Status(ConnectionStatus::Connected)
    );

    client.send(StreamCommand::StopCollection);
    assert_eq!(next_command(&mut second).await, json!({"event": "stop_ecg"}));

    timeout(WAIT, client.shutdown()).await.unwrap();
}

#[tokio::test]
async fn test_drop_policy_discards_offline_commands() {
    let addr = vacant_addr().await;
    let mut settings = settings(addr);
    settings.command_policy = CommandPolicy::Drop;
    settings.reconnect_delay = Duration::from_millis(300);
    let client = StreamingClient::spawn(settings);
    let mut events = client.take_events().unwrap();

    wait_disconnected(&mut events).await;
    client.send(StreamCommand::StartCollection);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let listener = TcpListener::bind(addr).await.unwrap();
    let mut ws = accept(&listener).await;

    client.send(StreamCommand::StopCollection);
    assert_eq!(next_command(&mut ws).await, json!({"event": "stop_ecg"}));

    timeout(WAIT, client.shutdown()).await.unwrap();
}

#[tokio::test]
async fn test_send_after_shutdown_does_not_panic() {
    let client = StreamingClient::spawn(settings(vacant_addr().await));
    timeout(WAIT, client.shutdown()).await.unwrap();

    assert!(client.is_closed());
    client.send(StreamCommand::StartCollection);
    client.send(StreamCommand::StopCollection);
}

#[tokio::test]
async fn test_shared_client_is_reused() {
    let addr = vacant_addr().await;
    let first = stream::shared(&settings(addr));
    let second = stream::shared(&StreamSettings::new("ws://192.0.2.1:1/ignored"));

    assert!(std::sync::Arc::ptr_eq(&first, &second));
    assert_eq!(second.url(), format!("ws://{addr}/ws"));

    assert!(!first.is_closed());

    timeout(WAIT, stream::shutdown_shared()).await.unwrap();
    assert!(first.is_closed());

    // Teardown is final: later callers get the same closed client.
    let after = stream::shared(&settings(addr));
    assert!(std::sync::Arc::ptr_eq(&first, &after));
    assert!(after.is_closed());
}
