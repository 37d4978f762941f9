//! Integration tests for relay admission and frame forwarding.

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tunnel_protocol::auth::issue_token;

fn test_config() -> tunnel_relay::config::Config {
    tunnel_relay::config::Config {
        bind_addr: "127.0.0.1:0".into(),
        jwt_secret: "test-secret".into(),
        cors_origins: vec![],
        heartbeat_interval: Duration::from_secs(20),
        heartbeat_timeout: Duration::from_secs(10),
        half_open_timeout: Duration::from_secs(300),
        max_message_bytes: 16 * 1024 * 1024,
        max_sessions: 10_000,
    }
}

async fn spawn_server() -> SocketAddr {
    let state = tunnel_relay::AppState::new(test_config());
    let app = tunnel_relay::build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn token() -> String {
    issue_token("test-secret", 1, 0, 3600)
}

#[tokio::test]
async fn two_parties_exchange_binary_frames_verbatim() {
    let addr = spawn_server().await;
    let t = token();
    let url = format!("ws://{addr}/relay/session-1?token={t}");

    let (mut a, _) = tokio_tungstenite::connect_async(&url).await.unwrap();
    let (mut b, _) = tokio_tungstenite::connect_async(&url).await.unwrap();

    a.send(WsMessage::Binary(b"hello from a".to_vec().into()))
        .await
        .unwrap();
    let received = b.next().await.unwrap().unwrap();
    assert_eq!(received.into_data(), b"hello from a".to_vec());

    b.send(WsMessage::Binary(b"hello from b".to_vec().into()))
        .await
        .unwrap();
    let received = a.next().await.unwrap().unwrap();
    assert_eq!(received.into_data(), b"hello from b".to_vec());
}

#[tokio::test]
async fn a_third_connection_to_a_full_session_is_rejected() {
    let addr = spawn_server().await;
    let t = token();
    let url = format!("ws://{addr}/relay/session-2?token={t}");

    let (_a, _) = tokio_tungstenite::connect_async(&url).await.unwrap();
    let (_b, _) = tokio_tungstenite::connect_async(&url).await.unwrap();

    let (mut c, _) = tokio_tungstenite::connect_async(&url).await.unwrap();
    let msg = c.next().await.unwrap().unwrap();
    assert!(matches!(msg, WsMessage::Close(Some(_))));
}

#[tokio::test]
async fn closing_one_party_closes_the_other() {
    let addr = spawn_server().await;
    let t = token();
    let url = format!("ws://{addr}/relay/session-3?token={t}");

    let (a, _) = tokio_tungstenite::connect_async(&url).await.unwrap();
    let (mut b, _) = tokio_tungstenite::connect_async(&url).await.unwrap();

    drop(a);

    let msg = tokio::time::timeout(Duration::from_secs(2), b.next())
        .await
        .expect("peer should be closed promptly")
        .unwrap();
    assert!(matches!(msg, Ok(WsMessage::Close(_)) | Err(_)));
}
