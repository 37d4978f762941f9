//! Exercises `RelayTransport` against a real in-process relay service,
//! the same way a browser and host endpoint would use it once both
//! have fallen back from `p2p-direct`.

use std::net::SocketAddr;
use std::time::Duration;

use tunnel_protocol::auth::issue_token;
use tunnel_transport::relay_transport;
use tunnel_transport::Transport;

fn relay_config() -> tunnel_relay::config::Config {
    tunnel_relay::config::Config {
        bind_addr: "127.0.0.1:0".into(),
        jwt_secret: "shared-secret".into(),
        cors_origins: vec![],
        heartbeat_interval: Duration::from_secs(20),
        heartbeat_timeout: Duration::from_secs(10),
        half_open_timeout: Duration::from_secs(300),
        max_message_bytes: 16 * 1024 * 1024,
        max_sessions: 10_000,
    }
}

async fn spawn_relay() -> SocketAddr {
    let state = tunnel_relay::AppState::new(relay_config());
    let app = tunnel_relay::build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn two_relay_transports_exchange_bytes_through_a_shared_session() {
    let addr = spawn_relay().await;
    let relay_url = format!("ws://{addr}");
    let token = issue_token("shared-secret", 1, 0, 3600);

    let (browser, mut browser_inbound) = relay_transport::connect(&relay_url, "session-x", &token)
        .await
        .unwrap();
    let (host, mut host_inbound) = relay_transport::connect(&relay_url, "session-x", &token)
        .await
        .unwrap();

    browser.send(b"ping".to_vec()).await.unwrap();
    let received = host_inbound.recv().await.unwrap();
    assert_eq!(received, b"ping");

    host.send(b"pong".to_vec()).await.unwrap();
    let received = browser_inbound.recv().await.unwrap();
    assert_eq!(received, b"pong");

    assert!(browser.is_open());
    assert!(host.is_open());
}

#[tokio::test]
async fn closing_one_side_eventually_marks_the_other_closed() {
    let addr = spawn_relay().await;
    let relay_url = format!("ws://{addr}");
    let token = issue_token("shared-secret", 1, 0, 3600);

    let (browser, _browser_inbound) = relay_transport::connect(&relay_url, "session-y", &token)
        .await
        .unwrap();
    let (host, mut host_inbound) = relay_transport::connect(&relay_url, "session-y", &token)
        .await
        .unwrap();

    browser.close().await;
    drop(browser);

    let result = tokio::time::timeout(Duration::from_secs(2), host_inbound.recv()).await;
    assert!(result.is_ok());
    assert_eq!(result.unwrap(), None);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!host.is_open());
}
