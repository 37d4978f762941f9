//! Exercises `BrowserMultiplexer` against a fake transport that lets the
//! test control inbound delivery and inspect outbound frames directly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tunnel_multiplexer::browser::{BrowserConfig, BrowserMultiplexer, BrowserWebSocketHandle};
use tunnel_protocol::frame::{self, Frame, Headers};
use tunnel_transport::{Transport, TransportError};

struct FakeTransport {
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    open: AtomicBool,
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, bytes: Vec<u8>) -> Result<(), TransportError> {
        self.outbound.send(bytes).map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

fn fake_pair() -> (Arc<FakeTransport>, mpsc::UnboundedReceiver<Vec<u8>>, mpsc::UnboundedSender<Vec<u8>>, mpsc::UnboundedReceiver<Vec<u8>>) {
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let transport = Arc::new(FakeTransport { outbound: outbound_tx, open: AtomicBool::new(true) });
    (transport, outbound_rx, inbound_tx, inbound_rx)
}

fn config() -> BrowserConfig {
    BrowserConfig {
        signaling_base_url: "https://signal.example.com".into(),
        request_timeout: Duration::from_secs(5),
    }
}

#[tokio::test]
async fn fetch_resolves_when_a_matching_response_frame_arrives() {
    let (transport, mut outbound_rx, inbound_tx, inbound_rx) = fake_pair();
    let mux = Arc::new(BrowserMultiplexer::new(transport, config()));

    let mux_run = Arc::clone(&mux);
    tokio::spawn(async move { mux_run.run(inbound_rx).await });

    let mux_fetch = Arc::clone(&mux);
    let fetch = tokio::spawn(async move {
        mux_fetch
            .fetch("GET", "/v1/health", Headers::new(), vec![], None)
            .await
    });

    let sent = outbound_rx.recv().await.unwrap();
    let Frame::HttpRequest { request_id, method, path, .. } = frame::decode(&sent).unwrap() else {
        panic!("expected an HTTP_REQUEST frame");
    };
    assert_eq!(method, "GET");
    assert_eq!(path, "/v1/health");

    let response = Frame::HttpResponse {
        request_id,
        status_code: 200,
        headers: Headers::new(),
        body: b"ok".to_vec(),
    };
    inbound_tx.send(frame::encode(&response)).unwrap();

    let result = fetch.await.unwrap().unwrap();
    assert_eq!(result.status_code, 200);
    assert_eq!(result.body, b"ok");
}

#[tokio::test]
async fn fetch_times_out_when_no_response_arrives() {
    let (transport, _outbound_rx, _inbound_tx, inbound_rx) = fake_pair();
    let mux = Arc::new(BrowserMultiplexer::new(transport, config()));

    let mux_run = Arc::clone(&mux);
    tokio::spawn(async move { mux_run.run(inbound_rx).await });

    let result = mux
        .fetch("GET", "/slow", Headers::new(), vec![], Some(Duration::from_millis(30)))
        .await;
    assert!(matches!(result, Err(tunnel_multiplexer::MultiplexError::RequestTimeout)));
}

#[tokio::test]
async fn pending_fetch_fails_with_connection_closed_when_transport_dies() {
    let (transport, mut outbound_rx, inbound_tx, inbound_rx) = fake_pair();
    let mux = Arc::new(BrowserMultiplexer::new(transport, config()));

    let mux_run = Arc::clone(&mux);
    tokio::spawn(async move { mux_run.run(inbound_rx).await });

    let mux_fetch = Arc::clone(&mux);
    let fetch = tokio::spawn(async move {
        mux_fetch
            .fetch("GET", "/never-answered", Headers::new(), vec![], Some(Duration::from_secs(5)))
            .await
    });

    let _ = outbound_rx.recv().await.unwrap();
    drop(inbound_tx);

    let result = fetch.await.unwrap();
    assert!(matches!(result, Err(tunnel_multiplexer::MultiplexError::ConnectionClosed)));
}

#[tokio::test]
async fn websocket_to_the_signaling_origin_is_classified_direct() {
    let (transport, _outbound_rx, _inbound_tx, inbound_rx) = fake_pair();
    let mux = Arc::new(BrowserMultiplexer::new(transport, config()));
    let mux_run = Arc::clone(&mux);
    tokio::spawn(async move { mux_run.run(inbound_rx).await });

    let handle = mux
        .websocket("wss://signal.example.com/signal?token=t&device_id=d", Headers::new())
        .await
        .unwrap();
    assert!(matches!(handle, BrowserWebSocketHandle::Direct { .. }));
}

#[tokio::test]
async fn websocket_to_any_other_origin_is_tunneled_as_ws_connect() {
    let (transport, mut outbound_rx, _inbound_tx, inbound_rx) = fake_pair();
    let mux = Arc::new(BrowserMultiplexer::new(transport, config()));
    let mux_run = Arc::clone(&mux);
    tokio::spawn(async move { mux_run.run(inbound_rx).await });

    let handle = mux.websocket("ws://127.0.0.1:11434/status", Headers::new()).await.unwrap();
    assert!(matches!(handle, BrowserWebSocketHandle::Tunneled(_)));

    let sent = outbound_rx.recv().await.unwrap();
    assert!(matches!(frame::decode(&sent).unwrap(), Frame::WsConnect { .. }));
}
