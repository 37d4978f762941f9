//! Exercises `HostMultiplexer` against a real loopback HTTP server
//! standing in for "the local service".

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::routing::get;
use axum::Router;
use tokio::sync::mpsc;
use tunnel_multiplexer::host::{HostConfig, HostMultiplexer};
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

async fn spawn_local_service() -> String {
    let app = Router::new().route("/v1/health", get(|| async { "ok" }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn http_request_is_replayed_against_the_local_service_and_answered() {
    let base_url = spawn_local_service().await;

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let transport: Arc<dyn Transport> = Arc::new(FakeTransport { outbound: outbound_tx, open: AtomicBool::new(true) });

    let mux = Arc::new(HostMultiplexer::new(
        transport,
        HostConfig { local_base_url: base_url, max_ws_connections: 4 },
    ));
    let mux_run = Arc::clone(&mux);
    tokio::spawn(async move { mux_run.run(inbound_rx).await });

    let request = Frame::HttpRequest {
        request_id: 1,
        method: "GET".into(),
        path: "/v1/health".into(),
        headers: Headers::new(),
        body: vec![],
    };
    inbound_tx.send(frame::encode(&request)).unwrap();

    let sent = outbound_rx.recv().await.unwrap();
    let Frame::HttpResponse { request_id, status_code, body, .. } = frame::decode(&sent).unwrap() else {
        panic!("expected an HTTP_RESPONSE frame");
    };
    assert_eq!(request_id, 1);
    assert_eq!(status_code, 200);
    assert_eq!(body, b"ok");
}

#[tokio::test]
async fn http_request_against_an_unreachable_service_answers_with_bad_gateway() {
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let transport: Arc<dyn Transport> = Arc::new(FakeTransport { outbound: outbound_tx, open: AtomicBool::new(true) });

    let mux = Arc::new(HostMultiplexer::new(
        transport,
        HostConfig { local_base_url: "http://127.0.0.1:1".into(), max_ws_connections: 4 },
    ));
    let mux_run = Arc::clone(&mux);
    tokio::spawn(async move { mux_run.run(inbound_rx).await });

    let request = Frame::HttpRequest {
        request_id: 7,
        method: "GET".into(),
        path: "/anything".into(),
        headers: Headers::new(),
        body: vec![],
    };
    inbound_tx.send(frame::encode(&request)).unwrap();

    let sent = outbound_rx.recv().await.unwrap();
    let Frame::HttpResponse { request_id, status_code, .. } = frame::decode(&sent).unwrap() else {
        panic!("expected an HTTP_RESPONSE frame");
    };
    assert_eq!(request_id, 7);
    assert_eq!(status_code, 502);
}
