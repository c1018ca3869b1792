// Local stand-in for the realtime broadcast endpoint.

#![allow(dead_code)]

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;
use tokio_rustls::TlsAcceptor;
use tracing_subscriber::fmt::MakeWriter;

use dcs_telemetry_bridge::BridgeConfig;

#[derive(Clone, Debug)]
pub struct Recorded {
    pub api_key: Option<String>,
    pub body: Value,
}

#[derive(Clone, Default)]
pub struct MockEndpoint {
    recorded: Arc<Mutex<Vec<Recorded>>>,
    failing: Arc<AtomicBool>,
}

impl MockEndpoint {
    pub async fn spawn() -> (String, MockEndpoint) {
        let mock = MockEndpoint::default();
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock endpoint");
        let addr = listener.local_addr().expect("mock endpoint addr");
        let server = axum::Server::from_tcp(listener)
            .expect("mock endpoint listener")
            .serve(mock.router().into_make_service());
        tokio::spawn(server);
        (format!("http://{addr}"), mock)
    }

    /// Same endpoint behind TLS with a freshly generated self-signed certificate.
    pub async fn spawn_self_signed() -> (String, MockEndpoint) {
        let mock = MockEndpoint::default();
        let acceptor = self_signed_acceptor();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind tls endpoint");
        let port = listener.local_addr().expect("tls endpoint addr").port();
        let app = mock.router();

        tokio::spawn(async move {
            loop {
                let Ok((tcp, _)) = listener.accept().await else {
                    break;
                };
                let acceptor = acceptor.clone();
                let app = app.clone();
                tokio::spawn(async move {
                    // Verified clients abort the handshake.
                    let Ok(tls) = acceptor.accept(tcp).await else {
                        return;
                    };
                    let _ = hyper::server::conn::Http::new()
                        .serve_connection(tls, app)
                        .await;
                });
            }
        });
        (format!("https://localhost:{port}"), mock)
    }

    fn router(&self) -> Router {
        Router::new()
            .route("/realtime/v1/api/broadcast", post(broadcast))
            .with_state(self.clone())
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn recorded(&self) -> Vec<Recorded> {
        self.recorded.lock().unwrap().clone()
    }

    /// Payloads of every accepted message carrying `event`.
    pub fn payloads(&self, event: &str) -> Vec<Value> {
        self.recorded()
            .into_iter()
            .flat_map(|recorded| {
                recorded.body["messages"]
                    .as_array()
                    .cloned()
                    .unwrap_or_default()
            })
            .filter(|message| message["event"] == event)
            .map(|message| message["payload"].clone())
            .collect()
    }
}

async fn broadcast(
    State(mock): State<MockEndpoint>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> StatusCode {
    if mock.failing.load(Ordering::SeqCst) {
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    let api_key = headers
        .get("apikey")
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);
    mock.recorded.lock().unwrap().push(Recorded { api_key, body });
    StatusCode::OK
}

fn self_signed_acceptor() -> TlsAcceptor {
    let cert = rcgen::generate_simple_self_signed(vec!["localhost".into()])
        .expect("generate certificate");
    let cert_der = cert.serialize_der().expect("serialize certificate");
    let key_der = cert.serialize_private_key_der();
    let config = rustls::ServerConfig::builder()
        .with_safe_defaults()
        .with_no_client_auth()
        .with_single_cert(vec![rustls::Certificate(cert_der)], rustls::PrivateKey(key_der))
        .expect("tls server config");
    TlsAcceptor::from(Arc::new(config))
}

/// Accepts connections and never answers; counts how many were opened.
pub async fn spawn_unresponsive() -> (String, Arc<AtomicUsize>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind unresponsive endpoint");
    let addr = listener.local_addr().expect("unresponsive endpoint addr");
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = accepted.clone();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            held.push(stream);
        }
    });
    (format!("http://{addr}"), accepted)
}

/// Collects formatted log output for assertions.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }

    pub fn count(&self, needle: &str) -> usize {
        self.contents().matches(needle).count()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Routes events on the current thread into the returned buffer until the guard drops.
pub fn capture_logs() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (logs, guard)
}

pub fn test_config(base_url: &str) -> BridgeConfig {
    let mut config = BridgeConfig::new(base_url, "test-key", "session:test");
    config.udp_bind = IpAddr::V4(Ipv4Addr::LOCALHOST);
    config.udp_port = 0;
    config.publish_interval = Duration::from_millis(200);
    config.heartbeat_interval = Duration::from_secs(60);
    config.metrics_interval = Duration::from_secs(60);
    config.request_timeout = Duration::from_secs(2);
    config
}

pub async fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

pub fn udp_sender() -> std::net::UdpSocket {
    std::net::UdpSocket::bind("127.0.0.1:0").expect("bind udp sender")
}

pub fn send_to(sender: &std::net::UdpSocket, target: SocketAddr, datagram: &[u8]) {
    sender.send_to(datagram, target).expect("send datagram");
}
