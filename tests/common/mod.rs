//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use shttp::config::Config;
use shttp::http::ServeError;
use shttp::lifecycle::{self, ServerState, Shutdown};
use shttp::observability::MemorySink;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// A running server bound to an ephemeral loopback port.
#[allow(dead_code)]
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub sink: Arc<MemorySink>,
    pub state: watch::Receiver<ServerState>,
    pub task: JoinHandle<Result<(), ServeError>>,
}

#[allow(dead_code)]
impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Access log lines, without the startup banner.
    pub fn access_lines(&self) -> Vec<String> {
        self.sink
            .lines()
            .into_iter()
            .filter(|line| line.contains(" HTTP/1.1\" "))
            .collect()
    }
}

/// Start `config` on 127.0.0.1 with an OS-assigned port.
pub async fn start_server(mut config: Config) -> TestServer {
    config.listener.host = "127.0.0.1".into();
    config.listener.port = 0;

    let sink = MemorySink::new();
    let server = lifecycle::start(&config, sink.clone())
        .await
        .expect("server should start");
    let addr = server.local_addr().unwrap();
    let state = server.state();

    let shutdown = Shutdown::new();
    let task = tokio::spawn(server.serve(shutdown.signalled()));

    TestServer {
        addr,
        shutdown,
        sink,
        state,
        task,
    }
}

/// HTTP client that ignores proxy environment variables.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .pool_max_idle_per_host(0)
        .build()
        .unwrap()
}

/// An address nothing listens on.
#[allow(dead_code)]
pub async fn dead_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Start a backend that waits `delay`, then answers 200 with a body
/// describing what it received: the request line, Host and X-Forwarded-For.
#[allow(dead_code)]
pub async fn start_echo_backend(delay: Duration) -> SocketAddr {
    start_observed_backend(delay).await.0
}

/// Like [`start_echo_backend`], also reporting each request line as soon as
/// its head has been read, before the delay starts.
#[allow(dead_code)]
pub async fn start_observed_backend(
    delay: Duration,
) -> (SocketAddr, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (arrived_tx, arrived_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let arrived = arrived_tx.clone();
            tokio::spawn(async move {
                let mut head = Vec::new();
                let mut chunk = [0u8; 1024];
                while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => head.extend_from_slice(&chunk[..n]),
                    }
                }

                let head = String::from_utf8_lossy(&head).into_owned();
                let mut lines = head.split("\r\n");
                let request_line = lines.next().unwrap_or_default().to_string();
                let _ = arrived.send(request_line.clone());
                let headers: Vec<(String, String)> = lines
                    .filter_map(|line| line.split_once(':'))
                    .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
                    .collect();
                let header = |name: &str| {
                    headers
                        .iter()
                        .find(|(k, _)| k == name)
                        .map(|(_, v)| v.clone())
                        .unwrap_or_default()
                };

                let body = format!(
                    "{}\nhost={}\nx-forwarded-for={}",
                    request_line,
                    header("host"),
                    header("x-forwarded-for")
                );

                tokio::time::sleep(delay).await;
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (addr, arrived_rx)
}
