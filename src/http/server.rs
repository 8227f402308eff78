//! HTTP server lifecycle.
//!
//! # Responsibilities
//! - Bind the listener (`Unstarted → Listening`)
//! - Serve each accepted connection on its own task with hyper's HTTP/1 stack
//! - Enforce the header read timeout and the header size limit per connection
//! - Keep accepting through per-connection and resource-exhaustion errors
//! - On shutdown: stop accepting, drain within the stop timeout, abort
//!   whatever is left and wait at most the kill timeout (`→ Stopped`)

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::Request;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tower::ServiceExt;

use crate::config::ListenerConfig;
use crate::http::Handler;
use crate::lifecycle::ServerState;
use crate::net::{ConnectionGuard, ConnectionTracker, Listener, ListenerError};

/// Smallest read buffer hyper accepts for a connection.
const MIN_BUF_SIZE: usize = 8192;

/// Pause before accepting again when the process runs out of descriptors.
const ACCEPT_BACKOFF: Duration = Duration::from_secs(1);

/// Fatal server errors.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error(transparent)]
    Listener(#[from] ListenerError),
}

/// Owns the composed handler until it is bound to a socket.
pub struct Supervisor {
    config: ListenerConfig,
    handler: Handler,
    state: watch::Sender<ServerState>,
}

impl Supervisor {
    /// Prepare to serve `handler`, normally an assembled pipeline.
    pub fn new(config: ListenerConfig, handler: Handler) -> Self {
        let (state, _) = watch::channel(ServerState::Unstarted);
        Self {
            config,
            handler,
            state,
        }
    }

    pub fn state(&self) -> watch::Receiver<ServerState> {
        self.state.subscribe()
    }

    /// Bind the configured address. Failure is fatal for the caller.
    pub async fn bind(self) -> Result<BoundServer, ServeError> {
        let listener = Listener::bind(&self.config).await?;
        self.state.send_replace(ServerState::Listening);

        Ok(BoundServer {
            listener,
            config: self.config,
            handler: self.handler,
            state: self.state,
            tracker: ConnectionTracker::new(),
        })
    }
}

/// A server in the `Listening` state.
pub struct BoundServer {
    listener: Listener,
    config: ListenerConfig,
    handler: Handler,
    state: watch::Sender<ServerState>,
    tracker: ConnectionTracker,
}

impl BoundServer {
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn state(&self) -> watch::Receiver<ServerState> {
        self.state.subscribe()
    }

    /// Connections currently being served.
    pub fn tracker(&self) -> ConnectionTracker {
        self.tracker.clone()
    }

    /// Accept connections until `shutdown` resolves or accepting fails fatally,
    /// then drain.
    pub async fn serve<F>(self, shutdown: F) -> Result<(), ServeError>
    where
        F: Future<Output = ()> + Send,
    {
        let BoundServer {
            listener,
            config,
            handler,
            state,
            tracker,
        } = self;

        let (drain_tx, drain_rx) = watch::channel(false);
        let mut connections = JoinSet::new();
        tokio::pin!(shutdown);

        let result = loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => break Ok(()),

                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        connections.spawn(serve_connection(
                            stream,
                            peer,
                            handler.clone(),
                            config.clone(),
                            drain_rx.clone(),
                            tracker.track(),
                        ));
                    }
                    Err(e) if e.is_transient() => {
                        tracing::debug!(error = %e, "Dropped connection during accept");
                    }
                    Err(e) if e.is_resource_exhaustion() => {
                        tracing::error!(error = %e, backoff = ?ACCEPT_BACKOFF, "Accept failed, backing off");
                        tokio::select! {
                            _ = &mut shutdown => break Ok(()),
                            _ = tokio::time::sleep(ACCEPT_BACKOFF) => {}
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Listener failed");
                        break Err(ServeError::from(e));
                    }
                },

                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            tracing::error!(error = %e, "Connection task panicked");
                        }
                    }
                }
            }
        };

        drop(listener);
        state.send_replace(ServerState::ShuttingDown);
        drain_tx.send_replace(true);

        tracing::info!(
            in_flight = tracker.active_count(),
            stop_timeout = ?config.stop_timeout,
            "Draining connections"
        );

        if tokio::time::timeout(config.stop_timeout, drain(&mut connections))
            .await
            .is_err()
        {
            tracing::warn!(
                remaining = connections.len(),
                "Stop timeout elapsed, aborting connections"
            );
            connections.abort_all();
            if tokio::time::timeout(config.kill_timeout, drain(&mut connections))
                .await
                .is_err()
            {
                tracing::error!(
                    remaining = connections.len(),
                    "Kill timeout elapsed, abandoning connections"
                );
            }
        }

        state.send_replace(ServerState::Stopped);
        tracing::info!("HTTP server stopped");
        result
    }
}

async fn drain(connections: &mut JoinSet<()>) {
    while connections.join_next().await.is_some() {}
}

/// Serve one connection until it closes, switching to graceful close once
/// draining starts.
async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    handler: Handler,
    config: ListenerConfig,
    mut draining: watch::Receiver<bool>,
    guard: ConnectionGuard,
) {
    let service = service_fn(move |request: Request<Incoming>| {
        let mut request = request.map(Body::new);
        request.extensions_mut().insert(ConnectInfo(peer));
        handler.clone().oneshot(request)
    });

    let mut builder = http1::Builder::new();
    builder
        .timer(TokioTimer::new())
        .header_read_timeout(config.read_timeout)
        .max_buf_size(config.max_header_bytes.max(MIN_BUF_SIZE))
        .keep_alive(true);

    let conn = builder.serve_connection(TokioIo::new(stream), service);
    tokio::pin!(conn);

    let mut closing = false;
    loop {
        tokio::select! {
            result = conn.as_mut() => {
                if let Err(e) = result {
                    tracing::debug!(connection_id = %guard.id(), peer_addr = %peer, error = %e, "Connection error");
                }
                break;
            }
            _ = draining.changed(), if !closing => {
                closing = true;
                conn.as_mut().graceful_shutdown();
            }
        }
    }
}
