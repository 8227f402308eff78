//! Single-host reverse proxy.
//!
//! # Responsibilities
//! - Parse and hold the proxy target (scheme, authority, base path, base query)
//! - Rewrite the request URI onto the target, preserving path and query
//! - Strip hop-by-hop headers and append X-Forwarded-For
//! - Relay the upstream response; map transport failures to 502
//!
//! # Design Decisions
//! - One pooled hyper client per proxy, cloned into every request
//! - The Host header is not touched here; the host-rewrite layer owns it
//! - No retries: a failed upstream call is answered immediately

use std::convert::Infallible;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::header::HeaderValue;
use axum::http::uri::{Authority, PathAndQuery, Scheme};
use axum::http::{Request, Response, StatusCode, Uri};
use futures_util::future::BoxFuture;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use tower::Service;
use url::Url;

use crate::config::ValidationError;
use crate::http::headers::{append_forwarded_for, peer_addr, strip_hop_by_hop};

/// Where proxied requests are sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyTarget {
    authority: Authority,
    host_header: HeaderValue,
    base_path: String,
    base_query: Option<String>,
}

impl ProxyTarget {
    /// Parse a target URL such as `http://localhost:9999/api?key=1`.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let url = Url::parse(raw).map_err(|source| ValidationError::InvalidProxyUrl {
            url: raw.to_string(),
            source,
        })?;

        if url.scheme() != "http" {
            return Err(ValidationError::UnsupportedProxyScheme(url.scheme().to_string()));
        }

        let host = match url.host_str() {
            Some(host) if !host.is_empty() => host,
            _ => return Err(ValidationError::MissingProxyHost(raw.to_string())),
        };
        let authority = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let host_header = HeaderValue::from_str(&authority)
            .map_err(|_| ValidationError::InvalidProxyHost(raw.to_string()))?;
        let authority = authority
            .parse::<Authority>()
            .map_err(|_| ValidationError::InvalidProxyHost(raw.to_string()))?;

        Ok(Self {
            authority,
            host_header,
            base_path: url.path().to_string(),
            base_query: url.query().filter(|q| !q.is_empty()).map(str::to_string),
        })
    }

    /// `host[:port]` of the target.
    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// The Host header value sent upstream.
    pub fn host_header(&self) -> &HeaderValue {
        &self.host_header
    }

    /// Map an incoming request URI onto the target.
    pub fn rewrite_uri(&self, uri: &Uri) -> Uri {
        let path = join_paths(&self.base_path, uri.path());
        let path_and_query = match (self.base_query.as_deref(), uri.query()) {
            (Some(base), Some(query)) if !query.is_empty() => format!("{path}?{base}&{query}"),
            (Some(base), _) => format!("{path}?{base}"),
            (None, Some(query)) if !query.is_empty() => format!("{path}?{query}"),
            (None, _) => path,
        };

        let mut parts = uri.clone().into_parts();
        parts.scheme = Some(Scheme::HTTP);
        parts.authority = Some(self.authority.clone());
        parts.path_and_query = path_and_query.parse::<PathAndQuery>().ok();
        Uri::from_parts(parts).unwrap_or_else(|_| uri.clone())
    }
}

/// Join two path segments with exactly one slash between them.
fn join_paths(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", base, &path[1..]),
        (false, false) => format!("{base}/{path}"),
        _ => format!("{base}{path}"),
    }
}

/// Reverse-proxy handler forwarding every request to one target.
#[derive(Clone)]
pub struct ReverseProxy {
    target: ProxyTarget,
    client: Client<HttpConnector, Body>,
}

impl ReverseProxy {
    pub fn new(target: ProxyTarget) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { target, client }
    }

    pub fn target(&self) -> &ProxyTarget {
        &self.target
    }

    async fn forward(self, request: Request<Body>) -> Response<Body> {
        let (mut parts, body) = request.into_parts();
        let original_uri = parts.uri.clone();

        parts.uri = self.target.rewrite_uri(&parts.uri);
        strip_hop_by_hop(&mut parts.headers);
        if let Some(peer) = peer_addr(&parts.extensions) {
            append_forwarded_for(&mut parts.headers, peer.ip());
        }

        tracing::debug!(
            method = %parts.method,
            from = %original_uri,
            to = %parts.uri,
            "Proxying request"
        );

        match self.client.request(Request::from_parts(parts, body)).await {
            Ok(response) => {
                let (mut parts, body) = response.into_parts();
                strip_hop_by_hop(&mut parts.headers);
                Response::from_parts(parts, Body::new(body))
            }
            Err(e) => {
                tracing::error!(
                    target_authority = %self.target.authority,
                    uri = %original_uri,
                    error = %e,
                    "Upstream error"
                );
                let mut response = Response::new(Body::empty());
                *response.status_mut() = StatusCode::BAD_GATEWAY;
                response
            }
        }
    }
}

impl Service<Request<Body>> for ReverseProxy {
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let this = self.clone();
        Box::pin(async move { Ok(this.forward(request).await) })
    }
}
