//! Host rewrite for proxy mode.
//!
//! The incoming Host names this server; the upstream expects its own name
//! for virtual-host routing. Applied directly around the reverse proxy.

use std::task::{Context, Poll};

use axum::http::header::{HeaderValue, HOST};
use axum::http::Request;
use tower::{Layer, Service};

/// Layer that sets the Host header to a fixed authority.
#[derive(Debug, Clone)]
pub struct HostRewriteLayer {
    host: HeaderValue,
}

impl HostRewriteLayer {
    pub fn new(host: HeaderValue) -> Self {
        Self { host }
    }
}

impl<S> Layer<S> for HostRewriteLayer {
    type Service = HostRewrite<S>;

    fn layer(&self, inner: S) -> Self::Service {
        HostRewrite {
            inner,
            host: self.host.clone(),
        }
    }
}

/// Service produced by [`HostRewriteLayer`].
#[derive(Debug, Clone)]
pub struct HostRewrite<S> {
    inner: S,
    host: HeaderValue,
}

impl<S, B> Service<Request<B>> for HostRewrite<S>
where
    S: Service<Request<B>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<B>) -> Self::Future {
        request.headers_mut().insert(HOST, self.host.clone());
        self.inner.call(request)
    }
}
