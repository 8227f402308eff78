//! Permissive cross-origin policy.
//!
//! Any origin may call the server with the simple methods and the headers
//! browsers send by default. An `OPTIONS` request carrying
//! `Access-Control-Request-Method` is a preflight and is answered here; any
//! other `OPTIONS` request reaches the inner handler like a normal call.

use std::convert::Infallible;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::header::{
    HeaderName, HeaderValue, ACCEPT, ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_REQUEST_METHOD,
    CONTENT_TYPE, ORIGIN, VARY,
};
use axum::http::{Method, Request, Response};
use futures_util::future::BoxFuture;
use tower::{Layer, Service, ServiceExt};
use tower_http::cors::{Any, Cors, CorsLayer};

const X_REQUESTED_WITH: HeaderName = HeaderName::from_static("x-requested-with");

/// Build the CORS layer applied unless `--nocors` is given.
pub fn cors_layer() -> PermissiveCorsLayer {
    PermissiveCorsLayer {
        cors: CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::HEAD])
            .allow_headers([ORIGIN, ACCEPT, CONTENT_TYPE, X_REQUESTED_WITH]),
    }
}

#[derive(Debug, Clone)]
pub struct PermissiveCorsLayer {
    cors: CorsLayer,
}

impl<S: Clone> Layer<S> for PermissiveCorsLayer {
    type Service = PermissiveCors<S>;

    fn layer(&self, inner: S) -> Self::Service {
        PermissiveCors {
            cors: self.cors.layer(inner.clone()),
            inner,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PermissiveCors<S> {
    cors: Cors<S>,
    inner: S,
}

fn is_preflight(request: &Request<Body>) -> bool {
    request.method() == Method::OPTIONS
        && request.headers().contains_key(ACCESS_CONTROL_REQUEST_METHOD)
}

impl<S> Service<Request<Body>> for PermissiveCors<S>
where
    S: Service<Request<Body>, Response = Response<Body>, Error = Infallible>
        + Clone
        + Send
        + 'static,
    S::Future: Send + 'static,
{
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // Both paths drive a fresh clone to readiness in `call`.
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        if request.method() != Method::OPTIONS || is_preflight(&request) {
            return Box::pin(self.cors.clone().oneshot(request));
        }

        let has_origin = request.headers().contains_key(ORIGIN);
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut response = inner.oneshot(request).await?;
            if has_origin {
                let headers = response.headers_mut();
                headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
                headers.append(VARY, HeaderValue::from_static("origin"));
            }
            Ok(response)
        })
    }
}
