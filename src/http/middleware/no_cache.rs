//! Cache suppression.
//!
//! Forces three headers onto every response so neither browsers nor
//! intermediaries reuse it. Values set by inner handlers are overwritten.

use std::task::{Context, Poll};

use axum::http::header::{HeaderValue, CACHE_CONTROL, EXPIRES, PRAGMA};
use axum::http::{Request, Response};
use futures_util::future::BoxFuture;
use tower::{Layer, Service};

pub const CACHE_CONTROL_VALUE: &str = "no-cache, no-store, must-revalidate";
pub const PRAGMA_VALUE: &str = "no-cache";
pub const EXPIRES_VALUE: &str = "0";

#[derive(Debug, Clone, Copy, Default)]
pub struct NoCacheLayer;

impl<S> Layer<S> for NoCacheLayer {
    type Service = NoCache<S>;

    fn layer(&self, inner: S) -> Self::Service {
        NoCache { inner }
    }
}

#[derive(Debug, Clone)]
pub struct NoCache<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for NoCache<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
    S::Error: 'static,
    ReqBody: 'static,
    ResBody: Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        let future = self.inner.call(request);
        Box::pin(async move {
            let mut response = future.await?;
            let headers = response.headers_mut();
            headers.insert(CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL_VALUE));
            headers.insert(PRAGMA, HeaderValue::from_static(PRAGMA_VALUE));
            headers.insert(EXPIRES, HeaderValue::from_static(EXPIRES_VALUE));
            Ok(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;
    use std::convert::Infallible;
    use tower::{service_fn, ServiceExt};

    #[tokio::test]
    async fn overrides_inner_cache_headers() {
        let inner = service_fn(|_req: Request<Body>| async {
            let mut response = Response::new(Body::from("payload"));
            *response.status_mut() = StatusCode::CREATED;
            response
                .headers_mut()
                .insert(CACHE_CONTROL, HeaderValue::from_static("max-age=3600"));
            Ok::<_, Infallible>(response)
        });

        let response = NoCacheLayer
            .layer(inner)
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[CACHE_CONTROL], CACHE_CONTROL_VALUE);
        assert_eq!(response.headers()[PRAGMA], PRAGMA_VALUE);
        assert_eq!(response.headers()[EXPIRES], EXPIRES_VALUE);
        assert_eq!(response.headers().get_all(CACHE_CONTROL).iter().count(), 1);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"payload");
    }
}
