//! Access logging in Apache common log format.
//!
//! # Responsibilities
//! - Capture request metadata and the start timestamp
//! - Observe the status and the body bytes actually sent to the client
//! - Emit one line per request once the response body is finished
//!
//! # Design Decisions
//! - Bytes are counted by wrapping the response body, not from Content-Length
//! - The line is written when the body ends or is dropped, so aborted
//!   transfers are still logged with the bytes that made it out

use std::fmt::Write as _;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::{Body, Bytes};
use axum::http::{Request, Response, StatusCode};
use chrono::{DateTime, Local};
use futures_util::future::BoxFuture;
use http_body::{Frame, SizeHint};
use tower::{Layer, Service};

use crate::http::headers::{client_ip, peer_addr};
use crate::observability::SharedSink;

/// Timestamp layout used by the common log format.
const CLF_TIME_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";

/// Request half of an access log entry, captured before the inner handler runs.
#[derive(Debug, Clone)]
pub struct RequestRecord {
    client: String,
    method: String,
    uri: String,
    protocol: String,
    created: DateTime<Local>,
}

impl RequestRecord {
    pub fn capture<B>(request: &Request<B>) -> Self {
        Self {
            client: client_ip(request.headers(), peer_addr(request.extensions())),
            method: request.method().to_string(),
            uri: request.uri().to_string(),
            protocol: format!("{:?}", request.version()),
            created: Local::now(),
        }
    }

    /// Render the full common log format line.
    pub fn format(&self, status: StatusCode, bytes: u64) -> String {
        let mut line = String::with_capacity(128);
        let _ = write!(
            line,
            "{} - - [{}] \"{} {} {}\" {} {}",
            self.client,
            self.created.format(CLF_TIME_FORMAT),
            self.method,
            self.uri,
            self.protocol,
            status.as_u16(),
            bytes
        );
        line
    }
}

#[derive(Clone)]
pub struct AccessLogLayer {
    sink: SharedSink,
}

impl AccessLogLayer {
    pub fn new(sink: SharedSink) -> Self {
        Self { sink }
    }
}

impl<S> Layer<S> for AccessLogLayer {
    type Service = AccessLog<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AccessLog {
            inner,
            sink: self.sink.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AccessLog<S> {
    inner: S,
    sink: SharedSink,
}

impl<S, ReqBody> Service<Request<ReqBody>> for AccessLog<S>
where
    S: Service<Request<ReqBody>, Response = Response<Body>>,
    S::Future: Send + 'static,
    S::Error: 'static,
    ReqBody: 'static,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        let record = RequestRecord::capture(&request);
        let sink = self.sink.clone();
        let future = self.inner.call(request);

        Box::pin(async move {
            let response = future.await?;
            let (parts, body) = response.into_parts();
            let body = CountingBody {
                inner: body,
                bytes: 0,
                status: parts.status,
                record: Some(record),
                sink,
            };
            Ok(Response::from_parts(parts, Body::new(body)))
        })
    }
}

/// Response body that counts bytes and writes the log line when finished.
struct CountingBody {
    inner: Body,
    bytes: u64,
    status: StatusCode,
    record: Option<RequestRecord>,
    sink: SharedSink,
}

impl CountingBody {
    fn finish(&mut self) {
        if let Some(record) = self.record.take() {
            self.sink.write_line(&record.format(self.status, self.bytes));
        }
    }
}

impl http_body::Body for CountingBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let poll = Pin::new(&mut self.inner).poll_frame(cx);
        match &poll {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(data) = frame.data_ref() {
                    self.bytes += data.len() as u64;
                }
            }
            Poll::Ready(None) => self.finish(),
            _ => {}
        }
        poll
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for CountingBody {
    fn drop(&mut self) {
        self.finish();
    }
}
