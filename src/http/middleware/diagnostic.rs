//! Per-request diagnostic dump for `--debug`.
//!
//! Writes the request line fields, every header and every query/form
//! parameter to the sink before delegating. Multi-valued entries are
//! joined with commas.
//!
//! URL-encoded form bodies with a known length up to [`FORM_BODY_LIMIT`] are
//! buffered to list their parameters, then handed to the inner handler
//! unchanged. Any other body is left unread.

use std::fmt::Write as _;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE, HOST, TRANSFER_ENCODING};
use axum::http::{HeaderMap, Request};
use futures_util::future::BoxFuture;
use tower::{Layer, Service};
use url::form_urlencoded;

use crate::observability::SharedSink;

/// Largest form body buffered for logging.
pub const FORM_BODY_LIMIT: usize = 10 << 20;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

#[derive(Clone)]
pub struct DiagnosticLogLayer {
    sink: SharedSink,
}

impl DiagnosticLogLayer {
    pub fn new(sink: SharedSink) -> Self {
        Self { sink }
    }
}

impl<S> Layer<S> for DiagnosticLogLayer {
    type Service = DiagnosticLog<S>;

    fn layer(&self, inner: S) -> Self::Service {
        DiagnosticLog {
            inner,
            sink: self.sink.clone(),
        }
    }
}

#[derive(Clone)]
pub struct DiagnosticLog<S> {
    inner: S,
    sink: SharedSink,
}

impl<S> Service<Request<Body>> for DiagnosticLog<S>
where
    S: Service<Request<Body>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Response: 'static,
    S::Error: 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        // The clone may not be ready; keep the one poll_ready was called on.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let sink = self.sink.clone();

        Box::pin(async move {
            let (request, dump) = describe(request).await;
            sink.write_line(&dump);
            inner.call(request).await
        })
    }
}

/// Render the dump, buffering a form body if there is one.
async fn describe(request: Request<Body>) -> (Request<Body>, String) {
    let (parts, body) = request.into_parts();

    let (body, form) = if is_bounded_form(&parts.headers) {
        match axum::body::to_bytes(body, FORM_BODY_LIMIT).await {
            Ok(bytes) => {
                let form = group_params(form_urlencoded::parse(&bytes));
                (Body::from(bytes), form)
            }
            Err(e) => {
                tracing::warn!(error = %e, uri = %parts.uri, "Failed to read form body");
                (Body::empty(), Vec::new())
            }
        }
    } else {
        (body, Vec::new())
    };

    let query = parts
        .uri
        .query()
        .map(|q| group_params(form_urlencoded::parse(q.as_bytes())))
        .unwrap_or_default();

    let host = parts
        .headers
        .get(HOST)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
        .or_else(|| parts.uri.authority().map(|a| a.to_string()))
        .unwrap_or_default();

    let mut out = String::with_capacity(512);
    let _ = writeln!(out, "Request:");
    let _ = writeln!(out, "  Protocol: {:?}", parts.version);
    let _ = writeln!(out, "  Method: {}", parts.method);
    let _ = writeln!(out, "  Content length: {}", content_length(&parts.headers));
    let _ = writeln!(out, "  URI: {}", parts.uri);
    let _ = writeln!(out, "  Host: {host}");
    let _ = writeln!(out, "  Path: {}", parts.uri.path());
    let _ = writeln!(out, "  Query: {}", parts.uri.query().unwrap_or_default());

    let _ = writeln!(out, "Request headers:");
    for name in parts.headers.keys() {
        let values: Vec<String> = parts
            .headers
            .get_all(name)
            .iter()
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .collect();
        let _ = writeln!(out, "  {}: {}", name, values.join(","));
    }

    let _ = writeln!(out, "Request parameters:");
    for (key, values) in &query {
        let _ = writeln!(out, "  Query string parameter [{}] value [{}]", key, values.join(","));
    }
    for (key, values) in &form {
        let _ = writeln!(out, "  Form parameter [{}] value [{}]", key, values.join(","));
    }

    let dump = out.trim_end().to_string();
    (Request::from_parts(parts, body), dump)
}

/// Declared length, `-1` when the body length is unknown.
fn content_length(headers: &HeaderMap) -> i64 {
    if let Some(len) = headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<i64>().ok())
    {
        return len;
    }
    if headers.contains_key(TRANSFER_ENCODING) {
        -1
    } else {
        0
    }
}

fn is_bounded_form(headers: &HeaderMap) -> bool {
    let is_form = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case(FORM_CONTENT_TYPE));

    let len = content_length(headers);
    is_form && len > 0 && (len as usize) <= FORM_BODY_LIMIT
}

/// Collect key/value pairs, keeping first-seen key order.
fn group_params<'a>(
    pairs: impl Iterator<Item = (std::borrow::Cow<'a, str>, std::borrow::Cow<'a, str>)>,
) -> Vec<(String, Vec<String>)> {
    let mut grouped: Vec<(String, Vec<String>)> = Vec::new();
    for (key, value) in pairs {
        match grouped.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value.into_owned()),
            None => grouped.push((key.into_owned(), vec![value.into_owned()])),
        }
    }
    grouped
}
