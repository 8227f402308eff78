//! Pipeline assembly.
//!
//! # Wrap order (innermost first)
//! ```text
//! base handler (files | reverse proxy)
//!     → write timeout     always; answers 408
//!     → host rewrite      proxy mode only
//!     → access log        unless --quiet
//!     → CORS              unless --nocors
//!     → diagnostic log    only with --debug (error with --quiet)
//!     → cache suppression only with --nocache
//! ```
//!
//! The order depends only on `Config`, never on request content. Cache
//! suppression is outermost so its headers win over anything set inside;
//! the diagnostic dump sits outside the access log and CORS so it sees
//! every request, preflights included. The write timeout wraps only the
//! base handler, so a timed-out request still passes every decorator.

use axum::http::StatusCode;
use tower::Layer;
use tower_http::timeout::TimeoutLayer;

use crate::config::{validate_config, Config, ValidationError};
use crate::http::base::BaseHandler;
use crate::http::middleware::{
    cors_layer, AccessLogLayer, DiagnosticLogLayer, HostRewriteLayer, NoCacheLayer,
};
use crate::http::Handler;
use crate::observability::SharedSink;

/// A decorator applied by the assembler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decorator {
    HostRewrite,
    AccessLog,
    Cors,
    DiagnosticLog,
    NoCache,
}

/// The composed handler plus a record of how it was built.
#[derive(Clone)]
pub struct Pipeline {
    handler: Handler,
    base: BaseHandler,
    /// Outermost first.
    decorators: Vec<Decorator>,
}

impl Pipeline {
    /// Select the base handler and wrap it according to `config`.
    ///
    /// `sink` receives the access log and the diagnostic dumps.
    pub fn assemble(config: &Config, sink: SharedSink) -> Result<Self, ValidationError> {
        validate_config(config)?;
        let base = BaseHandler::select(config)?;
        let mut handler = Handler::new(
            TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                config.listener.write_timeout,
            )
            .layer(base.clone().into_handler()),
        );
        let mut applied = Vec::with_capacity(5);

        if let Some(target) = base.proxy_target() {
            let host = target.host_header().clone();
            handler = Handler::new(HostRewriteLayer::new(host).layer(handler));
            applied.push(Decorator::HostRewrite);
        }

        if !config.quiet {
            handler = Handler::new(AccessLogLayer::new(sink.clone()).layer(handler));
            applied.push(Decorator::AccessLog);
        }

        if !config.no_cors {
            handler = Handler::new(cors_layer().layer(handler));
            applied.push(Decorator::Cors);
        }

        if config.debug {
            handler = Handler::new(DiagnosticLogLayer::new(sink.clone()).layer(handler));
            applied.push(Decorator::DiagnosticLog);
        }

        if config.no_cache {
            handler = Handler::new(NoCacheLayer.layer(handler));
            applied.push(Decorator::NoCache);
        }

        applied.reverse();
        tracing::debug!(decorators = ?applied, "Pipeline assembled");

        Ok(Self {
            handler,
            base,
            decorators: applied,
        })
    }

    /// Applied decorators, outermost first.
    pub fn decorators(&self) -> &[Decorator] {
        &self.decorators
    }

    pub fn contains(&self, decorator: Decorator) -> bool {
        self.decorators.contains(&decorator)
    }

    pub fn base(&self) -> &BaseHandler {
        &self.base
    }

    pub fn handler(&self) -> Handler {
        self.handler.clone()
    }

    pub fn into_handler(self) -> Handler {
        self.handler
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::middleware::no_cache::CACHE_CONTROL_VALUE;
    use crate::observability::MemorySink;
    use axum::body::Body;
    use axum::http::header::{
        ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_REQUEST_METHOD, CACHE_CONTROL, EXPIRES,
        ORIGIN, PRAGMA,
    };
    use axum::http::{Method, Request};
    use tower::ServiceExt;

    fn config(proxy: bool, quiet: bool, no_cors: bool, debug: bool, no_cache: bool) -> Config {
        Config {
            proxy: proxy.then(|| "http://localhost:9999".to_string()),
            quiet,
            no_cors,
            debug,
            no_cache,
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn decorator_truth_table() {
        for bits in 0u8..32 {
            let (proxy, quiet, no_cors, debug, no_cache) = (
                bits & 1 != 0,
                bits & 2 != 0,
                bits & 4 != 0,
                bits & 8 != 0,
                bits & 16 != 0,
            );
            let cfg = config(proxy, quiet, no_cors, debug, no_cache);
            let result = Pipeline::assemble(&cfg, MemorySink::new());

            if debug && quiet {
                assert!(
                    matches!(result, Err(ValidationError::IncompatibleFlags(..))),
                    "bits={bits:05b}"
                );
                continue;
            }

            let mut expected = Vec::new();
            if no_cache {
                expected.push(Decorator::NoCache);
            }
            if debug {
                expected.push(Decorator::DiagnosticLog);
            }
            if !no_cors {
                expected.push(Decorator::Cors);
            }
            if !quiet {
                expected.push(Decorator::AccessLog);
            }
            if proxy {
                expected.push(Decorator::HostRewrite);
            }

            let pipeline = result.unwrap();
            assert_eq!(pipeline.decorators(), expected.as_slice(), "bits={bits:05b}");
            assert_eq!(pipeline.base().proxy_target().is_some(), proxy);
            assert_eq!(pipeline.contains(Decorator::HostRewrite), proxy);
        }
    }

    #[test]
    fn invalid_proxy_fails_before_composition() {
        let cfg = Config {
            proxy: Some("https://secure.example".into()),
            ..Config::default()
        };
        assert!(matches!(
            Pipeline::assemble(&cfg, MemorySink::new()),
            Err(ValidationError::UnsupportedProxyScheme(_))
        ));
    }

    fn www() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<p>index</p>").unwrap();
        dir
    }

    fn file_config(dir: &tempfile::TempDir) -> Config {
        Config {
            dir: dir.path().to_path_buf(),
            ..Config::default()
        }
    }

    async fn get(handler: Handler, uri: &str) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        let response = handler
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, body.to_vec())
    }

    #[tokio::test]
    async fn quiet_writes_nothing() {
        let dir = www();
        let sink = MemorySink::new();
        let cfg = Config {
            quiet: true,
            ..file_config(&dir)
        };
        let pipeline = Pipeline::assemble(&cfg, sink.clone()).unwrap();

        let (status, _, _) = get(pipeline.handler(), "/index.html").await;
        assert_eq!(status, StatusCode::OK);
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn default_logs_each_request() {
        let dir = www();
        let sink = MemorySink::new();
        let pipeline = Pipeline::assemble(&file_config(&dir), sink.clone()).unwrap();

        let (_, headers, _) = get(pipeline.handler(), "/index.html").await;
        get(pipeline.handler(), "/missing.html").await;

        assert!(!headers.contains_key(CACHE_CONTROL));
        let lines = sink.lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("\"GET /index.html HTTP/1.1\" 200 12"), "{}", lines[0]);
        assert!(lines[1].contains("\"GET /missing.html HTTP/1.1\" 404"), "{}", lines[1]);
    }

    #[tokio::test]
    async fn no_cache_headers_on_every_response() {
        let dir = www();
        let cfg = Config {
            no_cache: true,
            ..file_config(&dir)
        };
        let pipeline = Pipeline::assemble(&cfg, MemorySink::new()).unwrap();

        for uri in ["/index.html", "/missing.html"] {
            let (_, headers, _) = get(pipeline.handler(), uri).await;
            assert_eq!(headers[CACHE_CONTROL], CACHE_CONTROL_VALUE);
            assert_eq!(headers[PRAGMA], "no-cache");
            assert_eq!(headers[EXPIRES], "0");
        }
    }

    #[tokio::test]
    async fn repeated_gets_are_identical() {
        let dir = www();
        let pipeline = Pipeline::assemble(&file_config(&dir), MemorySink::new()).unwrap();

        let (s1, _, b1) = get(pipeline.handler(), "/index.html").await;
        let (s2, _, b2) = get(pipeline.handler(), "/index.html").await;
        assert_eq!(s1, s2);
        assert_eq!(b1, b2);
        assert_eq!(b1, b"<p>index</p>");
    }

    #[tokio::test]
    async fn preflight_never_reaches_file_server() {
        let dir = www();
        let sink = MemorySink::new();
        let pipeline = Pipeline::assemble(&file_config(&dir), sink.clone()).unwrap();

        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/index.html")
            .header(ORIGIN, "http://example.com")
            .header(ACCESS_CONTROL_REQUEST_METHOD, "GET")
            .body(Body::empty())
            .unwrap();
        let response = pipeline.handler().oneshot(request).await.unwrap();

        // The file server answers OPTIONS with 405; a 200 means CORS replied.
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        drop(response);
        assert!(sink.is_empty(), "access log sits inside CORS");
    }

    #[tokio::test]
    async fn plain_options_reaches_file_server() {
        let dir = www();
        let cfg = Config {
            quiet: true,
            ..file_config(&dir)
        };
        let pipeline = Pipeline::assemble(&cfg, MemorySink::new()).unwrap();

        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/index.html")
            .header(ORIGIN, "http://example.com")
            .body(Body::empty())
            .unwrap();
        let response = pipeline.handler().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[tokio::test]
    async fn nocors_lets_options_through() {
        let dir = www();
        let cfg = Config {
            no_cors: true,
            quiet: true,
            ..file_config(&dir)
        };
        let pipeline = Pipeline::assemble(&cfg, MemorySink::new()).unwrap();

        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/index.html")
            .header(ORIGIN, "http://example.com")
            .body(Body::empty())
            .unwrap();
        let response = pipeline.handler().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert!(!response.headers().contains_key(ACCESS_CONTROL_ALLOW_ORIGIN));
    }

    #[tokio::test]
    async fn debug_dump_precedes_access_line() {
        let dir = www();
        let sink = MemorySink::new();
        let cfg = Config {
            debug: true,
            ..file_config(&dir)
        };
        let pipeline = Pipeline::assemble(&cfg, sink.clone()).unwrap();

        get(pipeline.handler(), "/index.html?v=1").await;

        let lines = sink.lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Request:"));
        assert!(lines[0].contains("Query string parameter [v] value [1]"));
        assert!(lines[1].contains("\"GET /index.html?v=1 HTTP/1.1\" 200"));
    }
}
