//! Base handler selection: serve a directory or reverse-proxy a target.

use std::path::PathBuf;

use crate::config::{Config, ValidationError};
use crate::http::files::FileServer;
use crate::http::proxy::{ProxyTarget, ReverseProxy};
use crate::http::Handler;

/// The innermost handler of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaseHandler {
    /// Serve files from a directory, listing folders without an index.
    /// The root is not checked at startup; a missing path answers 404.
    StaticFiles { root: PathBuf },
    /// Forward every request to a single upstream.
    ReverseProxy(ProxyTarget),
}

impl BaseHandler {
    /// Pick the base handler. A proxy target takes precedence over `dir`.
    pub fn select(config: &Config) -> Result<Self, ValidationError> {
        match config.proxy.as_deref() {
            Some(raw) if !raw.is_empty() => Ok(Self::ReverseProxy(ProxyTarget::parse(raw)?)),
            _ => Ok(Self::StaticFiles {
                root: config.dir.clone(),
            }),
        }
    }

    pub fn proxy_target(&self) -> Option<&ProxyTarget> {
        match self {
            Self::ReverseProxy(target) => Some(target),
            Self::StaticFiles { .. } => None,
        }
    }

    pub fn into_handler(self) -> Handler {
        match self {
            Self::StaticFiles { root } => {
                tracing::debug!(root = %root.display(), "Serving directory");
                Handler::new(FileServer::new(root))
            }
            Self::ReverseProxy(target) => {
                tracing::debug!(target_authority = %target.authority(), "Proxying to target");
                Handler::new(ReverseProxy::new(target))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[test]
    fn no_proxy_selects_directory() {
        let config = Config {
            dir: PathBuf::from("/tmp/www"),
            ..Config::default()
        };
        assert_eq!(
            BaseHandler::select(&config).unwrap(),
            BaseHandler::StaticFiles {
                root: PathBuf::from("/tmp/www")
            }
        );
    }

    #[test]
    fn proxy_overrides_directory() {
        let config = Config {
            dir: PathBuf::from("/tmp/www"),
            proxy: Some("http://localhost:9999".into()),
            ..Config::default()
        };
        let base = BaseHandler::select(&config).unwrap();
        assert_eq!(
            base.proxy_target().map(|t| t.authority().as_str()),
            Some("localhost:9999")
        );
    }

    #[test]
    fn invalid_proxy_is_config_error() {
        let config = Config {
            proxy: Some("::not-a-url::".into()),
            ..Config::default()
        };
        assert!(matches!(
            BaseHandler::select(&config),
            Err(ValidationError::InvalidProxyUrl { .. })
        ));
    }

    #[tokio::test]
    async fn serves_files_from_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>hi</h1>").unwrap();

        let handler = BaseHandler::StaticFiles {
            root: dir.path().to_path_buf(),
        }
        .into_handler();

        let response = handler
            .oneshot(Request::get("/index.html").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"<h1>hi</h1>");
    }

    #[tokio::test]
    async fn directory_without_index_is_listed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "n").unwrap();

        let handler = BaseHandler::StaticFiles {
            root: dir.path().to_path_buf(),
        }
        .into_handler();

        let response = handler
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&body).contains("<a href=\"notes.txt\">notes.txt</a>"));
    }

    #[tokio::test]
    async fn missing_root_is_not_found() {
        let handler = BaseHandler::StaticFiles {
            root: PathBuf::from("/definitely/not/here"),
        }
        .into_handler();

        let response = handler
            .oneshot(Request::get("/index.html").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
