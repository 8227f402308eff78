//! Directory serving.
//!
//! Files and `index.html` pages come from `ServeDir`. A directory requested
//! with a trailing slash and holding no `index.html` gets a generated
//! listing: one link per entry, sorted by name, subdirectories suffixed
//! with `/`.

use std::convert::Infallible;
use std::fmt::Write as _;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{Method, Request, Response, StatusCode};
use futures_util::future::BoxFuture;
use tower::{Service, ServiceExt};
use tower_http::services::ServeDir;

const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Static file handler rooted at one directory.
#[derive(Debug, Clone)]
pub struct FileServer {
    root: PathBuf,
    files: ServeDir,
}

impl FileServer {
    pub fn new(root: PathBuf) -> Self {
        Self {
            files: ServeDir::new(&root),
            root,
        }
    }

    /// Directory a listing would be rendered for, if `path` names one.
    /// Paths escaping the root never do.
    fn listing_dir(&self, path: &str) -> Option<PathBuf> {
        if !path.ends_with('/') {
            return None;
        }
        let decoded = urlencoding::decode(path).ok()?;

        let mut dir = self.root.clone();
        for component in Path::new(decoded.as_ref()).components() {
            match component {
                Component::Normal(part) => dir.push(part),
                Component::RootDir | Component::CurDir => {}
                Component::ParentDir | Component::Prefix(_) => return None,
            }
        }
        Some(dir)
    }
}

impl Service<Request<Body>> for FileServer {
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let listing = match *request.method() {
            Method::GET | Method::HEAD => self.listing_dir(request.uri().path()),
            _ => None,
        };
        let files = self.files.clone();

        Box::pin(async move {
            let response = match files.oneshot(request).await {
                Ok(response) => response.map(Body::new),
                Err(never) => match never {},
            };

            let dir = match listing {
                Some(dir) if response.status() == StatusCode::NOT_FOUND => dir,
                _ => return Ok(response),
            };
            match render_listing(&dir).await {
                Ok(listing) => Ok(listing),
                Err(e) => {
                    if e.kind() != io::ErrorKind::NotFound {
                        tracing::debug!(dir = %dir.display(), error = %e, "No listing");
                    }
                    Ok(response)
                }
            }
        })
    }
}

async fn render_listing(dir: &Path) -> io::Result<Response<Body>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        let is_dir = entry.file_type().await?.is_dir();
        names.push((name, is_dir));
    }
    names.sort();

    let mut html = String::from(
        "<!doctype html>\n<meta name=\"viewport\" content=\"width=device-width\">\n<pre>\n",
    );
    for (name, is_dir) in &names {
        let slash = if *is_dir { "/" } else { "" };
        let _ = writeln!(
            html,
            "<a href=\"{}{slash}\">{}{slash}</a>",
            urlencoding::encode(name),
            html_escape::encode_text(name),
        );
    }
    html.push_str("</pre>\n");

    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, HTML_CONTENT_TYPE)
        .body(Body::from(html))
        .map_err(io::Error::other)
}
