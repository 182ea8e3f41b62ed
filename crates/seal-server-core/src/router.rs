//! Path-based request routing.
//!
//! Patterns ending in `/` match their whole subtree; other patterns match a
//! single path exactly. When several patterns match, the longest wins.
//! Requests that match nothing get `404 page not found`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use http::{Request, Response, StatusCode};
use http_body_util::Full;
use seal_proto::PeerIdentity;

/// Boxed response future returned by a [`Handler`].
pub type HandlerFuture = Pin<Box<dyn Future<Output = Response<Full<Bytes>>> + Send>>;

/// Something that answers a request from a verified peer.
///
/// Implemented for async closures taking `(Request<Bytes>, PeerIdentity)`.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, req: Request<Bytes>, peer: PeerIdentity) -> HandlerFuture;
}

impl<F, Fut> Handler for F
where
    F: Fn(Request<Bytes>, PeerIdentity) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response<Full<Bytes>>> + Send + 'static,
{
    fn call(&self, req: Request<Bytes>, peer: PeerIdentity) -> HandlerFuture {
        Box::pin(self(req, peer))
    }
}

/// Routing table from path patterns to handlers.
#[derive(Clone, Default)]
pub struct Router {
    routes: Vec<(String, Arc<dyn Handler>)>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `pattern`. A later registration of the same
    /// pattern replaces the earlier one.
    pub fn route(mut self, pattern: impl Into<String>, handler: impl Handler) -> Self {
        let pattern = pattern.into();
        let handler: Arc<dyn Handler> = Arc::new(handler);
        match self.routes.iter_mut().find(|(p, _)| *p == pattern) {
            Some(slot) => slot.1 = handler,
            None => self.routes.push((pattern, handler)),
        }
        self
    }

    /// Find the handler for `path`, if any.
    fn lookup(&self, path: &str) -> Option<&Arc<dyn Handler>> {
        self.routes
            .iter()
            .filter(|(pattern, _)| pattern_matches(pattern, path))
            .max_by_key(|(pattern, _)| pattern.len())
            .map(|(_, handler)| handler)
    }

    /// Run the matching handler, or answer 404.
    pub async fn dispatch(&self, req: Request<Bytes>, peer: PeerIdentity) -> Response<Full<Bytes>> {
        match self.lookup(req.uri().path()) {
            Some(handler) => handler.call(req, peer).await,
            None => plain_response(StatusCode::NOT_FOUND, "404 page not found\n"),
        }
    }
}

fn pattern_matches(pattern: &str, path: &str) -> bool {
    if pattern.ends_with('/') {
        path.starts_with(pattern)
    } else {
        path == pattern
    }
}

/// A `text/plain` response with the given status and body.
pub fn plain_response(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}
