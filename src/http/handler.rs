//! The handler contract shared by every stage of a writer-based pipeline.
//!
//! Used by library embedders (see `http::writer`); the proxy binary serves
//! through the axum router.

use std::sync::Arc;

use axum::body::Bytes;
use axum::http::{header::HOST, Request};

use crate::http::writer::ResponseWriter;

/// A stage that answers a request by driving a `ResponseWriter`.
pub trait Handler: Send + Sync {
    fn serve(&self, req: &Request<Bytes>, w: &mut dyn ResponseWriter);
}

impl<H: Handler + ?Sized> Handler for Arc<H> {
    fn serve(&self, req: &Request<Bytes>, w: &mut dyn ResponseWriter) {
        (**self).serve(req, w)
    }
}

impl<H: Handler + ?Sized> Handler for Box<H> {
    fn serve(&self, req: &Request<Bytes>, w: &mut dyn ResponseWriter) {
        (**self).serve(req, w)
    }
}

/// A handler built from a closure. See [`handler_fn`].
#[derive(Clone, Copy)]
pub struct HandlerFn<F> {
    f: F,
}

/// Wrap a closure as a [`Handler`].
pub fn handler_fn<F>(f: F) -> HandlerFn<F>
where
    F: Fn(&Request<Bytes>, &mut dyn ResponseWriter) + Send + Sync,
{
    HandlerFn { f }
}

impl<F> Handler for HandlerFn<F>
where
    F: Fn(&Request<Bytes>, &mut dyn ResponseWriter) + Send + Sync,
{
    fn serve(&self, req: &Request<Bytes>, w: &mut dyn ResponseWriter) {
        (self.f)(req, w)
    }
}

/// The host a request was addressed to.
///
/// Uses the `Host` header, falling back to the URI authority (HTTP/2
/// `:authority` or absolute-form requests). Any port is kept.
pub fn request_host<B>(req: &Request<B>) -> &str {
    req.headers()
        .get(HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| {
            req.uri()
                .authority()
                .map(|a| a.as_str().rsplit('@').next().unwrap_or_default())
        })
        .unwrap_or_default()
}
