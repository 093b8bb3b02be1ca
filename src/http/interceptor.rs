//! Response header rewriting handler.
//!
//! # Responsibilities
//! - Wrap the next handler with a decorated `ResponseWriter`
//! - Rewrite configured headers exactly once, when the status is committed
//! - Forward body writes, flushes and hijacks to the real writer
//!
//! # Design Decisions
//! - Header reads and writes are never buffered; only the commit is intercepted
//! - The commit is a one-shot latch: later `write_header` calls are dropped
//!   with a warning so the rewrite never runs twice
//! - A body write or flush before any commit commits `200 OK` through the
//!   rewrite path, so implicit commits are rewritten too

use std::io;
use std::sync::Arc;

use axum::body::Bytes;
use axum::http::{HeaderMap, Request, StatusCode};

use crate::config::RewriteConfig;
use crate::http::handler::{request_host, Handler};
use crate::http::writer::{Flusher, HijackError, Hijacked, Hijacker, ResponseWriter};
use crate::rewrite::{RuleError, RuleSet};

const DEFAULT_NAME: &str = "rewrite-response-headers";

/// A handler that rewrites the response headers produced by `next`.
pub struct RewriteHeaders<H> {
    name: String,
    next: H,
    rules: Arc<RuleSet>,
}

impl<H: Handler> RewriteHeaders<H> {
    /// Wrap `next` with an already compiled rule set.
    pub fn new(next: H, rules: Arc<RuleSet>) -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            next,
            rules,
        }
    }

    /// Compile `rewrites` and wrap `next`. Fails if any regex is invalid.
    pub fn from_config(
        next: H,
        rewrites: &[RewriteConfig],
        name: impl Into<String>,
    ) -> Result<Self, RuleError> {
        let name = name.into();
        let rules = RuleSet::compile(rewrites).inspect_err(|e| {
            tracing::error!(middleware = %name, error = %e, "Invalid rewrite configuration");
        })?;

        tracing::info!(middleware = %name, rules = rules.len(), "Response header rewrites compiled");

        Ok(Self {
            name,
            next,
            rules: Arc::new(rules),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rules(&self) -> &Arc<RuleSet> {
        &self.rules
    }
}

impl<H: Handler> Handler for RewriteHeaders<H> {
    fn serve(&self, req: &Request<Bytes>, w: &mut dyn ResponseWriter) {
        let mut rewriter = ResponseRewriter::new(w, &self.rules, request_host(req));
        self.next.serve(req, &mut rewriter);
    }
}

/// Per-request decorator around the real writer.
pub struct ResponseRewriter<'a> {
    writer: &'a mut dyn ResponseWriter,
    rules: &'a RuleSet,
    request_host: String,
    committed: bool,
}

impl<'a> ResponseRewriter<'a> {
    pub fn new(
        writer: &'a mut dyn ResponseWriter,
        rules: &'a RuleSet,
        request_host: impl Into<String>,
    ) -> Self {
        Self {
            writer,
            rules,
            request_host: request_host.into(),
            committed: false,
        }
    }

    pub fn request_host(&self) -> &str {
        &self.request_host
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    fn ensure_committed(&mut self) {
        if !self.committed {
            self.write_header(StatusCode::OK);
        }
    }
}

impl ResponseWriter for ResponseRewriter<'_> {
    fn headers(&self) -> &HeaderMap {
        self.writer.headers()
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.writer.headers_mut()
    }

    fn write_header(&mut self, status: StatusCode) {
        if self.committed {
            tracing::warn!(status = status.as_u16(), "Superfluous write_header call ignored");
            return;
        }
        self.committed = true;

        self.rules.apply(self.writer.headers_mut(), &self.request_host);
        self.writer.write_header(status);
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.ensure_committed();
        self.writer.write(buf)
    }

    fn as_flusher(&mut self) -> Option<&mut dyn Flusher> {
        Some(self)
    }

    fn as_hijacker(&mut self) -> Option<&mut dyn Hijacker> {
        Some(self)
    }
}

impl Flusher for ResponseRewriter<'_> {
    /// Forwards to the real writer; a no-op when it cannot flush.
    fn flush(&mut self) -> io::Result<()> {
        if self.writer.as_flusher().is_none() {
            return Ok(());
        }
        self.ensure_committed();
        match self.writer.as_flusher() {
            Some(flusher) => flusher.flush(),
            None => Ok(()),
        }
    }
}

impl Hijacker for ResponseRewriter<'_> {
    fn hijack(&mut self) -> Result<Hijacked, HijackError> {
        self.writer
            .as_hijacker()
            .ok_or(HijackError::Unsupported)?
            .hijack()
    }
}
