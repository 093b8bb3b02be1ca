//! Response writing surface.
//!
//! A `ResponseWriter` is what a handler uses to build a response: mutate
//! headers, commit the status line, then write the body. Flushing and
//! connection takeover are optional capabilities discovered at call time
//! through `as_flusher` / `as_hijacker`.
//!
//! This is the embedding surface of the library: hosts that drive responses
//! through a writer stack `RewriteHeaders` in front of their own `Handler`.
//! The bundled proxy binary runs on axum instead and applies the same
//! `RuleSet` through `http::middleware`.

use std::fmt;
use std::io;

use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode};
use thiserror::Error;

/// Base response writing capabilities.
pub trait ResponseWriter {
    /// Headers that will be sent when the status is committed.
    fn headers(&self) -> &HeaderMap;

    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Commit the status line and headers.
    ///
    /// Only the first call takes effect. Decorators may drop later calls
    /// instead of forwarding them.
    fn write_header(&mut self, status: StatusCode);

    /// Write body bytes. Commits `200 OK` first if nothing was committed yet.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Flush capability, if the writer has one.
    fn as_flusher(&mut self) -> Option<&mut dyn Flusher> {
        None
    }

    /// Connection takeover capability, if the writer has one.
    fn as_hijacker(&mut self) -> Option<&mut dyn Hijacker> {
        None
    }
}

/// Writers that can push buffered data to the client immediately.
pub trait Flusher {
    fn flush(&mut self) -> io::Result<()>;
}

/// Writers that can hand over the raw client connection.
pub trait Hijacker {
    fn hijack(&mut self) -> Result<Hijacked, HijackError>;
}

/// A raw, bidirectional client connection.
pub trait Connection: io::Read + io::Write + Send {}

impl<T> Connection for T where T: io::Read + io::Write + Send {}

/// The result of a successful hijack.
pub struct Hijacked {
    /// The raw connection; the HTTP server no longer touches it.
    pub conn: Box<dyn Connection>,
    /// Bytes already read from the client but not yet consumed by the server.
    pub buffered: Bytes,
}

impl fmt::Debug for Hijacked {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hijacked")
            .field("buffered", &self.buffered.len())
            .finish_non_exhaustive()
    }
}

/// Error returned by `Hijacker::hijack`.
#[derive(Debug, Error)]
pub enum HijackError {
    #[error("response writer does not support connection hijacking")]
    Unsupported,

    #[error("connection has already been hijacked")]
    AlreadyHijacked,

    #[error("hijack failed: {0}")]
    Io(#[from] io::Error),
}
