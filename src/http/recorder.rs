//! In-memory `ResponseWriter` for tests.
//!
//! Records the committed status, a snapshot of the headers at commit time,
//! the body, and whether the response was flushed or hijacked. Header
//! mutations after the commit stay visible through `headers()` but not in
//! `committed_headers()`, the same way they would never reach the wire.

use std::io;

use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode};

use crate::http::writer::{Connection, Flusher, HijackError, Hijacked, Hijacker, ResponseWriter};

#[derive(Debug)]
pub struct ResponseRecorder {
    headers: HeaderMap,
    status: Option<StatusCode>,
    committed: Option<HeaderMap>,
    commit_count: usize,
    body: Vec<u8>,
    can_flush: bool,
    flushed: bool,
    hijack: HijackState,
}

#[derive(Debug)]
enum HijackState {
    Unsupported,
    Ready(Hijacked),
    Taken,
}

impl ResponseRecorder {
    /// A recorder that can flush but not hijack.
    pub fn new() -> Self {
        Self {
            headers: HeaderMap::new(),
            status: None,
            committed: None,
            commit_count: 0,
            body: Vec::new(),
            can_flush: true,
            flushed: false,
            hijack: HijackState::Unsupported,
        }
    }

    /// Remove the flush capability.
    pub fn without_flush(mut self) -> Self {
        self.can_flush = false;
        self
    }

    /// Add the hijack capability, handing out `conn` and `buffered` once.
    pub fn with_hijack(mut self, conn: impl Connection + 'static, buffered: Bytes) -> Self {
        self.hijack = HijackState::Ready(Hijacked {
            conn: Box::new(conn),
            buffered,
        });
        self
    }

    /// The committed status, if any.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Headers as they were when the status was committed.
    pub fn committed_headers(&self) -> Option<&HeaderMap> {
        self.committed.as_ref()
    }

    /// Number of times `write_header` reached this recorder.
    pub fn commit_count(&self) -> usize {
        self.commit_count
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn flushed(&self) -> bool {
        self.flushed
    }

    pub fn hijacked(&self) -> bool {
        matches!(self.hijack, HijackState::Taken)
    }

    fn commit_if_needed(&mut self) {
        if self.status.is_none() {
            self.write_header(StatusCode::OK);
        }
    }
}

impl Default for ResponseRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseWriter for ResponseRecorder {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_header(&mut self, status: StatusCode) {
        self.commit_count += 1;
        if self.status.is_some() {
            return;
        }
        self.status = Some(status);
        self.committed = Some(self.headers.clone());
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.commit_if_needed();
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn as_flusher(&mut self) -> Option<&mut dyn Flusher> {
        if self.can_flush {
            Some(self)
        } else {
            None
        }
    }

    fn as_hijacker(&mut self) -> Option<&mut dyn Hijacker> {
        match self.hijack {
            HijackState::Unsupported => None,
            _ => Some(self),
        }
    }
}

impl Flusher for ResponseRecorder {
    fn flush(&mut self) -> io::Result<()> {
        self.commit_if_needed();
        self.flushed = true;
        Ok(())
    }
}

impl Hijacker for ResponseRecorder {
    fn hijack(&mut self) -> Result<Hijacked, HijackError> {
        match std::mem::replace(&mut self.hijack, HijackState::Taken) {
            HijackState::Ready(hijacked) => Ok(hijacked),
            HijackState::Taken => Err(HijackError::AlreadyHijacked),
            HijackState::Unsupported => {
                self.hijack = HijackState::Unsupported;
                Err(HijackError::Unsupported)
            }
        }
    }
}
