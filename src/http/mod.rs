//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Writer-based pipeline (handler.rs / writer.rs):
//!     request → RewriteHeaders (interceptor.rs)
//!         → next handler drives a ResponseRewriter
//!         → write_header: rules applied, then the real writer commits
//!
//! Axum pipeline (server.rs):
//!     TCP connection
//!     → TraceLayer / TimeoutLayer
//!     → middleware/rewrite_headers.rs (rules applied to the returned Response)
//!     → proxy_handler (forward to upstream)
//! ```

pub mod handler;
pub mod interceptor;
pub mod middleware;
pub mod recorder;
pub mod server;
pub mod writer;

pub use handler::{handler_fn, request_host, Handler, HandlerFn};
pub use interceptor::{ResponseRewriter, RewriteHeaders};
pub use recorder::ResponseRecorder;
pub use server::HttpServer;
pub use writer::{Connection, Flusher, HijackError, Hijacked, Hijacker, ResponseWriter};
