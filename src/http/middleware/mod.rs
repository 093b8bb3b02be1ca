//! Axum middleware.

pub mod rewrite_headers;

pub use rewrite_headers::{rewrite_headers_middleware, RewriteState};
