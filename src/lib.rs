//! Response header rewriting for reverse proxies.
//!
//! Rewrites configured response headers with regex substitutions right
//! before the response is committed, optionally inserting the request host
//! through the `{RequestHost}` token.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod rewrite;

pub use config::schema::ProxyConfig;
pub use http::{HttpServer, RewriteHeaders};
pub use lifecycle::Shutdown;
pub use rewrite::{Rule, RuleError, RuleSet};
