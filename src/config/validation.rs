//! Configuration validation.
//!
//! Serde handles the syntax; this module checks what serde cannot: that
//! addresses parse, timeouts are positive, log filters are well formed and
//! every rewrite compiles. All errors are collected, not just the first.

use std::net::SocketAddr;
use std::str::FromStr;

use axum::http::uri::Authority;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::config::schema::ProxyConfig;
use crate::rewrite::Rule;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid listener bind address {0:?}")]
    InvalidBindAddress(String),

    #[error("invalid upstream address {0:?}")]
    InvalidUpstream(String),

    #[error("request timeout must be greater than zero")]
    ZeroRequestTimeout,

    #[error("invalid log filter {0:?}")]
    InvalidLogFilter(String),

    #[error("rewrite #{index} for header {header:?}: {reason}")]
    InvalidRewrite {
        index: usize,
        header: String,
        reason: String,
    },
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if Authority::from_str(&config.upstream.address).is_err() {
        errors.push(ValidationError::InvalidUpstream(
            config.upstream.address.clone(),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }

    if EnvFilter::try_new(&config.observability.log_level).is_err() {
        errors.push(ValidationError::InvalidLogFilter(
            config.observability.log_level.clone(),
        ));
    }

    for (index, rewrite) in config.rewrites.iter().enumerate() {
        if let Err(e) = Rule::new(&rewrite.header, &rewrite.regex, &rewrite.replacement) {
            errors.push(ValidationError::InvalidRewrite {
                index,
                header: rewrite.header.clone(),
                reason: e.to_string(),
            });
        }
        // A header value can never hold these, so every rewrite would be discarded.
        if rewrite.replacement.contains(['\r', '\n', '\0']) {
            errors.push(ValidationError::InvalidRewrite {
                index,
                header: rewrite.header.clone(),
                reason: "replacement contains a control character".to_string(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
