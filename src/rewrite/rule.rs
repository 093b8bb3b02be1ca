//! Compiled rewrite rules.
//!
//! # Responsibilities
//! - Compile `{header, regex, replacement}` triples, failing fast on the
//!   first invalid pattern
//! - Rewrite every value of a header in place, preserving value order
//! - Substitute the `{RequestHost}` token after the regex replacement
//!
//! # Design Decisions
//! - A `RuleSet` is immutable once built and shared behind an `Arc`
//! - Applying a rule cannot fail: a value that cannot be rewritten into a
//!   valid header value is kept as it was

use std::sync::Arc;

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use regex::Regex;
use thiserror::Error;

use crate::config::RewriteConfig;

/// Token in a replacement template that is replaced by the request host.
pub const REQUEST_HOST_TOKEN: &str = "{RequestHost}";

/// Error raised while compiling rewrite rules.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("error compiling regex {pattern:?}: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// A single compiled rewrite.
#[derive(Debug, Clone)]
pub struct Rule {
    header: String,
    /// `None` when `header` is not a legal header name; such a rule never matches.
    header_name: Option<HeaderName>,
    matcher: Arc<Regex>,
    replacement: String,
}

impl Rule {
    /// Compile a rule.
    pub fn new(header: &str, regex: &str, replacement: &str) -> Result<Self, RuleError> {
        let matcher = Regex::new(regex).map_err(|source| RuleError::InvalidRegex {
            pattern: regex.to_string(),
            source,
        })?;

        Ok(Self {
            header: header.to_string(),
            header_name: HeaderName::from_bytes(header.as_bytes()).ok(),
            matcher: Arc::new(matcher),
            replacement: replacement.to_string(),
        })
    }

    /// The header name as configured.
    pub fn header(&self) -> &str {
        &self.header
    }

    pub fn pattern(&self) -> &str {
        self.matcher.as_str()
    }

    pub fn replacement(&self) -> &str {
        &self.replacement
    }

    /// Rewrite a single header value.
    pub fn rewrite_value(&self, value: &str, request_host: &str) -> String {
        let replaced = self.matcher.replace_all(value, self.replacement.as_str());
        if replaced.contains(REQUEST_HOST_TOKEN) {
            replaced.replace(REQUEST_HOST_TOKEN, request_host)
        } else {
            replaced.into_owned()
        }
    }

    /// Rewrite every value of this rule's header.
    ///
    /// Headers that are absent are left alone. Otherwise all values are
    /// removed and re-appended in their original order.
    pub fn apply(&self, headers: &mut HeaderMap, request_host: &str) {
        let Some(name) = &self.header_name else {
            return;
        };

        let originals: Vec<HeaderValue> = headers.get_all(name).iter().cloned().collect();
        if originals.is_empty() {
            return;
        }

        headers.remove(name);

        for original in originals {
            let value = self.rewrite_header_value(name, original, request_host);
            headers.append(name.clone(), value);
        }
    }

    fn rewrite_header_value(
        &self,
        name: &HeaderName,
        original: HeaderValue,
        request_host: &str,
    ) -> HeaderValue {
        // Values with opaque (non UTF-8) bytes cannot be matched as text.
        let Ok(text) = std::str::from_utf8(original.as_bytes()) else {
            return original;
        };

        let rewritten = self.rewrite_value(text, request_host);
        if rewritten == text {
            return original;
        }

        match HeaderValue::from_str(&rewritten) {
            Ok(mut value) => {
                value.set_sensitive(original.is_sensitive());
                tracing::trace!(
                    header = %name,
                    before = text,
                    after = %rewritten,
                    "Rewrote response header"
                );
                value
            }
            Err(_) => {
                tracing::warn!(
                    header = %name,
                    pattern = self.pattern(),
                    "Rewritten value is not a valid header value, keeping original"
                );
                original
            }
        }
    }
}

/// An ordered, immutable collection of rules.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Compile rewrites in order. The first invalid pattern aborts compilation.
    pub fn compile(rewrites: &[RewriteConfig]) -> Result<Self, RuleError> {
        let rules = rewrites
            .iter()
            .map(|r| Rule::new(&r.header, &r.regex, &r.replacement))
            .collect::<Result<Vec<_>, _>>()?;

        for rule in rules.iter().filter(|r| r.header_name.is_none()) {
            tracing::warn!(
                header = rule.header(),
                "Rewrite targets an invalid header name and will never match"
            );
        }

        Ok(Self { rules })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    /// Apply every rule, in order, to `headers`.
    pub fn apply(&self, headers: &mut HeaderMap, request_host: &str) {
        for rule in &self.rules {
            rule.apply(headers, request_host);
        }
    }
}

impl FromIterator<Rule> for RuleSet {
    fn from_iter<T: IntoIterator<Item = Rule>>(iter: T) -> Self {
        Self {
            rules: iter.into_iter().collect(),
        }
    }
}
