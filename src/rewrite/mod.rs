//! Response header rewriting.
//!
//! # Data Flow
//! ```text
//! [[rewrites]] config
//!     → rule.rs (compile every regex, fail on the first bad one)
//!     → RuleSet (ordered, immutable, Arc-shared)
//!     → applied to a response HeaderMap at commit time
//! ```

pub mod rule;

pub use rule::{Rule, RuleError, RuleSet, REQUEST_HOST_TOKEN};
