//! Observability subsystem.
//!
//! Every subsystem emits `tracing` events with structured fields; the
//! binary installs the subscriber once at startup (logging.rs).

pub mod logging;

pub use logging::init_logging;
