//! # LiftLog Testkit
//!
//! Test utilities for LiftLog.
//!
//! This crate provides:
//! - A [`TestHarness`] wiring a sync engine to in-memory collaborators
//! - A [`FlakyGateway`] for injecting remote failures
//! - Property-based test generators using proptest
//! - [`init_tracing`] for readable engine logs in failing tests
//!
//! ## Usage
//!
//! ```rust,ignore
//! use liftlog_testkit::prelude::*;
//!
//! #[test]
//! fn queued_while_offline() {
//!     let h = TestHarness::offline();
//!     h.engine.log_set("squat", 0, "100", "5").unwrap();
//!     assert_eq!(h.engine.queue_length(), 1);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::init_tracing;
}

pub use fixtures::*;
pub use generators::*;

/// Installs a test-friendly tracing subscriber, filtered by `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
