//! Shared test utilities for the trip unit event engine.
//!
//! # Modules
//!
//! - [`mod@must`] - Option unwrap helper with `#[track_caller]`
//! - [`assertions`] - Custom assertion macros
//! - [`mock`] - Scriptable clock, metering, protection and bulk-store collaborators
//! - [`fixtures`] - Engine fixture builder
//! - [`prelude`] - Convenience re-exports
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! tripunit-test-helpers = { path = "../tripunit-test-helpers" }
//! ```
//!
//! ```rust,ignore
//! use tripunit_test_helpers::prelude::*;
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![allow(clippy::panic, reason = "assertion helpers report failures by panicking")]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod assertions;
pub mod must;
pub mod prelude;

#[cfg(feature = "mock")]
#[cfg_attr(docsrs, doc(cfg(feature = "mock")))]
pub mod mock;

#[cfg(feature = "fixtures")]
#[cfg_attr(docsrs, doc(cfg(feature = "fixtures")))]
pub mod fixtures;

pub use must::*;

/// Install a test tracing subscriber once. Output is captured by the test
/// harness and shown for failing tests.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
