//! Convenience re-exports for common test utilities.
//!
//! ```rust,ignore
//! use tripunit_test_helpers::prelude::*;
//! ```

pub use crate::init_tracing;
pub use crate::must::must_some;

#[cfg(feature = "mock")]
pub use crate::mock::{BulkResponder, FixedProtection, ManualClock, ScriptedMetering};

#[cfg(feature = "fixtures")]
pub use crate::fixtures::{EngineFixture, TestEngine, small_config};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;
