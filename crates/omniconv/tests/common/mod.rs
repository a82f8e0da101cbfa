//! Shared utilities for the integration tests: `TestHarness` gives each
//! test its own temp directories and service, and the builders produce
//! synthetic upload payloads.

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
