//! Shared test utilities for servicebroker integration tests.
//!
//! This module provides:
//! - `ControllerHarness` for running a controller against in-memory collaborators
//! - Builder patterns for creating test configurations programmatically

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::*;
