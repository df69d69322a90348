//! Shared utilities for mailtriage integration tests.
//!
//! - `TestHarness`: temp directories, an on-disk store and service builders
//! - `doubles`: scripted providers and queues

pub mod doubles;
pub mod harness;

pub use doubles::*;
pub use harness::TestHarness;
