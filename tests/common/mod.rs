//! Common test utilities and helpers
//!
//! This module provides shared utilities for all tests including:
//! - Payload and record fixtures
//! - A scripted in-process remote API
//! - SQLite stores in temporary directories

pub mod fixtures;
pub mod remote;

// Re-export commonly used utilities
pub use fixtures::*;
pub use remote::*;
