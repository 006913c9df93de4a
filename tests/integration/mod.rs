//! Integration tests
//!
//! Exercise the sync core against a real SQLite file and a mock HTTP server.

pub mod concurrency_test;
pub mod sync_flow_test;
