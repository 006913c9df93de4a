//! Shared Module
//!
//! Types that are independent of the device runtime: the queued mutation
//! model, its payloads, configuration and payload-level errors. These types
//! are serialized into the local store and onto the wire.

/// Queued mutation records and typed payloads
pub mod mutation;

/// Shared error types
pub mod error;

/// Application configuration
pub mod config;

pub use mutation::{
    ChecklistPayload, CommentPayload, MutationKind, MutationPayload, PhotoPayload, QueuedMutation,
};
pub use error::SharedError;
pub use config::{AppConfig, AppConfigBuilder, ConfigError};
