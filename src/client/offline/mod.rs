//! # Offline-First Writes
//!
//! User actions on site are recorded locally first and reach the remote API
//! whenever connectivity allows.
//!
//! ## Usage
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! use complisite_sync::client::offline::MutationQueue;
//! # use complisite_sync::client::sync::Synchronizer;
//!
//! # async fn example(synchronizer: Arc<Synchronizer>) -> Result<(), complisite_sync::client::error::QueueError> {
//! let queue = MutationQueue::new(synchronizer);
//!
//! // Saved locally even with no signal; synced later.
//! queue.record_checklist("item-42", true, None).await?;
//! queue.attach_photo("item-42", "/data/photos/IMG_0042.jpg").await?;
//! # Ok(())
//! # }
//! ```

pub mod queue;

pub use queue::MutationQueue;
