//! Saved Objects SDK
//!
//! This crate provides the public API for the `saved_objects` module:
//!
//! - [`SavedObjectsClient`] - Public API trait for consumers
//! - [`SavedObject`], [`BulkUpdateObject`], [`UpdateOptions`] - Domain models
//! - [`SavedObjectsError`], [`BulkItemError`] - Error types
//!
//! ## Usage
//!
//! ```ignore
//! use saved_objects_sdk::{SavedObjectsClient, UpdateOptions};
//!
//! let updated = client
//!     .update("dashboard", "my-dashboard", attributes, UpdateOptions::default())
//!     .await?;
//!
//! // Bulk results keep the position of each request.
//! let results = client.bulk_update(objects, BulkUpdateOptions::default()).await?;
//! for result in results {
//!     match result {
//!         Ok(object) => println!("updated {}", object.id),
//!         Err(e) => println!("failed {}: {}", e.id, e.error),
//!     }
//! }
//! ```
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod api;
pub mod error;
pub mod models;

pub use api::SavedObjectsClient;
pub use error::{BulkItemError, ErrorPayload, SavedObjectsError};
pub use models::{
    Attributes, BulkGetObject, BulkResult, BulkUpdateObject, BulkUpdateOptions, GetOptions,
    Refresh, SavedObject, SavedObjectReference, UpdateOptions,
};
