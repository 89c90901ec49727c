//! # tablesync store abstractions
//!
//! Shared foundation for mirroring an external table into a hosted data
//! collection: the typed record model, the capability traits the sync
//! engine consumes, error types, and deployment configuration.
//!
//! ## Crate organization
//!
//! - [`ids`] - Typed identifiers (`RecordId`, `RunId`)
//! - [`types`] - Record and field-value model
//! - [`traits`] - `SourceStore` / `TargetStore` capability traits
//! - [`error`] - Error types with transient/permanent classification
//! - [`config`] - Deployment settings, validated fail-fast at startup

pub mod config;
pub mod error;
pub mod ids;
pub mod traits;
pub mod types;

pub use config::{FieldRules, SourceSettings, SyncSettings, TargetSettings};
pub use error::{StoreError, StoreResult};
pub use ids::{RecordId, RunId};
pub use traits::{SourceStore, TargetStore};
pub use types::{
    Attachment, CollectionRecord, FieldValue, RemovalOutcome, SourceRecord, SOURCE_ID_FIELD,
    TARGET_ID_FIELD,
};

// Re-export async_trait for store implementors.
pub use async_trait::async_trait;
