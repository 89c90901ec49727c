//! # tablesync engine
//!
//! One-directional synchronization of an external table into a hosted
//! data collection. The source is ground truth: records are inserted or
//! updated to mirror it, and collection records whose source id has
//! disappeared are deleted.
//!
//! ## Components
//!
//! - [`transform`] - Field transformation heuristics (tags, attachments,
//!   addresses, encoded geocodes)
//! - [`reconcile`] - Insert/update reconciliation over the full source
//! - [`orphan`] - Batch removal of records gone from the source
//! - [`runner`] - The entry point sequencing the two passes
//! - [`report`] - Run summary handed back to the caller
//!
//! ## Run shape
//!
//! ```ignore
//! let runner = SyncRunner::new(source, target, settings)?;
//! let report = runner.run().await?;
//! assert!(report.clean());
//! ```

pub mod error;
pub mod orphan;
pub mod reconcile;
pub mod report;
pub mod runner;
pub mod transform;

pub use error::{SyncError, SyncResult};
pub use orphan::OrphanCollector;
pub use reconcile::{ReconcileOutcome, RecordReconciler};
pub use report::SyncReport;
pub use runner::SyncRunner;
pub use transform::{normalize_field_name, FieldTransformer, TransformError};
