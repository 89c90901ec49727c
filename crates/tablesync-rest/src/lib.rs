//! # tablesync HTTP store clients
//!
//! Thin reqwest-based implementations of the store traits:
//!
//! - [`GridSourceClient`] reads the source table via its REST API
//! - [`CollectionClient`] reads and writes the target collection
//!
//! Both clients are deliberately dumb: no retries, no caching. Deadlines
//! are enforced by the engine around each call, and retry policy belongs
//! to whatever schedules the runs.

mod http;
pub mod source;
pub mod target;

pub use source::GridSourceClient;
pub use target::CollectionClient;
