//! Store capability traits
//!
//! The two stores the engine talks to, as narrow async traits. Production
//! implementations live in the REST client crate; tests substitute
//! in-memory fakes.

use async_trait::async_trait;
use std::collections::HashSet;

use crate::error::StoreResult;
use crate::ids::RecordId;
use crate::types::{CollectionRecord, RemovalOutcome, SourceRecord};

/// Read access to the source table.
#[async_trait]
pub trait SourceStore: Send + Sync {
    /// Fetch every record in the table, in source-provided order.
    ///
    /// Implementations paginate internally with `page_size` and return the
    /// result as a single in-memory batch. `page_size` is a tuning
    /// constant, not semantically meaningful.
    async fn fetch_all(&self, table: &str, page_size: u32) -> StoreResult<Vec<SourceRecord>>;
}

/// Read/write access to the target collection.
#[async_trait]
pub trait TargetStore: Send + Sync {
    /// Look up the record whose external identifier equals `source_id`.
    ///
    /// The external identifier is unique within the collection, so at most
    /// one record can match.
    async fn find_by_source_id(
        &self,
        collection: &str,
        source_id: &RecordId,
    ) -> StoreResult<Option<CollectionRecord>>;

    /// Upsert a record: insert when it has no primary key, update in place
    /// when it does. Returns the record as stored, primary key included.
    async fn save(
        &self,
        collection: &str,
        record: CollectionRecord,
    ) -> StoreResult<CollectionRecord>;

    /// Find records whose external identifier is NOT in `keep`, up to
    /// `limit` of them. `limit` reflects a query ceiling on the target
    /// platform; callers must not assume the result is exhaustive.
    async fn find_orphans(
        &self,
        collection: &str,
        keep: &HashSet<RecordId>,
        limit: u32,
    ) -> StoreResult<Vec<CollectionRecord>>;

    /// Remove records by primary key in one call.
    ///
    /// Stores may skip individual removals (e.g. concurrent modification);
    /// the outcome reports both counts and a partial removal is not an
    /// error.
    async fn bulk_remove(&self, collection: &str, ids: &[String]) -> StoreResult<RemovalOutcome>;
}
