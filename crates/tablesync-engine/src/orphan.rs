//! Orphan collection
//!
//! Removes collection records whose source id no longer exists. Runs only
//! after a clean reconciliation pass; see the runner's safety gate.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use tablesync_connector::{RecordId, RunId, SyncSettings, TargetStore};

use crate::error::{SyncError, SyncResult};

/// Finds and deletes collection records that no longer exist at the source.
pub struct OrphanCollector {
    target: Arc<dyn TargetStore>,
    settings: Arc<SyncSettings>,
}

impl OrphanCollector {
    /// Create a collector over the given target store.
    pub fn new(target: Arc<dyn TargetStore>, settings: Arc<SyncSettings>) -> Self {
        Self { target, settings }
    }

    /// Delete up to one batch of orphans, returning how many were removed.
    ///
    /// An empty survivor set is a no-op: an empty source would otherwise
    /// wipe the whole collection, which is far more likely to be a fetch
    /// anomaly than an intentional mass delete. If more orphans exist than
    /// the batch ceiling, later runs remove the remainder.
    pub async fn collect_and_delete(
        &self,
        run_id: RunId,
        survivors: &[RecordId],
    ) -> SyncResult<u64> {
        if survivors.is_empty() {
            debug!(run_id = %run_id, "No survivors; skipping orphan cleanup");
            return Ok(0);
        }

        let collection = self.settings.target.collection.as_str();
        let keep: HashSet<RecordId> = survivors.iter().cloned().collect();

        let orphans = self
            .target
            .find_orphans(collection, &keep, self.settings.orphan_batch_limit)
            .await
            .map_err(|source| SyncError::OrphanCleanup { source })?;

        if orphans.is_empty() {
            debug!(run_id = %run_id, "No orphans found");
            return Ok(0);
        }

        // Orphans fetched from the store always carry a primary key; a
        // record without one has never been persisted.
        let ids: Vec<String> = orphans.into_iter().filter_map(|r| r.id).collect();

        let outcome = self
            .target
            .bulk_remove(collection, &ids)
            .await
            .map_err(|source| SyncError::OrphanCleanup { source })?;

        if outcome.skipped > 0 {
            warn!(
                run_id = %run_id,
                skipped = outcome.skipped,
                "Target store skipped some orphan deletions"
            );
        }

        info!(
            run_id = %run_id,
            removed = outcome.removed,
            "Removed orphaned records"
        );
        Ok(outcome.removed)
    }
}
