//! Sync orchestration
//!
//! The externally-invoked entry point: sequences reconciliation, then
//! orphan cleanup behind the safety gate.

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use tablesync_connector::{RunId, SourceStore, StoreResult, SyncSettings, TargetStore};

use crate::error::{SyncError, SyncResult};
use crate::orphan::OrphanCollector;
use crate::reconcile::RecordReconciler;
use crate::report::SyncReport;

/// Runs one full synchronization of the source table into the collection.
///
/// One run at a time: recurrence belongs to an external scheduler, and a
/// second invocation while a run is active is refused rather than queued.
pub struct SyncRunner {
    reconciler: RecordReconciler,
    collector: OrphanCollector,
    settings: Arc<SyncSettings>,
    run_lock: Mutex<()>,
}

impl SyncRunner {
    /// Build a runner over the given stores.
    ///
    /// Validates the settings fail-fast: a misconfigured deployment is
    /// caught here, before anything is fetched or written.
    pub fn new(
        source: Arc<dyn SourceStore>,
        target: Arc<dyn TargetStore>,
        settings: SyncSettings,
    ) -> StoreResult<Self> {
        settings.validate()?;
        let settings = Arc::new(settings);
        Ok(Self {
            reconciler: RecordReconciler::new(source, Arc::clone(&target), Arc::clone(&settings)),
            collector: OrphanCollector::new(target, Arc::clone(&settings)),
            settings,
            run_lock: Mutex::new(()),
        })
    }

    /// Run one sync: reconcile, then collect orphans if nothing failed.
    pub async fn run(&self) -> SyncResult<SyncReport> {
        let _guard = self.run_lock.try_lock().map_err(|_| SyncError::AlreadyRunning)?;

        let run_id = RunId::new();
        let started_at = Utc::now();
        info!(
            run_id = %run_id,
            table = %self.settings.source.table,
            collection = %self.settings.target.collection,
            "Starting sync run"
        );

        let outcome = match self.reconciler.reconcile(run_id).await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(
                    run_id = %run_id,
                    code = err.error_code(),
                    error = %err,
                    "Sync run aborted"
                );
                return Err(err);
            }
        };

        // Safety gate: never prune the collection based on a possibly
        // incomplete view of the source.
        let (orphans_removed, orphan_cleanup_skipped) = if outcome.all_succeeded() {
            let removed = match self
                .collector
                .collect_and_delete(run_id, &outcome.survivors)
                .await
            {
                Ok(removed) => removed,
                Err(err) => {
                    error!(
                        run_id = %run_id,
                        code = err.error_code(),
                        error = %err,
                        "Orphan cleanup failed; remaining orphans will be retried next run"
                    );
                    return Err(err);
                }
            };
            (removed, false)
        } else {
            warn!(
                run_id = %run_id,
                failed = outcome.failed,
                "Per-record errors occurred; skipping orphan cleanup"
            );
            (0, true)
        };

        let report = SyncReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            records_processed: outcome.processed(),
            inserted: outcome.inserted,
            updated: outcome.updated,
            failed: outcome.failed,
            duplicates_skipped: outcome.duplicates_skipped,
            orphans_removed,
            orphan_cleanup_skipped,
        };

        info!(
            run_id = %run_id,
            processed = report.records_processed,
            inserted = report.inserted,
            updated = report.updated,
            failed = report.failed,
            orphans_removed = report.orphans_removed,
            "Sync run completed"
        );

        Ok(report)
    }
}
