//! Record reconciliation
//!
//! Drives the insert/update half of a sync run: fetches the full source
//! table, deduplicates it, and mirrors every record into the target
//! collection. Per-record failures are logged and counted but never abort
//! the run; the orphan pass downstream is gated on a clean outcome.

use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use tablesync_connector::{
    CollectionRecord, RecordId, RunId, SourceRecord, SourceStore, StoreError, SyncSettings,
    TargetStore,
};

use crate::error::{SyncError, SyncResult};
use crate::transform::{FieldTransformer, TransformError};

/// Outcome of the reconciliation half of a run.
#[derive(Debug, Clone, Default)]
pub struct ReconcileOutcome {
    /// Every distinct source id observed, in first-seen source order.
    /// These records must survive the orphan pass.
    pub survivors: Vec<RecordId>,
    /// Records newly inserted.
    pub inserted: usize,
    /// Records updated in place.
    pub updated: usize,
    /// Records whose lookup, transform, or write failed.
    pub failed: usize,
    /// Duplicate source ids skipped.
    pub duplicates_skipped: usize,
}

impl ReconcileOutcome {
    /// True when no per-record error occurred. Orphan deletion must only
    /// run on a clean outcome: never prune the collection based on a
    /// possibly-incomplete view of the source.
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }

    /// Distinct records processed.
    pub fn processed(&self) -> usize {
        self.survivors.len()
    }
}

/// What happened to one record.
enum RecordAction {
    Inserted,
    Updated,
}

/// Error while syncing one record. Logged with its code, never propagated.
#[derive(Debug, Error)]
enum RecordSyncError {
    #[error("target lookup failed: {0}")]
    Lookup(#[source] StoreError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error("target write failed: {0}")]
    Write(#[source] StoreError),

    #[error("target write timed out after {timeout_secs} seconds")]
    WriteTimeout { timeout_secs: u64 },
}

impl RecordSyncError {
    fn error_code(&self) -> &'static str {
        match self {
            RecordSyncError::Lookup(_) => "LOOKUP_FAILED",
            RecordSyncError::Transform(inner) => inner.error_code(),
            RecordSyncError::Write(_) => "WRITE_FAILED",
            RecordSyncError::WriteTimeout { .. } => "WRITE_TIMEOUT",
        }
    }
}

/// Mirrors source records into the target collection.
pub struct RecordReconciler {
    source: Arc<dyn SourceStore>,
    target: Arc<dyn TargetStore>,
    settings: Arc<SyncSettings>,
    transformer: Arc<FieldTransformer>,
}

impl RecordReconciler {
    /// Create a reconciler over the given stores.
    pub fn new(
        source: Arc<dyn SourceStore>,
        target: Arc<dyn TargetStore>,
        settings: Arc<SyncSettings>,
    ) -> Self {
        let transformer = Arc::new(FieldTransformer::new(settings.rules.clone()));
        Self {
            source,
            target,
            settings,
            transformer,
        }
    }

    /// Run reconciliation: fetch, deduplicate, fan out, await everything.
    ///
    /// The survivor list is final only after every dispatched write has
    /// completed; callers can safely hand it to the orphan pass.
    pub async fn reconcile(&self, run_id: RunId) -> SyncResult<ReconcileOutcome> {
        let records = self.fetch_source(run_id).await?;
        let total_fetched = records.len();

        // Resolve duplicates up front, before any per-record work is
        // dispatched. First occurrence in source order wins.
        let mut seen: HashSet<RecordId> = HashSet::with_capacity(records.len());
        let mut deduped: Vec<SourceRecord> = Vec::with_capacity(records.len());
        for record in records {
            if seen.insert(record.id.clone()) {
                deduped.push(record);
            }
        }

        let mut outcome = ReconcileOutcome {
            survivors: deduped.iter().map(|r| r.id.clone()).collect(),
            duplicates_skipped: total_fetched - deduped.len(),
            ..ReconcileOutcome::default()
        };

        if outcome.duplicates_skipped > 0 {
            debug!(
                run_id = %run_id,
                duplicates = outcome.duplicates_skipped,
                "Skipped duplicate source ids"
            );
        }

        // Fan out per-record work over the fixed list, bounded so the
        // target platform's rate limits are respected, then join all of it.
        let limiter = Arc::new(Semaphore::new(self.settings.max_in_flight));
        let mut join_set = JoinSet::new();

        for record in deduped {
            let target = Arc::clone(&self.target);
            let settings = Arc::clone(&self.settings);
            let transformer = Arc::clone(&self.transformer);
            let limiter = Arc::clone(&limiter);

            join_set.spawn(async move {
                // The semaphore is never closed, so acquire cannot fail.
                let _permit = limiter.acquire_owned().await.expect("semaphore closed");
                let result = sync_record(&*target, &transformer, &settings, &record).await;
                (record.id, result)
            });
        }

        while let Some(join_result) = join_set.join_next().await {
            match join_result {
                Ok((_, Ok(RecordAction::Inserted))) => outcome.inserted += 1,
                Ok((_, Ok(RecordAction::Updated))) => outcome.updated += 1,
                Ok((record_id, Err(err))) => {
                    outcome.failed += 1;
                    error!(
                        run_id = %run_id,
                        record_id = %record_id,
                        code = err.error_code(),
                        error = %err,
                        "Record sync failed"
                    );
                }
                Err(join_err) => {
                    outcome.failed += 1;
                    error!(
                        run_id = %run_id,
                        error = %join_err,
                        "Record sync task panicked"
                    );
                }
            }
        }

        info!(
            run_id = %run_id,
            processed = outcome.processed(),
            inserted = outcome.inserted,
            updated = outcome.updated,
            failed = outcome.failed,
            "Reconciliation finished"
        );

        Ok(outcome)
    }

    /// Fetch the complete source table under the configured deadline.
    /// Failure here is fatal to the run; nothing has been written yet.
    async fn fetch_source(&self, run_id: RunId) -> SyncResult<Vec<SourceRecord>> {
        let timeout_secs = self.settings.fetch_timeout_secs;
        let fetch = self
            .source
            .fetch_all(&self.settings.source.table, self.settings.page_size);

        let records = tokio::time::timeout(self.settings.fetch_timeout(), fetch)
            .await
            .map_err(|_| SyncError::SourceFetchTimeout { timeout_secs })?
            .map_err(|source| SyncError::SourceFetch { source })?;

        debug!(
            run_id = %run_id,
            table = %self.settings.source.table,
            count = records.len(),
            "Fetched source records"
        );
        Ok(records)
    }
}

/// Mirror a single source record into the collection.
async fn sync_record(
    target: &dyn TargetStore,
    transformer: &FieldTransformer,
    settings: &SyncSettings,
    record: &SourceRecord,
) -> Result<RecordAction, RecordSyncError> {
    let collection = settings.target.collection.as_str();

    let existing = target
        .find_by_source_id(collection, &record.id)
        .await
        .map_err(RecordSyncError::Lookup)?;

    // Merge onto the existing record when there is one; otherwise start
    // from a skeleton carrying the join key and creation time.
    let mut item = match existing {
        Some(item) => item,
        None => CollectionRecord::skeleton(record.id.clone(), record.created_time),
    };
    let action = if item.is_new() {
        RecordAction::Inserted
    } else {
        RecordAction::Updated
    };

    transformer.apply(&record.fields, &mut item.fields)?;

    let timeout_secs = settings.write_timeout_secs;
    tokio::time::timeout(settings.write_timeout(), target.save(collection, item))
        .await
        .map_err(|_| RecordSyncError::WriteTimeout { timeout_secs })?
        .map_err(RecordSyncError::Write)?;

    Ok(action)
}
