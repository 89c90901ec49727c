//! Run reporting

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tablesync_connector::RunId;

/// Summary of one completed sync run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    /// Identifier correlating this report with log lines.
    pub run_id: RunId,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
    /// Distinct source records processed (duplicates excluded).
    pub records_processed: usize,
    /// Records newly inserted into the collection.
    pub inserted: usize,
    /// Records updated in place.
    pub updated: usize,
    /// Records whose lookup, transform, or write failed.
    pub failed: usize,
    /// Duplicate source ids skipped (first occurrence wins).
    pub duplicates_skipped: usize,
    /// Orphaned collection records removed this run.
    pub orphans_removed: u64,
    /// True when orphan cleanup was suppressed by per-record failures.
    pub orphan_cleanup_skipped: bool,
}

impl SyncReport {
    /// True when every record landed and the collection now mirrors the
    /// source (up to the orphan batch ceiling).
    pub fn clean(&self) -> bool {
        self.failed == 0
    }

    /// Wall-clock duration of the run.
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}
