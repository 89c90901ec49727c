//! Engine error types

use thiserror::Error;

use tablesync_connector::StoreError;

/// Error that aborts (or refuses) a whole sync run.
///
/// Per-record failures are not represented here: they are logged, counted
/// in the run outcome, and gate orphan cleanup, but never abort the run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Another run is already in progress in this process.
    #[error("a sync run is already in progress")]
    AlreadyRunning,

    /// The initial source fetch failed. Fatal: nothing was written.
    #[error("source fetch failed: {source}")]
    SourceFetch {
        #[source]
        source: StoreError,
    },

    /// The initial source fetch ran past its deadline. Fatal.
    #[error("source fetch timed out after {timeout_secs} seconds")]
    SourceFetchTimeout { timeout_secs: u64 },

    /// Orphan query or bulk delete failed. Logged, never retried; the
    /// remaining orphans are picked up by the next run.
    #[error("orphan cleanup failed: {source}")]
    OrphanCleanup {
        #[source]
        source: StoreError,
    },
}

impl SyncError {
    /// Stable code for log correlation and alerting.
    pub fn error_code(&self) -> &'static str {
        match self {
            SyncError::AlreadyRunning => "ALREADY_RUNNING",
            SyncError::SourceFetch { .. } => "SOURCE_FETCH_FAILED",
            SyncError::SourceFetchTimeout { .. } => "SOURCE_FETCH_TIMEOUT",
            SyncError::OrphanCleanup { .. } => "ORPHAN_CLEANUP_FAILED",
        }
    }
}

/// Result type for engine operations.
pub type SyncResult<T> = Result<T, SyncError>;
