//! Sync run tests
//!
//! End-to-end tests for the `SyncRunner` over in-memory stores, covering:
//! - insert/update reconciliation and idempotence
//! - duplicate source-id handling
//! - field transformation on the wire shape
//! - orphan removal, the batch ceiling, and the empty-source guard
//! - the safety gate suppressing orphan cleanup on per-record errors
//! - overlapping-run refusal

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::sync::Arc;
use std::time::Duration;

use tablesync_connector::{
    CollectionRecord, FieldValue, RecordId, RemovalOutcome, SourceRecord, SourceStore, StoreError,
    StoreResult, SyncSettings, TargetStore,
};
use tablesync_engine::{SyncError, SyncRunner};

// =============================================================================
// In-memory store fakes
// =============================================================================

struct FakeSource {
    records: Mutex<Vec<SourceRecord>>,
    fail: AtomicBool,
    delay: Option<Duration>,
    fetch_calls: AtomicUsize,
}

impl FakeSource {
    fn new(records: Vec<SourceRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            fail: AtomicBool::new(false),
            delay: None,
            fetch_calls: AtomicUsize::new(0),
        }
    }

    fn slow(records: Vec<SourceRecord>, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new(records)
        }
    }
}

#[async_trait]
impl SourceStore for FakeSource {
    async fn fetch_all(&self, _table: &str, _page_size: u32) -> StoreResult<Vec<SourceRecord>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(StoreError::connection_failed("source is down"));
        }
        Ok(self.records.lock().unwrap().clone())
    }
}

struct FakeTarget {
    /// Items keyed by their primary key.
    items: Mutex<HashMap<String, CollectionRecord>>,
    next_id: AtomicUsize,
    /// Source ids whose save should fail.
    fail_saves_for: Mutex<HashSet<String>>,
    save_calls: AtomicUsize,
    /// How many removals to report as skipped.
    skip_removals: AtomicUsize,
}

impl FakeTarget {
    fn new() -> Self {
        Self {
            items: Mutex::new(HashMap::new()),
            next_id: AtomicUsize::new(1),
            fail_saves_for: Mutex::new(HashSet::new()),
            save_calls: AtomicUsize::new(0),
            skip_removals: AtomicUsize::new(0),
        }
    }

    fn fail_save_for(&self, source_id: &str) {
        self.fail_saves_for
            .lock()
            .unwrap()
            .insert(source_id.to_string());
    }

    /// Seed an item directly, bypassing the engine.
    fn seed(&self, mut record: CollectionRecord) -> String {
        let id = format!("item-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        record.id = Some(id.clone());
        self.items.lock().unwrap().insert(id.clone(), record);
        id
    }

    fn source_ids(&self) -> HashSet<String> {
        self.items
            .lock()
            .unwrap()
            .values()
            .map(|r| r.source_id.as_str().to_string())
            .collect()
    }

    fn by_source_id(&self, source_id: &str) -> Option<CollectionRecord> {
        self.items
            .lock()
            .unwrap()
            .values()
            .find(|r| r.source_id.as_str() == source_id)
            .cloned()
    }
}

#[async_trait]
impl TargetStore for FakeTarget {
    async fn find_by_source_id(
        &self,
        _collection: &str,
        source_id: &RecordId,
    ) -> StoreResult<Option<CollectionRecord>> {
        Ok(self.by_source_id(source_id.as_str()))
    }

    async fn save(
        &self,
        _collection: &str,
        mut record: CollectionRecord,
    ) -> StoreResult<CollectionRecord> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        if self
            .fail_saves_for
            .lock()
            .unwrap()
            .contains(record.source_id.as_str())
        {
            return Err(StoreError::operation_failed("validation rejected"));
        }
        if record.id.is_none() {
            record.id = Some(format!(
                "item-{}",
                self.next_id.fetch_add(1, Ordering::SeqCst)
            ));
        }
        let id = record.id.clone().unwrap();
        self.items.lock().unwrap().insert(id, record.clone());
        Ok(record)
    }

    async fn find_orphans(
        &self,
        _collection: &str,
        keep: &HashSet<RecordId>,
        limit: u32,
    ) -> StoreResult<Vec<CollectionRecord>> {
        let items = self.items.lock().unwrap();
        let mut orphans: Vec<CollectionRecord> = items
            .values()
            .filter(|r| !keep.contains(&r.source_id))
            .cloned()
            .collect();
        orphans.sort_by(|a, b| a.id.cmp(&b.id));
        orphans.truncate(limit as usize);
        Ok(orphans)
    }

    async fn bulk_remove(&self, _collection: &str, ids: &[String]) -> StoreResult<RemovalOutcome> {
        let skip = self.skip_removals.load(Ordering::SeqCst);
        let mut items = self.items.lock().unwrap();
        let mut removed = 0u64;
        for id in ids.iter().skip(skip) {
            if items.remove(id).is_some() {
                removed += 1;
            }
        }
        Ok(RemovalOutcome {
            removed,
            skipped: skip as u64,
        })
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn created() -> DateTime<Utc> {
    "2024-03-01T12:00:00Z".parse().unwrap()
}

fn settings() -> SyncSettings {
    serde_json::from_value(json!({
        "source": {
            "api_base": "https://grid.test/v0",
            "api_key": "key-source",
            "base_id": "appXYZ",
            "table": "Places"
        },
        "target": {
            "api_base": "https://collections.test/v2",
            "api_key": "key-target",
            "collection": "Places"
        }
    }))
    .unwrap()
}

fn place(id: &str, name: &str) -> SourceRecord {
    SourceRecord::new(id, created()).with_field("Name", name)
}

fn runner_over(source: Arc<FakeSource>, target: Arc<FakeTarget>) -> SyncRunner {
    runner_with_settings(source, target, settings())
}

fn runner_with_settings(
    source: Arc<FakeSource>,
    target: Arc<FakeTarget>,
    settings: SyncSettings,
) -> SyncRunner {
    SyncRunner::new(source, target, settings).expect("settings should validate")
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_first_run_inserts_every_record() {
    let source = Arc::new(FakeSource::new(vec![
        place("r1", "Blue Bottle"),
        place("r2", "Sightglass"),
        place("r3", "Ritual"),
    ]));
    let target = Arc::new(FakeTarget::new());
    let runner = runner_over(source, Arc::clone(&target));

    let report = runner.run().await.unwrap();

    assert!(report.clean());
    assert_eq!(report.records_processed, 3);
    assert_eq!(report.inserted, 3);
    assert_eq!(report.updated, 0);
    assert_eq!(report.orphans_removed, 0);
    assert_eq!(
        target.source_ids(),
        HashSet::from(["r1".to_string(), "r2".to_string(), "r3".to_string()])
    );

    let item = target.by_source_id("r1").unwrap();
    assert_eq!(item.get("name"), Some(&json!("Blue Bottle")));
    assert_eq!(item.created_time, created());
}

#[tokio::test]
async fn test_unchanged_source_is_a_fixed_point() {
    let source = Arc::new(FakeSource::new(vec![
        place("r1", "Blue Bottle"),
        place("r2", "Sightglass"),
    ]));
    let target = Arc::new(FakeTarget::new());
    let runner = runner_over(source, Arc::clone(&target));

    runner.run().await.unwrap();
    let first_ids: HashMap<String, String> = target
        .items
        .lock()
        .unwrap()
        .iter()
        .map(|(k, v)| (v.source_id.as_str().to_string(), k.clone()))
        .collect();

    let report = runner.run().await.unwrap();

    assert!(report.clean());
    assert_eq!(report.inserted, 0);
    assert_eq!(report.updated, 2);
    assert_eq!(report.orphans_removed, 0);

    // Same items, same primary keys: updated in place, not recreated.
    let second_ids: HashMap<String, String> = target
        .items
        .lock()
        .unwrap()
        .iter()
        .map(|(k, v)| (v.source_id.as_str().to_string(), k.clone()))
        .collect();
    assert_eq!(first_ids, second_ids);
}

#[tokio::test]
async fn test_duplicate_source_ids_first_occurrence_wins() {
    let source = Arc::new(FakeSource::new(vec![
        place("r1", "First"),
        place("r1", "Second"),
        place("r2", "Other"),
    ]));
    let target = Arc::new(FakeTarget::new());
    let runner = runner_over(source, Arc::clone(&target));

    let report = runner.run().await.unwrap();

    assert_eq!(report.records_processed, 2);
    assert_eq!(report.duplicates_skipped, 1);
    let item = target.by_source_id("r1").unwrap();
    assert_eq!(item.get("name"), Some(&json!("First")));
}

#[tokio::test]
async fn test_transformed_fields_reach_the_collection() {
    // {"o":{"formattedAddress":"X","lat":1.5,"lng":-2.5}}
    let geo = "v1 eyJvIjp7ImZvcm1hdHRlZEFkZHJlc3MiOiJYIiwibGF0IjoxLjUsImxuZyI6LTIuNX19";
    let record = SourceRecord::new("r1", created())
        .with_field("Name", "Blue Bottle")
        .with_field(
            "Tags",
            FieldValue::from(vec!["coffee".to_string(), "wifi".to_string()]),
        )
        .with_field("Address", "123 Main St")
        .with_field("Geocode", geo);

    let source = Arc::new(FakeSource::new(vec![record]));
    let target = Arc::new(FakeTarget::new());
    let runner = runner_over(source, Arc::clone(&target));

    let report = runner.run().await.unwrap();
    assert!(report.clean());

    let item = target.by_source_id("r1").unwrap();
    assert_eq!(item.get("tags"), Some(&json!(["coffee", "wifi"])));
    assert_eq!(item.get("tagsshadow"), Some(&json!("coffee,wifi")));
    assert_eq!(item.get("address"), Some(&json!({"formatted": "123 Main St"})));
    assert_eq!(
        item.get("geocode"),
        Some(&json!({
            "formatted": "X",
            "location": {"latitude": 1.5, "longitude": -2.5}
        }))
    );
}

#[tokio::test]
async fn test_update_preserves_unrelated_fields() {
    let target = Arc::new(FakeTarget::new());
    target.seed(
        CollectionRecord::skeleton(RecordId::new("r1"), created())
            .with_field("name", json!("Old Name"))
            .with_field("manualNote", json!("curated by an editor")),
    );

    let source = Arc::new(FakeSource::new(vec![place("r1", "New Name")]));
    let runner = runner_over(source, Arc::clone(&target));

    let report = runner.run().await.unwrap();

    assert_eq!(report.updated, 1);
    let item = target.by_source_id("r1").unwrap();
    assert_eq!(item.get("name"), Some(&json!("New Name")));
    assert_eq!(item.get("manualNote"), Some(&json!("curated by an editor")));
}

#[tokio::test]
async fn test_orphans_are_removed() {
    let target = Arc::new(FakeTarget::new());
    target.seed(CollectionRecord::skeleton(RecordId::new("r3"), created()));

    let source = Arc::new(FakeSource::new(vec![
        place("r1", "Blue Bottle"),
        place("r2", "Sightglass"),
    ]));
    let runner = runner_over(source, Arc::clone(&target));

    let report = runner.run().await.unwrap();

    assert_eq!(report.orphans_removed, 1);
    assert!(!report.orphan_cleanup_skipped);
    assert_eq!(
        target.source_ids(),
        HashSet::from(["r1".to_string(), "r2".to_string()])
    );
}

#[tokio::test]
async fn test_empty_source_deletes_nothing() {
    let target = Arc::new(FakeTarget::new());
    target.seed(CollectionRecord::skeleton(RecordId::new("r3"), created()));

    let source = Arc::new(FakeSource::new(vec![]));
    let runner = runner_over(source, Arc::clone(&target));

    let report = runner.run().await.unwrap();

    assert_eq!(report.records_processed, 0);
    assert_eq!(report.orphans_removed, 0);
    assert_eq!(target.source_ids(), HashSet::from(["r3".to_string()]));
}

#[tokio::test]
async fn test_orphan_removal_respects_batch_ceiling() {
    let target = Arc::new(FakeTarget::new());
    target.seed(CollectionRecord::skeleton(RecordId::new("gone1"), created()));
    target.seed(CollectionRecord::skeleton(RecordId::new("gone2"), created()));

    let source = Arc::new(FakeSource::new(vec![place("r1", "Keeper")]));
    let mut settings = settings();
    settings.orphan_batch_limit = 1;
    let runner = runner_with_settings(source, Arc::clone(&target), settings);

    let report = runner.run().await.unwrap();

    // One batch per run; the second orphan is caught by the next run.
    assert_eq!(report.orphans_removed, 1);
    assert_eq!(target.items.lock().unwrap().len(), 2);

    let report = runner.run().await.unwrap();
    assert_eq!(report.orphans_removed, 1);
    assert_eq!(target.source_ids(), HashSet::from(["r1".to_string()]));
}

#[tokio::test]
async fn test_record_failure_suppresses_orphan_cleanup() {
    let target = Arc::new(FakeTarget::new());
    target.seed(CollectionRecord::skeleton(RecordId::new("r3"), created()));
    target.fail_save_for("r2");

    let source = Arc::new(FakeSource::new(vec![
        place("r1", "Blue Bottle"),
        place("r2", "Sightglass"),
    ]));
    let runner = runner_over(source, Arc::clone(&target));

    let report = runner.run().await.unwrap();

    assert!(!report.clean());
    assert_eq!(report.failed, 1);
    assert!(report.orphan_cleanup_skipped);
    assert_eq!(report.orphans_removed, 0);

    // Best effort: the healthy record still landed, and the would-be
    // orphan is untouched.
    assert!(target.by_source_id("r1").is_some());
    assert!(target.by_source_id("r3").is_some());
}

#[tokio::test]
async fn test_malformed_geocode_fails_only_that_record() {
    let bad = SourceRecord::new("r2", created()).with_field("Geocode", "v1 not-base64!");
    let source = Arc::new(FakeSource::new(vec![place("r1", "Blue Bottle"), bad]));
    let target = Arc::new(FakeTarget::new());
    let runner = runner_over(source, Arc::clone(&target));

    let report = runner.run().await.unwrap();

    assert_eq!(report.failed, 1);
    assert!(target.by_source_id("r1").is_some());
    assert!(target.by_source_id("r2").is_none());
}

#[tokio::test]
async fn test_source_fetch_failure_aborts_before_writes() {
    let source = Arc::new(FakeSource::new(vec![place("r1", "Blue Bottle")]));
    source.fail.store(true, Ordering::SeqCst);
    let target = Arc::new(FakeTarget::new());
    let runner = runner_over(source, Arc::clone(&target));

    let err = runner.run().await.unwrap_err();

    assert_eq!(err.error_code(), "SOURCE_FETCH_FAILED");
    assert_eq!(target.save_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_skipped_removals_are_tolerated() {
    let target = Arc::new(FakeTarget::new());
    target.seed(CollectionRecord::skeleton(RecordId::new("gone1"), created()));
    target.seed(CollectionRecord::skeleton(RecordId::new("gone2"), created()));
    target.skip_removals.store(1, Ordering::SeqCst);

    let source = Arc::new(FakeSource::new(vec![place("r1", "Keeper")]));
    let runner = runner_over(source, Arc::clone(&target));

    let report = runner.run().await.unwrap();

    // A partial bulk removal is a success for the removed subset.
    assert!(report.clean());
    assert_eq!(report.orphans_removed, 1);
}

#[tokio::test]
async fn test_overlapping_runs_are_refused() {
    let source = Arc::new(FakeSource::slow(
        vec![place("r1", "Blue Bottle")],
        Duration::from_millis(200),
    ));
    let target = Arc::new(FakeTarget::new());
    let runner = Arc::new(runner_over(source, target));

    let (first, second) = tokio::join!(runner.run(), async {
        // Let the first run take the lock before trying.
        tokio::time::sleep(Duration::from_millis(20)).await;
        runner.run().await
    });

    assert!(first.is_ok());
    match second {
        Err(SyncError::AlreadyRunning) => {}
        other => panic!("expected AlreadyRunning, got {other:?}"),
    }
}
