//! Target collection client
//!
//! Write client for the collection platform's data API: filtered queries,
//! upsert saves, and bulk removal.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;
use tracing::debug;

use tablesync_connector::{
    CollectionRecord, RecordId, RemovalOutcome, StoreResult, TargetSettings, TargetStore,
    SOURCE_ID_FIELD,
};

use crate::http::{build_client, check_status, transport_error};

#[derive(Debug, Serialize)]
struct QueryRequest {
    filter: Value,
    limit: u32,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    items: Vec<CollectionRecord>,
}

#[derive(Debug, Serialize)]
struct SaveRequest {
    item: CollectionRecord,
}

#[derive(Debug, Deserialize)]
struct SaveResponse {
    item: CollectionRecord,
}

#[derive(Debug, Serialize)]
struct RemoveRequest<'a> {
    ids: &'a [String],
}

#[derive(Debug, Deserialize)]
struct RemoveResponse {
    #[serde(default)]
    removed: u64,
    #[serde(default)]
    skipped: u64,
}

/// Filter matching records whose external identifier equals `id`.
fn source_id_eq(id: &RecordId) -> Value {
    json!({ SOURCE_ID_FIELD: { "$eq": id.as_str() } })
}

/// Filter matching records whose external identifier is not in `keep`.
fn source_id_not_in(keep: &HashSet<RecordId>) -> Value {
    let mut ids: Vec<&str> = keep.iter().map(RecordId::as_str).collect();
    ids.sort_unstable();
    json!({ SOURCE_ID_FIELD: { "$nin": ids } })
}

/// Client for the target collection API.
pub struct CollectionClient {
    http: reqwest::Client,
    api_base: String,
}

impl CollectionClient {
    /// Build a client from the deployment's target settings.
    pub fn new(settings: &TargetSettings) -> StoreResult<Self> {
        Ok(Self {
            http: build_client(&settings.api_key)?,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
        })
    }

    fn collection_url(&self, collection: &str, tail: &str) -> String {
        format!("{}/collections/{}/{}", self.api_base, collection, tail)
    }

    async fn query(
        &self,
        collection: &str,
        filter: Value,
        limit: u32,
    ) -> StoreResult<Vec<CollectionRecord>> {
        let response = self
            .http
            .post(self.collection_url(collection, "query"))
            .json(&QueryRequest { filter, limit })
            .send()
            .await
            .map_err(|e| transport_error("collection query", e))?;

        let body: QueryResponse = check_status("collection query", response)?
            .json()
            .await
            .map_err(|e| transport_error("collection query", e))?;

        Ok(body.items)
    }
}

#[async_trait]
impl TargetStore for CollectionClient {
    async fn find_by_source_id(
        &self,
        collection: &str,
        source_id: &RecordId,
    ) -> StoreResult<Option<CollectionRecord>> {
        let items = self.query(collection, source_id_eq(source_id), 1).await?;
        Ok(items.into_iter().next())
    }

    async fn save(
        &self,
        collection: &str,
        record: CollectionRecord,
    ) -> StoreResult<CollectionRecord> {
        let response = self
            .http
            .put(self.collection_url(collection, "items"))
            .json(&SaveRequest { item: record })
            .send()
            .await
            .map_err(|e| transport_error("collection save", e))?;

        let body: SaveResponse = check_status("collection save", response)?
            .json()
            .await
            .map_err(|e| transport_error("collection save", e))?;

        Ok(body.item)
    }

    async fn find_orphans(
        &self,
        collection: &str,
        keep: &HashSet<RecordId>,
        limit: u32,
    ) -> StoreResult<Vec<CollectionRecord>> {
        self.query(collection, source_id_not_in(keep), limit).await
    }

    async fn bulk_remove(&self, collection: &str, ids: &[String]) -> StoreResult<RemovalOutcome> {
        let response = self
            .http
            .post(self.collection_url(collection, "items/remove"))
            .json(&RemoveRequest { ids })
            .send()
            .await
            .map_err(|e| transport_error("collection remove", e))?;

        let body: RemoveResponse = check_status("collection remove", response)?
            .json()
            .await
            .map_err(|e| transport_error("collection remove", e))?;

        debug!(
            collection = %collection,
            removed = body.removed,
            skipped = body.skipped,
            "Bulk removal finished"
        );
        Ok(RemovalOutcome {
            removed: body.removed,
            skipped: body.skipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_id_eq_filter() {
        let filter = source_id_eq(&RecordId::new("rec1"));
        assert_eq!(filter, json!({"sourceId": {"$eq": "rec1"}}));
    }

    #[test]
    fn test_source_id_not_in_filter_is_deterministic() {
        let keep: HashSet<RecordId> = [RecordId::new("b"), RecordId::new("a")].into();
        let filter = source_id_not_in(&keep);
        assert_eq!(filter, json!({"sourceId": {"$nin": ["a", "b"]}}));
    }

    #[test]
    fn test_query_response_parses_items() {
        let body: QueryResponse = serde_json::from_value(json!({
            "items": [
                {
                    "_id": "item-1",
                    "sourceId": "rec1",
                    "createdTime": "2024-03-01T12:00:00Z",
                    "name": "Blue Bottle"
                }
            ]
        }))
        .unwrap();

        assert_eq!(body.items.len(), 1);
        assert_eq!(body.items[0].id.as_deref(), Some("item-1"));
        assert_eq!(body.items[0].get("name"), Some(&json!("Blue Bottle")));
    }

    #[test]
    fn test_remove_response_defaults_missing_counts() {
        let body: RemoveResponse = serde_json::from_value(json!({"removed": 3})).unwrap();
        assert_eq!(body.removed, 3);
        assert_eq!(body.skipped, 0);
    }

    #[test]
    fn test_collection_url() {
        let settings = TargetSettings {
            api_base: "https://collections.test/v2/".to_string(),
            api_key: "k".to_string(),
            collection: "Places".to_string(),
        };
        let client = CollectionClient::new(&settings).unwrap();
        assert_eq!(
            client.collection_url("Places", "query"),
            "https://collections.test/v2/collections/Places/query"
        );
    }
}
