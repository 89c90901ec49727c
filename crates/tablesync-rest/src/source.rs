//! Source table client
//!
//! Read-only client for the grid platform's REST API. Records come back in
//! pages of `{records: [...], offset: "..."}`; the offset cursor is echoed
//! until the table is exhausted.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use tablesync_connector::{SourceRecord, SourceSettings, SourceStore, StoreResult};

use crate::http::{build_client, check_status, transport_error};

/// Ceiling on records fetched in one run, against runaway tables.
const MAX_SOURCE_RECORDS: usize = 50_000;

/// One page of the source table.
#[derive(Debug, Deserialize)]
struct RecordPage {
    records: Vec<SourceRecord>,
    #[serde(default)]
    offset: Option<String>,
}

/// Client for the source table API.
pub struct GridSourceClient {
    http: reqwest::Client,
    api_base: String,
    base_id: String,
}

impl GridSourceClient {
    /// Build a client from the deployment's source settings.
    pub fn new(settings: &SourceSettings) -> StoreResult<Self> {
        Ok(Self {
            http: build_client(&settings.api_key)?,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            base_id: settings.base_id.clone(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}/{}", self.api_base, self.base_id, table)
    }
}

#[async_trait]
impl SourceStore for GridSourceClient {
    async fn fetch_all(&self, table: &str, page_size: u32) -> StoreResult<Vec<SourceRecord>> {
        let url = self.table_url(table);
        let mut records = Vec::new();
        let mut offset: Option<String> = None;

        loop {
            let mut request = self
                .http
                .get(&url)
                .query(&[("pageSize", page_size.to_string())]);
            if let Some(ref cursor) = offset {
                request = request.query(&[("offset", cursor)]);
            }

            let response = request
                .send()
                .await
                .map_err(|e| transport_error("source fetch", e))?;
            let page: RecordPage = check_status("source fetch", response)?
                .json()
                .await
                .map_err(|e| transport_error("source fetch", e))?;

            debug!(table = %table, count = page.records.len(), "Fetched source page");
            records.extend(page.records);

            if records.len() >= MAX_SOURCE_RECORDS {
                warn!(
                    table = %table,
                    fetched = records.len(),
                    "Reached source record ceiling, stopping fetch"
                );
                break;
            }

            match page.offset {
                Some(cursor) if !cursor.is_empty() => offset = Some(cursor),
                _ => break,
            }
        }

        Ok(records)
    }
}
