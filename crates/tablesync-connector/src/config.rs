//! Sync configuration
//!
//! Static per-deployment settings: platform credentials, the table and
//! collection being mirrored, field-detection rules, and tuning knobs.
//! Validated once at startup; the engine assumes a valid configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{StoreError, StoreResult};

const REDACTED: &str = "***";

/// Connection settings for the source table API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSettings {
    /// Base URL of the source platform API.
    pub api_base: String,
    /// Per-user API key. Use a read-only account for this.
    pub api_key: String,
    /// Identifier of the base/workspace that holds the table.
    pub base_id: String,
    /// Name of the table (or view) to mirror.
    pub table: String,
}

/// Connection settings for the target collection API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetSettings {
    /// Base URL of the target platform API.
    pub api_base: String,
    /// API key authorized to write the collection.
    pub api_key: String,
    /// Name of the collection being kept in sync.
    ///
    /// The collection is code-managed: anything in it that does not come
    /// from the source table will be deleted by the orphan pass.
    pub collection: String,
}

/// Field-detection rules applied by the transformer.
///
/// All markers are substring matches against the source field name,
/// case-insensitive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldRules {
    /// Marker identifying tag-list fields.
    #[serde(default = "default_tags_marker")]
    pub tags_marker: String,

    /// Suffix appended to the normalized name for shadow tag fields.
    #[serde(default = "default_shadow_suffix")]
    pub shadow_suffix: String,

    /// Whether to emit shadow tag fields at all.
    ///
    /// Shadow fields exist because the target store cannot filter on
    /// array-typed fields; turn this off if nothing queries them.
    #[serde(default = "default_generate_shadow_fields")]
    pub generate_shadow_fields: bool,

    /// Marker identifying postal address fields.
    #[serde(default = "default_address_marker")]
    pub address_marker: String,

    /// Marker identifying base64-encoded geocode fields.
    #[serde(default = "default_geocode_marker")]
    pub geocode_marker: String,
}

fn default_tags_marker() -> String {
    "tags".to_string()
}

fn default_shadow_suffix() -> String {
    "shadow".to_string()
}

fn default_generate_shadow_fields() -> bool {
    true
}

fn default_address_marker() -> String {
    "address".to_string()
}

fn default_geocode_marker() -> String {
    "geocode".to_string()
}

impl Default for FieldRules {
    fn default() -> Self {
        Self {
            tags_marker: default_tags_marker(),
            shadow_suffix: default_shadow_suffix(),
            generate_shadow_fields: default_generate_shadow_fields(),
            address_marker: default_address_marker(),
            geocode_marker: default_geocode_marker(),
        }
    }
}

impl FieldRules {
    /// True if the source field name marks a tag-list field.
    pub fn is_tags_field(&self, name: &str) -> bool {
        contains_ignore_case(name, &self.tags_marker)
    }

    /// True if the source field name marks a postal address field.
    pub fn is_address_field(&self, name: &str) -> bool {
        contains_ignore_case(name, &self.address_marker)
    }

    /// True if the source field name marks an encoded geocode field.
    pub fn is_geocode_field(&self, name: &str) -> bool {
        contains_ignore_case(name, &self.geocode_marker)
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    !needle.is_empty() && haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Complete configuration for one sync deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Source table connection.
    pub source: SourceSettings,

    /// Target collection connection.
    pub target: TargetSettings,

    /// Field-detection rules.
    #[serde(default)]
    pub rules: FieldRules,

    /// Page size for the source fetch. Tuning only, not semantic.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Maximum orphans removed per run, a ceiling imposed by the target
    /// platform's query limit. Excess orphans are removed by later runs.
    #[serde(default = "default_orphan_batch_limit")]
    pub orphan_batch_limit: u32,

    /// Maximum per-record writes in flight at once.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    /// Deadline for the full source fetch, in seconds.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Deadline for a single record lookup or write, in seconds.
    #[serde(default = "default_write_timeout_secs")]
    pub write_timeout_secs: u64,
}

fn default_page_size() -> u32 {
    100
}

fn default_orphan_batch_limit() -> u32 {
    1000
}

fn default_max_in_flight() -> usize {
    8
}

fn default_fetch_timeout_secs() -> u64 {
    60
}

fn default_write_timeout_secs() -> u64 {
    30
}

impl SyncSettings {
    /// Validate the configuration, failing fast on anything the engine
    /// would otherwise trip over mid-run.
    pub fn validate(&self) -> StoreResult<()> {
        fn require(value: &str, what: &str) -> StoreResult<()> {
            if value.trim().is_empty() {
                return Err(StoreError::invalid_configuration(format!(
                    "{what} must not be empty"
                )));
            }
            Ok(())
        }

        require(&self.source.api_base, "source api_base")?;
        require(&self.source.api_key, "source api_key")?;
        require(&self.source.base_id, "source base_id")?;
        require(&self.source.table, "source table")?;
        require(&self.target.api_base, "target api_base")?;
        require(&self.target.api_key, "target api_key")?;
        require(&self.target.collection, "target collection")?;

        if self.page_size == 0 {
            return Err(StoreError::invalid_configuration(
                "page_size must be greater than zero",
            ));
        }
        if self.orphan_batch_limit == 0 {
            return Err(StoreError::invalid_configuration(
                "orphan_batch_limit must be greater than zero",
            ));
        }
        if self.max_in_flight == 0 {
            return Err(StoreError::invalid_configuration(
                "max_in_flight must be greater than zero",
            ));
        }

        for (what, base) in [
            ("source", &self.source.api_base),
            ("target", &self.target.api_base),
        ] {
            if base.starts_with("http://") {
                tracing::warn!(
                    target: "security",
                    "SECURITY WARNING: {what} api_base uses plain HTTP; \
                     API keys will be sent unencrypted"
                );
            }
        }

        Ok(())
    }

    /// Create a copy with credentials replaced, safe for logging.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.source.api_key = REDACTED.to_string();
        copy.target.api_key = REDACTED.to_string();
        copy
    }

    /// Deadline for the full source fetch.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Deadline for a single record lookup or write.
    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }
}
