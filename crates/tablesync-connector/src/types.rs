//! Record and field-value types
//!
//! The loosely-typed field bag exposed by the source platform is modeled as
//! a tagged variant type so the transformer can pattern-match on shape
//! instead of probing JSON values at runtime.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::ids::RecordId;

/// Wire name of the external-identifier field on target records.
///
/// This is the reconciliation join key, not the target store's own primary
/// key. It must be unique within the collection.
pub const SOURCE_ID_FIELD: &str = "sourceId";

/// Wire name of the target store's own primary key.
pub const TARGET_ID_FIELD: &str = "_id";

/// A single value in a source record's field bag.
///
/// Deserialized untagged from the source API's JSON. Variant order matters:
/// more specific shapes are tried first, and [`FieldValue::Other`] absorbs
/// anything that does not match a known shape (non-attachment object
/// arrays, nested objects), leaving its fate to the transformer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// A plain text value.
    Text(String),
    /// A numeric value.
    Number(f64),
    /// A boolean value (e.g. a checkbox column).
    Boolean(bool),
    /// A multi-value text field, such as a tag list.
    StringList(Vec<String>),
    /// An array of file attachments.
    Attachments(Vec<Attachment>),
    /// Any other JSON shape the source may produce.
    Other(Value),
}

impl FieldValue {
    /// True if this is a single scalar value.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            FieldValue::Text(_) | FieldValue::Number(_) | FieldValue::Boolean(_)
        )
    }

    /// Get the text content if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(values: Vec<String>) -> Self {
        FieldValue::StringList(values)
    }
}

impl From<Vec<Attachment>> for FieldValue {
    fn from(values: Vec<Attachment>) -> Self {
        FieldValue::Attachments(values)
    }
}

/// One attachment inside an array-valued field.
///
/// The source sends richer metadata (file name, size, thumbnails); only the
/// category tag and the URL matter for transformation, the rest is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    /// Mime/category tag (JSON name `type`, e.g. `image/jpeg`).
    #[serde(rename = "type")]
    pub kind: String,
    /// Public URL of the attachment content.
    pub url: String,
}

impl Attachment {
    /// Create a new attachment value.
    pub fn new(kind: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            url: url.into(),
        }
    }

    /// True if the category tag marks this as an image.
    pub fn is_image(&self) -> bool {
        self.kind.contains("image")
    }
}

/// One row fetched from the source table.
///
/// Immutable snapshot: a record is fetched once per run and never written
/// back to the source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRecord {
    /// Source-assigned stable identifier.
    pub id: RecordId,
    /// Creation time reported by the source platform.
    #[serde(rename = "createdTime")]
    pub created_time: DateTime<Utc>,
    /// Field name to value, as loosely typed as the source allows.
    #[serde(default)]
    pub fields: HashMap<String, FieldValue>,
}

impl SourceRecord {
    /// Create a record with the given id and creation time and no fields.
    pub fn new(id: impl Into<RecordId>, created_time: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            created_time,
            fields: HashMap::new(),
        }
    }

    /// Add a field value (builder style, used heavily in tests).
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }
}

/// One item in the target collection.
///
/// Serialized flat for the wire: the transformed data fields sit at the top
/// level next to the identifier and timestamp fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionRecord {
    /// Target-store primary key, assigned on first insert.
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Copy of the source record's identifier; reconciliation join key.
    #[serde(rename = "sourceId")]
    pub source_id: RecordId,
    /// Creation time carried over from the source record.
    #[serde(rename = "createdTime")]
    pub created_time: DateTime<Utc>,
    /// Transformed data fields, keyed by normalized field name.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl CollectionRecord {
    /// Build a fresh skeleton for a source record the target has never seen.
    pub fn skeleton(source_id: RecordId, created_time: DateTime<Utc>) -> Self {
        Self {
            id: None,
            source_id,
            created_time,
            fields: Map::new(),
        }
    }

    /// True if this record has not been persisted yet.
    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }

    /// Get a data field by its normalized name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Set a data field (builder style, used heavily in tests).
    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }
}

/// Outcome of a bulk removal on the target store.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RemovalOutcome {
    /// Number of records actually removed.
    pub removed: u64,
    /// Number of records the store skipped (e.g. concurrent modification).
    pub skipped: u64,
}
