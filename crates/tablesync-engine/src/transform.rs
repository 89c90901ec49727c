//! Field transformation
//!
//! Converts one source record's field bag into target collection fields,
//! applying shape-detection heuristics per field. The transformer writes
//! into an existing field map, so applying it to a previously synced
//! record merges: unrelated existing fields persist, transformed keys
//! overwrite.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use thiserror::Error;

use tablesync_connector::{FieldRules, FieldValue};

/// Error raised while transforming a single field.
///
/// Only the geocode rule can fail; the error is deliberately not caught at
/// field level and aborts the enclosing record's write (the record is
/// counted as failed, the run continues).
#[derive(Debug, Error)]
pub enum TransformError {
    /// Geocode value was not a string.
    #[error("geocode field '{field}' does not hold a text value")]
    GeocodeNotText { field: String },

    /// Geocode value had no payload after the prefix.
    #[error("geocode field '{field}' has no encoded payload")]
    GeocodeMissingPayload { field: String },

    /// Geocode payload was not valid base64.
    #[error("geocode field '{field}' payload is not valid base64")]
    GeocodeDecode {
        field: String,
        #[source]
        source: base64::DecodeError,
    },

    /// Geocode payload decoded but was not valid JSON.
    #[error("geocode field '{field}' payload is not valid JSON")]
    GeocodeParse {
        field: String,
        #[source]
        source: serde_json::Error,
    },

    /// Geocode JSON was missing the expected keys.
    #[error("geocode field '{field}' payload is missing o.formattedAddress/o.lat/o.lng")]
    GeocodeShape { field: String },
}

impl TransformError {
    /// Stable code for log correlation.
    pub fn error_code(&self) -> &'static str {
        match self {
            TransformError::GeocodeNotText { .. } => "GEOCODE_NOT_TEXT",
            TransformError::GeocodeMissingPayload { .. } => "GEOCODE_MISSING_PAYLOAD",
            TransformError::GeocodeDecode { .. } => "GEOCODE_BAD_BASE64",
            TransformError::GeocodeParse { .. } => "GEOCODE_BAD_JSON",
            TransformError::GeocodeShape { .. } => "GEOCODE_BAD_SHAPE",
        }
    }
}

/// Normalize a source field name into a target field key.
///
/// Lower-cases the name, strips `/`, camel-cases on word boundaries and
/// removes whitespace: `"Street Address/2"` becomes `streetAddress2`.
///
/// Normalization is deterministic but not injective: two distinct source
/// names can normalize to the same key, in which case the later field
/// silently wins. The source schema is expected to avoid this.
pub fn normalize_field_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut boundary = false;
    for ch in name.chars() {
        if ch == '/' {
            continue;
        }
        if ch.is_whitespace() {
            boundary = true;
            continue;
        }
        if boundary && !out.is_empty() {
            out.extend(ch.to_uppercase());
        } else {
            out.extend(ch.to_lowercase());
        }
        boundary = !ch.is_alphanumeric();
    }
    out
}

/// Transforms source field bags into target collection fields.
#[derive(Debug, Clone)]
pub struct FieldTransformer {
    rules: FieldRules,
}

impl FieldTransformer {
    /// Create a transformer with the given field-detection rules.
    pub fn new(rules: FieldRules) -> Self {
        Self { rules }
    }

    /// Apply every source field onto `target`, keyed by normalized name.
    ///
    /// Returns an error only for malformed geocode payloads; everything
    /// else either maps cleanly or is dropped per the rules below.
    pub fn apply(
        &self,
        source_fields: &HashMap<String, FieldValue>,
        target: &mut Map<String, Value>,
    ) -> Result<(), TransformError> {
        for (name, value) in source_fields {
            self.apply_field(name, value, target)?;
        }
        Ok(())
    }

    fn apply_field(
        &self,
        name: &str,
        value: &FieldValue,
        target: &mut Map<String, Value>,
    ) -> Result<(), TransformError> {
        let key = normalize_field_name(name);

        match value {
            FieldValue::StringList(values) => {
                target.insert(key.clone(), json!(values));

                if self.rules.generate_shadow_fields && self.rules.is_tags_field(name) {
                    // The target store cannot filter on array fields, so a
                    // comma-joined copy is kept next to the real one.
                    let shadow_key = format!("{key}{}", self.rules.shadow_suffix);
                    target.insert(shadow_key, Value::String(values.join(",")));
                }
            }

            FieldValue::Attachments(attachments) => {
                // Only image attachment arrays map to the target's media
                // shape. Anything else is dropped without an output field;
                // deployments rely on that, so it stays until product says
                // otherwise.
                let is_image_array = attachments.first().is_some_and(|a| a.is_image());
                if is_image_array {
                    let images: Vec<Value> = attachments
                        .iter()
                        .map(|a| json!({"type": "image", "src": a.url}))
                        .collect();
                    target.insert(key, Value::Array(images));
                }
            }

            FieldValue::Text(_) | FieldValue::Number(_) | FieldValue::Boolean(_) => {
                let scalar = scalar_to_value(value);
                if self.rules.is_address_field(name) {
                    target.insert(key, json!({ "formatted": scalar }));
                } else if self.rules.is_geocode_field(name) {
                    target.insert(key, decode_geocode(name, value)?);
                } else {
                    target.insert(key, scalar);
                }
            }

            FieldValue::Other(raw) => {
                // Unrecognized array shapes (non-attachment object arrays,
                // mixed arrays) are dropped; any other shape passes through
                // verbatim like a scalar.
                if !raw.is_array() {
                    target.insert(key, raw.clone());
                }
            }
        }

        Ok(())
    }
}

fn scalar_to_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Text(s) => Value::String(s.clone()),
        FieldValue::Number(n) => json!(n),
        FieldValue::Boolean(b) => Value::Bool(*b),
        _ => Value::Null,
    }
}

/// Decode a geocode field value into the target's location shape.
///
/// The source stores geocode data as `"<prefix> <base64>"` where the
/// payload decodes to JSON carrying `o.formattedAddress`, `o.lat` and
/// `o.lng`.
fn decode_geocode(field: &str, value: &FieldValue) -> Result<Value, TransformError> {
    let raw = value.as_text().ok_or_else(|| TransformError::GeocodeNotText {
        field: field.to_string(),
    })?;

    let (_, payload) = raw
        .split_once(' ')
        .ok_or_else(|| TransformError::GeocodeMissingPayload {
            field: field.to_string(),
        })?;

    let decoded = BASE64
        .decode(payload)
        .map_err(|source| TransformError::GeocodeDecode {
            field: field.to_string(),
            source,
        })?;

    let parsed: Value =
        serde_json::from_slice(&decoded).map_err(|source| TransformError::GeocodeParse {
            field: field.to_string(),
            source,
        })?;

    let origin = &parsed["o"];
    let (formatted, lat, lng) = match (
        origin["formattedAddress"].as_str(),
        origin["lat"].as_f64(),
        origin["lng"].as_f64(),
    ) {
        (Some(formatted), Some(lat), Some(lng)) => (formatted, lat, lng),
        _ => {
            return Err(TransformError::GeocodeShape {
                field: field.to_string(),
            })
        }
    };

    Ok(json!({
        "formatted": formatted,
        "location": {
            "latitude": lat,
            "longitude": lng,
        }
    }))
}
