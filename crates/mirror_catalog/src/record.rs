//! Records and pages.

use crate::resource::ResourceDefinition;
use crate::timestamp::{format_timestamp, parse_timestamp};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

/// A single remote entity as captured by the fetcher.
///
/// Records are immutable once fetched. The local store upserts by
/// `primary_key`, so a later fetch of the same key overwrites the row
/// (last write wins by fetch order).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    /// Identifier extracted from the payload.
    pub primary_key: String,
    /// Full document as received.
    pub raw_payload: Value,
    /// Source update time, when the payload carries a parseable one.
    pub source_updated_at: Option<DateTime<Utc>>,
    /// Source update field verbatim, kept when it could not be parsed.
    pub source_updated_raw: Option<String>,
    /// Capture time assigned at read time.
    pub fetched_at: DateTime<Utc>,
}

impl Record {
    /// Builds a record from a raw document.
    ///
    /// Returns `None` if the document is not an object or carries no usable
    /// identifier.
    pub fn from_document(
        definition: &ResourceDefinition,
        document: Value,
        fetched_at: DateTime<Utc>,
    ) -> Option<Self> {
        let object = document.as_object()?;
        let primary_key = extract_primary_key(definition, object)?;

        let raw_update = definition
            .timestamp_fields
            .iter()
            .filter_map(|field| object.get(*field))
            .find_map(value_as_text);
        let source_updated_at = raw_update.as_deref().and_then(parse_timestamp);
        let source_updated_raw = match source_updated_at {
            Some(_) => None,
            None => raw_update,
        };

        Some(Self {
            primary_key,
            raw_payload: document,
            source_updated_at,
            source_updated_raw,
            fetched_at,
        })
    }

    /// Value stored in the `updated_at` column: the parsed source time, the
    /// raw source text, or the capture time, in that order.
    pub fn updated_at_column(&self) -> String {
        match (&self.source_updated_at, &self.source_updated_raw) {
            (Some(ts), _) => format_timestamp(ts),
            (None, Some(raw)) => raw.clone(),
            (None, None) => format_timestamp(&self.fetched_at),
        }
    }
}

/// Extracts the identifier of a document.
///
/// Candidates are tried in [`ResourceDefinition::id_candidates`] order.
/// Strings are trimmed, numbers rendered as text, blanks skipped.
pub fn extract_primary_key(
    definition: &ResourceDefinition,
    document: &Map<String, Value>,
) -> Option<String> {
    definition
        .id_candidates()
        .into_iter()
        .filter_map(|field| document.get(field))
        .find_map(value_as_text)
}

fn value_as_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// One page of records plus its continuation signal.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// Records in upstream order.
    pub records: Vec<Record>,
    /// Whether the upstream signalled more pages.
    pub has_more: bool,
    /// Page number to request next.
    pub next_cursor: Option<u32>,
    /// Documents dropped because they had no usable identifier.
    pub skipped: usize,
}

impl Page {
    /// Number of records on the page.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the page holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn builds_record_from_object() {
        let def = ResourceDefinition::new("products", "producto/");
        let doc = json!({"id": "P-1", "nombre": "Widget", "fecha_modificacion": "2024-04-30"});
        let record = Record::from_document(&def, doc.clone(), now()).unwrap();

        assert_eq!(record.primary_key, "P-1");
        assert_eq!(record.raw_payload, doc);
        assert_eq!(
            record.source_updated_at,
            Some(Utc.with_ymd_and_hms(2024, 4, 30, 0, 0, 0).unwrap())
        );
        assert_eq!(record.source_updated_raw, None);
        assert_eq!(record.fetched_at, now());
    }

    #[test]
    fn numeric_ids_and_fallbacks() {
        let def = ResourceDefinition::new("warehouses", "bodega/")
            .with_id_fallbacks(&["codigo", "code", "codigo_bodega"]);

        let numeric = json!({"id": 42});
        assert_eq!(
            Record::from_document(&def, numeric, now()).unwrap().primary_key,
            "42"
        );

        let fallback = json!({"id": "  ", "codigo_bodega": " B01 "});
        assert_eq!(
            Record::from_document(&def, fallback, now()).unwrap().primary_key,
            "B01"
        );
    }

    #[test]
    fn missing_identifier_is_none() {
        let def = ResourceDefinition::new("products", "producto/");
        assert!(Record::from_document(&def, json!({"nombre": "x"}), now()).is_none());
        assert!(Record::from_document(&def, json!({"id": null}), now()).is_none());
        assert!(Record::from_document(&def, json!([1, 2]), now()).is_none());
    }

    #[test]
    fn updated_at_column_fallbacks() {
        let def = ResourceDefinition::new("products", "producto/");

        let unparsed = Record::from_document(&def, json!({"id": 1, "fecha": "ayer"}), now()).unwrap();
        assert_eq!(unparsed.source_updated_at, None);
        assert_eq!(unparsed.updated_at_column(), "ayer");

        let bare = Record::from_document(&def, json!({"id": 1}), now()).unwrap();
        assert_eq!(bare.updated_at_column(), format_timestamp(&now()));
    }

    #[test]
    fn timestamp_field_order_is_respected() {
        let def = ResourceDefinition::new("documents", "documento/");
        let doc = json!({
            "id": "D1",
            "fecha_emision": "2024-01-01",
            "updated_at": "2024-02-02T00:00:00Z"
        });
        let record = Record::from_document(&def, doc, now()).unwrap();
        assert_eq!(
            record.source_updated_at,
            Some(Utc.with_ymd_and_hms(2024, 2, 2, 0, 0, 0).unwrap())
        );
    }
}
