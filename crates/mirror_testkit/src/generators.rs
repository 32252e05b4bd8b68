//! Document generators.
//!
//! Builders for upstream-shaped JSON documents plus proptest strategies.

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use serde_json::{json, Value};

/// A fixed reference instant, 2024-01-01T00:00:00Z.
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .expect("valid reference instant")
}

/// One document with `id`, a name and a modification time `minutes` after
/// [`epoch`].
pub fn document(id: &str, minutes: i64) -> Value {
    let modified = epoch() + Duration::minutes(minutes);
    json!({
        "id": id,
        "nombre": format!("Item {id}"),
        "fecha_modificacion": modified.to_rfc3339(),
    })
}

/// `count` documents with ids `{prefix}-0`, `{prefix}-1`, ...
pub fn documents(prefix: &str, count: usize) -> Vec<Value> {
    (0..count)
        .map(|i| document(&format!("{prefix}-{i}"), i as i64))
        .collect()
}

/// A document carrying no identifier field.
pub fn anonymous_document() -> Value {
    json!({"nombre": "sin codigo", "id": "   "})
}

/// Splits documents into pages of `size`.
pub fn paginate(documents: &[Value], size: usize) -> Vec<Vec<Value>> {
    documents.chunks(size.max(1)).map(<[Value]>::to_vec).collect()
}

/// Strategy for a record count and page/batch sizes.
pub fn sizes_strategy() -> impl Strategy<Value = (usize, u32, usize)> {
    (0usize..300, 1u32..60, 1usize..80)
}

/// Strategy for identifiers as the upstream sends them: strings or numbers.
pub fn identifier_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        "[A-Za-z0-9]{1,12}".prop_map(Value::String),
        (0u64..1_000_000).prop_map(|n| json!(n)),
    ]
}
