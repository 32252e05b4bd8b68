//! Search and show command implementations.

use super::{write_json, OutputFormat};
use crate::error::{CliError, CliResult};
use mirror_catalog::Registry;
use mirror_store::{LocalStore, StoredRecord};
use std::io::Write;

/// Prints the newest records of a resource, or those matching `query`.
pub fn run_search(
    store: &dyn LocalStore,
    registry: &Registry,
    resource: &str,
    query: Option<&str>,
    limit: usize,
    format: OutputFormat,
    out: &mut dyn Write,
) -> CliResult<()> {
    let definition = registry.require(resource)?;
    let records = store.search(definition, query, limit)?;

    match format {
        OutputFormat::Json => write_json(out, &records),
        OutputFormat::Text => {
            for record in &records {
                writeln!(out, "{:<20} {:<34} {}", record.id, record.updated_at, preview(record))?;
            }
            writeln!(out, "{} record(s)", records.len())?;
            Ok(())
        }
    }
}

/// Prints one stored record.
///
/// # Errors
///
/// Returns `NotFound` if the record is not mirrored.
pub fn run_show(
    store: &dyn LocalStore,
    registry: &Registry,
    resource: &str,
    id: &str,
    format: OutputFormat,
    out: &mut dyn Write,
) -> CliResult<()> {
    let definition = registry.require(resource)?;
    let record = store
        .get_record(definition, id)?
        .ok_or_else(|| CliError::NotFound(format!("record {id} in {resource}")))?;

    match format {
        OutputFormat::Json => write_json(out, &record),
        OutputFormat::Text => {
            writeln!(out, "id:         {}", record.id)?;
            writeln!(out, "updated_at: {}", record.updated_at)?;
            writeln!(out, "fetched_at: {}", record.fetched_at)?;
            write_json(out, &record.data)
        }
    }
}

const PREVIEW_CHARS: usize = 60;

fn preview(record: &StoredRecord) -> String {
    let text = record.data.to_string();
    if text.chars().count() <= PREVIEW_CHARS {
        return text;
    }
    let mut cut: String = text.chars().take(PREVIEW_CHARS).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mirror_catalog::{Record, ResourceDefinition};
    use mirror_store::MemoryStore;
    use serde_json::json;

    fn seeded() -> (MemoryStore, Registry) {
        let def = ResourceDefinition::new("products", "producto/");
        let registry = Registry::new(vec![def.clone()]).unwrap();
        let store = MemoryStore::new();
        let records: Vec<Record> = [
            json!({"id": "p1", "nombre": "Cafe molido"}),
            json!({"id": "p2", "nombre": "Te verde"}),
        ]
        .into_iter()
        .filter_map(|doc| Record::from_document(&def, doc, Utc::now()))
        .collect();
        store.upsert_batch("products", "id", &records).unwrap();
        (store, registry)
    }

    #[test]
    fn search_filters_by_payload() {
        let (store, registry) = seeded();
        let mut out = Vec::new();
        run_search(&store, &registry, "products", Some("verde"), 20, OutputFormat::Text, &mut out)
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("p2"));
        assert!(text.ends_with("1 record(s)\n"));
    }

    #[test]
    fn search_unknown_resource() {
        let (store, registry) = seeded();
        let err = run_search(&store, &registry, "nope", None, 20, OutputFormat::Text, &mut Vec::new())
            .unwrap_err();
        assert!(matches!(err, CliError::Catalog(_)));
    }

    #[test]
    fn show_prints_payload() {
        let (store, registry) = seeded();
        let mut out = Vec::new();
        run_show(&store, &registry, "products", "p1", OutputFormat::Text, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("id:         p1"));
        assert!(text.contains("Cafe molido"));
    }

    #[test]
    fn show_missing_record() {
        let (store, registry) = seeded();
        let err = run_show(&store, &registry, "products", "zz", OutputFormat::Json, &mut Vec::new())
            .unwrap_err();
        assert!(matches!(err, CliError::NotFound(_)));
    }

    #[test]
    fn long_payloads_are_cut() {
        let record = StoredRecord {
            id: "x".into(),
            data: json!({"text": "a".repeat(200)}),
            updated_at: String::new(),
            fetched_at: String::new(),
        };
        let shown = preview(&record);
        assert_eq!(shown.chars().count(), PREVIEW_CHARS + 3);
        assert!(shown.ends_with("..."));
    }
}
