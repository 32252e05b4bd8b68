//! Overview command implementation.

use super::{write_json, OutputFormat};
use crate::error::CliResult;
use mirror_catalog::{format_timestamp, Registry};
use mirror_store::{LocalStore, ResourceOverview};
use std::io::Write;

/// Prints row counts and watermarks per resource.
pub fn run(
    store: &dyn LocalStore,
    registry: &Registry,
    format: OutputFormat,
    out: &mut dyn Write,
) -> CliResult<()> {
    let overview = store.overview(registry)?;
    match format {
        OutputFormat::Json => write_json(out, &overview),
        OutputFormat::Text => print_table(&overview, out),
    }
}

fn print_table(rows: &[ResourceOverview], out: &mut dyn Write) -> CliResult<()> {
    writeln!(
        out,
        "{:<24} {:>8}  {:<32}  {:<32}",
        "RESOURCE", "ROWS", "LAST UPDATED", "LAST SYNCED"
    )?;
    for row in rows {
        writeln!(
            out,
            "{:<24} {:>8}  {:<32}  {:<32}",
            row.resource,
            row.count,
            row.last_updated.as_deref().unwrap_or("-"),
            row.last_synced
                .as_ref()
                .map(format_timestamp)
                .unwrap_or_else(|| "never".to_string()),
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use mirror_catalog::ResourceDefinition;
    use mirror_store::MemoryStore;

    #[test]
    fn table_lists_every_resource() {
        let registry = Registry::new(vec![
            ResourceDefinition::new("products", "producto/"),
            ResourceDefinition::new("brands", "marca/"),
        ])
        .unwrap();
        let store = MemoryStore::new();
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        store.write_watermark("products", at).unwrap();

        let mut out = Vec::new();
        run(&store, &registry, OutputFormat::Text, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("products"));
        assert!(lines[1].contains("2024-05-01T12:00:00"));
        assert!(lines[2].starts_with("brands"));
        assert!(lines[2].contains("never"));
    }
}
