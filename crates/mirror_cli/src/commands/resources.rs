//! Resources command implementation.

use super::{write_json, OutputFormat};
use crate::error::CliResult;
use mirror_catalog::Registry;
use std::io::Write;

/// Lists the registered resources.
pub fn run(registry: &Registry, format: OutputFormat, out: &mut dyn Write) -> CliResult<()> {
    if format == OutputFormat::Json {
        let definitions: Vec<_> = registry.iter().collect();
        return write_json(out, &definitions);
    }

    for def in registry.iter() {
        let filter = def.incremental_field.unwrap_or("(full scan)");
        writeln!(
            out,
            "{:<24} {:<32} {:<28} {}",
            def.name, def.endpoint, filter, def.label
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_builtin_catalog() {
        let registry = Registry::builtin();
        let mut out = Vec::new();
        run(&registry, OutputFormat::Text, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(text.lines().count(), registry.len());
        let warehouses = text.lines().find(|l| l.starts_with("warehouses")).unwrap();
        assert!(warehouses.contains("(full scan)"));
    }

    #[test]
    fn json_lists_names() {
        let registry = Registry::builtin();
        let mut out = Vec::new();
        run(&registry, OutputFormat::Json, &mut out).unwrap();
        let body: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(body.as_array().unwrap().len(), registry.len());
        assert_eq!(body[0]["name"], "categories");
    }
}
