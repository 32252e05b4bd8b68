//! Sync command implementation.

use super::{open_store, write_json, ApiArgs, OutputFormat};
use crate::error::CliResult;
use chrono::{DateTime, Utc};
use mirror_catalog::{parse_timestamp, Registry};
use mirror_sync_engine::{
    HttpSource, RunSummary, SyncContext, SyncOptions, SyncRunner,
};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Parses a `--since` value in any accepted timestamp format.
pub fn parse_since(value: &str) -> Result<DateTime<Utc>, String> {
    parse_timestamp(value).ok_or_else(|| format!("unrecognized timestamp: {value}"))
}

/// Validates the run options against the registry.
///
/// Unknown resources are rejected here, before the store or the remote
/// are touched.
pub fn build_options(
    registry: &Registry,
    resources: Vec<String>,
    since: Option<DateTime<Utc>>,
    full_refresh: bool,
) -> CliResult<SyncOptions> {
    registry.list_resources(&resources)?;
    let mut options = SyncOptions::all()
        .with_resources(resources)
        .with_full_refresh(full_refresh);
    if let Some(since) = since {
        options = options.with_since(since);
    }
    Ok(options)
}

/// Runs the sync command against the HTTP source and the SQLite store.
///
/// Returns whether the run fully succeeded.
pub fn run(
    db_path: &Path,
    api: &ApiArgs,
    options: SyncOptions,
    format: OutputFormat,
    out: &mut dyn Write,
) -> CliResult<bool> {
    let registry = Arc::new(Registry::builtin());
    registry.list_resources(&options.resources)?;
    let config = api.sync_config()?;
    let remote = HttpSource::new(&api.http_config())?;
    let store = open_store(db_path, &registry)?;

    let ctx = SyncContext::new(registry, Arc::new(remote), Arc::new(store), config);
    execute(&ctx, options, format, out)
}

/// Runs one sync on `ctx` and reports the summary.
pub fn execute(
    ctx: &SyncContext,
    options: SyncOptions,
    format: OutputFormat,
    out: &mut dyn Write,
) -> CliResult<bool> {
    let summary = SyncRunner::new().run(ctx, options)?;
    info!(
        run_id = %summary.run_id,
        records = summary.total_records(),
        failed = summary.failed_count(),
        "sync finished"
    );
    report(&summary, format, out)?;
    Ok(summary.is_success())
}

fn report(summary: &RunSummary, format: OutputFormat, out: &mut dyn Write) -> CliResult<()> {
    match format {
        OutputFormat::Json => write_json(out, summary),
        OutputFormat::Text => {
            writeln!(out, "{summary}")?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CliError, EXIT_CONFIG};
    use mirror_catalog::ResourceDefinition;
    use mirror_store::MemoryStore;
    use mirror_sync_engine::{MockRemote, RetryConfig, SyncConfig};
    use serde_json::{json, Value};

    fn context(remote: Arc<MockRemote>) -> SyncContext {
        let registry = Registry::new(vec![
            ResourceDefinition::new("products", "producto/"),
            ResourceDefinition::new("brands", "marca/"),
        ])
        .unwrap();
        SyncContext::new(
            Arc::new(registry),
            remote,
            Arc::new(MemoryStore::new()),
            SyncConfig::new().with_retry(RetryConfig::immediate(2)),
        )
    }

    #[test]
    fn parses_since_formats() {
        assert!(parse_since("2024-03-01T08:00:00Z").is_ok());
        assert!(parse_since("2024-03-01").is_ok());
        assert!(parse_since("01/03/2024").is_ok());
        assert!(parse_since("last tuesday").is_err());
    }

    #[test]
    fn unknown_resource_is_a_config_error() {
        let err = build_options(&Registry::builtin(), vec!["nope".into()], None, false)
            .unwrap_err();
        assert!(matches!(err, CliError::Catalog(_)));
        assert_eq!(err.exit_code(), EXIT_CONFIG);
    }

    #[test]
    fn text_report_of_clean_run() {
        let remote = Arc::new(MockRemote::new());
        remote.set_documents("producto/", vec![json!({"id": 1}), json!({"id": 2})]);

        let mut out = Vec::new();
        let ok = execute(&context(remote), SyncOptions::all(), OutputFormat::Text, &mut out)
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(ok);
        assert!(text.contains("products"));
        assert!(text.contains("Result: ok (2 records, 0 failed)"));
    }

    #[test]
    fn json_report_of_failed_resource() {
        let remote = Arc::new(MockRemote::new());
        remote.set_documents("producto/", vec![json!({"id": 1})]);
        remote.fail_with_status("marca/", 503);

        let mut out = Vec::new();
        let ok = execute(&context(remote), SyncOptions::all(), OutputFormat::Json, &mut out)
            .unwrap();
        assert!(!ok);

        let body: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(body["resources"][0]["status"], "success");
        assert_eq!(body["resources"][1]["status"], "failed");
        assert_eq!(body["resources"][1]["error"]["kind"], "fetch");
    }

    #[test]
    fn missing_credentials_are_a_config_error() {
        let api = ApiArgs {
            api_key: String::new(),
            api_token: "token".into(),
            base_url: "http://localhost:1".into(),
            page_size: 10,
            batch_size: 10,
        };
        let dir = tempfile::tempdir().unwrap();
        let mut out = Vec::new();
        let err = run(
            &dir.path().join("inventory.db"),
            &api,
            SyncOptions::all(),
            OutputFormat::Text,
            &mut out,
        )
        .unwrap_err();
        assert_eq!(err.exit_code(), EXIT_CONFIG);
        assert!(!dir.path().join("inventory.db").exists());
    }
}
