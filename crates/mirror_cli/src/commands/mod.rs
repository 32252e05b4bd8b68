//! CLI command implementations.

pub mod analytics;
pub mod overview;
pub mod resources;
pub mod search;
pub mod serve;
pub mod sync;

use crate::error::CliResult;
use clap::{Args, ValueEnum};
use mirror_catalog::Registry;
use mirror_store::SqliteStore;
use mirror_sync_engine::{
    HttpSourceConfig, SyncConfig, DEFAULT_BASE_URL, DEFAULT_BATCH_SIZE, DEFAULT_PAGE_SIZE,
};
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// Output format of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human readable text.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

/// Connection and sizing settings of the upstream API.
#[derive(Debug, Clone, Args)]
pub struct ApiArgs {
    /// API key sent as the Authorization header
    #[arg(long, env = "CONTIFICO_API_KEY", hide_env_values = true, default_value = "")]
    pub api_key: String,

    /// API token sent as the X-Api-Token header
    #[arg(long, env = "CONTIFICO_API_TOKEN", hide_env_values = true, default_value = "")]
    pub api_token: String,

    /// Base URL of the upstream API
    #[arg(long, env = "CONTIFICO_API_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Documents requested per page
    #[arg(long, env = "CONTIFICO_PAGE_SIZE", default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: u32,

    /// Records written per transaction
    #[arg(long, env = "SYNC_BATCH_SIZE", default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,
}

impl ApiArgs {
    /// HTTP source settings; credentials are checked when the source is built.
    pub fn http_config(&self) -> HttpSourceConfig {
        HttpSourceConfig::new(&self.api_key, &self.api_token).with_base_url(&self.base_url)
    }

    /// Engine settings.
    ///
    /// # Errors
    ///
    /// Returns `Config` for a zero page or batch size.
    pub fn sync_config(&self) -> CliResult<SyncConfig> {
        let config = SyncConfig::new()
            .with_page_size(self.page_size)
            .with_batch_size(self.batch_size);
        config.validate()?;
        Ok(config)
    }
}

/// Opens the SQLite mirror, creating it when missing.
pub fn open_store(path: &Path, registry: &Registry) -> CliResult<SqliteStore> {
    debug!(path = %path.display(), "opening store");
    Ok(SqliteStore::open(path, registry)?)
}

/// Writes `value` as pretty JSON followed by a newline.
pub fn write_json<T: Serialize>(out: &mut dyn Write, value: &T) -> CliResult<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}
