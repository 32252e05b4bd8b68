//! Serve command implementation.

use super::{open_store, ApiArgs};
use crate::error::CliResult;
use mirror_catalog::Registry;
use mirror_sync_engine::{HttpSource, RemoteSource, SyncResult};
use mirror_sync_server::{MirrorServer, ServerConfig, SourceFactory};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Serves the HTTP panel until Ctrl-C.
///
/// Missing credentials do not prevent the panel from starting; sync
/// triggers then fail with a configuration error.
pub fn run(db_path: &Path, api: &ApiArgs, bind_addr: SocketAddr) -> CliResult<()> {
    let registry = Arc::new(Registry::builtin());
    let sync_config = api.sync_config()?;
    let store = open_store(db_path, &registry)?;

    let http_config = api.http_config();
    if let Err(err) = http_config.validate() {
        warn!("sync triggers will fail: {err}");
    }
    let source: SourceFactory = Arc::new(move || -> SyncResult<Arc<dyn RemoteSource>> {
        Ok(Arc::new(HttpSource::new(&http_config)?))
    });

    let server = MirrorServer::new(
        ServerConfig::new(bind_addr),
        registry,
        Arc::new(store),
        sync_config,
        source,
    );

    info!(db = %db_path.display(), "starting panel");
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(server.serve())?;
    Ok(())
}
