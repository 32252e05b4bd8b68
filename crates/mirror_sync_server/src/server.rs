//! Router assembly and the listening loop.

use crate::config::ServerConfig;
use crate::error::ServerResult;
use crate::handler::{self, HandlerContext, SourceFactory};
use axum::routing::{get, post};
use axum::Router;
use mirror_catalog::Registry;
use mirror_store::LocalStore;
use mirror_sync_engine::{SyncConfig, SyncRunner};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// The HTTP panel.
///
/// Serves read-only views of the local store and lets operators trigger,
/// observe and cancel sync runs. At most one run is active at a time.
///
/// # Example
///
/// ```no_run
/// use mirror_catalog::Registry;
/// use mirror_store::MemoryStore;
/// use mirror_sync_engine::{MockRemote, RemoteSource, SyncConfig, SyncResult};
/// use mirror_sync_server::{MirrorServer, ServerConfig, SourceFactory};
/// use std::sync::Arc;
///
/// # async fn run() -> mirror_sync_server::ServerResult<()> {
/// let source: SourceFactory =
///     Arc::new(|| -> SyncResult<Arc<dyn RemoteSource>> { Ok(Arc::new(MockRemote::new())) });
/// let server = MirrorServer::new(
///     ServerConfig::default(),
///     Arc::new(Registry::builtin()),
///     Arc::new(MemoryStore::new()),
///     SyncConfig::new(),
///     source,
/// );
/// server.serve().await
/// # }
/// ```
pub struct MirrorServer {
    context: Arc<HandlerContext>,
}

impl MirrorServer {
    /// Creates a server.
    pub fn new(
        config: ServerConfig,
        registry: Arc<Registry>,
        store: Arc<dyn LocalStore>,
        sync_config: SyncConfig,
        source: SourceFactory,
    ) -> Self {
        let context = HandlerContext::new(config, registry, store, sync_config, source);
        Self {
            context: Arc::new(context),
        }
    }

    /// The runner shared by every request.
    pub fn runner(&self) -> &SyncRunner {
        &self.context.runner
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.context.config
    }

    /// Builds the router.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(handler::health))
            .route("/api/resources", get(handler::list_resources))
            .route("/api/overview", get(handler::overview))
            .route("/api/resource/{slug}", get(handler::search_resource))
            .route("/api/resource/{slug}/item/{id}", get(handler::get_item))
            .route("/api/analytics/report", get(handler::analytics_report))
            .route("/api/analytics/product/{id}", get(handler::analytics_product))
            .route("/api/sync", post(handler::trigger_sync))
            .route("/api/sync/status", get(handler::sync_status))
            .route("/api/sync/cancel", post(handler::cancel_sync))
            .with_state(Arc::clone(&self.context))
    }

    /// Binds the configured address and serves until Ctrl-C.
    ///
    /// An active run is cancelled on shutdown; its committed batches stay.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the address cannot be bound.
    pub async fn serve(self) -> ServerResult<()> {
        let listener = TcpListener::bind(self.context.config.bind_addr).await?;
        info!(addr = %listener.local_addr()?, "panel listening");

        let runner = self.context.runner.clone();
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!("failed to install Ctrl-C handler: {e}");
                    std::future::pending::<()>().await;
                }
                if runner.cancel() {
                    info!("cancelled active run on shutdown");
                }
                info!("shutting down");
            })
            .await?;
        Ok(())
    }
}
