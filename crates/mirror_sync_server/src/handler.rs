//! Request handlers for the panel and sync endpoints.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use mirror_analytics::{
    generate_inventory_report, generate_product_kpis, InventoryReport, ProductReport,
    ReportOptions, SafetyStock,
};
use mirror_catalog::{parse_timestamp, Registry, ResourceDefinition};
use mirror_store::{clamp_search_limit, LocalStore, StoredRecord};
use mirror_sync_engine::{
    RemoteSource, RunGuard, RunSummary, SyncConfig, SyncContext, SyncOptions, SyncResult,
    SyncRunner,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

/// Builds the remote source for one run.
///
/// Called on a blocking worker thread, so it may create blocking clients.
pub type SourceFactory = Arc<dyn Fn() -> SyncResult<Arc<dyn RemoteSource>> + Send + Sync>;

/// Shared state of every handler.
pub struct HandlerContext {
    /// Server configuration.
    pub config: ServerConfig,
    /// Resource registry.
    pub registry: Arc<Registry>,
    /// Local store, read by the panel and written by runs.
    pub store: Arc<dyn LocalStore>,
    /// Default sync settings.
    pub sync_config: SyncConfig,
    /// Single-flight runner.
    pub runner: SyncRunner,
    source: SourceFactory,
}

impl HandlerContext {
    /// Creates a handler context.
    pub fn new(
        config: ServerConfig,
        registry: Arc<Registry>,
        store: Arc<dyn LocalStore>,
        sync_config: SyncConfig,
        source: SourceFactory,
    ) -> Self {
        Self {
            config,
            registry,
            store,
            sync_config,
            runner: SyncRunner::new(),
            source,
        }
    }

    fn resource(&self, slug: &str) -> ServerResult<&ResourceDefinition> {
        self.registry
            .get(slug)
            .ok_or_else(|| ServerError::NotFound(format!("unknown resource: {slug}")))
    }

    /// Runs a claimed sync on the calling (blocking) thread.
    fn execute(&self, guard: RunGuard) -> SyncResult<RunSummary> {
        let remote = match (self.source)() {
            Ok(remote) => remote,
            Err(err) => return Err(guard.fail(err)),
        };
        let ctx = SyncContext::new(
            Arc::clone(&self.registry),
            remote,
            Arc::clone(&self.store),
            self.sync_config.clone(),
        );
        guard.run(&ctx)
    }
}

type AppState = State<Arc<HandlerContext>>;

async fn blocking<T, F>(f: F) -> ServerResult<T>
where
    F: FnOnce() -> ServerResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ServerError::Internal(format!("worker failed: {e}")))?
}

/// `GET /health`
pub async fn health(State(ctx): AppState) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "running": ctx.runner.is_running(),
    }))
}

/// `GET /api/resources`
pub async fn list_resources(State(ctx): AppState) -> Json<Vec<ResourceDefinition>> {
    Json(ctx.registry.iter().cloned().collect())
}

/// `GET /api/overview`
pub async fn overview(State(ctx): AppState) -> ServerResult<Response> {
    let overview = blocking(move || Ok(ctx.store.overview(&ctx.registry)?)).await?;
    Ok(Json(overview).into_response())
}

/// Query of a resource listing.
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    /// Id or payload fragment.
    pub q: Option<String>,
    /// Maximum rows.
    pub limit: Option<String>,
}

/// Body of a resource listing.
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    /// Resource name.
    pub resource: String,
    /// Resource label.
    pub label: String,
    /// Query used, if any.
    pub query: Option<String>,
    /// Effective limit.
    pub limit: usize,
    /// Matching rows.
    pub records: Vec<StoredRecord>,
}

/// `GET /api/resource/{slug}?q=&limit=`
pub async fn search_resource(
    State(ctx): AppState,
    Path(slug): Path<String>,
    Query(params): Query<SearchParams>,
) -> ServerResult<Json<SearchResponse>> {
    let definition = ctx.resource(&slug)?.clone();
    let limit = match params.limit.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => ctx.config.default_search_limit,
        Some(raw) => clamp_search_limit(
            raw.parse::<usize>()
                .map_err(|_| ServerError::InvalidRequest(format!("invalid limit: {raw}")))?,
        ),
    };
    let query = params
        .q
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty());

    let search_query = query.clone();
    let search_def = definition.clone();
    let records = blocking(move || {
        Ok(ctx
            .store
            .search(&search_def, search_query.as_deref(), limit)?)
    })
    .await?;

    Ok(Json(SearchResponse {
        resource: definition.name.to_string(),
        label: definition.label.to_string(),
        query,
        limit,
        records,
    }))
}

/// `GET /api/resource/{slug}/item/{id}`
pub async fn get_item(
    State(ctx): AppState,
    Path((slug, id)): Path<(String, String)>,
) -> ServerResult<Json<StoredRecord>> {
    let definition = ctx.resource(&slug)?.clone();
    let lookup = id.clone();
    let record = blocking(move || Ok(ctx.store.get_record(&definition, &lookup)?)).await?;
    record
        .map(Json)
        .ok_or_else(|| ServerError::NotFound(format!("record {id} not found in {slug}")))
}

/// Query of a sync trigger.
#[derive(Debug, Default, Deserialize)]
pub struct SyncParams {
    /// Comma-separated resource names; empty means all.
    pub resources: Option<String>,
    /// Since override, any accepted timestamp format.
    pub since: Option<String>,
    /// Ignore watermarks.
    pub full_refresh: Option<String>,
    /// Page size override.
    pub page_size: Option<String>,
    /// Batch size override.
    pub batch_size: Option<String>,
    /// Wait for the run and return its summary.
    pub wait: Option<String>,
}

impl SyncParams {
    /// Validates the parameters into run options and the wait flag.
    pub fn into_options(self, registry: &Registry) -> ServerResult<(SyncOptions, bool)> {
        let mut options = SyncOptions::all();

        if let Some(raw) = self.resources {
            let names: Vec<String> = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            registry.list_resources(&names).map_err(|e| ServerError::InvalidRequest(e.to_string()))?;
            options = options.with_resources(names);
        }

        if let Some(raw) = non_blank(self.since) {
            let since = parse_timestamp(&raw)
                .ok_or_else(|| ServerError::InvalidRequest(format!("invalid since: {raw}")))?;
            options = options.with_since(since);
        }

        options = options.with_full_refresh(parse_flag("full_refresh", self.full_refresh)?);

        if let Some(raw) = non_blank(self.page_size) {
            options = options.with_page_size(positive("page_size", &raw)?);
        }
        if let Some(raw) = non_blank(self.batch_size) {
            options = options.with_batch_size(positive("batch_size", &raw)?);
        }

        let wait = parse_flag("wait", self.wait)?;
        Ok((options, wait))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_flag(name: &str, value: Option<String>) -> ServerResult<bool> {
    match non_blank(value).map(|v| v.to_ascii_lowercase()).as_deref() {
        None => Ok(false),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => Err(ServerError::InvalidRequest(format!("invalid {name}: {other}"))),
    }
}

fn positive<T>(name: &str, raw: &str) -> ServerResult<T>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    match raw.parse::<T>() {
        Ok(value) if value > T::default() => Ok(value),
        _ => Err(ServerError::InvalidRequest(format!(
            "{name} must be a positive integer, got {raw}"
        ))),
    }
}

fn non_negative(name: &str, raw: &str) -> ServerResult<f64> {
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => Ok(value),
        _ => Err(ServerError::InvalidRequest(format!(
            "{name} must be a non-negative number, got {raw}"
        ))),
    }
}

/// Query of the analytics endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct AnalyticsParams {
    /// Fixed sales velocity window in days.
    pub velocity_days: Option<String>,
    /// Fixed turnover window in days.
    pub turnover_days: Option<String>,
    /// Safety stock added to every reorder point.
    pub safety_stock: Option<String>,
    /// Low stock threshold in days of coverage.
    pub low_days: Option<String>,
    /// Excess stock threshold in days of coverage.
    pub excess_days: Option<String>,
    /// Entries per ranking.
    pub top: Option<String>,
    /// Documents read per resource.
    pub limit: Option<String>,
}

impl AnalyticsParams {
    /// Validates the parameters into report options.
    pub fn into_options(self) -> ServerResult<ReportOptions> {
        let mut options = ReportOptions::new();
        if let Some(raw) = non_blank(self.velocity_days) {
            options = options.with_velocity_period(Some(positive("velocity_days", &raw)?));
        }
        if let Some(raw) = non_blank(self.turnover_days) {
            options = options.with_turnover_period(Some(positive("turnover_days", &raw)?));
        }
        if let Some(raw) = non_blank(self.safety_stock) {
            options = options.with_safety_stock(SafetyStock::Uniform(non_negative("safety_stock", &raw)?));
        }
        if let Some(raw) = non_blank(self.low_days) {
            options = options.with_low_stock_threshold(non_negative("low_days", &raw)?);
        }
        if let Some(raw) = non_blank(self.excess_days) {
            options = options.with_excess_stock_threshold(non_negative("excess_days", &raw)?);
        }
        if let Some(raw) = non_blank(self.top) {
            options = options.with_top_n(positive("top", &raw)?);
        }
        if let Some(raw) = non_blank(self.limit) {
            options = options.with_limit(positive("limit", &raw)?);
        }
        Ok(options)
    }
}

/// `GET /api/analytics/report`
pub async fn analytics_report(
    State(ctx): AppState,
    Query(params): Query<AnalyticsParams>,
) -> ServerResult<Json<InventoryReport>> {
    let options = params.into_options()?;
    let report = blocking(move || {
        Ok(generate_inventory_report(ctx.store.as_ref(), &ctx.registry, &options)?)
    })
    .await?;
    Ok(Json(report))
}

/// `GET /api/analytics/product/{id}`
///
/// `id` may be a SKU, a base code or an internal id.
pub async fn analytics_product(
    State(ctx): AppState,
    Path(id): Path<String>,
    Query(params): Query<AnalyticsParams>,
) -> ServerResult<Json<ProductReport>> {
    let options = params.into_options()?;
    let product = id.trim().to_string();
    if product.is_empty() {
        return Err(ServerError::InvalidRequest("product id is blank".into()));
    }
    let report = blocking(move || {
        Ok(generate_product_kpis(ctx.store.as_ref(), &ctx.registry, &product, &options)?)
    })
    .await?;
    Ok(Json(report))
}

/// `POST /api/sync`
///
/// With `wait` the summary is returned once the run ends (200); otherwise
/// the run continues in the background and the accepted options are
/// returned (202). A concurrent trigger gets 409.
pub async fn trigger_sync(
    State(ctx): AppState,
    Query(params): Query<SyncParams>,
) -> ServerResult<Response> {
    let (options, wait) = params.into_options(&ctx.registry)?;
    let guard = ctx.runner.begin(options.clone())?;
    info!(resources = ?options.resources, full_refresh = options.full_refresh, wait, "sync triggered");

    if wait {
        let summary = blocking(move || Ok(ctx.execute(guard)?)).await?;
        return Ok((StatusCode::OK, Json(summary)).into_response());
    }

    tokio::task::spawn_blocking(move || {
        if let Err(err) = ctx.execute(guard) {
            error!(kind = err.kind(), "background sync failed: {err}");
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "status": "accepted",
            "options": options,
        })),
    )
        .into_response())
}

/// `GET /api/sync/status`
pub async fn sync_status(State(ctx): AppState) -> Response {
    Json(ctx.runner.status()).into_response()
}

/// `POST /api/sync/cancel`
pub async fn cancel_sync(State(ctx): AppState) -> Json<serde_json::Value> {
    Json(json!({ "cancelled": ctx.runner.cancel() }))
}
