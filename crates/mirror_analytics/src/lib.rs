//! # Catalog Mirror: Analytics
//!
//! Inventory KPIs computed from the local mirror.
//!
//! Purchases, sales and stock rows are read from a [`mirror_store::LocalStore`]
//! and turned into product facts. The facts feed the KPI formulas (lead
//! time, sales velocity, stock coverage, turnover, reorder point) and the
//! consolidated inventory report with its rankings and alerts.
//!
//! ## Product Identity
//!
//! Documents name products by SKU (`SKU-1/54`, base code plus size) or by
//! internal id. The [`ProductCatalog`] built from the mirrored `products`
//! and `categories` maps both onto one SKU, so facts of the same article
//! are grouped together and carry its name and category.
//!
//! ## Example
//!
//! ```rust
//! use mirror_analytics::{generate_inventory_report, ReportOptions};
//! use mirror_catalog::Registry;
//! use mirror_store::MemoryStore;
//!
//! let registry = Registry::builtin();
//! let store = MemoryStore::new();
//!
//! let report = generate_inventory_report(&store, &registry, &ReportOptions::new()).unwrap();
//! assert_eq!(report.summary.total_products, 0);
//! assert!(report.alerts.low_stock.is_empty());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod catalog;
mod error;
mod loaders;
mod metrics;
mod models;
mod report;
mod sku;

pub use catalog::{ProductCatalog, ProductEntry};
pub use error::{AnalyticsError, AnalyticsResult};
pub use loaders::{load_purchases, load_sales, load_stock_levels, DEFAULT_SCAN_LIMIT};
pub use metrics::{
    average_lead_time, duration_in_days, inventory_turnover, mean_inventory, reorder_point,
    sales_velocity, stock_coverage,
};
pub use models::{ProductFact, Purchase, Sale, StockLevel};
pub use report::{
    generate_inventory_report, generate_product_kpis, Alerts, Highlight, InventoryReport,
    ProductRef, ProductReport, Rankings, ReportOptions, ReportSummary, SafetyStock,
};
pub use sku::{format_variant_label, split_sku_and_size};
