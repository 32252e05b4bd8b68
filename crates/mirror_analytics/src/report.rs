//! Per-product KPIs and the consolidated inventory report.

use crate::catalog::{ProductCatalog, ProductEntry};
use crate::error::AnalyticsResult;
use crate::loaders::{load_purchases, load_sales, load_stock_levels, DEFAULT_SCAN_LIMIT};
use crate::metrics::{
    average_lead_time, duration_in_days, inventory_turnover, mean_inventory, reorder_point,
    sales_velocity, stock_coverage,
};
use crate::models::{ProductFact, Purchase, Sale, StockLevel};
use crate::sku::{format_variant_label, split_sku_and_size};
use chrono::{DateTime, Utc};
use mirror_catalog::Registry;
use mirror_store::LocalStore;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

/// Safety stock added to reorder points.
#[derive(Debug, Clone, PartialEq)]
pub enum SafetyStock {
    /// The same amount for every product.
    Uniform(f64),
    /// Amounts keyed by SKU or internal id; unlisted products get zero.
    PerProduct(HashMap<String, f64>),
}

impl Default for SafetyStock {
    fn default() -> Self {
        SafetyStock::Uniform(0.0)
    }
}

impl SafetyStock {
    /// Safety stock of a product, never negative.
    ///
    /// Per-product amounts are looked up by SKU first, then by each
    /// internal id in order.
    pub fn resolve(&self, sku: &str, internal_ids: &[String]) -> f64 {
        let value = match self {
            SafetyStock::Uniform(value) => *value,
            SafetyStock::PerProduct(amounts) => std::iter::once(sku)
                .chain(internal_ids.iter().map(String::as_str))
                .filter(|key| !key.is_empty())
                .find_map(|key| amounts.get(key).copied())
                .unwrap_or(0.0),
        };
        value.max(0.0)
    }
}

/// Knobs of the KPI computations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportOptions {
    /// Fixed window for sales velocity; `None` uses the observed span.
    pub velocity_period_days: Option<u32>,
    /// Fixed window for turnover; `None` uses the observed span.
    pub turnover_period_days: Option<u32>,
    /// Safety stock for reorder points.
    #[serde(skip)]
    pub safety_stock: SafetyStock,
    /// Coverage at or below which stock is low.
    pub low_stock_threshold_days: f64,
    /// Coverage at or above which stock is excessive.
    pub excess_stock_threshold_days: f64,
    /// Length of each ranking.
    pub top_n: usize,
    /// Documents read per resource.
    pub limit: usize,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            velocity_period_days: None,
            turnover_period_days: None,
            safety_stock: SafetyStock::default(),
            low_stock_threshold_days: 7.0,
            excess_stock_threshold_days: 60.0,
            top_n: 5,
            limit: DEFAULT_SCAN_LIMIT,
        }
    }
}

impl ReportOptions {
    /// Creates the default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the sales velocity window.
    pub fn with_velocity_period(mut self, days: Option<u32>) -> Self {
        self.velocity_period_days = days;
        self
    }

    /// Sets the turnover window.
    pub fn with_turnover_period(mut self, days: Option<u32>) -> Self {
        self.turnover_period_days = days;
        self
    }

    /// Sets the safety stock.
    pub fn with_safety_stock(mut self, safety_stock: SafetyStock) -> Self {
        self.safety_stock = safety_stock;
        self
    }

    /// Sets the low stock threshold.
    pub fn with_low_stock_threshold(mut self, days: f64) -> Self {
        self.low_stock_threshold_days = days;
        self
    }

    /// Sets the excess stock threshold.
    pub fn with_excess_stock_threshold(mut self, days: f64) -> Self {
        self.excess_stock_threshold_days = days;
        self
    }

    /// Sets the ranking length.
    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    /// Sets the per-resource read limit.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// Identity of a product in reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductRef {
    /// SKU the product is grouped under.
    pub product_id: String,
    /// SKU without size.
    pub product_code: String,
    /// Size suffix.
    pub variant_size: Option<String>,
    /// Human label.
    pub product_label: String,
    /// Catalog name.
    pub product_name: Option<String>,
    /// Catalog category id.
    pub category_id: Option<String>,
    /// Catalog category name.
    pub category_name: Option<String>,
    /// Internal ids that referenced this product, sorted.
    pub product_internal_ids: Vec<String>,
}

/// KPIs of one product.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductReport {
    /// Product identity.
    #[serde(flatten)]
    pub product: ProductRef,
    /// Mean order-to-receipt time in days.
    pub average_lead_time_days: Option<f64>,
    /// Units sold per day.
    pub sales_velocity_per_day: Option<f64>,
    /// Days of stock at the current velocity.
    pub stock_coverage_days: Option<f64>,
    /// Annualised turnover.
    pub inventory_turnover: Option<f64>,
    /// Stock level that should trigger a new order.
    pub reorder_point: Option<f64>,
    /// Units purchased.
    pub total_purchased_units: f64,
    /// Units sold.
    pub total_sold_units: f64,
    /// Units on hand across stock rows.
    pub current_stock_units: f64,
    /// Mean units per stock row.
    pub average_inventory_units: f64,
    /// Purchase lines, relabelled with the product SKU.
    pub purchases: Vec<Purchase>,
    /// Sale lines, relabelled with the product SKU.
    pub sales: Vec<Sale>,
    /// Stock rows, relabelled with the product SKU.
    pub stock_levels: Vec<StockLevel>,
}

/// A product in a ranking or alert, with the metrics that put it there.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Highlight {
    /// Product identity.
    #[serde(flatten)]
    pub product: ProductRef,
    /// Metric values by name.
    #[serde(flatten)]
    pub metrics: BTreeMap<&'static str, Option<f64>>,
}

/// Rankings of the inventory report, each at most `top_n` long.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rankings {
    /// Most units sold.
    pub top_selling_products: Vec<Highlight>,
    /// Most units on hand.
    pub top_stock_levels: Vec<Highlight>,
    /// Slowest suppliers.
    pub longest_lead_times: Vec<Highlight>,
    /// Highest turnover.
    pub fastest_turnover: Vec<Highlight>,
}

/// Products needing attention.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alerts {
    /// Coverage at or below the low threshold, shortest first.
    pub low_stock: Vec<Highlight>,
    /// Stock below the reorder point.
    pub reorder_recommended: Vec<Highlight>,
    /// Stock on hand but nothing sold.
    pub no_sales: Vec<Highlight>,
    /// Stock on hand but nothing purchased.
    pub no_purchases: Vec<Highlight>,
    /// Coverage at or above the excess threshold, longest first.
    pub excess_stock: Vec<Highlight>,
    /// Stock on hand with no sales velocity.
    pub stagnant_stock: Vec<Highlight>,
}

/// Totals and whole-inventory KPIs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummary {
    /// Generation time.
    pub generated_at: DateTime<Utc>,
    /// Products in the report.
    pub total_products: usize,
    /// Units purchased.
    pub total_purchased_units: f64,
    /// Units sold.
    pub total_sold_units: f64,
    /// Units on hand.
    pub total_stock_units: f64,
    /// Mean lead time over every purchase, in days.
    pub average_lead_time_days: Option<f64>,
    /// Units sold per day over every sale.
    pub overall_sales_velocity_per_day: Option<f64>,
    /// Days of stock at the overall velocity.
    pub overall_stock_coverage_days: Option<f64>,
    /// Annualised turnover of the whole inventory.
    pub overall_inventory_turnover: Option<f64>,
}

/// The consolidated inventory report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InventoryReport {
    /// Totals.
    pub summary: ReportSummary,
    /// Per-product KPIs, ordered by SKU.
    pub products: Vec<ProductReport>,
    /// Rankings.
    pub rankings: Rankings,
    /// Alerts.
    pub alerts: Alerts,
    /// Options the report was computed with.
    pub metadata: ReportOptions,
}

fn relabel<F: ProductFact + Clone>(facts: &[F], sku: &str) -> Vec<F> {
    facts
        .iter()
        .cloned()
        .map(|mut fact| {
            fact.set_product_id(sku);
            fact
        })
        .collect()
}

struct ProductFacts<'a> {
    sku: &'a str,
    entry: Option<&'a ProductEntry>,
    internal_ids: &'a [String],
    purchases: &'a [Purchase],
    sales: &'a [Sale],
    stock_levels: &'a [StockLevel],
}

fn build_product_report(facts: ProductFacts<'_>, options: &ReportOptions, safety_stock: f64) -> ProductReport {
    let lead = average_lead_time(facts.purchases);
    let velocity = sales_velocity(facts.sales, options.velocity_period_days);
    let coverage = stock_coverage(facts.stock_levels, velocity);
    let average_inventory = mean_inventory(facts.stock_levels);
    let turnover = inventory_turnover(facts.sales, average_inventory, options.turnover_period_days);
    let lead_days = lead.map(duration_in_days);
    let reorder = match (lead_days, velocity) {
        (Some(days), Some(velocity)) => reorder_point(velocity, days, safety_stock).ok(),
        _ => None,
    };

    let sku = facts.sku.trim();
    let sku = if sku.is_empty() {
        facts
            .entry
            .map(|e| e.code.as_str())
            .filter(|c| !c.is_empty())
            .or_else(|| facts.internal_ids.first().map(String::as_str))
            .unwrap_or_default()
    } else {
        sku
    };
    let (product_code, variant_size) = split_sku_and_size(sku);

    let mut internal_ids: BTreeSet<String> = facts
        .internal_ids
        .iter()
        .filter(|id| !id.is_empty())
        .cloned()
        .collect();
    if let Some(id) = facts.entry.and_then(|e| e.internal_id.clone()) {
        internal_ids.insert(id);
    }
    if internal_ids.is_empty() && !sku.is_empty() {
        internal_ids.insert(sku.to_string());
    }

    ProductReport {
        product: ProductRef {
            product_id: sku.to_string(),
            product_code,
            variant_size,
            product_label: format_variant_label(sku),
            product_name: facts.entry.and_then(|e| e.name.clone()),
            category_id: facts.entry.and_then(|e| e.category_id.clone()),
            category_name: facts.entry.and_then(|e| e.category_name.clone()),
            product_internal_ids: internal_ids.into_iter().collect(),
        },
        average_lead_time_days: lead_days,
        sales_velocity_per_day: velocity,
        stock_coverage_days: coverage,
        inventory_turnover: turnover,
        reorder_point: reorder,
        total_purchased_units: facts.purchases.iter().map(|p| p.quantity).sum(),
        total_sold_units: facts.sales.iter().map(|s| s.quantity).sum(),
        current_stock_units: facts.stock_levels.iter().map(|l| l.quantity).sum(),
        average_inventory_units: average_inventory,
        purchases: relabel(facts.purchases, sku),
        sales: relabel(facts.sales, sku),
        stock_levels: relabel(facts.stock_levels, sku),
    }
}

fn source_ids<'a>(facts: impl Iterator<Item = &'a dyn ProductFact>) -> BTreeSet<String> {
    facts
        .filter_map(|fact| fact.source_product_id().map(str::to_string))
        .collect()
}

fn all_facts<'a>(
    purchases: &'a [Purchase],
    sales: &'a [Sale],
    stock_levels: &'a [StockLevel],
) -> impl Iterator<Item = &'a dyn ProductFact> {
    purchases
        .iter()
        .map(|p| p as &dyn ProductFact)
        .chain(sales.iter().map(|s| s as &dyn ProductFact))
        .chain(stock_levels.iter().map(|l| l as &dyn ProductFact))
}

/// KPIs of one product.
///
/// `product` may be a SKU, a base code (every size of the style) or an
/// internal id. A product without any mirrored fact yields a report with
/// zero totals and no metrics.
///
/// # Errors
///
/// Returns an error if the mirror cannot be read.
pub fn generate_product_kpis(
    store: &dyn LocalStore,
    registry: &Registry,
    product: &str,
    options: &ReportOptions,
) -> AnalyticsResult<ProductReport> {
    let product = product.trim();
    let catalog = ProductCatalog::load(store, registry, options.limit)?;
    let purchases = load_purchases(store, registry, Some(product), options.limit)?;
    let sales = load_sales(store, registry, Some(product), options.limit)?;
    let stock_levels = load_stock_levels(store, registry, Some(product), options.limit)?;

    let (sku, entry) = all_facts(&purchases, &sales, &stock_levels)
        .map(|fact| catalog.resolve(Some(fact.product_id()), fact.source_product_id()))
        .find(|(key, _)| !key.is_empty())
        .unwrap_or_else(|| catalog.resolve(Some(product), None));
    let sku = if sku.is_empty() { product.to_string() } else { sku };

    let internal_ids: Vec<String> = source_ids(all_facts(&purchases, &sales, &stock_levels))
        .into_iter()
        .collect();
    let safety_stock = options.safety_stock.resolve(&sku, &internal_ids);
    debug!(product, sku = %sku, purchases = purchases.len(), sales = sales.len(), "product kpis");

    Ok(build_product_report(
        ProductFacts {
            sku: &sku,
            entry,
            internal_ids: &internal_ids,
            purchases: &purchases,
            sales: &sales,
            stock_levels: &stock_levels,
        },
        options,
        safety_stock,
    ))
}

#[derive(Default)]
struct ProductGroup<'c> {
    purchases: Vec<Purchase>,
    sales: Vec<Sale>,
    stock_levels: Vec<StockLevel>,
    entry: Option<&'c ProductEntry>,
    seen: bool,
    internal_ids: BTreeSet<String>,
}

impl<'c> ProductGroup<'c> {
    fn register(&mut self, entry: Option<&'c ProductEntry>, source_id: Option<&str>) {
        if entry.is_some() || !self.seen {
            self.entry = entry;
        }
        self.seen = true;
        if let Some(id) = source_id {
            self.internal_ids.insert(id.to_string());
        }
        if let Some(id) = entry.and_then(|e| e.internal_id.as_ref()) {
            self.internal_ids.insert(id.clone());
        }
    }
}

/// Files each fact under the SKU its product resolves to.
fn group_facts<'c, F: ProductFact + Clone>(
    groups: &mut BTreeMap<String, ProductGroup<'c>>,
    catalog: &'c ProductCatalog,
    facts: &[F],
    bucket: for<'g> fn(&'g mut ProductGroup<'c>) -> &'g mut Vec<F>,
) {
    for fact in facts {
        let (key, entry) = catalog.resolve(Some(fact.product_id()), fact.source_product_id());
        if key.is_empty() {
            continue;
        }
        let group = groups.entry(key).or_default();
        group.register(entry, fact.source_product_id());
        bucket(group).push(fact.clone());
    }
}

fn highlight(report: &ProductReport, metrics: &[(&'static str, Option<f64>)]) -> Highlight {
    Highlight {
        product: report.product.clone(),
        metrics: metrics.iter().copied().collect(),
    }
}

/// Reports with a value for `metric`, highest first, at most `top_n`.
fn top_by<'r>(
    reports: &'r [ProductReport],
    metric: impl Fn(&ProductReport) -> Option<f64>,
    top_n: usize,
) -> Vec<&'r ProductReport> {
    let mut ranked: Vec<(&ProductReport, f64)> =
        reports.iter().filter_map(|r| metric(r).map(|v| (r, v))).collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked.into_iter().take(top_n).map(|(r, _)| r).collect()
}

fn rankings(products: &[ProductReport], top_n: usize) -> Rankings {
    Rankings {
        top_selling_products: top_by(products, |r| Some(r.total_sold_units), top_n)
            .into_iter()
            .map(|r| {
                highlight(
                    r,
                    &[
                        ("total_sold_units", Some(r.total_sold_units)),
                        ("sales_velocity_per_day", r.sales_velocity_per_day),
                    ],
                )
            })
            .collect(),
        top_stock_levels: top_by(products, |r| Some(r.current_stock_units), top_n)
            .into_iter()
            .map(|r| {
                highlight(
                    r,
                    &[
                        ("current_stock_units", Some(r.current_stock_units)),
                        ("stock_coverage_days", r.stock_coverage_days),
                    ],
                )
            })
            .collect(),
        longest_lead_times: top_by(products, |r| r.average_lead_time_days, top_n)
            .into_iter()
            .map(|r| highlight(r, &[("average_lead_time_days", r.average_lead_time_days)]))
            .collect(),
        fastest_turnover: top_by(products, |r| r.inventory_turnover, top_n)
            .into_iter()
            .map(|r| highlight(r, &[("inventory_turnover", r.inventory_turnover)]))
            .collect(),
    }
}

fn alerts(products: &[ProductReport], options: &ReportOptions) -> Alerts {
    let stock_and_coverage = |r: &ProductReport| {
        highlight(
            r,
            &[
                ("stock_coverage_days", r.stock_coverage_days),
                ("current_stock_units", Some(r.current_stock_units)),
            ],
        )
    };
    let stock_only =
        |r: &ProductReport| highlight(r, &[("current_stock_units", Some(r.current_stock_units))]);

    let mut low: Vec<&ProductReport> = products
        .iter()
        .filter(|r| r.stock_coverage_days.is_some_and(|c| c <= options.low_stock_threshold_days))
        .collect();
    low.sort_by(|a, b| {
        a.stock_coverage_days
            .unwrap_or_default()
            .total_cmp(&b.stock_coverage_days.unwrap_or_default())
    });

    let mut excess: Vec<&ProductReport> = products
        .iter()
        .filter(|r| r.stock_coverage_days.is_some_and(|c| c >= options.excess_stock_threshold_days))
        .collect();
    excess.sort_by(|a, b| {
        b.stock_coverage_days
            .unwrap_or_default()
            .total_cmp(&a.stock_coverage_days.unwrap_or_default())
    });

    Alerts {
        low_stock: low.into_iter().map(stock_and_coverage).collect(),
        reorder_recommended: products
            .iter()
            .filter(|r| r.reorder_point.is_some_and(|rop| r.current_stock_units < rop))
            .map(|r| {
                highlight(
                    r,
                    &[
                        ("reorder_point", r.reorder_point),
                        ("current_stock_units", Some(r.current_stock_units)),
                    ],
                )
            })
            .collect(),
        no_sales: products
            .iter()
            .filter(|r| r.total_sold_units == 0.0 && r.current_stock_units > 0.0)
            .map(stock_only)
            .collect(),
        no_purchases: products
            .iter()
            .filter(|r| r.total_purchased_units == 0.0 && r.current_stock_units > 0.0)
            .map(stock_only)
            .collect(),
        excess_stock: excess.into_iter().map(stock_and_coverage).collect(),
        stagnant_stock: products
            .iter()
            .filter(|r| {
                r.sales_velocity_per_day.is_none_or(|v| v == 0.0) && r.current_stock_units > 0.0
            })
            .map(stock_only)
            .collect(),
    }
}

/// The consolidated inventory report.
///
/// Facts are grouped per product through the catalog, so a SKU and the
/// internal id it belongs to land in the same group.
///
/// # Errors
///
/// Returns an error if the mirror cannot be read.
pub fn generate_inventory_report(
    store: &dyn LocalStore,
    registry: &Registry,
    options: &ReportOptions,
) -> AnalyticsResult<InventoryReport> {
    let catalog = ProductCatalog::load(store, registry, options.limit)?;
    let purchases = load_purchases(store, registry, None, options.limit)?;
    let sales = load_sales(store, registry, None, options.limit)?;
    let stock_levels = load_stock_levels(store, registry, None, options.limit)?;

    let mut groups: BTreeMap<String, ProductGroup<'_>> = BTreeMap::new();
    group_facts(&mut groups, &catalog, &purchases, |g| &mut g.purchases);
    group_facts(&mut groups, &catalog, &sales, |g| &mut g.sales);
    group_facts(&mut groups, &catalog, &stock_levels, |g| &mut g.stock_levels);

    let products: Vec<ProductReport> = groups
        .iter()
        .map(|(sku, group)| {
            let entry = group.entry.or_else(|| catalog.resolve(Some(sku.as_str()), None).1);
            let internal_ids: Vec<String> = group.internal_ids.iter().cloned().collect();
            let safety_stock = options.safety_stock.resolve(sku, &internal_ids);
            build_product_report(
                ProductFacts {
                    sku,
                    entry,
                    internal_ids: &internal_ids,
                    purchases: &group.purchases,
                    sales: &group.sales,
                    stock_levels: &group.stock_levels,
                },
                options,
                safety_stock,
            )
        })
        .collect();

    let overall_velocity = sales_velocity(&sales, options.velocity_period_days);
    let summary = ReportSummary {
        generated_at: Utc::now(),
        total_products: products.len(),
        total_purchased_units: products.iter().map(|r| r.total_purchased_units).sum(),
        total_sold_units: products.iter().map(|r| r.total_sold_units).sum(),
        total_stock_units: products.iter().map(|r| r.current_stock_units).sum(),
        average_lead_time_days: average_lead_time(&purchases).map(duration_in_days),
        overall_sales_velocity_per_day: overall_velocity,
        overall_stock_coverage_days: stock_coverage(&stock_levels, overall_velocity),
        overall_inventory_turnover: inventory_turnover(
            &sales,
            mean_inventory(&stock_levels),
            options.turnover_period_days,
        ),
    };
    debug!(products = summary.total_products, "inventory report");

    Ok(InventoryReport {
        summary,
        rankings: rankings(&products, options.top_n),
        alerts: alerts(&products, options),
        products,
        metadata: options.clone(),
    })
}
