//! Analytics command implementation.

use super::{write_json, OutputFormat};
use crate::error::{CliError, CliResult};
use clap::Args;
use mirror_analytics::{
    generate_inventory_report, generate_product_kpis, Highlight, InventoryReport, ProductReport,
    ReportOptions, SafetyStock, DEFAULT_SCAN_LIMIT,
};
use mirror_catalog::Registry;
use mirror_store::LocalStore;
use std::collections::HashMap;
use std::io::Write;

/// Knobs of the KPI computations.
#[derive(Debug, Clone, Args)]
pub struct ReportArgs {
    /// Fixed sales velocity window in days (default: observed span)
    #[arg(long, value_name = "DAYS")]
    pub velocity_days: Option<u32>,

    /// Fixed turnover window in days (default: observed span)
    #[arg(long, value_name = "DAYS")]
    pub turnover_days: Option<u32>,

    /// Safety stock added to every reorder point
    #[arg(long, default_value_t = 0.0)]
    pub safety_stock: f64,

    /// Safety stock of one product as SKU=UNITS; repeat for several
    #[arg(long = "safety-stock-for", value_name = "SKU=UNITS", value_parser = parse_safety_entry)]
    pub safety_stock_for: Vec<(String, f64)>,

    /// Coverage in days at or below which stock is low
    #[arg(long, default_value_t = 7.0)]
    pub low_days: f64,

    /// Coverage in days at or above which stock is excessive
    #[arg(long, default_value_t = 60.0)]
    pub excess_days: f64,

    /// Entries per ranking
    #[arg(long, default_value_t = 5)]
    pub top: usize,

    /// Documents read per resource
    #[arg(long, default_value_t = DEFAULT_SCAN_LIMIT)]
    pub limit: usize,
}

impl Default for ReportArgs {
    fn default() -> Self {
        Self {
            velocity_days: None,
            turnover_days: None,
            safety_stock: 0.0,
            safety_stock_for: Vec::new(),
            low_days: 7.0,
            excess_days: 60.0,
            top: 5,
            limit: DEFAULT_SCAN_LIMIT,
        }
    }
}

impl ReportArgs {
    /// Report options; per-product safety stock replaces the uniform one.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a negative safety stock or threshold.
    pub fn options(&self) -> CliResult<ReportOptions> {
        if self.safety_stock < 0.0 || self.safety_stock_for.iter().any(|(_, v)| *v < 0.0) {
            return Err(CliError::InvalidArgument("safety stock cannot be negative".into()));
        }
        if self.low_days < 0.0 || self.excess_days < 0.0 {
            return Err(CliError::InvalidArgument("stock thresholds cannot be negative".into()));
        }

        let safety_stock = if self.safety_stock_for.is_empty() {
            SafetyStock::Uniform(self.safety_stock)
        } else {
            SafetyStock::PerProduct(self.safety_stock_for.iter().cloned().collect::<HashMap<_, _>>())
        };
        Ok(ReportOptions::new()
            .with_velocity_period(self.velocity_days)
            .with_turnover_period(self.turnover_days)
            .with_safety_stock(safety_stock)
            .with_low_stock_threshold(self.low_days)
            .with_excess_stock_threshold(self.excess_days)
            .with_top_n(self.top)
            .with_limit(self.limit))
    }
}

/// Parses `SKU=UNITS`.
pub fn parse_safety_entry(raw: &str) -> Result<(String, f64), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected SKU=UNITS, got {raw:?}"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing SKU in {raw:?}"));
    }
    let units: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid units in {raw:?}"))?;
    Ok((key.to_string(), units))
}

/// Prints the KPIs of one product, or the whole inventory report.
pub fn run(
    store: &dyn LocalStore,
    registry: &Registry,
    product: Option<&str>,
    args: &ReportArgs,
    format: OutputFormat,
    out: &mut dyn Write,
) -> CliResult<()> {
    let options = args.options()?;
    match product {
        Some(product) => {
            let report = generate_product_kpis(store, registry, product, &options)?;
            match format {
                OutputFormat::Json => write_json(out, &report),
                OutputFormat::Text => print_product(out, &report),
            }
        }
        None => {
            let report = generate_inventory_report(store, registry, &options)?;
            match format {
                OutputFormat::Json => write_json(out, &report),
                OutputFormat::Text => print_report(out, &report),
            }
        }
    }
}

fn metric(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"))
}

fn print_product(out: &mut dyn Write, report: &ProductReport) -> CliResult<()> {
    let product = &report.product;
    writeln!(out, "product:        {}", product.product_label)?;
    if let Some(name) = &product.product_name {
        writeln!(out, "name:           {name}")?;
    }
    if let Some(category) = &product.category_name {
        writeln!(out, "category:       {category}")?;
    }
    writeln!(out, "internal ids:   {}", product.product_internal_ids.join(", "))?;
    writeln!(out, "purchased:      {:.2}", report.total_purchased_units)?;
    writeln!(out, "sold:           {:.2}", report.total_sold_units)?;
    writeln!(out, "in stock:       {:.2}", report.current_stock_units)?;
    writeln!(out, "lead time:      {} days", metric(report.average_lead_time_days))?;
    writeln!(out, "velocity:       {} units/day", metric(report.sales_velocity_per_day))?;
    writeln!(out, "coverage:       {} days", metric(report.stock_coverage_days))?;
    writeln!(out, "turnover:       {}", metric(report.inventory_turnover))?;
    writeln!(out, "reorder point:  {}", metric(report.reorder_point))?;
    Ok(())
}

fn print_alert(out: &mut dyn Write, title: &str, entries: &[Highlight]) -> CliResult<()> {
    if entries.is_empty() {
        return Ok(());
    }
    let labels: Vec<&str> = entries.iter().map(|h| h.product.product_label.as_str()).collect();
    writeln!(out, "{title:<16} {}", labels.join(", "))?;
    Ok(())
}

fn print_report(out: &mut dyn Write, report: &InventoryReport) -> CliResult<()> {
    let summary = &report.summary;
    writeln!(
        out,
        "{} product(s), {:.2} purchased, {:.2} sold, {:.2} in stock",
        summary.total_products,
        summary.total_purchased_units,
        summary.total_sold_units,
        summary.total_stock_units
    )?;
    writeln!(
        out,
        "lead time {} days, velocity {} units/day, coverage {} days, turnover {}",
        metric(summary.average_lead_time_days),
        metric(summary.overall_sales_velocity_per_day),
        metric(summary.overall_stock_coverage_days),
        metric(summary.overall_inventory_turnover)
    )?;

    if !report.products.is_empty() {
        writeln!(out)?;
        writeln!(
            out,
            "{:<24} {:>10} {:>10} {:>10} {:>10} {:>10}",
            "PRODUCT", "STOCK", "SOLD", "VELOCITY", "COVERAGE", "REORDER"
        )?;
        for product in &report.products {
            writeln!(
                out,
                "{:<24} {:>10.2} {:>10.2} {:>10} {:>10} {:>10}",
                product.product.product_id,
                product.current_stock_units,
                product.total_sold_units,
                metric(product.sales_velocity_per_day),
                metric(product.stock_coverage_days),
                metric(product.reorder_point)
            )?;
        }
    }

    let alerts = &report.alerts;
    writeln!(out)?;
    print_alert(out, "low stock:", &alerts.low_stock)?;
    print_alert(out, "reorder:", &alerts.reorder_recommended)?;
    print_alert(out, "excess stock:", &alerts.excess_stock)?;
    print_alert(out, "stagnant:", &alerts.stagnant_stock)?;
    print_alert(out, "no sales:", &alerts.no_sales)?;
    print_alert(out, "no purchases:", &alerts.no_purchases)?;
    Ok(())
}
