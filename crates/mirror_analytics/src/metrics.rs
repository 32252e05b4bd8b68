//! KPI formulas over product facts.
//!
//! All functions return `None` when the inputs cannot support the metric
//! (no data, zero velocity, empty inventory) rather than a misleading zero.

use crate::error::{AnalyticsError, AnalyticsResult};
use crate::models::{Purchase, Sale, StockLevel};
use chrono::Duration;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Converts a duration to fractional days.
pub fn duration_in_days(duration: Duration) -> f64 {
    duration.num_milliseconds() as f64 / 1000.0 / SECONDS_PER_DAY
}

/// Mean time between order and receipt.
///
/// Purchases without a receipt, or received before they were ordered, are
/// ignored.
pub fn average_lead_time(purchases: &[Purchase]) -> Option<Duration> {
    let lead_times: Vec<i64> = purchases
        .iter()
        .filter_map(Purchase::lead_time)
        .filter(|lead| *lead >= Duration::zero())
        .map(|lead| lead.num_milliseconds())
        .collect();

    if lead_times.is_empty() {
        return None;
    }
    let total: i128 = lead_times.iter().map(|ms| i128::from(*ms)).sum();
    let mean = total / lead_times.len() as i128;
    Some(Duration::milliseconds(mean as i64))
}

/// Length of the observation window in days.
///
/// An explicit non-zero period wins. Otherwise the window spans the first
/// to the last sale, inclusive, and is at least one day.
fn period_in_days(sales: &[Sale], period_days: Option<u32>) -> Option<u32> {
    if let Some(days) = period_days.filter(|d| *d > 0) {
        return Some(days);
    }
    let start = sales.iter().map(|s| s.sold_at).min()?;
    let end = sales.iter().map(|s| s.sold_at).max()?;
    let days = (end - start).num_days() + 1;
    Some(u32::try_from(days.max(1)).unwrap_or(u32::MAX))
}

/// Units sold per day.
pub fn sales_velocity(sales: &[Sale], period_days: Option<u32>) -> Option<f64> {
    if sales.is_empty() {
        return None;
    }
    let days = period_in_days(sales, period_days)?;
    let total: f64 = sales.iter().map(|s| s.quantity).sum();
    Some(total / f64::from(days))
}

/// Days the current stock lasts at `velocity`.
pub fn stock_coverage(stock_levels: &[StockLevel], velocity: Option<f64>) -> Option<f64> {
    let velocity = velocity.filter(|v| *v > 0.0)?;
    if stock_levels.is_empty() {
        return None;
    }
    let total: f64 = stock_levels.iter().map(|l| l.quantity).sum();
    Some(total / velocity)
}

/// Mean units on hand across stock observations.
pub fn mean_inventory(stock_levels: &[StockLevel]) -> f64 {
    if stock_levels.is_empty() {
        return 0.0;
    }
    let total: f64 = stock_levels.iter().map(|l| l.quantity).sum();
    total / stock_levels.len() as f64
}

/// Annualised inventory turnover: units sold over mean inventory, scaled
/// from the observation window to 365 days.
pub fn inventory_turnover(
    sales: &[Sale],
    average_inventory: f64,
    period_days: Option<u32>,
) -> Option<f64> {
    if average_inventory <= 0.0 || sales.is_empty() {
        return None;
    }
    let days = period_in_days(sales, period_days)?;
    let total: f64 = sales.iter().map(|s| s.quantity).sum();
    Some((total / average_inventory) * (365.0 / f64::from(days)))
}

/// Stock level at which a new order should be placed.
///
/// # Errors
///
/// Returns `InvalidArgument` if any input is negative.
pub fn reorder_point(daily_demand: f64, lead_time_days: f64, safety_stock: f64) -> AnalyticsResult<f64> {
    if daily_demand < 0.0 {
        return Err(AnalyticsError::invalid("daily demand cannot be negative"));
    }
    if lead_time_days < 0.0 {
        return Err(AnalyticsError::invalid("lead time cannot be negative"));
    }
    if safety_stock < 0.0 {
        return Err(AnalyticsError::invalid("safety stock cannot be negative"));
    }
    Ok(daily_demand * lead_time_days + safety_stock)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    fn at(day: u32, hour: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap()
    }

    fn sale(day: u32, hour: u32, quantity: f64) -> Sale {
        Sale {
            sale_id: format!("SA-{day}"),
            product_id: "SKU-1".into(),
            source_product_id: None,
            sold_at: at(day, hour),
            quantity,
            warehouse_id: None,
            customer_id: None,
        }
    }

    fn purchase(ordered: (u32, u32), received: Option<(u32, u32)>) -> Purchase {
        Purchase {
            purchase_id: "PO".into(),
            product_id: "SKU-1".into(),
            source_product_id: None,
            ordered_at: at(ordered.0, ordered.1),
            received_at: received.map(|(d, h)| at(d, h)),
            quantity: 1.0,
            warehouse_id: None,
            supplier_id: None,
        }
    }

    fn level(quantity: f64) -> StockLevel {
        StockLevel {
            product_id: "SKU-1".into(),
            source_product_id: None,
            quantity,
            as_of: at(15, 0),
            warehouse_id: None,
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-6 * b.abs().max(1.0)
    }

    #[test]
    fn lead_time_averages_valid_receipts() {
        let purchases = vec![
            purchase((1, 9), Some((5, 15))),
            purchase((10, 12), Some((14, 10))),
            purchase((3, 0), None),
            purchase((20, 0), Some((19, 0))),
        ];
        let lead = average_lead_time(&purchases).unwrap();
        assert_eq!(lead, Duration::hours(98));
        assert!(close(duration_in_days(lead), 98.0 / 24.0));
        assert_eq!(average_lead_time(&[purchase((1, 0), None)]), None);
    }

    #[test]
    fn velocity_over_observed_window() {
        let sales = vec![sale(5, 10, 2.0), sale(6, 12, 3.0), sale(15, 16, 5.0)];
        assert!(close(sales_velocity(&sales, None).unwrap(), 10.0 / 11.0));
        assert!(close(sales_velocity(&sales, Some(20)).unwrap(), 0.5));
        assert!(close(sales_velocity(&sales, Some(0)).unwrap(), 10.0 / 11.0));
        assert_eq!(sales_velocity(&[], None), None);
    }

    #[test]
    fn single_sale_counts_one_day() {
        assert!(close(sales_velocity(&[sale(5, 11, 4.0)], None).unwrap(), 4.0));
    }

    #[test]
    fn coverage_and_turnover() {
        let sales = vec![sale(5, 10, 2.0), sale(6, 12, 3.0), sale(15, 16, 5.0)];
        let levels = vec![level(20.0), level(12.0)];
        let velocity = sales_velocity(&sales, None);

        assert!(close(stock_coverage(&levels, velocity).unwrap(), 32.0 / (10.0 / 11.0)));
        assert_eq!(stock_coverage(&levels, Some(0.0)), None);
        assert_eq!(stock_coverage(&[], velocity), None);

        let mean = mean_inventory(&levels);
        assert!(close(mean, 16.0));
        let turnover = inventory_turnover(&sales, mean, Some(30)).unwrap();
        assert!(close(turnover, (10.0 / 16.0) * (365.0 / 30.0)));
        assert_eq!(inventory_turnover(&sales, 0.0, None), None);
    }

    #[test]
    fn reorder_point_formula_and_guards() {
        let velocity = 10.0 / 11.0;
        let rop = reorder_point(velocity, 98.0 / 24.0, 5.0).unwrap();
        assert!(close(rop, velocity * (98.0 / 24.0) + 5.0));
        assert!(reorder_point(-1.0, 1.0, 0.0).is_err());
        assert!(reorder_point(1.0, -1.0, 0.0).is_err());
        assert!(reorder_point(1.0, 1.0, -0.5).is_err());
    }

    proptest! {
        #[test]
        fn explicit_period_scales_velocity(
            quantities in proptest::collection::vec(0.0f64..100.0, 1..20),
            period in 1u32..365,
        ) {
            let sales: Vec<Sale> = quantities
                .iter()
                .enumerate()
                .map(|(i, q)| sale(1 + (i as u32 % 28), 0, *q))
                .collect();
            let total: f64 = quantities.iter().sum();
            let velocity = sales_velocity(&sales, Some(period)).unwrap();
            prop_assert!(close(velocity, total / f64::from(period)));
        }
    }
}
