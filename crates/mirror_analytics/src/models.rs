//! Line-level facts extracted from mirrored documents.

use crate::sku::{format_variant_label, split_sku_and_size};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// One purchased product line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Purchase {
    /// Id of the purchase document.
    pub purchase_id: String,
    /// Product SKU, or the raw product id when the line carries no code.
    pub product_id: String,
    /// Product id as referenced by the document line.
    pub source_product_id: Option<String>,
    /// When the order was issued.
    pub ordered_at: DateTime<Utc>,
    /// When the goods arrived, if known.
    pub received_at: Option<DateTime<Utc>>,
    /// Units ordered or received, never negative.
    pub quantity: f64,
    /// Receiving warehouse.
    pub warehouse_id: Option<String>,
    /// Supplier.
    pub supplier_id: Option<String>,
}

impl Purchase {
    /// Time between order and receipt.
    pub fn lead_time(&self) -> Option<Duration> {
        self.received_at.map(|received| received - self.ordered_at)
    }
}

/// One sold product line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sale {
    /// Id of the sale document.
    pub sale_id: String,
    /// Product SKU, or the raw product id when the line carries no code.
    pub product_id: String,
    /// Product id as referenced by the document line.
    pub source_product_id: Option<String>,
    /// Transaction time.
    pub sold_at: DateTime<Utc>,
    /// Units sold, never negative.
    pub quantity: f64,
    /// Dispatching warehouse.
    pub warehouse_id: Option<String>,
    /// Customer.
    pub customer_id: Option<String>,
}

/// Units on hand of one product at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockLevel {
    /// Product SKU, or the raw product id when the row carries no code.
    pub product_id: String,
    /// Product id the stock row points to.
    pub source_product_id: Option<String>,
    /// Units available, never negative.
    pub quantity: f64,
    /// When the level was measured.
    pub as_of: DateTime<Utc>,
    /// Warehouse holding the stock.
    pub warehouse_id: Option<String>,
}

/// Accessors shared by every product fact.
pub trait ProductFact {
    /// Product SKU (or raw id).
    fn product_id(&self) -> &str;

    /// Product id as referenced by the source document.
    fn source_product_id(&self) -> Option<&str>;

    /// Units carried by the fact.
    fn quantity(&self) -> f64;

    /// SKU without its size suffix.
    fn product_code(&self) -> String {
        split_sku_and_size(self.product_id()).0
    }

    /// Size suffix of the SKU.
    fn variant_size(&self) -> Option<String> {
        split_sku_and_size(self.product_id()).1
    }

    /// Human label of the SKU.
    fn product_label(&self) -> String {
        format_variant_label(self.product_id())
    }

    /// Whether `filter` names this product by SKU, base code or source id.
    fn matches_product(&self, filter: &str) -> bool {
        let filter = filter.trim();
        self.product_id() == filter
            || self.product_code() == filter
            || self.source_product_id() == Some(filter)
    }

    /// Replaces the SKU, keeping the source id.
    fn set_product_id(&mut self, sku: &str);
}

macro_rules! product_fact {
    ($ty:ty) => {
        impl ProductFact for $ty {
            fn product_id(&self) -> &str {
                &self.product_id
            }

            fn source_product_id(&self) -> Option<&str> {
                self.source_product_id.as_deref()
            }

            fn quantity(&self) -> f64 {
                self.quantity
            }

            fn set_product_id(&mut self, sku: &str) {
                self.product_id = sku.to_string();
            }
        }
    };
}

product_fact!(Purchase);
product_fact!(Sale);
product_fact!(StockLevel);

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sale(product_id: &str, source: Option<&str>) -> Sale {
        Sale {
            sale_id: "SA-1".into(),
            product_id: product_id.into(),
            source_product_id: source.map(str::to_string),
            sold_at: Utc.with_ymd_and_hms(2024, 1, 5, 10, 0, 0).unwrap(),
            quantity: 2.0,
            warehouse_id: None,
            customer_id: None,
        }
    }

    #[test]
    fn sku_views() {
        let sale = sale("SKU-1/54", Some("PROD-1"));
        assert_eq!(sale.product_code(), "SKU-1");
        assert_eq!(sale.variant_size().as_deref(), Some("54"));
        assert_eq!(sale.product_label(), "SKU-1 (Talla 54)");
    }

    #[test]
    fn matches_by_sku_base_or_source() {
        let sale = sale("SKU-1/54", Some("PROD-1"));
        assert!(sale.matches_product("SKU-1/54"));
        assert!(sale.matches_product("SKU-1"));
        assert!(sale.matches_product(" PROD-1 "));
        assert!(!sale.matches_product("SKU-2"));
    }

    #[test]
    fn lead_time_needs_receipt() {
        let ordered = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let mut purchase = Purchase {
            purchase_id: "PO-1".into(),
            product_id: "SKU-1".into(),
            source_product_id: None,
            ordered_at: ordered,
            received_at: None,
            quantity: 1.0,
            warehouse_id: None,
            supplier_id: None,
        };
        assert_eq!(purchase.lead_time(), None);

        purchase.received_at = Some(ordered + Duration::hours(102));
        assert_eq!(purchase.lead_time(), Some(Duration::hours(102)));
    }
}
