//! Extraction of purchase, sale and stock facts from mirrored documents.
//!
//! Documents come from the upstream API as stored: header fields on the
//! document, product lines under `detalles` (or `items`), and for purchases
//! optional `recepciones` carrying their own dated lines. Field names follow
//! the upstream's Spanish names with English fallbacks.

use crate::error::{AnalyticsError, AnalyticsResult};
use crate::models::{ProductFact, Purchase, Sale, StockLevel};
use chrono::{DateTime, Utc};
use mirror_catalog::{parse_timestamp, Registry, ResourceDefinition};
use mirror_store::{LocalStore, StoredRecord};
use serde_json::{Map, Value};
use tracing::debug;

/// Default number of documents read per resource.
pub const DEFAULT_SCAN_LIMIT: usize = 1000;

const ORDER_DATE_FIELDS: &[&str] = &[
    "fecha_emision",
    "fecha",
    "created_at",
    "fecha_creacion",
    "fecha_documento",
    "fecha_registro",
];
const RECEIPT_DATE_FIELDS: &[&str] = &[
    "fecha_recepcion",
    "fecha_entrega",
    "fecha_modificacion",
    "updated_at",
];
const RECEPTION_DATE_FIELDS: &[&str] = &["fecha", "fecha_recepcion", "created_at"];
const SALE_DATE_FIELDS: &[&str] = &[
    "fecha_emision",
    "fecha",
    "created_at",
    "fecha_venta",
    "fecha_registro",
];
const STOCK_DATE_FIELDS: &[&str] = &["fecha_actualizacion", "fecha", "updated_at"];

const LINE_PRODUCT_FIELDS: &[&str] = &["producto_id", "product_id", "variant_id"];
const HEADER_PRODUCT_FIELDS: &[&str] = &["producto_id", "product_id"];
const LINE_CODE_FIELDS: &[&str] = &["producto_codigo", "product_code", "codigo_producto"];
const ROW_CODE_FIELDS: &[&str] = &["codigo", "code"];
const LINE_QUANTITY_FIELDS: &[&str] = &["cantidad", "quantity", "cant"];
const HEADER_QUANTITY_FIELDS: &[&str] = &["cantidad", "quantity"];
const STOCK_QUANTITY_FIELDS: &[&str] = &[
    "existencia",
    "stock",
    "cantidad_stock",
    "cantidad",
    "quantity",
];
const WAREHOUSE_FIELDS: &[&str] = &["bodega_id", "warehouse_id"];

/// Document type filter used to find purchases among generic documents.
const PURCHASE_DOCUMENT: (&str, &str) = ("LQC", "PRO");
/// Document type filter used to find sales among generic documents.
const SALE_DOCUMENT: (&str, &str) = ("FAC", "CLI");

/// Non-blank text of a scalar JSON value. Numbers are rendered as text.
pub(crate) fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn first_text(object: &Map<String, Value>, fields: &[&str]) -> Option<String> {
    fields.iter().find_map(|field| text(object.get(*field)))
}

fn first_datetime(object: &Map<String, Value>, fields: &[&str]) -> Option<DateTime<Utc>> {
    fields
        .iter()
        .filter_map(|field| text(object.get(*field)))
        .find_map(|raw| parse_timestamp(&raw))
}

fn number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// First non-zero numeric field, clamped at zero.
fn first_quantity(sources: &[(&Map<String, Value>, &[&str])]) -> f64 {
    sources
        .iter()
        .flat_map(|(object, fields)| fields.iter().map(move |f| number(object.get(*f))))
        .flatten()
        .find(|q| *q != 0.0)
        .unwrap_or(0.0)
        .max(0.0)
}

fn lines(data: &Map<String, Value>) -> impl Iterator<Item = &Map<String, Value>> {
    ["detalles", "items"]
        .iter()
        .find_map(|key| data.get(*key).and_then(Value::as_array).filter(|a| !a.is_empty()))
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
}

/// Product identity of a document line: `(sku, source id)`.
fn line_product(
    line: &Map<String, Value>,
    data: &Map<String, Value>,
) -> Option<(String, Option<String>)> {
    let source = first_text(line, LINE_PRODUCT_FIELDS).or_else(|| first_text(data, HEADER_PRODUCT_FIELDS));
    let code = first_text(line, LINE_CODE_FIELDS);
    let sku = code.or_else(|| source.clone())?;
    Some((sku, source))
}

fn resource<'r>(registry: &'r Registry, name: &str) -> AnalyticsResult<&'r ResourceDefinition> {
    registry
        .get(name)
        .ok_or_else(|| AnalyticsError::MissingResource(name.to_string()))
}

/// Reads `primary`; when it holds nothing, falls back to the generic
/// documents of the given type.
fn scan_documents(
    store: &dyn LocalStore,
    registry: &Registry,
    primary: &str,
    (kind, registry_kind): (&str, &str),
    limit: usize,
) -> AnalyticsResult<Vec<StoredRecord>> {
    let records = store.scan(resource(registry, primary)?, limit)?;
    if !records.is_empty() {
        return Ok(records);
    }

    let documents = store.scan(resource(registry, "documents")?, limit)?;
    let matching: Vec<StoredRecord> = documents
        .into_iter()
        .filter(|record| {
            let Some(data) = record.data.as_object() else {
                return false;
            };
            text(data.get("tipo")).as_deref() == Some(kind)
                && text(data.get("tipo_registro")).as_deref() == Some(registry_kind)
        })
        .collect();
    debug!(resource = primary, documents = matching.len(), "falling back to generic documents");
    Ok(matching)
}

fn keep<F: ProductFact>(fact: &F, product: Option<&str>) -> bool {
    product.is_none_or(|p| fact.matches_product(p))
}

fn reception_date(
    data: &Map<String, Value>,
    sku: &str,
    source: Option<&str>,
) -> Option<DateTime<Utc>> {
    let receptions = data.get("recepciones")?.as_array()?;
    receptions.iter().filter_map(Value::as_object).find_map(|reception| {
        let received = first_datetime(reception, RECEPTION_DATE_FIELDS)?;
        let covers = lines(reception).any(|detail| {
            first_text(detail, LINE_PRODUCT_FIELDS)
                .is_some_and(|id| id == sku || Some(id.as_str()) == source)
        });
        covers.then_some(received)
    })
}

fn purchase_lines(record: &StoredRecord) -> Vec<Purchase> {
    let Some(data) = record.data.as_object() else {
        return Vec::new();
    };
    let Some(ordered_at) = first_datetime(data, ORDER_DATE_FIELDS) else {
        return Vec::new();
    };
    let warehouse_id = first_text(data, WAREHOUSE_FIELDS);
    let supplier_id = first_text(data, &["proveedor_id", "supplier_id"]);

    lines(data)
        .filter_map(|line| {
            let (sku, source) = line_product(line, data)?;
            let received_at = first_datetime(line, RECEIPT_DATE_FIELDS)
                .or_else(|| first_datetime(data, RECEIPT_DATE_FIELDS))
                .or_else(|| reception_date(data, &sku, source.as_deref()));
            Some(Purchase {
                purchase_id: record.id.clone(),
                product_id: sku,
                source_product_id: source,
                ordered_at,
                received_at,
                quantity: first_quantity(&[
                    (line, LINE_QUANTITY_FIELDS),
                    (data, HEADER_QUANTITY_FIELDS),
                ]),
                warehouse_id: warehouse_id.clone(),
                supplier_id: supplier_id.clone(),
            })
        })
        .collect()
}

fn sale_lines(record: &StoredRecord) -> Vec<Sale> {
    let Some(data) = record.data.as_object() else {
        return Vec::new();
    };
    let Some(sold_at) = first_datetime(data, SALE_DATE_FIELDS) else {
        return Vec::new();
    };
    let warehouse_id = first_text(data, WAREHOUSE_FIELDS);
    let customer_id = first_text(data, &["cliente_id", "customer_id"]);

    lines(data)
        .filter_map(|line| {
            let (sku, source) = line_product(line, data)?;
            Some(Sale {
                sale_id: record.id.clone(),
                product_id: sku,
                source_product_id: source,
                sold_at,
                quantity: first_quantity(&[
                    (line, LINE_QUANTITY_FIELDS),
                    (data, HEADER_QUANTITY_FIELDS),
                ]),
                warehouse_id: warehouse_id.clone(),
                customer_id: customer_id.clone(),
            })
        })
        .collect()
}

fn stock_level(record: &StoredRecord) -> Option<StockLevel> {
    let data = record.data.as_object()?;
    let source = first_text(data, HEADER_PRODUCT_FIELDS)
        .or_else(|| first_text(data, &["id"]))
        .or_else(|| Some(record.id.clone()).filter(|id| !id.trim().is_empty()));
    let sku = first_text(data, ROW_CODE_FIELDS).or_else(|| source.clone())?;
    let as_of = first_datetime(data, STOCK_DATE_FIELDS)
        .or_else(|| parse_timestamp(&record.fetched_at))
        .unwrap_or_else(Utc::now);

    Some(StockLevel {
        product_id: sku,
        source_product_id: source,
        quantity: first_quantity(&[(data, STOCK_QUANTITY_FIELDS)]),
        as_of,
        warehouse_id: first_text(data, WAREHOUSE_FIELDS),
    })
}

/// Purchase lines, oldest order first.
///
/// Reads `purchases`, or `documents` of type `LQC`/`PRO` when no purchase
/// has been mirrored. `product` keeps only lines whose SKU, base code or
/// source id equals it.
///
/// # Errors
///
/// Returns an error if the store cannot be read or a resource is missing
/// from the registry.
pub fn load_purchases(
    store: &dyn LocalStore,
    registry: &Registry,
    product: Option<&str>,
    limit: usize,
) -> AnalyticsResult<Vec<Purchase>> {
    let records = scan_documents(store, registry, "purchases", PURCHASE_DOCUMENT, limit)?;
    let mut purchases: Vec<Purchase> = records
        .iter()
        .flat_map(purchase_lines)
        .filter(|p| keep(p, product))
        .collect();
    purchases.sort_by_key(|p| p.ordered_at);
    Ok(purchases)
}

/// Sale lines, oldest first.
///
/// Reads `sales`, or `documents` of type `FAC`/`CLI` when no sale has been
/// mirrored.
///
/// # Errors
///
/// Same as [`load_purchases`].
pub fn load_sales(
    store: &dyn LocalStore,
    registry: &Registry,
    product: Option<&str>,
    limit: usize,
) -> AnalyticsResult<Vec<Sale>> {
    let records = scan_documents(store, registry, "sales", SALE_DOCUMENT, limit)?;
    let mut sales: Vec<Sale> = records
        .iter()
        .flat_map(sale_lines)
        .filter(|s| keep(s, product))
        .collect();
    sales.sort_by_key(|s| s.sold_at);
    Ok(sales)
}

/// Stock levels, oldest measurement first.
///
/// Reads `variants`; when no variant row yields a level, product rows are
/// read instead (simple products carry their own stock).
///
/// # Errors
///
/// Same as [`load_purchases`].
pub fn load_stock_levels(
    store: &dyn LocalStore,
    registry: &Registry,
    product: Option<&str>,
    limit: usize,
) -> AnalyticsResult<Vec<StockLevel>> {
    let mut all: Vec<StockLevel> = store
        .scan(resource(registry, "variants")?, limit)?
        .iter()
        .filter_map(stock_level)
        .collect();
    if all.is_empty() {
        all = store
            .scan(resource(registry, "products")?, limit)?
            .iter()
            .filter_map(stock_level)
            .collect();
    }

    let mut levels: Vec<StockLevel> = all.into_iter().filter(|l| keep(l, product)).collect();
    levels.sort_by_key(|l| l.as_of);
    Ok(levels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stored(id: &str, data: Value) -> StoredRecord {
        StoredRecord {
            id: id.into(),
            data,
            updated_at: "2024-01-01T00:00:00.000000+00:00".into(),
            fetched_at: "2024-02-01T00:00:00.000000+00:00".into(),
        }
    }

    #[test]
    fn text_accepts_strings_and_numbers() {
        assert_eq!(text(Some(&json!(" A "))), Some("A".to_string()));
        assert_eq!(text(Some(&json!(42))), Some("42".to_string()));
        assert_eq!(text(Some(&json!("  "))), None);
        assert_eq!(text(Some(&json!(null))), None);
    }

    #[test]
    fn quantity_skips_zero_and_clamps() {
        let line = json!({"cantidad": 0, "quantity": "7.5"});
        let line = line.as_object().unwrap();
        assert_eq!(first_quantity(&[(line, LINE_QUANTITY_FIELDS)]), 7.5);

        let negative = json!({"cantidad": -3});
        assert_eq!(first_quantity(&[(negative.as_object().unwrap(), LINE_QUANTITY_FIELDS)]), 0.0);
    }

    #[test]
    fn purchase_receipt_from_matching_reception() {
        let record = stored(
            "PO-2",
            json!({
                "fecha_emision": "2024-01-10T12:00:00+00:00",
                "recepciones": [
                    {"fecha": "2024-01-12T00:00:00+00:00", "detalles": [{"producto_id": "OTHER"}]},
                    {"fecha": "2024-01-14T10:00:00+00:00", "detalles": [{"producto_id": "SKU-1/54"}]},
                ],
                "detalles": [{"producto_id": "PROD-1", "producto_codigo": "SKU-1/54", "cantidad": 8}],
            }),
        );

        let lines = purchase_lines(&record);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].product_id, "SKU-1/54");
        assert_eq!(lines[0].source_product_id.as_deref(), Some("PROD-1"));
        assert_eq!(lines[0].lead_time(), Some(chrono::Duration::hours(94)));
    }

    #[test]
    fn documents_without_date_or_product_yield_nothing() {
        assert!(purchase_lines(&stored("X", json!({"detalles": [{"producto_id": "A"}]}))).is_empty());
        let no_product = stored("Y", json!({"fecha": "2024-01-01", "detalles": [{"cantidad": 2}]}));
        assert!(sale_lines(&no_product).is_empty());
    }

    #[test]
    fn header_product_applies_to_lines() {
        let record = stored(
            "SA-9",
            json!({"fecha": "01/03/2024", "producto_id": "P9", "cantidad": 2, "detalles": [{}]}),
        );
        let sales = sale_lines(&record);
        assert_eq!(sales[0].product_id, "P9");
        assert_eq!(sales[0].quantity, 2.0);
    }

    #[test]
    fn stock_level_falls_back_to_capture_time() {
        let level = stock_level(&stored("SIM-1", json!({"id": "SIM-1", "cantidad_stock": "12.5"}))).unwrap();
        assert_eq!(level.product_id, "SIM-1");
        assert_eq!(level.quantity, 12.5);
        assert_eq!(level.as_of, parse_timestamp("2024-02-01T00:00:00Z").unwrap());
    }
}
