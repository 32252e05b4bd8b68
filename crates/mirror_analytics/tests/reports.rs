//! Reports computed over a SQLite mirror seeded with upstream documents.

use chrono::{TimeZone, Utc};
use mirror_analytics::{
    average_lead_time, generate_inventory_report, generate_product_kpis, load_purchases,
    load_sales, load_stock_levels, ProductFact, ReportOptions, SafetyStock,
};
use mirror_catalog::Registry;
use mirror_testkit::prelude::*;
use serde_json::json;
use std::collections::HashMap;

fn approx(actual: f64, expected: f64) -> bool {
    (actual - expected).abs() <= 1e-3 * expected.abs().max(1.0)
}

fn line(quantity: u32) -> serde_json::Value {
    json!({"producto_id": "PROD-1", "producto_codigo": "SKU-1/54", "cantidad": quantity})
}

/// One jacket in size 54: two purchases, three sales, two stock rows.
fn jacket_store(registry: &Registry) -> TestStore {
    let store = TestStore::new(registry);
    seed_documents(
        &store.store,
        registry,
        "categories",
        vec![
            json!({"id": "CAT-001", "nombre": "Sastrería"}),
            json!({"id": "CAT-002", "nombre": "General"}),
        ],
    );
    seed_documents(
        &store.store,
        registry,
        "products",
        vec![json!({
            "id": "PROD-1",
            "codigo": "SKU-1/54",
            "nombre": "JACKET XOXO",
            "categoria_id": "CAT-001",
            "categoria_nombre": "Sastrería",
        })],
    );
    seed_documents(
        &store.store,
        registry,
        "purchases",
        vec![
            json!({
                "id": "PO-1",
                "fecha_emision": "2024-01-01T09:00:00+00:00",
                "fecha_recepcion": "2024-01-05T15:00:00+00:00",
                "detalles": [line(10)],
            }),
            json!({
                "id": "PO-2",
                "fecha_emision": "2024-01-10T12:00:00+00:00",
                "recepciones": [{
                    "fecha": "2024-01-14T10:00:00+00:00",
                    "detalles": [{"producto_id": "SKU-1/54", "cantidad": 8}],
                }],
                "detalles": [line(8)],
            }),
        ],
    );
    seed_documents(
        &store.store,
        registry,
        "sales",
        vec![
            json!({"id": "SA-1", "fecha_emision": "2024-01-05T10:00:00+00:00", "detalles": [line(2)]}),
            json!({"id": "SA-2", "fecha_emision": "2024-01-06T12:00:00+00:00", "detalles": [line(3)]}),
            json!({"id": "SA-3", "fecha_emision": "2024-01-15T16:00:00+00:00", "detalles": [line(5)]}),
        ],
    );
    seed_documents(
        &store.store,
        registry,
        "variants",
        vec![
            json!({
                "id": "VAR-1",
                "producto_id": "PROD-1",
                "codigo": "SKU-1/54",
                "existencia": 20,
                "fecha_actualizacion": "2024-01-15T20:00:00+00:00",
            }),
            json!({
                "id": "VAR-2",
                "producto_id": "PROD-1",
                "codigo": "SKU-1/54",
                "existencia": 12,
                "fecha_actualizacion": "2024-01-16T08:00:00+00:00",
            }),
        ],
    );
    store
}

#[test]
fn loaders_build_facts_with_sku_and_source() {
    let registry = Registry::builtin();
    let store = jacket_store(&registry);

    let purchases = load_purchases(&store.store, &registry, Some("SKU-1/54"), 1000).unwrap();
    let sales = load_sales(&store.store, &registry, Some("SKU-1/54"), 1000).unwrap();
    let stock = load_stock_levels(&store.store, &registry, Some("SKU-1/54"), 1000).unwrap();

    assert_eq!(purchases.len(), 2);
    assert_eq!(purchases[0].purchase_id, "PO-1");
    assert_eq!(purchases[0].product_id, "SKU-1/54");
    assert_eq!(purchases[0].source_product_id.as_deref(), Some("PROD-1"));
    assert_eq!(purchases[0].product_code(), "SKU-1");
    assert_eq!(purchases[0].variant_size().as_deref(), Some("54"));
    assert!(purchases.iter().all(|p| p.lead_time().is_some()));

    let mut quantities: Vec<f64> = sales.iter().map(|s| s.quantity).collect();
    quantities.sort_by(f64::total_cmp);
    assert_eq!(quantities, vec![2.0, 3.0, 5.0]);
    assert_eq!(sales[0].product_label(), "SKU-1 (Talla 54)");

    assert_eq!(stock.len(), 2);
    assert!(stock.iter().all(|l| l.product_id == "SKU-1/54"));
    assert!(stock.iter().all(|l| l.source_product_id.as_deref() == Some("PROD-1")));

    assert_eq!(load_purchases(&store.store, &registry, Some("SKU-1"), 1000).unwrap().len(), 2);
    assert_eq!(load_sales(&store.store, &registry, Some("PROD-1"), 1000).unwrap().len(), 3);
    assert!(load_sales(&store.store, &registry, Some("SKU-9"), 1000).unwrap().is_empty());
}

#[test]
fn lead_time_averages_both_receipts() {
    let registry = Registry::builtin();
    let store = jacket_store(&registry);
    let purchases = load_purchases(&store.store, &registry, None, 1000).unwrap();
    assert_eq!(average_lead_time(&purchases), Some(chrono::Duration::hours(98)));
}

#[test]
fn product_kpis_for_a_sized_sku() {
    let registry = Registry::builtin();
    let store = jacket_store(&registry);
    let options = ReportOptions::new()
        .with_turnover_period(Some(30))
        .with_safety_stock(SafetyStock::Uniform(5.0));

    let report = generate_product_kpis(&store.store, &registry, "SKU-1/54", &options).unwrap();

    let product = &report.product;
    assert_eq!(product.product_id, "SKU-1/54");
    assert_eq!(product.product_code, "SKU-1");
    assert_eq!(product.variant_size.as_deref(), Some("54"));
    assert_eq!(product.product_label, "SKU-1 (Talla 54)");
    assert_eq!(product.product_name.as_deref(), Some("JACKET XOXO"));
    assert_eq!(product.category_id.as_deref(), Some("CAT-001"));
    assert_eq!(product.category_name.as_deref(), Some("Sastrería"));
    assert_eq!(product.product_internal_ids, vec!["PROD-1".to_string()]);

    let velocity = 10.0 / 11.0;
    assert!(approx(report.average_lead_time_days.unwrap(), 98.0 / 24.0));
    assert!(approx(report.sales_velocity_per_day.unwrap(), velocity));
    assert!(approx(report.stock_coverage_days.unwrap(), 32.0 / velocity));
    assert!(approx(report.inventory_turnover.unwrap(), (10.0 / 16.0) * (365.0 / 30.0)));
    assert!(approx(report.reorder_point.unwrap(), velocity * (98.0 / 24.0) + 5.0));
    assert_eq!(report.total_purchased_units, 18.0);
    assert_eq!(report.total_sold_units, 10.0);
    assert_eq!(report.current_stock_units, 32.0);

    assert_eq!(report.purchases.len(), 2);
    assert_eq!(report.sales.len(), 3);
    assert_eq!(report.stock_levels.len(), 2);
    assert_eq!(report.purchases[0].source_product_id.as_deref(), Some("PROD-1"));
}

#[test]
fn product_kpis_by_internal_id_resolve_to_the_sku() {
    let registry = Registry::builtin();
    let store = jacket_store(&registry);

    let report = generate_product_kpis(&store.store, &registry, "PROD-1", &ReportOptions::new()).unwrap();
    assert_eq!(report.product.product_id, "SKU-1/54");
    assert_eq!(report.total_sold_units, 10.0);
}

#[test]
fn product_kpis_without_facts_have_no_metrics() {
    let registry = Registry::builtin();
    let store = TestStore::new(&registry);

    let report = generate_product_kpis(&store.store, &registry, "GHOST/40", &ReportOptions::new()).unwrap();
    assert_eq!(report.product.product_id, "GHOST/40");
    assert_eq!(report.product.product_internal_ids, vec!["GHOST/40".to_string()]);
    assert_eq!(report.sales_velocity_per_day, None);
    assert_eq!(report.reorder_point, None);
    assert_eq!(report.total_sold_units, 0.0);
}

#[test]
fn inventory_report_summary_rankings_and_alerts() {
    let registry = Registry::builtin();
    let store = jacket_store(&registry);
    let options = ReportOptions::new()
        .with_turnover_period(Some(30))
        .with_safety_stock(SafetyStock::PerProduct(HashMap::from([("PROD-1".to_string(), 5.0)])))
        .with_low_stock_threshold(30.0)
        .with_excess_stock_threshold(30.0);

    let report = generate_inventory_report(&store.store, &registry, &options).unwrap();

    let velocity = 10.0 / 11.0;
    assert_eq!(report.summary.total_products, 1);
    assert!(approx(report.summary.total_stock_units, 32.0));
    assert!(approx(report.summary.overall_sales_velocity_per_day.unwrap(), velocity));
    assert!(approx(report.summary.overall_stock_coverage_days.unwrap(), 32.0 / velocity));

    let product = &report.products[0];
    assert_eq!(product.product.product_id, "SKU-1/54");
    assert_eq!(product.product.product_name.as_deref(), Some("JACKET XOXO"));
    assert_eq!(product.product.product_internal_ids, vec!["PROD-1".to_string()]);
    assert!(approx(product.reorder_point.unwrap(), velocity * (98.0 / 24.0) + 5.0));

    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["products"][0]["product_id"], "SKU-1/54");
    assert_eq!(value["products"][0]["purchases"][0]["product_id"], "SKU-1/54");
    assert_eq!(value["products"][0]["sales"][0]["product_id"], "SKU-1/54");

    let rankings = &value["rankings"];
    assert_eq!(rankings["top_selling_products"][0]["product_id"], "SKU-1/54");
    assert_eq!(rankings["top_selling_products"][0]["product_label"], "SKU-1 (Talla 54)");
    assert_eq!(rankings["top_selling_products"][0]["category_name"], "Sastrería");
    assert_eq!(rankings["top_selling_products"][0]["total_sold_units"], 10.0);
    assert_eq!(rankings["top_stock_levels"][0]["product_internal_ids"], json!(["PROD-1"]));

    let alerts = &value["alerts"];
    assert_eq!(alerts["low_stock"], json!([]));
    assert_eq!(alerts["reorder_recommended"], json!([]));
    assert_eq!(alerts["excess_stock"][0]["product_id"], "SKU-1/54");
    assert_eq!(alerts["excess_stock"][0]["product_name"], "JACKET XOXO");
    assert_eq!(alerts["stagnant_stock"], json!([]));
    assert_eq!(alerts["no_sales"], json!([]));

    assert_eq!(value["metadata"]["low_stock_threshold_days"], 30.0);
    assert_eq!(value["metadata"]["top_n"], 5);
    assert!(value["metadata"].get("safety_stock").is_none());
}

#[test]
fn inventory_report_flags_low_stock_and_reorders() {
    let registry = Registry::builtin();
    let store = jacket_store(&registry);
    let options = ReportOptions::new()
        .with_safety_stock(SafetyStock::Uniform(40.0))
        .with_low_stock_threshold(60.0);

    let report = generate_inventory_report(&store.store, &registry, &options).unwrap();
    assert_eq!(report.alerts.low_stock.len(), 1);
    assert_eq!(report.alerts.reorder_recommended.len(), 1);
    let reorder = &report.alerts.reorder_recommended[0];
    assert_eq!(reorder.metrics["current_stock_units"], Some(32.0));
    assert!(reorder.metrics["reorder_point"].unwrap() > 40.0);
}

#[test]
fn inventory_report_reads_latin_dates_and_text_quantities() {
    let registry = Registry::builtin();
    let store = TestStore::new(&registry);
    seed_documents(&store.store, &registry, "categories", vec![json!({"id": "CAT-LAT", "nombre": "Promociones"})]);
    seed_documents(
        &store.store,
        &registry,
        "products",
        vec![json!({"id": "PR-LAT-1", "codigo": "SKU-EC-42", "nombre": "CAMISA PROMO", "categoria_id": "CAT-LAT"})],
    );
    let detail = json!({"producto_id": "PR-LAT-1", "producto_codigo": "SKU-EC-42", "cantidad": "12"});
    seed_documents(
        &store.store,
        &registry,
        "purchases",
        vec![json!({
            "id": "PO-LAT-1",
            "fecha_emision": "05/06/2025",
            "fecha_recepcion": "07/06/2025",
            "detalles": [detail],
        })],
    );
    seed_documents(
        &store.store,
        &registry,
        "sales",
        vec![json!({
            "id": "SA-LAT-1",
            "fecha_emision": "08/06/2025",
            "detalles": [{"producto_id": "PR-LAT-1", "producto_codigo": "SKU-EC-42", "cantidad": "5"}],
        })],
    );
    seed_documents(
        &store.store,
        &registry,
        "variants",
        vec![json!({
            "id": "VAR-LAT-1",
            "producto_id": "PR-LAT-1",
            "codigo": "SKU-EC-42",
            "existencia": "20",
            "fecha_actualizacion": "09/06/2025",
        })],
    );

    let report = generate_inventory_report(&store.store, &registry, &ReportOptions::new()).unwrap();
    assert_eq!(report.summary.total_products, 1);
    assert_eq!(report.summary.total_purchased_units, 12.0);
    assert_eq!(report.summary.total_sold_units, 5.0);
    assert_eq!(report.summary.total_stock_units, 20.0);

    let product = &report.products[0];
    assert_eq!(product.product.product_id, "SKU-EC-42");
    assert_eq!(product.product.category_name.as_deref(), Some("Promociones"));
    assert_eq!(product.average_lead_time_days, Some(2.0));
}

#[test]
fn sales_dated_by_registration_count() {
    let registry = Registry::builtin();
    let store = TestStore::new(&registry);
    seed_documents(
        &store.store,
        &registry,
        "sales",
        vec![json!({
            "id": "SA-REG",
            "fecha_registro": "2024-03-05T11:00:00+00:00",
            "detalles": [{"producto_id": "SKU-REG/38", "cantidad": 4}],
        })],
    );

    let sales = load_sales(&store.store, &registry, None, 1000).unwrap();
    assert_eq!(sales.len(), 1);
    assert_eq!(sales[0].sold_at, Utc.with_ymd_and_hms(2024, 3, 5, 11, 0, 0).unwrap());

    let report = generate_inventory_report(&store.store, &registry, &ReportOptions::new()).unwrap();
    assert!(approx(report.summary.total_sold_units, 4.0));
    assert!(approx(report.summary.overall_sales_velocity_per_day.unwrap(), 4.0));
}

#[test]
fn generic_documents_stand_in_for_purchases_and_sales() {
    let registry = Registry::builtin();
    let store = TestStore::new(&registry);
    seed_documents(
        &store.store,
        &registry,
        "documents",
        vec![
            json!({
                "id": "DOC-PO-1",
                "tipo": "LQC",
                "tipo_registro": "PRO",
                "fecha_emision": "2024-02-01T09:00:00+00:00",
                "fecha_recepcion": "2024-02-03T09:00:00+00:00",
                "detalles": [{"producto_id": "SKU-2/42", "cantidad": 4}],
            }),
            json!({
                "id": "DOC-SA-1",
                "tipo": "FAC",
                "tipo_registro": "CLI",
                "fecha_emision": "2024-02-05T11:00:00+00:00",
                "detalles": [{"producto_id": "SKU-2/42", "cantidad": 3}],
            }),
        ],
    );

    let purchases = load_purchases(&store.store, &registry, Some("SKU-2/42"), 1000).unwrap();
    let sales = load_sales(&store.store, &registry, Some("SKU-2/42"), 1000).unwrap();
    assert_eq!(purchases.len(), 1);
    assert_eq!(purchases[0].purchase_id, "DOC-PO-1");
    assert_eq!(purchases[0].quantity, 4.0);
    assert_eq!(sales.len(), 1);
    assert_eq!(sales[0].sale_id, "DOC-SA-1");
    assert_eq!(sales[0].quantity, 3.0);
}

#[test]
fn stock_falls_back_to_products() {
    let registry = Registry::builtin();
    let store = TestStore::new(&registry);
    seed_documents(
        &store.store,
        &registry,
        "products",
        vec![
            json!({
                "id": "SIM-1",
                "tipo_producto": "SIM",
                "cantidad_stock": "12.5",
                "fecha_actualizacion": "2024-02-01T10:00:00+00:00",
            }),
            json!({
                "id": "SIM-2",
                "tipo_producto": "SIM",
                "cantidad_stock": "0",
                "fecha_modificacion": "2024-02-01T09:00:00+00:00",
            }),
        ],
    );

    let levels = load_stock_levels(&store.store, &registry, None, 1000).unwrap();
    let by_id: HashMap<&str, f64> = levels.iter().map(|l| (l.product_id.as_str(), l.quantity)).collect();
    assert_eq!(by_id["SIM-1"], 12.5);
    assert_eq!(by_id["SIM-2"], 0.0);

    let filtered = load_stock_levels(&store.store, &registry, Some("SIM-1"), 1000).unwrap();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].product_id, "SIM-1");

    let report = generate_inventory_report(&store.store, &registry, &ReportOptions::new()).unwrap();
    let stagnant: Vec<&str> = report
        .alerts
        .stagnant_stock
        .iter()
        .map(|h| h.product.product_id.as_str())
        .collect();
    assert_eq!(stagnant, vec!["SIM-1"]);
}
