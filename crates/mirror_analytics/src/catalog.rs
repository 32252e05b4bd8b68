//! Product catalog resolution.
//!
//! Documents reference products either by SKU or by internal id. The
//! catalog maps both onto one product so KPIs of the same article are
//! grouped together and carry its name and category.

use crate::error::AnalyticsResult;
use crate::loaders::{first_text, text};
use mirror_catalog::Registry;
use mirror_store::LocalStore;
use serde::Serialize;
use std::collections::HashMap;

/// Catalog data of one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductEntry {
    /// SKU, or the internal id when the product has no code.
    pub code: String,
    /// Upstream internal id.
    pub internal_id: Option<String>,
    /// Product name.
    pub name: Option<String>,
    /// Category id.
    pub category_id: Option<String>,
    /// Category name.
    pub category_name: Option<String>,
}

/// Products indexed by SKU and by internal id.
#[derive(Debug, Clone, Default)]
pub struct ProductCatalog {
    by_code: HashMap<String, ProductEntry>,
    by_internal_id: HashMap<String, ProductEntry>,
}

impl ProductCatalog {
    /// Indexes `entries`; later entries win on duplicate keys.
    pub fn new(entries: impl IntoIterator<Item = ProductEntry>) -> Self {
        let mut catalog = Self::default();
        for entry in entries {
            if let Some(id) = &entry.internal_id {
                catalog.by_internal_id.insert(id.clone(), entry.clone());
            }
            if !entry.code.is_empty() {
                catalog.by_code.insert(entry.code.clone(), entry);
            }
        }
        catalog
    }

    /// Reads categories and products from the mirror.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn load(store: &dyn LocalStore, registry: &Registry, limit: usize) -> AnalyticsResult<Self> {
        let mut categories: HashMap<String, String> = HashMap::new();
        if let Some(def) = registry.get("categories") {
            for record in store.scan(def, limit)? {
                let Some(data) = record.data.as_object() else {
                    continue;
                };
                let id = text(data.get("id")).unwrap_or_else(|| record.id.clone());
                if let Some(name) = first_text(data, &["nombre", "name"]) {
                    categories.insert(id, name);
                }
            }
        }

        let mut entries = Vec::new();
        if let Some(def) = registry.get("products") {
            for record in store.scan(def, limit)? {
                let Some(data) = record.data.as_object() else {
                    continue;
                };
                let internal_id = text(data.get("id")).or_else(|| {
                    Some(record.id.trim().to_string()).filter(|id| !id.is_empty())
                });
                let Some(code) = first_text(data, &["codigo", "code"]).or_else(|| internal_id.clone())
                else {
                    continue;
                };
                let category_id = first_text(data, &["categoria_id", "category_id"]);
                let category_name = first_text(data, &["categoria_nombre", "category_name"])
                    .or_else(|| category_id.as_ref().and_then(|id| categories.get(id).cloned()));

                entries.push(ProductEntry {
                    code,
                    internal_id,
                    name: first_text(data, &["nombre", "name"]),
                    category_id,
                    category_name,
                });
            }
        }

        Ok(Self::new(entries))
    }

    /// Number of indexed products.
    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    /// Returns true if no product is indexed.
    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }

    /// Resolves a product reference to its grouping key and catalog entry.
    ///
    /// The SKU is tried first, then the internal id. Unknown references
    /// resolve to themselves (SKU preferred) without an entry; an empty
    /// key means nothing usable was given.
    pub fn resolve(&self, code: Option<&str>, source_id: Option<&str>) -> (String, Option<&ProductEntry>) {
        let code = code.map(str::trim).filter(|c| !c.is_empty());
        let source_id = source_id.map(str::trim).filter(|s| !s.is_empty());

        if let Some(entry) = code.and_then(|c| self.by_code.get(c)) {
            return (entry.code.clone(), Some(entry));
        }
        if let Some(entry) = source_id.and_then(|s| self.by_internal_id.get(s)) {
            return (entry.code.clone(), Some(entry));
        }
        let key = code.or(source_id).unwrap_or_default();
        (key.to_string(), None)
    }
}
