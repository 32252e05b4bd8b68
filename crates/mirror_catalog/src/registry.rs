//! The static resource registry.

use crate::error::{CatalogError, CatalogResult};
use crate::resource::{is_valid_identifier, ResourceDefinition};

/// Immutable, ordered catalog of resource definitions.
///
/// The registry is built once at startup and shared read-only (usually behind
/// an `Arc`). Lookups never allocate new definitions and selection results are
/// always returned in declaration order, independent of the order in which
/// names were requested.
#[derive(Debug, Clone)]
pub struct Registry {
    resources: Vec<ResourceDefinition>,
}

impl Registry {
    /// Creates a registry from definitions, validating names and tables.
    pub fn new(resources: Vec<ResourceDefinition>) -> CatalogResult<Self> {
        for (idx, def) in resources.iter().enumerate() {
            if resources[..idx].iter().any(|other| other.name == def.name) {
                return Err(CatalogError::DuplicateResource(def.name.to_string()));
            }
            if !is_valid_identifier(def.table) {
                return Err(CatalogError::InvalidDefinition {
                    name: def.name.to_string(),
                    reason: format!("table name {:?} is not a plain identifier", def.table),
                });
            }
            if def.table == "sync_state" {
                return Err(CatalogError::InvalidDefinition {
                    name: def.name.to_string(),
                    reason: "table name sync_state is reserved".into(),
                });
            }
            if def.endpoint.trim().is_empty() {
                return Err(CatalogError::InvalidDefinition {
                    name: def.name.to_string(),
                    reason: "endpoint is empty".into(),
                });
            }
        }
        Ok(Self { resources })
    }

    /// The built-in catalog of inventory, document, accounting and banking
    /// resources exposed by the upstream API.
    pub fn builtin() -> Self {
        let resources = vec![
            ResourceDefinition::new("categories", "categoria/").with_label("Categorías"),
            ResourceDefinition::new("brands", "marca/").with_label("Marcas"),
            ResourceDefinition::new("variants", "variante/").with_label("Variantes"),
            ResourceDefinition::new("products", "producto/").with_label("Productos"),
            // The warehouse endpoint ignores date filters and keys rows by code.
            ResourceDefinition::new("warehouses", "bodega/")
                .with_label("Bodegas")
                .with_id_fallbacks(&["codigo", "code", "codigo_bodega"])
                .without_incremental_filter(),
            ResourceDefinition::new("inventory_movements", "movimiento-inventario/")
                .with_label("Movimientos de Inventario"),
            ResourceDefinition::new("remission_guides", "inventario/guia/")
                .with_label("Guías de Remisión")
                .with_legacy_pagination(false),
            ResourceDefinition::new("purchases", "registro/documento/")
                .with_label("Compras")
                .with_extra_params(&[("tipo", "LQC"), ("tipo_registro", "PRO")]),
            ResourceDefinition::new("sales", "registro/documento/")
                .with_label("Ventas")
                .with_extra_params(&[("tipo", "FAC"), ("tipo_registro", "CLI")]),
            ResourceDefinition::new("documents", "documento/")
                .with_label("Documentos")
                .with_incremental_field("fecha_emision__gte"),
            ResourceDefinition::new("registry_transactions", "registro/transaccion/")
                .with_label("Transacciones de Registro"),
            ResourceDefinition::new("persons", "persona/").with_label("Personas"),
            ResourceDefinition::new("cost_centers", "contabilidad/centro-costo/")
                .with_label("Centros de Costo")
                .with_legacy_pagination(false),
            ResourceDefinition::new("chart_of_accounts", "contabilidad/cuenta-contable/")
                .with_label("Plan de Cuentas")
                .with_legacy_pagination(false),
            ResourceDefinition::new("journal_entries", "contabilidad/asiento/")
                .with_label("Asientos Contables")
                .with_legacy_pagination(false),
            ResourceDefinition::new("bank_accounts", "banco/cuenta/")
                .with_label("Cuentas Bancarias")
                .with_legacy_pagination(false),
            ResourceDefinition::new("bank_movements", "banco/movimiento/")
                .with_label("Movimientos Bancarios")
                .with_legacy_pagination(false),
        ];

        Self { resources }
    }

    /// Returns the selected definitions in declaration order.
    ///
    /// An empty filter selects every resource. Unknown names fail the whole
    /// selection and are all reported, so callers can reject bad input before
    /// any fetch begins.
    pub fn list_resources<S: AsRef<str>>(
        &self,
        filter: &[S],
    ) -> CatalogResult<Vec<&ResourceDefinition>> {
        if filter.is_empty() {
            return Ok(self.resources.iter().collect());
        }

        let mut unknown: Vec<String> = filter
            .iter()
            .map(AsRef::as_ref)
            .filter(|name| self.get(name).is_none())
            .map(str::to_string)
            .collect();
        if !unknown.is_empty() {
            unknown.sort();
            unknown.dedup();
            return Err(CatalogError::UnknownResource(unknown));
        }

        Ok(self
            .resources
            .iter()
            .filter(|def| filter.iter().any(|name| name.as_ref() == def.name))
            .collect())
    }

    /// Looks up a definition by name.
    pub fn get(&self, name: &str) -> Option<&ResourceDefinition> {
        self.resources.iter().find(|def| def.name == name)
    }

    /// Looks up a definition by name, failing with `UnknownResource`.
    pub fn require(&self, name: &str) -> CatalogResult<&ResourceDefinition> {
        self.get(name).ok_or_else(|| CatalogError::unknown(name))
    }

    /// Resource names in declaration order.
    pub fn names(&self) -> Vec<&'static str> {
        self.resources.iter().map(|def| def.name).collect()
    }

    /// Iterates over every definition.
    pub fn iter(&self) -> impl Iterator<Item = &ResourceDefinition> {
        self.resources.iter()
    }

    /// Number of registered resources.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Returns true if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::builtin()
    }
}
