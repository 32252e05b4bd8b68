//! Resource definitions.

use serde::Serialize;

/// Query parameter used for incremental filtering unless a resource overrides it.
pub const DEFAULT_INCREMENTAL_FIELD: &str = "fecha_modificacion__gte";

/// Identifier fields tried, in order, after a resource's own candidates.
pub const DEFAULT_ID_FALLBACKS: &[&str] = &["codigo", "code", "uuid", "external_id"];

/// Payload fields from which `source_updated_at` is read, in order.
pub const DEFAULT_TIMESTAMP_FIELDS: &[&str] = &[
    "updated_at",
    "fecha_modificacion",
    "fecha",
    "fecha_emision",
    "created_at",
];

/// Static description of one synchronizable remote resource.
///
/// Definitions are built once when the [`crate::Registry`] is created and are
/// never mutated afterwards. The builder-style setters consume `self` so a
/// definition reads as a single expression in the registry table.
///
/// # Example
///
/// ```
/// use mirror_catalog::ResourceDefinition;
///
/// let sales = ResourceDefinition::new("sales", "registro/documento/")
///     .with_label("Ventas")
///     .with_extra_params(&[("tipo", "FAC"), ("tipo_registro", "CLI")]);
///
/// assert_eq!(sales.table, "sales");
/// assert_eq!(sales.primary_key_field, "id");
/// assert!(sales.supports_incremental());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceDefinition {
    /// Unique name; also the key of the watermark row.
    pub name: &'static str,
    /// Human readable label.
    pub label: &'static str,
    /// Endpoint path relative to the API base URL.
    pub endpoint: &'static str,
    /// Local table the records are upserted into.
    pub table: &'static str,
    /// Payload field holding the primary key.
    pub primary_key_field: &'static str,
    /// Alternative key fields tried when the primary key field is blank.
    pub id_fallbacks: &'static [&'static str],
    /// Query parameter the remote API filters on, `None` for full-scan only.
    pub incremental_field: Option<&'static str>,
    /// Payload fields carrying the source's own update timestamp.
    pub timestamp_fields: &'static [&'static str],
    /// Also send the historic `result_page` / `result_size` aliases.
    pub legacy_pagination: bool,
    /// Fixed query parameters sent with every page request.
    pub extra_params: &'static [(&'static str, &'static str)],
    /// Upper bound on the page size this endpoint honors.
    pub page_size_cap: Option<u32>,
}

impl ResourceDefinition {
    /// Creates a definition with the default conventions: table named after
    /// the resource, `id` primary key, incremental filtering on
    /// [`DEFAULT_INCREMENTAL_FIELD`] and legacy pagination aliases.
    pub fn new(name: &'static str, endpoint: &'static str) -> Self {
        Self {
            name,
            label: name,
            endpoint,
            table: name,
            primary_key_field: "id",
            id_fallbacks: &[],
            incremental_field: Some(DEFAULT_INCREMENTAL_FIELD),
            timestamp_fields: DEFAULT_TIMESTAMP_FIELDS,
            legacy_pagination: true,
            extra_params: &[],
            page_size_cap: None,
        }
    }

    /// Sets the label.
    pub fn with_label(mut self, label: &'static str) -> Self {
        self.label = label;
        self
    }

    /// Sets the target table.
    pub fn with_table(mut self, table: &'static str) -> Self {
        self.table = table;
        self
    }

    /// Sets the primary key field.
    pub fn with_primary_key(mut self, field: &'static str) -> Self {
        self.primary_key_field = field;
        self
    }

    /// Sets the resource-specific identifier fallbacks.
    pub fn with_id_fallbacks(mut self, fields: &'static [&'static str]) -> Self {
        self.id_fallbacks = fields;
        self
    }

    /// Sets the incremental filter parameter.
    pub fn with_incremental_field(mut self, field: &'static str) -> Self {
        self.incremental_field = Some(field);
        self
    }

    /// Marks the resource as full-scan only.
    pub fn without_incremental_filter(mut self) -> Self {
        self.incremental_field = None;
        self
    }

    /// Sets the timestamp fields.
    pub fn with_timestamp_fields(mut self, fields: &'static [&'static str]) -> Self {
        self.timestamp_fields = fields;
        self
    }

    /// Enables or disables the legacy pagination aliases.
    pub fn with_legacy_pagination(mut self, enabled: bool) -> Self {
        self.legacy_pagination = enabled;
        self
    }

    /// Sets fixed query parameters.
    pub fn with_extra_params(mut self, params: &'static [(&'static str, &'static str)]) -> Self {
        self.extra_params = params;
        self
    }

    /// Caps the page size requested from this endpoint.
    pub fn with_page_size_cap(mut self, cap: u32) -> Self {
        self.page_size_cap = Some(cap);
        self
    }

    /// Returns true if the remote API can filter this resource by time.
    pub fn supports_incremental(&self) -> bool {
        self.incremental_field.is_some()
    }

    /// Returns the page size to request, honoring the endpoint cap.
    pub fn effective_page_size(&self, requested: u32) -> u32 {
        match self.page_size_cap {
            Some(cap) => requested.min(cap),
            None => requested,
        }
    }

    /// Identifier candidates in lookup order, without duplicates.
    pub fn id_candidates(&self) -> Vec<&'static str> {
        let mut fields: Vec<&'static str> = Vec::new();
        let all = std::iter::once(self.primary_key_field)
            .chain(self.id_fallbacks.iter().copied())
            .chain(DEFAULT_ID_FALLBACKS.iter().copied());
        for field in all {
            if !fields.contains(&field) {
                fields.push(field);
            }
        }
        fields
    }
}

/// Returns true if `name` is safe to splice into SQL as an identifier.
pub(crate) fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}
