//! Page requests and remote page responses.

use crate::error::{CatalogError, CatalogResult};
use crate::resource::ResourceDefinition;
use crate::timestamp::format_timestamp;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// A request for one page of a remote resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Endpoint path relative to the API base.
    pub endpoint: String,
    /// Incremental filter parameter, if the resource supports one.
    pub filter_field: Option<String>,
    /// Lower bound for the incremental filter.
    pub since: Option<DateTime<Utc>>,
    /// Requested page size.
    pub page_size: u32,
    /// 1-based page number.
    pub page: u32,
    /// Also send `result_page` / `result_size`.
    pub legacy_pagination: bool,
    /// Fixed query parameters.
    pub extra_params: Vec<(String, String)>,
}

impl PageRequest {
    /// Creates the request for `page` of `definition`.
    ///
    /// `since` is dropped for resources without an incremental filter.
    pub fn for_resource(
        definition: &ResourceDefinition,
        since: Option<DateTime<Utc>>,
        page_size: u32,
        page: u32,
    ) -> Self {
        let filter_field = definition.incremental_field.map(str::to_string);
        Self {
            endpoint: definition.endpoint.to_string(),
            since: filter_field.as_ref().and(since),
            filter_field,
            page_size,
            page,
            legacy_pagination: definition.legacy_pagination,
            extra_params: definition
                .extra_params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    /// Query parameters in the order they are sent.
    pub fn query_params(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("page".to_string(), self.page.to_string()),
            ("page_size".to_string(), self.page_size.to_string()),
        ];
        if self.legacy_pagination {
            params.push(("result_page".to_string(), self.page.to_string()));
            params.push(("result_size".to_string(), self.page_size.to_string()));
        }
        if let (Some(field), Some(since)) = (&self.filter_field, &self.since) {
            params.push((field.clone(), format_timestamp(since)));
        }
        params.extend(self.extra_params.iter().cloned());
        params
    }
}

/// One page as returned by the remote collaborator.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RemotePage {
    /// Raw documents in upstream order.
    pub documents: Vec<Value>,
    /// Whether the upstream signalled more pages.
    pub has_more: bool,
    /// Page number to request next, when `has_more` is set.
    pub next_cursor: Option<u32>,
    /// Items the upstream sent, counted before non-object items are dropped.
    pub received: usize,
}

impl RemotePage {
    /// Creates a page.
    pub fn new(documents: Vec<Value>, has_more: bool, next_cursor: Option<u32>) -> Self {
        Self {
            received: documents.len(),
            documents,
            has_more,
            next_cursor,
        }
    }

    /// A terminal empty page.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Interprets a decoded response body.
    ///
    /// Two shapes are accepted: a bare array (more pages are assumed while
    /// the array is full) and an object with a `results` array and a `next`
    /// link. `None` means the upstream sent an empty body. Non-object array
    /// items are dropped from `documents` but still counted in `received`,
    /// so a full page stays full for the stop condition.
    pub fn from_body(request: &PageRequest, body: Option<Value>) -> CatalogResult<Self> {
        let Some(body) = body else {
            return Ok(Self::empty());
        };

        let (items, has_more) = match body {
            Value::Array(items) => {
                let full = items.len() >= request.page_size as usize;
                (items, full)
            }
            Value::Object(mut object) => {
                let has_next = match object.get("next") {
                    Some(Value::String(s)) => !s.trim().is_empty(),
                    Some(Value::Null) | None => false,
                    Some(Value::Bool(b)) => *b,
                    Some(_) => true,
                };
                match object.remove("results") {
                    Some(Value::Array(items)) => (items, has_next),
                    _ => {
                        return Err(CatalogError::MalformedResponse {
                            endpoint: request.endpoint.clone(),
                            reason: "object response without a results array".into(),
                        })
                    }
                }
            }
            other => {
                return Err(CatalogError::MalformedResponse {
                    endpoint: request.endpoint.clone(),
                    reason: format!("unexpected {} body", json_kind(&other)),
                })
            }
        };

        let received = items.len();
        let documents: Vec<Value> = items.into_iter().filter(Value::is_object).collect();
        let next_cursor = has_more.then(|| request.page.saturating_add(1));
        Ok(Self {
            documents,
            has_more,
            next_cursor,
            received,
        })
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use serde_json::json;

    fn request(page_size: u32) -> PageRequest {
        let def = ResourceDefinition::new("products", "producto/");
        PageRequest::for_resource(&def, None, page_size, 1)
    }

    #[test]
    fn query_params_with_legacy_aliases_and_filter() {
        let def = ResourceDefinition::new("sales", "registro/documento/")
            .with_extra_params(&[("tipo", "FAC")]);
        let since = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let req = PageRequest::for_resource(&def, Some(since), 50, 3);

        let params = req.query_params();
        assert_eq!(
            params,
            vec![
                ("page".to_string(), "3".to_string()),
                ("page_size".to_string(), "50".to_string()),
                ("result_page".to_string(), "3".to_string()),
                ("result_size".to_string(), "50".to_string()),
                (
                    "fecha_modificacion__gte".to_string(),
                    "2024-01-02T03:04:05.000000+00:00".to_string()
                ),
                ("tipo".to_string(), "FAC".to_string()),
            ]
        );
    }

    #[test]
    fn since_dropped_without_incremental_filter() {
        let def = ResourceDefinition::new("warehouses", "bodega/")
            .without_incremental_filter()
            .with_legacy_pagination(false);
        let since = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let req = PageRequest::for_resource(&def, Some(since), 10, 1);
        assert_eq!(req.since, None);
        assert_eq!(req.query_params().len(), 2);
    }

    #[test]
    fn list_body_full_page_has_more() {
        let body = json!([{"id": 1}, {"id": 2}]);
        let page = RemotePage::from_body(&request(2), Some(body)).unwrap();
        assert_eq!(page.documents.len(), 2);
        assert!(page.has_more);
        assert_eq!(page.next_cursor, Some(2));
    }

    #[test]
    fn list_body_short_page_is_last() {
        let body = json!([{"id": 1}, "junk", 3]);
        let page = RemotePage::from_body(&request(5), Some(body)).unwrap();
        assert_eq!(page.documents.len(), 1);
        assert_eq!(page.received, 3);
        assert!(!page.has_more);
        assert_eq!(page.next_cursor, None);
    }

    #[test]
    fn object_body_uses_next_link() {
        let body = json!({"results": [{"id": 1}], "next": "https://api/x?page=2"});
        let page = RemotePage::from_body(&request(100), Some(body)).unwrap();
        assert!(page.has_more);

        let last = json!({"results": [{"id": 1}], "next": null});
        let page = RemotePage::from_body(&request(100), Some(last)).unwrap();
        assert!(!page.has_more);
    }

    #[test]
    fn malformed_bodies() {
        let err = RemotePage::from_body(&request(10), Some(json!({"detail": "x"}))).unwrap_err();
        assert!(matches!(err, CatalogError::MalformedResponse { .. }));
        assert!(RemotePage::from_body(&request(10), Some(json!("text"))).is_err());
    }

    #[test]
    fn empty_body_is_terminal() {
        let page = RemotePage::from_body(&request(10), None).unwrap();
        assert!(page.documents.is_empty());
        assert!(!page.has_more);
    }

    proptest! {
        #[test]
        fn list_pages_continue_only_when_full(
            objects in 0usize..40,
            scalars in 0usize..10,
            page_size in 1u32..50,
        ) {
            let mut items: Vec<Value> = (0..objects).map(|i| json!({"id": i})).collect();
            items.extend((0..scalars).map(|i| json!(i)));
            let page = RemotePage::from_body(&request(page_size), Some(Value::Array(items))).unwrap();

            prop_assert_eq!(page.documents.len(), objects);
            prop_assert_eq!(page.received, objects + scalars);
            prop_assert_eq!(page.has_more, objects + scalars >= page_size as usize);
            prop_assert_eq!(page.next_cursor.is_some(), page.has_more);
        }
    }
}
