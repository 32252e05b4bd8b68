//! Remote source abstraction.

use crate::error::SyncResult;
use crate::http::classify_status;
use mirror_catalog::{parse_timestamp, PageRequest, RemotePage};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// A remote source serves pages of a resource.
///
/// This trait abstracts the network layer, allowing for different
/// implementations (HTTP, mock for testing, etc.).
///
/// # Errors
///
/// Implementations classify their failures:
/// - `Authentication` for rejected credentials
/// - `Transport { retryable: true }` for timeouts, connection failures,
///   throttling and server errors
/// - `Transport { retryable: false }` or `Protocol` for everything else
pub trait RemoteSource: Send + Sync {
    /// Fetches one page.
    fn fetch_page(&self, request: &PageRequest) -> SyncResult<RemotePage>;
}

impl<T: RemoteSource + ?Sized> RemoteSource for Arc<T> {
    fn fetch_page(&self, request: &PageRequest) -> SyncResult<RemotePage> {
        (**self).fetch_page(request)
    }
}

impl<T: RemoteSource + ?Sized> RemoteSource for Box<T> {
    fn fetch_page(&self, request: &PageRequest) -> SyncResult<RemotePage> {
        (**self).fetch_page(request)
    }
}

/// A mock remote for testing.
///
/// Serves documents registered per endpoint the way the real API pages
/// them: bare arrays of `page_size` items, the last one short. When a
/// request carries an incremental filter, documents whose filtered field is
/// older than `since` are left out.
#[derive(Debug, Default)]
pub struct MockRemote {
    documents: Mutex<HashMap<String, Vec<Value>>>,
    failures: Mutex<HashMap<String, u16>>,
    requests: Mutex<Vec<PageRequest>>,
}

impl MockRemote {
    /// Creates an empty mock remote.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the documents served for an endpoint.
    pub fn set_documents(&self, endpoint: &str, documents: Vec<Value>) {
        self.documents.lock().insert(endpoint.to_string(), documents);
    }

    /// Makes every request to `endpoint` fail as if the API answered `status`.
    pub fn fail_with_status(&self, endpoint: &str, status: u16) {
        self.failures.lock().insert(endpoint.to_string(), status);
    }

    /// Removes an injected failure.
    pub fn clear_failure(&self, endpoint: &str) {
        self.failures.lock().remove(endpoint);
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<PageRequest> {
        self.requests.lock().clone()
    }

    /// Number of requests received for `endpoint`.
    pub fn request_count(&self, endpoint: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.endpoint == endpoint)
            .count()
    }
}

impl RemoteSource for MockRemote {
    fn fetch_page(&self, request: &PageRequest) -> SyncResult<RemotePage> {
        self.requests.lock().push(request.clone());

        if let Some(status) = self.failures.lock().get(&request.endpoint) {
            return Err(classify_status(*status, "injected failure"));
        }

        let documents = self.documents.lock();
        let Some(all) = documents.get(&request.endpoint) else {
            return Ok(RemotePage::empty());
        };

        let visible: Vec<&Value> = match (&request.filter_field, &request.since) {
            (Some(field), Some(since)) => {
                let field = field.trim_end_matches("__gte");
                all.iter()
                    .filter(|doc| {
                        doc.get(field)
                            .and_then(Value::as_str)
                            .and_then(parse_timestamp)
                            .map_or(true, |ts| ts >= *since)
                    })
                    .collect()
            }
            _ => all.iter().collect(),
        };

        let size = request.page_size.max(1) as usize;
        let start = (request.page.max(1) as usize - 1).saturating_mul(size);
        let page: Vec<Value> = visible.iter().skip(start).take(size).map(|d| (*d).clone()).collect();
        let has_more = start + page.len() < visible.len();
        let next_cursor = has_more.then(|| request.page + 1);
        Ok(RemotePage::new(page, has_more, next_cursor))
    }
}
