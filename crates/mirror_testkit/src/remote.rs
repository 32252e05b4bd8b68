//! Scripted remote source.
//!
//! Unlike [`mirror_sync_engine::MockRemote`], which pages a fixed data set,
//! a [`ScriptedRemote`] answers each call from a per-endpoint script, so
//! tests can sequence failures, retries and odd page shapes exactly.

use mirror_catalog::{PageRequest, RemotePage};
use mirror_sync_engine::{classify_status, CancellationToken, RemoteSource, SyncError, SyncResult};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};

/// One scripted answer.
#[derive(Debug, Clone)]
pub enum Reply {
    /// A page of documents with an explicit continuation flag.
    Page {
        /// Documents returned.
        documents: Vec<Value>,
        /// Whether more pages follow.
        has_more: bool,
    },
    /// An HTTP error status, classified like the real source does.
    Status(u16),
    /// A request timeout.
    Timeout,
    /// A body that is not a page.
    Malformed,
}

impl Reply {
    /// A page that announces more pages.
    pub fn more(documents: Vec<Value>) -> Self {
        Reply::Page {
            documents,
            has_more: true,
        }
    }

    /// A final page.
    pub fn last(documents: Vec<Value>) -> Self {
        Reply::Page {
            documents,
            has_more: false,
        }
    }
}

#[derive(Debug)]
struct CancelTrigger {
    endpoint: String,
    after_calls: usize,
    token: CancellationToken,
}

/// A remote answering from scripts.
///
/// Calls to an endpoint whose script is exhausted return an empty final
/// page.
#[derive(Debug, Default)]
pub struct ScriptedRemote {
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<PageRequest>>,
    cancel_triggers: Mutex<Vec<CancelTrigger>>,
}

impl ScriptedRemote {
    /// Creates a remote with no scripts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends replies to the script of `endpoint`.
    pub fn script(&self, endpoint: &str, replies: impl IntoIterator<Item = Reply>) -> &Self {
        self.scripts
            .lock()
            .entry(endpoint.to_string())
            .or_default()
            .extend(replies);
        self
    }

    /// Cancels `token` once `endpoint` has been called `after_calls` times.
    pub fn cancel_after(&self, endpoint: &str, after_calls: usize, token: CancellationToken) {
        self.cancel_triggers.lock().push(CancelTrigger {
            endpoint: endpoint.to_string(),
            after_calls,
            token,
        });
    }

    /// Every request received so far.
    pub fn calls(&self) -> Vec<PageRequest> {
        self.calls.lock().clone()
    }

    /// Number of requests received for `endpoint`.
    pub fn call_count(&self, endpoint: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|r| r.endpoint == endpoint)
            .count()
    }
}

impl RemoteSource for ScriptedRemote {
    fn fetch_page(&self, request: &PageRequest) -> SyncResult<RemotePage> {
        let count = {
            let mut calls = self.calls.lock();
            calls.push(request.clone());
            calls.iter().filter(|r| r.endpoint == request.endpoint).count()
        };

        for trigger in self.cancel_triggers.lock().iter() {
            if trigger.endpoint == request.endpoint && count >= trigger.after_calls {
                trigger.token.cancel();
            }
        }

        let reply = self
            .scripts
            .lock()
            .get_mut(&request.endpoint)
            .and_then(VecDeque::pop_front);

        match reply {
            None => Ok(RemotePage::empty()),
            Some(Reply::Page {
                documents,
                has_more,
            }) => {
                let next = has_more.then(|| request.page + 1);
                Ok(RemotePage::new(documents, has_more, next))
            }
            Some(Reply::Status(status)) => Err(classify_status(status, "scripted failure")),
            Some(Reply::Timeout) => Err(SyncError::transport_retryable("operation timed out")),
            Some(Reply::Malformed) => Err(SyncError::Protocol(format!(
                "unexpected body from {}",
                request.endpoint
            ))),
        }
    }
}
