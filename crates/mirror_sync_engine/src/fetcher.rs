//! Paginated fetcher.

use crate::config::RetryConfig;
use crate::error::{SyncError, SyncResult};
use crate::transport::RemoteSource;
use chrono::{DateTime, Utc};
use mirror_catalog::{Page, PageRequest, Record, RemotePage, ResourceDefinition};
use tracing::{debug, warn};

/// Walks the pages of a resource through a [`RemoteSource`].
///
/// The fetcher owns only the pagination state and the stop condition; the
/// source does the talking.
pub struct Fetcher<'a> {
    remote: &'a dyn RemoteSource,
    retry: RetryConfig,
}

impl<'a> Fetcher<'a> {
    /// Creates a fetcher.
    pub fn new(remote: &'a dyn RemoteSource, retry: RetryConfig) -> Self {
        Self { remote, retry }
    }

    /// Returns a lazy iterator over the pages of `definition`.
    ///
    /// `since = None` means a full scan. `page_size` is clamped to the
    /// resource's cap.
    ///
    /// # Errors
    ///
    /// Returns `Config` if `page_size` is zero.
    ///
    /// # Iteration
    ///
    /// The iterator ends after a short page, an empty page or a page the
    /// remote marked as the last one. Page length is what the upstream
    /// sent, before non-object items are dropped. The final page is still
    /// yielded. After yielding an error it yields `None`.
    pub fn pages(
        &self,
        definition: &'a ResourceDefinition,
        since: Option<DateTime<Utc>>,
        page_size: u32,
    ) -> SyncResult<PageIter<'a>> {
        if page_size == 0 {
            return Err(SyncError::config("page size must be greater than zero"));
        }

        Ok(PageIter {
            remote: self.remote,
            retry: self.retry.clone(),
            definition,
            since: since.filter(|_| definition.supports_incremental()),
            page_size: definition.effective_page_size(page_size),
            next_page: 1,
            done: false,
        })
    }
}

/// Iterator returned by [`Fetcher::pages`].
pub struct PageIter<'a> {
    remote: &'a dyn RemoteSource,
    retry: RetryConfig,
    definition: &'a ResourceDefinition,
    since: Option<DateTime<Utc>>,
    page_size: u32,
    next_page: u32,
    done: bool,
}

impl PageIter<'_> {
    /// The effective page size after clamping.
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    fn fetch_with_retry(&self, request: &PageRequest) -> SyncResult<RemotePage> {
        let name = self.definition.name;
        let mut attempt = 0;

        loop {
            if attempt > 0 {
                let delay = self.retry.delay_for_attempt(attempt);
                std::thread::sleep(delay);
            }

            match self.remote.fetch_page(request) {
                Ok(page) => return Ok(page),
                Err(e) if e.is_retryable() && attempt + 1 < self.retry.max_attempts => {
                    warn!(resource = %name, page = request.page, attempt = attempt + 1, error = %e, "retrying page");
                    attempt += 1;
                }
                Err(e) => return Err(into_taxonomy(name, e, attempt + 1)),
            }
        }
    }

    fn to_page(&self, remote: RemotePage) -> Page {
        let fetched_at = Utc::now();
        let total = remote.documents.len();
        let records: Vec<Record> = remote
            .documents
            .into_iter()
            .filter_map(|doc| Record::from_document(self.definition, doc, fetched_at))
            .collect();

        let skipped = total - records.len();
        if skipped > 0 {
            warn!(resource = %self.definition.name, skipped, "documents without identifier skipped");
            debug!(
                resource = %self.definition.name,
                fields = ?self.definition.id_candidates(),
                "identifier fields tried"
            );
        }

        Page {
            records,
            has_more: remote.has_more,
            next_cursor: remote.next_cursor,
            skipped,
        }
    }
}

impl Iterator for PageIter<'_> {
    type Item = SyncResult<Page>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let request =
            PageRequest::for_resource(self.definition, self.since, self.page_size, self.next_page);
        let remote = match self.fetch_with_retry(&request) {
            Ok(remote) => remote,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };

        let received = remote.received;
        debug!(
            resource = %self.definition.name,
            page = self.next_page,
            received,
            documents = remote.documents.len(),
            has_more = remote.has_more,
            "page received"
        );

        if received == 0 || received < self.page_size as usize || !remote.has_more {
            self.done = true;
        } else {
            self.next_page = remote
                .next_cursor
                .filter(|next| *next > self.next_page)
                .unwrap_or(self.next_page + 1);
        }

        Some(Ok(self.to_page(remote)))
    }
}

impl std::iter::FusedIterator for PageIter<'_> {}

/// Maps a collaborator error into the run taxonomy.
fn into_taxonomy(resource: &str, err: SyncError, attempts: u32) -> SyncError {
    match err {
        SyncError::Transport { message, retryable } => SyncError::Fetch {
            resource: resource.to_string(),
            message: if retryable {
                format!("giving up after {attempts} attempt(s): {message}")
            } else {
                message
            },
        },
        SyncError::Protocol(message) => SyncError::Fetch {
            resource: resource.to_string(),
            message,
        },
        other => other,
    }
}
