//! Batch committer.

use crate::error::{SyncError, SyncResult};
use mirror_catalog::{Record, ResourceDefinition};
use mirror_store::LocalStore;
use tracing::debug;

/// Buffers records and commits them to the store in fixed-size batches.
///
/// # Invariants
///
/// - Every commit is one `upsert_batch` call, hence one transaction
/// - The buffer never holds `batch_size` records after `accumulate` returns
/// - A failed commit keeps earlier batches; the failed one is dropped
pub struct BatchCommitter<'a> {
    store: &'a dyn LocalStore,
    table: &'a str,
    primary_key_field: &'a str,
    batch_size: usize,
    buffer: Vec<Record>,
    batches: usize,
    written: usize,
}

impl<'a> BatchCommitter<'a> {
    /// Creates a committer targeting the table of `definition`.
    ///
    /// # Errors
    ///
    /// Returns `Config` if `batch_size` is zero.
    pub fn new(
        store: &'a dyn LocalStore,
        definition: &'a ResourceDefinition,
        batch_size: usize,
    ) -> SyncResult<Self> {
        if batch_size == 0 {
            return Err(SyncError::config("batch size must be greater than zero"));
        }
        Ok(Self {
            store,
            table: definition.table,
            primary_key_field: definition.primary_key_field,
            batch_size,
            buffer: Vec::with_capacity(batch_size),
            batches: 0,
            written: 0,
        })
    }

    /// Adds a record, committing the buffer once it is full.
    pub fn accumulate(&mut self, record: Record) -> SyncResult<()> {
        self.buffer.push(record);
        if self.buffer.len() >= self.batch_size {
            self.commit()?;
        }
        Ok(())
    }

    /// Commits whatever is buffered. An empty buffer commits nothing.
    ///
    /// Returns the number of records committed by this call.
    pub fn flush(&mut self) -> SyncResult<usize> {
        if self.buffer.is_empty() {
            return Ok(0);
        }
        self.commit()
    }

    /// Number of batches committed so far.
    pub fn batches(&self) -> usize {
        self.batches
    }

    /// Number of records committed so far.
    pub fn records_written(&self) -> usize {
        self.written
    }

    /// Number of records waiting in the buffer.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    fn commit(&mut self) -> SyncResult<usize> {
        let batch = std::mem::take(&mut self.buffer);
        let written = self
            .store
            .upsert_batch(self.table, self.primary_key_field, &batch)?;
        self.batches += 1;
        self.written += written;
        self.buffer.reserve(self.batch_size);
        debug!(table = self.table, batch = self.batches, written, "batch committed");
        Ok(written)
    }
}
