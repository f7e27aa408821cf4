//! Aggregate store trait and related types.
//!
//! The store is the persistence collaborator of the registration core. It is
//! deliberately minimal:
//!
//! - Load one aggregate's current bytes and version
//! - Commit a batch of writes atomically, guarded by version expectations
//! - Scan all aggregates of one kind (for query executors)
//!
//! Higher-level transactions (`run_atomic`) are built on top of these primitives
//! in `conference-runtime`.
//!
//! # Optimistic concurrency
//!
//! A [`CommitBatch`] records, for every aggregate the caller read, the version it
//! observed (`None` if the aggregate did not exist). The store applies the writes
//! only if every expectation still holds; otherwise it rejects the whole batch with
//! [`StoreError::ConcurrencyConflict`] and nothing is written.
//!
//! # Example
//!
//! ```no_run
//! use conference_core::aggregate::AggregateKey;
//! use conference_core::store::{AggregateStore, CommitBatch, StoreError};
//!
//! async fn bump<S: AggregateStore>(store: &S, bytes: Vec<u8>) -> Result<(), StoreError> {
//!     let key = AggregateKey::new("counter", "home");
//!     let current = store.load(&key).await?;
//!
//!     let mut batch = CommitBatch::new();
//!     batch.expect(key.clone(), current.map(|record| record.version));
//!     batch.put(key, bytes);
//!     store.commit(batch).await
//! }
//! ```

use crate::aggregate::{AggregateKey, CodecError, Version};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during aggregate store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Optimistic concurrency conflict: an aggregate changed after it was read.
    #[error("Concurrency conflict on {key}: expected version {expected:?}, found {actual:?}")]
    ConcurrencyConflict {
        /// The aggregate whose version moved.
        key: AggregateKey,
        /// The version observed when it was read (`None` = absent).
        expected: Option<Version>,
        /// The version found at commit time (`None` = absent).
        actual: Option<Version>,
    },

    /// Backend connection or I/O failure.
    #[error("Database error: {0}")]
    Database(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Whether this error is storage contention that a fresh attempt may resolve.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }
}

impl From<CodecError> for StoreError {
    fn from(error: CodecError) -> Self {
        Self::Serialization(error.to_string())
    }
}

/// The stored bytes of one aggregate together with its committed version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    /// Version at which these bytes were committed.
    pub version: Version,
    /// `bincode` encoding of the aggregate.
    pub bytes: Vec<u8>,
}

/// A single write inside a [`CommitBatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Write {
    /// Insert or replace the aggregate's bytes.
    Put(Vec<u8>),
    /// Remove the aggregate.
    Delete,
}

/// All-or-nothing unit of work submitted to [`AggregateStore::commit`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitBatch {
    expectations: Vec<(AggregateKey, Option<Version>)>,
    writes: Vec<(AggregateKey, Write)>,
}

impl CommitBatch {
    /// Create an empty batch.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            expectations: Vec::new(),
            writes: Vec::new(),
        }
    }

    /// Require `key` to still be at `version` (`None` = still absent) at commit time.
    pub fn expect(&mut self, key: AggregateKey, version: Option<Version>) {
        self.expectations.push((key, version));
    }

    /// Store `bytes` under `key`.
    pub fn put(&mut self, key: AggregateKey, bytes: Vec<u8>) {
        self.writes.push((key, Write::Put(bytes)));
    }

    /// Remove the aggregate under `key`.
    pub fn delete(&mut self, key: AggregateKey) {
        self.writes.push((key, Write::Delete));
    }

    /// Version expectations in insertion order.
    #[must_use]
    pub fn expectations(&self) -> &[(AggregateKey, Option<Version>)] {
        &self.expectations
    }

    /// Writes in insertion order.
    #[must_use]
    pub fn writes(&self) -> &[(AggregateKey, Write)] {
        &self.writes
    }

    /// Whether the batch contains no writes.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.writes.is_empty()
    }
}

/// Aggregate store abstraction.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; one store instance is shared by every
/// concurrent caller.
///
/// # Dyn Compatibility
///
/// Methods return `Pin<Box<dyn Future>>` instead of using `async fn` so the trait
/// can be used as `Arc<dyn AggregateStore>`.
pub trait AggregateStore: Send + Sync {
    /// Load the current record for `key`.
    ///
    /// Returns `Ok(None)` when the aggregate does not exist.
    ///
    /// # Errors
    ///
    /// - `Database`: backend failure
    fn load(
        &self,
        key: &AggregateKey,
    ) -> Pin<Box<dyn Future<Output = Result<Option<StoredRecord>, StoreError>> + Send + '_>>;

    /// Atomically apply a batch.
    ///
    /// Every expectation is checked first; if any aggregate moved, nothing is written.
    /// Each `Put` bumps the aggregate's version by one (new aggregates start at
    /// [`Version::FIRST`]).
    ///
    /// # Errors
    ///
    /// - `ConcurrencyConflict`: an expectation no longer holds
    /// - `Database`: backend failure
    fn commit(
        &self,
        batch: CommitBatch,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>>;

    /// Return every record of the given kind, ordered by id.
    ///
    /// This is the primitive query executors are built on; it is not part of the
    /// transactional path.
    ///
    /// # Errors
    ///
    /// - `Database`: backend failure
    fn scan(
        &self,
        kind: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<StoredRecord>, StoreError>> + Send + '_>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concurrency_conflict_error_display() {
        let error = StoreError::ConcurrencyConflict {
            key: AggregateKey::new("conference", "c1"),
            expected: Some(Version::new(3)),
            actual: Some(Version::new(4)),
        };

        let display = format!("{error}");
        assert!(display.contains("conference/c1"));
        assert!(display.contains("Some(Version(3))"));
        assert!(error.is_conflict());
    }

    #[test]
    fn database_error_is_not_conflict() {
        assert!(!StoreError::Database("down".to_string()).is_conflict());
    }

    #[test]
    fn batch_records_expectations_and_writes_in_order() {
        let mut batch = CommitBatch::new();
        assert!(batch.is_read_only());

        batch.expect(AggregateKey::new("profile", "a"), None);
        batch.put(AggregateKey::new("profile", "a"), vec![1]);
        batch.delete(AggregateKey::new("session", "s"));

        assert_eq!(batch.expectations().len(), 1);
        assert_eq!(batch.writes().len(), 2);
        assert_eq!(batch.writes()[1].1, Write::Delete);
        assert!(!batch.is_read_only());
    }
}
