//! In-memory storage collaborators for fast, deterministic tests.
//!
//! - [`InMemoryAggregateStore`]: versioned `BTreeMap` store with atomic batch commit
//!   and injectable concurrency conflicts
//! - [`InMemoryAnnouncementSlot`]: key-value slot that records every operation

#![allow(clippy::unwrap_used)] // Lock poisoning only follows a failed test
#![allow(clippy::missing_panics_doc)] // Lock poisoning only happens after a test already panicked

use conference_core::aggregate::{AggregateKey, Version};
use conference_core::announcement::AnnouncementSlot;
use conference_core::store::{AggregateStore, CommitBatch, StoreError, StoredRecord, Write};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

#[derive(Debug, Default)]
struct StoreState {
    records: BTreeMap<AggregateKey, StoredRecord>,
    // Highest version ever assigned per key, so a deleted-then-recreated
    // aggregate never reuses an old version.
    high_water: BTreeMap<AggregateKey, Version>,
}

/// In-memory aggregate store for testing.
///
/// Commits are serialized behind a single write lock, which makes the
/// expectation check and the writes one atomic step.
///
/// # Example
///
/// ```
/// use conference_testing::InMemoryAggregateStore;
/// use conference_core::aggregate::{AggregateKey, Version};
/// use conference_core::store::{AggregateStore, CommitBatch};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = InMemoryAggregateStore::new();
/// let key = AggregateKey::new("counter", "home");
///
/// let mut batch = CommitBatch::new();
/// batch.expect(key.clone(), None);
/// batch.put(key.clone(), vec![1, 2, 3]);
/// store.commit(batch).await?;
///
/// assert_eq!(store.version_of(&key), Some(Version::FIRST));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryAggregateStore {
    state: Arc<RwLock<StoreState>>,
    injected_conflicts: Arc<AtomicUsize>,
    commits: Arc<AtomicUsize>,
}

impl InMemoryAggregateStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the next `count` commits with a concurrency conflict.
    ///
    /// Simulates contention from writers outside the test.
    pub fn fail_next_commits(&self, count: usize) {
        self.injected_conflicts.store(count, Ordering::SeqCst);
    }

    /// Number of successfully applied commits.
    #[must_use]
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Current version of `key`, if present.
    #[must_use]
    pub fn version_of(&self, key: &AggregateKey) -> Option<Version> {
        self.state
            .read()
            .unwrap()
            .records
            .get(key)
            .map(|record| record.version)
    }

    /// Whether `key` is present.
    #[must_use]
    pub fn contains(&self, key: &AggregateKey) -> bool {
        self.state.read().unwrap().records.contains_key(key)
    }

    /// Number of stored aggregates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().unwrap().records.len()
    }

    /// Check if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.read().unwrap().records.is_empty()
    }

    fn take_injected_conflict(&self) -> bool {
        self.injected_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn apply(&self, batch: &CommitBatch) -> Result<(), StoreError> {
        if self.take_injected_conflict() {
            let key = batch
                .writes()
                .first()
                .map(|(key, _)| key.clone())
                .or_else(|| batch.expectations().first().map(|(key, _)| key.clone()))
                .unwrap_or_else(|| AggregateKey::new("injected", "conflict"));
            return Err(StoreError::ConcurrencyConflict {
                key,
                expected: None,
                actual: None,
            });
        }

        let mut state = self.state.write().unwrap();

        for (key, expected) in batch.expectations() {
            let actual = state.records.get(key).map(|record| record.version);
            if actual != *expected {
                return Err(StoreError::ConcurrencyConflict {
                    key: key.clone(),
                    expected: *expected,
                    actual,
                });
            }
        }

        for (key, write) in batch.writes() {
            match write {
                Write::Put(bytes) => {
                    let version = state
                        .high_water
                        .get(key)
                        .map_or(Version::FIRST, |v| v.next());
                    state.high_water.insert(key.clone(), version);
                    state.records.insert(
                        key.clone(),
                        StoredRecord {
                            version,
                            bytes: bytes.clone(),
                        },
                    );
                }
                Write::Delete => {
                    state.records.remove(key);
                }
            }
        }

        if !batch.is_read_only() {
            self.commits.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

impl AggregateStore for InMemoryAggregateStore {
    fn load(
        &self,
        key: &AggregateKey,
    ) -> Pin<Box<dyn Future<Output = Result<Option<StoredRecord>, StoreError>> + Send + '_>> {
        let key = key.clone();
        Box::pin(async move { Ok(self.state.read().unwrap().records.get(&key).cloned()) })
    }

    fn commit(
        &self,
        batch: CommitBatch,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(async move { self.apply(&batch) })
    }

    fn scan(
        &self,
        kind: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<StoredRecord>, StoreError>> + Send + '_>> {
        let kind = kind.to_string();
        Box::pin(async move {
            Ok(self
                .state
                .read()
                .unwrap()
                .records
                .iter()
                .filter(|(key, _)| key.kind() == kind)
                .map(|(_, record)| record.clone())
                .collect())
        })
    }
}

/// One recorded operation on an [`InMemoryAnnouncementSlot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotOp {
    /// `set(key, value)`
    Set(String, String),
    /// `clear(key)`
    Clear(String),
}

/// In-memory announcement slot that keeps an operation log.
///
/// The log lets tests assert publish ordering (clear-then-set).
#[derive(Clone, Debug, Default)]
pub struct InMemoryAnnouncementSlot {
    values: Arc<RwLock<HashMap<String, String>>>,
    ops: Arc<RwLock<Vec<SlotOp>>>,
}

impl InMemoryAnnouncementSlot {
    /// Create an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value under `key`.
    #[must_use]
    pub fn value(&self, key: &str) -> Option<String> {
        self.values.read().unwrap().get(key).cloned()
    }

    /// Every operation so far, oldest first.
    #[must_use]
    pub fn ops(&self) -> Vec<SlotOp> {
        self.ops.read().unwrap().clone()
    }

    /// Forget the operation log, keeping values.
    pub fn reset_ops(&self) {
        self.ops.write().unwrap().clear();
    }
}

impl AnnouncementSlot for InMemoryAnnouncementSlot {
    fn set(&self, key: &str, value: String) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            self.ops
                .write()
                .unwrap()
                .push(SlotOp::Set(key.clone(), value.clone()));
            self.values.write().unwrap().insert(key, value);
        })
    }

    fn clear(&self, key: &str) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            self.ops.write().unwrap().push(SlotOp::Clear(key.clone()));
            self.values.write().unwrap().remove(&key);
        })
    }

    fn get(&self, key: &str) -> Pin<Box<dyn Future<Output = Option<String>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move { self.values.read().unwrap().get(&key).cloned() })
    }
}
