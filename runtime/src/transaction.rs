//! Optimistic multi-aggregate transactions.
//!
//! A [`Transaction`] buffers reads and writes against an [`AggregateStore`]:
//!
//! - Every aggregate read records the version it was read at (or its absence)
//! - Writes are staged in memory and are visible to later reads in the same transaction
//! - On commit, all expectations and all writes go to the store as one [`CommitBatch`]
//!
//! The [`TransactionExecutor`] runs a transaction body, commits it, and re-runs the
//! whole body from scratch when the commit loses a concurrency race. When the retry
//! budget is exhausted the caller gets [`TransactionError::Exhausted`] and nothing
//! was written.
//!
//! # Example
//!
//! ```ignore
//! let outcome = executor
//!     .run_atomic("register", move |tx| {
//!         Box::pin(async move {
//!             let mut conference: Conference = tx.load(&id).await?.ok_or(NotFound)?;
//!             conference.seats_available -= 1;
//!             tx.save(&conference)?;
//!             Ok(())
//!         })
//!     })
//!     .await;
//! ```

use crate::metrics::TransactionMetrics;
use crate::retry::{RetryPolicy, retry_while};
use conference_core::aggregate::{self, Aggregate, AggregateKey};
use conference_core::store::{AggregateStore, CommitBatch, StoreError, StoredRecord};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Boxed future returned by a transaction body.
pub type TxFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

enum Staged {
    Put(Vec<u8>),
    Delete,
}

/// A single attempt at an atomic unit of work.
///
/// Obtained only through [`TransactionExecutor::run_atomic`]; the executor owns
/// the commit.
pub struct Transaction {
    store: Arc<dyn AggregateStore>,
    observed: BTreeMap<AggregateKey, Option<StoredRecord>>,
    staged: BTreeMap<AggregateKey, Staged>,
}

impl Transaction {
    fn new(store: Arc<dyn AggregateStore>) -> Self {
        Self {
            store,
            observed: BTreeMap::new(),
            staged: BTreeMap::new(),
        }
    }

    /// Load an aggregate by id.
    ///
    /// Staged writes from this transaction take precedence over stored state.
    /// Repeated loads of the same aggregate hit the store only once.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails or the stored bytes do not decode.
    pub async fn load<A: Aggregate>(&mut self, id: &A::Id) -> Result<Option<A>, StoreError> {
        let key = A::key_for(id);

        if let Some(staged) = self.staged.get(&key) {
            return match staged {
                Staged::Put(bytes) => Ok(Some(aggregate::decode(bytes)?)),
                Staged::Delete => Ok(None),
            };
        }

        if !self.observed.contains_key(&key) {
            let record = self.store.load(&key).await?;
            self.observed.insert(key.clone(), record);
        }

        match self.observed.get(&key) {
            Some(Some(record)) => Ok(Some(aggregate::decode(&record.bytes)?)),
            _ => Ok(None),
        }
    }

    /// Load an aggregate, or build a fresh one with `init` when it does not exist.
    ///
    /// The fresh aggregate is not staged; call [`save`](Self::save) to persist it.
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load).
    pub async fn load_or_else<A, F>(&mut self, id: &A::Id, init: F) -> Result<A, StoreError>
    where
        A: Aggregate,
        F: FnOnce() -> A,
    {
        Ok(self.load::<A>(id).await?.unwrap_or_else(init))
    }

    /// Stage a write of `aggregate`.
    ///
    /// A write to an aggregate this transaction never read carries no version
    /// expectation.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialization`] if the aggregate cannot be encoded.
    pub fn save<A: Aggregate>(&mut self, aggregate: &A) -> Result<(), StoreError> {
        let bytes = aggregate::encode(aggregate)?;
        self.staged.insert(aggregate.key(), Staged::Put(bytes));
        Ok(())
    }

    /// Stage removal of an aggregate.
    pub fn delete<A: Aggregate>(&mut self, id: &A::Id) {
        self.staged.insert(A::key_for(id), Staged::Delete);
    }

    fn into_batch(self) -> (Arc<dyn AggregateStore>, CommitBatch) {
        let mut batch = CommitBatch::new();
        for (key, record) in self.observed {
            batch.expect(key, record.map(|r| r.version));
        }
        for (key, staged) in self.staged {
            match staged {
                Staged::Put(bytes) => batch.put(key, bytes),
                Staged::Delete => batch.delete(key),
            }
        }
        (self.store, batch)
    }

    async fn commit(self) -> Result<(), StoreError> {
        let (store, batch) = self.into_batch();
        store.commit(batch).await
    }
}

/// Errors returned by [`TransactionExecutor::run_atomic`].
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TransactionError<E> {
    /// The body returned an error; nothing was written.
    #[error("{0}")]
    Aborted(E),

    /// Every attempt lost a concurrency race; nothing was written.
    #[error("Transaction gave up after {attempts} attempts due to contention")]
    Exhausted {
        /// Number of attempts made.
        attempts: usize,
    },

    /// The store failed while committing.
    #[error("Store error: {0}")]
    Store(StoreError),
}

enum AttemptError<E> {
    Conflict(StoreError),
    Aborted(E),
    Store(StoreError),
}

impl<E: fmt::Display> fmt::Display for AttemptError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conflict(e) | Self::Store(e) => write!(f, "{e}"),
            Self::Aborted(e) => write!(f, "{e}"),
        }
    }
}

/// Runs transaction bodies atomically with optimistic retry.
#[derive(Clone)]
pub struct TransactionExecutor {
    store: Arc<dyn AggregateStore>,
    policy: RetryPolicy,
}

impl TransactionExecutor {
    /// Create an executor over `store` with the given retry budget.
    #[must_use]
    pub fn new(store: Arc<dyn AggregateStore>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    /// Read the latest committed state of one aggregate, outside any transaction.
    ///
    /// # Errors
    ///
    /// Store failures, or [`StoreError::Serialization`] when the bytes do not decode.
    pub async fn get<A: Aggregate>(&self, id: &A::Id) -> Result<Option<A>, StoreError> {
        match self.store.load(&A::key_for(id)).await? {
            Some(record) => Ok(Some(aggregate::decode(&record.bytes)?)),
            None => Ok(None),
        }
    }

    /// Run `body` as one atomic unit.
    ///
    /// The body may run several times; it must not perform side effects outside
    /// the [`Transaction`] it is given. Side effects belong after a successful return.
    ///
    /// # Errors
    ///
    /// - [`TransactionError::Aborted`]: the body returned an error
    /// - [`TransactionError::Exhausted`]: every attempt conflicted
    /// - [`TransactionError::Store`]: the commit failed for a non-conflict reason
    pub async fn run_atomic<T, E, F>(
        &self,
        name: &'static str,
        body: F,
    ) -> Result<T, TransactionError<E>>
    where
        F: for<'a> Fn(&'a mut Transaction) -> TxFuture<'a, T, E> + Sync,
        T: Send,
        E: fmt::Display + Send,
    {
        let started = Instant::now();
        let body = &body;

        let result = retry_while(
            &self.policy,
            || self.attempt(name, body),
            |err: &AttemptError<E>| matches!(err, AttemptError::Conflict(_)),
        )
        .await;

        match result {
            Ok(value) => {
                TransactionMetrics::record_commit(name, started.elapsed());
                Ok(value)
            }
            Err(AttemptError::Conflict(error)) => {
                TransactionMetrics::record_exhausted(name);
                tracing::warn!(transaction = name, %error, "Transaction exhausted retry budget");
                Err(TransactionError::Exhausted {
                    attempts: self.policy.max_retries + 1,
                })
            }
            Err(AttemptError::Aborted(error)) => Err(TransactionError::Aborted(error)),
            Err(AttemptError::Store(error)) => {
                tracing::error!(transaction = name, %error, "Transaction commit failed");
                Err(TransactionError::Store(error))
            }
        }
    }

    async fn attempt<T, E, F>(&self, name: &'static str, body: &F) -> Result<T, AttemptError<E>>
    where
        F: for<'a> Fn(&'a mut Transaction) -> TxFuture<'a, T, E> + Sync,
    {
        let mut tx = Transaction::new(Arc::clone(&self.store));
        let value = body(&mut tx).await.map_err(AttemptError::Aborted)?;

        match tx.commit().await {
            Ok(()) => Ok(value),
            Err(error) if error.is_conflict() => {
                TransactionMetrics::record_conflict(name);
                tracing::debug!(transaction = name, %error, "Commit conflicted");
                Err(AttemptError::Conflict(error))
            }
            Err(error) => Err(AttemptError::Store(error)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use conference_testing::mocks::InMemoryAggregateStore;
    use serde::{Deserialize, Serialize};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Counter {
        id: String,
        hits: u64,
    }

    impl Aggregate for Counter {
        type Id = String;
        const KIND: &'static str = "counter";

        fn id(&self) -> &String {
            &self.id
        }
    }

    fn fast_policy(max_retries: usize) -> RetryPolicy {
        RetryPolicy::builder()
            .max_retries(max_retries)
            .initial_delay(Duration::from_millis(1))
            .max_delay(Duration::from_millis(2))
            .build()
    }

    async fn increment(executor: &TransactionExecutor) -> Result<u64, TransactionError<StoreError>> {
        executor
            .run_atomic("increment", |tx| {
                Box::pin(async move {
                    let id = "home".to_string();
                    let mut counter = tx
                        .load_or_else::<Counter, _>(&id, || Counter {
                            id: id.clone(),
                            hits: 0,
                        })
                        .await?;
                    counter.hits += 1;
                    tx.save(&counter)?;
                    Ok(counter.hits)
                })
            })
            .await
    }

    #[tokio::test]
    async fn commit_persists_writes() {
        let store = Arc::new(InMemoryAggregateStore::new());
        let executor = TransactionExecutor::new(store.clone(), fast_policy(3));

        assert_eq!(increment(&executor).await.unwrap(), 1);
        assert_eq!(increment(&executor).await.unwrap(), 2);
        assert_eq!(store.len(), 1);

        let committed = executor.get::<Counter>(&"home".to_string()).await.unwrap();
        assert_eq!(committed.map(|c| c.hits), Some(2));
        assert!(executor.get::<Counter>(&"away".to_string()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reads_see_staged_writes() {
        let store = Arc::new(InMemoryAggregateStore::new());
        let executor = TransactionExecutor::new(store, fast_policy(0));

        let seen = executor
            .run_atomic("staged", |tx| {
                Box::pin(async move {
                    let id = "a".to_string();
                    tx.save(&Counter {
                        id: id.clone(),
                        hits: 9,
                    })?;
                    let reread = tx.load::<Counter>(&id).await?;
                    tx.delete::<Counter>(&id);
                    let gone = tx.load::<Counter>(&id).await?;
                    Ok::<_, StoreError>((reread.map(|c| c.hits), gone.is_none()))
                })
            })
            .await
            .unwrap();

        assert_eq!(seen, (Some(9), true));
    }

    #[tokio::test]
    async fn aborted_body_writes_nothing() {
        let store = Arc::new(InMemoryAggregateStore::new());
        let executor = TransactionExecutor::new(store.clone(), fast_policy(3));

        let result: Result<(), _> = executor
            .run_atomic("abort", |tx| {
                Box::pin(async move {
                    tx.save(&Counter {
                        id: "x".to_string(),
                        hits: 1,
                    })?;
                    Err::<(), _>(StoreError::Database("refused".to_string()))
                })
            })
            .await;

        assert!(matches!(result, Err(TransactionError::Aborted(_))));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn conflict_reruns_body() {
        let store = Arc::new(InMemoryAggregateStore::new());
        let executor = TransactionExecutor::new(store.clone(), fast_policy(3));
        store.fail_next_commits(2);

        let runs = Arc::new(AtomicUsize::new(0));
        let result = executor
            .run_atomic("retry", |tx| {
                let runs = Arc::clone(&runs);
                Box::pin(async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    tx.save(&Counter {
                        id: "r".to_string(),
                        hits: 1,
                    })?;
                    Ok::<_, StoreError>(())
                })
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_budget_reports_attempts() {
        let store = Arc::new(InMemoryAggregateStore::new());
        let executor = TransactionExecutor::new(store.clone(), fast_policy(2));
        store.fail_next_commits(10);

        let result = increment(&executor).await;

        assert_eq!(result, Err(TransactionError::Exhausted { attempts: 3 }));
        assert!(store.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_increments_are_serialized() {
        let store = Arc::new(InMemoryAggregateStore::new());
        let executor = Arc::new(TransactionExecutor::new(store, fast_policy(50)));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let executor = Arc::clone(&executor);
            handles.push(tokio::spawn(async move { increment(&executor).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(increment(&executor).await.unwrap(), 9);
    }
}
