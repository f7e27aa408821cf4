//! # Conference Runtime
//!
//! Runtime plumbing for the conference registration core.
//!
//! ## Core Components
//!
//! - **Transaction executor**: optimistic multi-aggregate transactions with retry
//! - **Retry policy**: exponential backoff bounding how often a conflicting commit is re-run
//! - **Channel dispatcher**: in-process fire-and-forget task delivery
//! - **Metrics**: Prometheus recorder and transaction counters
//!
//! ## Example
//!
//! ```ignore
//! use conference_runtime::{RetryPolicy, TransactionExecutor};
//!
//! let executor = TransactionExecutor::new(store, RetryPolicy::default());
//! let seats = executor
//!     .run_atomic("seats", move |tx| {
//!         Box::pin(async move {
//!             let conference: Option<Conference> = tx.load(&id).await?;
//!             Ok::<_, StoreError>(conference.map(|c| c.seats_available))
//!         })
//!     })
//!     .await?;
//! ```

/// In-process task dispatch
pub mod dispatcher;

/// Prometheus metrics for observability
pub mod metrics;

/// Retry logic with exponential backoff
pub mod retry;

/// Optimistic transactions over the aggregate store
pub mod transaction;

pub use dispatcher::{ChannelDispatcher, TaskReceiver};
pub use retry::RetryPolicy;
pub use transaction::{Transaction, TransactionError, TransactionExecutor, TxFuture};
