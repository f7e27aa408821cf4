//! # Conference Core
//!
//! Storage, versioning and collaborator traits for the conference registration core.
//!
//! The registration core (in the `conference` crate) is a functional core wrapped
//! around a small set of external collaborators. This crate defines those
//! collaborators so the domain logic never depends on a concrete backend.
//!
//! ## Core Concepts
//!
//! - **Aggregate**: independently owned, independently versioned persisted state
//! - **Aggregate store**: versioned load, atomic batch commit, kind scans
//! - **Announcement slot**: external key-value side channel for derived strings
//! - **Task dispatcher**: fire-and-forget background work
//! - **Identity provider**: the already-authenticated caller
//! - **Clock**: injected time source
//!
//! ## Example
//!
//! ```ignore
//! use conference_core::aggregate::Aggregate;
//! use conference_core::store::AggregateStore;
//!
//! async fn exists<A: Aggregate>(store: &dyn AggregateStore, id: &A::Id) -> bool {
//!     matches!(store.load(&A::key_for(id)).await, Ok(Some(_)))
//! }
//! ```

pub use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
pub use serde::{Deserialize, Serialize};

pub mod aggregate;
pub mod announcement;
pub mod dispatch;
pub mod identity;
pub mod store;

/// Injected time.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Source of "now".
    ///
    /// Date-relative queries (upcoming sessions) read the clock instead of the
    /// system time so tests can freeze it; see `conference_testing::FixedClock`.
    pub trait Clock: Send + Sync {
        /// The current instant.
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
