//! # Conference Testing
//!
//! Testing utilities for the conference registration core.
//!
//! In-memory implementations of every collaborator trait in `conference-core`
//! (store, announcement slot, dispatcher, identity), a frozen clock, and a
//! tracing initializer that writes through the test harness.
//!
//! ## Example
//!
//! ```ignore
//! use conference_testing::{InMemoryAggregateStore, RecordingDispatcher, test_clock};
//!
//! #[tokio::test]
//! async fn registration_flow() {
//!     let store = Arc::new(InMemoryAggregateStore::new());
//!     let dispatcher = Arc::new(RecordingDispatcher::new());
//!     let service = ConferenceService::new(store, dispatcher.clone(), ...);
//!
//!     service.register(&ada, conference_id).await.unwrap();
//!     assert_eq!(dispatcher.len(), 0);
//! }
//! ```

use chrono::{DateTime, Utc};
use conference_core::environment::Clock;

/// In-memory store and announcement slot
pub mod store_mocks;

/// Mock implementations of collaborator traits.
pub mod mocks {
    #![allow(clippy::unwrap_used)] // Lock poisoning only follows a failed test
    #![allow(clippy::missing_panics_doc)]

    use super::{Clock, DateTime, Utc};
    use conference_core::dispatch::{Task, TaskDispatcher};
    use conference_core::identity::{IdentityProvider, UserIdentity};
    use std::sync::Mutex;

    pub use crate::store_mocks::{InMemoryAggregateStore, InMemoryAnnouncementSlot, SlotOp};

    /// Clock frozen at one instant, so "today" is the same in every test.
    ///
    /// ```
    /// use conference_core::environment::Clock;
    /// use conference_testing::test_clock;
    ///
    /// let clock = test_clock();
    /// assert_eq!(clock.now().date_naive().to_string(), "2025-06-01");
    /// ```
    #[derive(Debug, Clone, Copy)]
    pub struct FixedClock(DateTime<Utc>);

    impl FixedClock {
        /// Freeze time at `instant`.
        #[must_use]
        pub const fn new(instant: DateTime<Utc>) -> Self {
            Self(instant)
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    /// 2025-06-01 09:00:00 UTC.
    const TEST_EPOCH_SECONDS: i64 = 1_748_768_400;

    /// The clock every fixture uses: 2025-06-01 09:00:00 UTC.
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(DateTime::from_timestamp(TEST_EPOCH_SECONDS, 0).unwrap_or_default())
    }

    /// Identity provider that always reports the same caller.
    #[derive(Debug, Clone, Default)]
    pub struct StaticIdentity {
        user: Option<UserIdentity>,
    }

    impl StaticIdentity {
        /// A provider with `user` signed in.
        #[must_use]
        pub const fn signed_in(user: UserIdentity) -> Self {
            Self { user: Some(user) }
        }

        /// A provider with nobody signed in.
        #[must_use]
        pub const fn anonymous() -> Self {
            Self { user: None }
        }
    }

    impl IdentityProvider for StaticIdentity {
        fn current_user(&self) -> Option<UserIdentity> {
            self.user.clone()
        }
    }

    /// Dispatcher that records submitted tasks instead of running them.
    #[derive(Debug, Default)]
    pub struct RecordingDispatcher {
        tasks: Mutex<Vec<Task>>,
    }

    impl RecordingDispatcher {
        /// Create an empty recorder.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// All submitted tasks, oldest first.
        #[must_use]
        pub fn tasks(&self) -> Vec<Task> {
            self.tasks.lock().unwrap().clone()
        }

        /// Submitted tasks addressed to `route`.
        #[must_use]
        pub fn tasks_for(&self, route: &str) -> Vec<Task> {
            self.tasks
                .lock()
                .unwrap()
                .iter()
                .filter(|task| task.route() == route)
                .cloned()
                .collect()
        }

        /// Remove and return every recorded task.
        pub fn drain(&self) -> Vec<Task> {
            std::mem::take(&mut *self.tasks.lock().unwrap())
        }

        /// Number of recorded tasks.
        #[must_use]
        pub fn len(&self) -> usize {
            self.tasks.lock().unwrap().len()
        }

        /// Whether nothing was submitted.
        #[must_use]
        pub fn is_empty(&self) -> bool {
            self.tasks.lock().unwrap().is_empty()
        }
    }

    impl TaskDispatcher for RecordingDispatcher {
        fn submit(&self, task: Task) {
            self.tasks.lock().unwrap().push(task);
        }
    }
}

/// Test helpers.
pub mod helpers {
    /// Install a `tracing` subscriber that writes through the test harness.
    ///
    /// Safe to call from every test; only the first call installs.
    pub fn init_test_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "warn".into()),
            )
            .with_test_writer()
            .try_init();
    }
}

pub use helpers::init_test_tracing;
pub use mocks::{
    FixedClock, InMemoryAggregateStore, InMemoryAnnouncementSlot, RecordingDispatcher, SlotOp,
    StaticIdentity, test_clock,
};

#[cfg(test)]
mod tests {
    use super::*;
    use conference_core::dispatch::{Task, TaskDispatcher};
    use conference_core::identity::{IdentityProvider, UserIdentity};

    #[test]
    fn test_clock_is_frozen_on_the_fixture_day() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());
        assert_eq!(clock.now().to_rfc3339(), "2025-06-01T09:00:00+00:00");
    }

    #[test]
    fn recording_dispatcher_filters_by_route() {
        let dispatcher = RecordingDispatcher::new();
        dispatcher.submit(Task::new("a"));
        dispatcher.submit(Task::new("b"));
        dispatcher.submit(Task::new("a"));

        assert_eq!(dispatcher.len(), 3);
        assert_eq!(dispatcher.tasks_for("a").len(), 2);
        assert_eq!(dispatcher.drain().len(), 3);
        assert!(dispatcher.is_empty());
    }

    #[test]
    fn static_identity() {
        let ada = UserIdentity::new("ada", "ada@example.com", "Ada");
        assert_eq!(StaticIdentity::signed_in(ada.clone()).current_user(), Some(ada));
        assert!(StaticIdentity::anonymous().require_user().is_err());
    }
}
