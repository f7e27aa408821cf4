//! Registration coordinator: seat allocation across two aggregates.
//!
//! Registering moves one seat from a [`Conference`] to a [`Profile`]. The two are
//! independent aggregates with independent writers, so both changes run in one
//! optimistic transaction: either the attendee holds the conference id *and* the
//! seat counter dropped, or neither happened.
//!
//! Conflicts and missing conferences abort the transaction and are returned as-is.
//! Lost commit races re-run the whole transaction; when the retry budget runs out
//! the caller gets [`ConferenceError::Transient`].

use crate::error::{ConferenceError, ConflictKind, Result};
use crate::ledger::SeatLedger;
use crate::metrics;
use crate::types::{Conference, ConferenceId, Profile, ProfileId};
use conference_core::identity::UserIdentity;
use conference_runtime::TransactionExecutor;

/// Successful registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registered {
    /// Seats left after taking this one.
    pub seats_available: u32,
}

/// Result of an unregister call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unregistered {
    /// `false` when the attendee was not registered (nothing changed).
    pub changed: bool,
}

/// Orchestrates the seat ledger and attendee registrations.
#[derive(Clone)]
pub struct RegistrationCoordinator {
    executor: TransactionExecutor,
}

impl RegistrationCoordinator {
    /// Create a coordinator running on `executor`.
    #[must_use]
    pub const fn new(executor: TransactionExecutor) -> Self {
        Self { executor }
    }

    /// Register the caller for `conference_id`.
    ///
    /// Creates the caller's profile on first use.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the conference does not exist
    /// - `Conflict(AlreadyRegistered)` / `Conflict(SoldOut)`
    /// - `Transient` if contention outlasted the retry budget
    #[tracing::instrument(skip(self, attendee), fields(attendee_id = %attendee.user_id))]
    pub async fn register(
        &self,
        attendee: &UserIdentity,
        conference_id: ConferenceId,
    ) -> Result<Registered> {
        let attendee = attendee.clone();

        let result = self
            .executor
            .run_atomic::<_, ConferenceError, _>("register", move |tx| {
                let attendee = attendee.clone();
                Box::pin(async move {
                    let profile_id = ProfileId::from(&attendee);
                    let mut profile = tx
                        .load_or_else::<Profile, _>(&profile_id, || {
                            Profile::from_identity(&attendee)
                        })
                        .await?;
                    let conference = tx
                        .load::<Conference>(&conference_id)
                        .await?
                        .ok_or_else(|| ConferenceError::not_found("conference", conference_id))?;

                    if profile.is_registered_for(conference_id) {
                        return Err(ConflictKind::AlreadyRegistered.into());
                    }

                    let conference = SeatLedger::try_allocate(conference)
                        .map_err(|_| ConferenceError::from(ConflictKind::SoldOut))?;
                    profile.conferences_to_attend.insert(conference_id);

                    tx.save(&profile)?;
                    tx.save(&conference)?;
                    Ok(Registered {
                        seats_available: conference.seats_available,
                    })
                })
            })
            .await
            .map_err(ConferenceError::from);

        match &result {
            Ok(registered) => {
                metrics::record_registration("registered");
                tracing::info!(seats_available = registered.seats_available, "Registered");
            }
            Err(ConferenceError::Conflict(ConflictKind::SoldOut)) => {
                metrics::record_registration("sold_out");
            }
            Err(ConferenceError::Conflict(_)) => metrics::record_registration("conflict"),
            Err(ConferenceError::Transient { .. }) => metrics::record_registration("transient"),
            Err(_) => metrics::record_registration("error"),
        }
        result
    }

    /// Release the caller's seat at `conference_id`.
    ///
    /// Unregistering when not registered is not an error: it reports
    /// `changed: false` and writes nothing. An unknown attendee gets no profile.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the conference does not exist
    /// - `Transient` if contention outlasted the retry budget
    #[tracing::instrument(skip(self, attendee), fields(attendee_id = %attendee.user_id))]
    pub async fn unregister(
        &self,
        attendee: &UserIdentity,
        conference_id: ConferenceId,
    ) -> Result<Unregistered> {
        let profile_id = ProfileId::from(attendee);

        let result = self
            .executor
            .run_atomic::<_, ConferenceError, _>("unregister", move |tx| {
                let profile_id = profile_id.clone();
                Box::pin(async move {
                    let profile = tx.load::<Profile>(&profile_id).await?;
                    let conference = tx
                        .load::<Conference>(&conference_id)
                        .await?
                        .ok_or_else(|| ConferenceError::not_found("conference", conference_id))?;

                    let Some(mut profile) =
                        profile.filter(|p| p.is_registered_for(conference_id))
                    else {
                        return Ok(Unregistered { changed: false });
                    };

                    profile.conferences_to_attend.remove(&conference_id);
                    let conference = SeatLedger::release(conference);

                    tx.save(&profile)?;
                    tx.save(&conference)?;
                    Ok(Unregistered { changed: true })
                })
            })
            .await
            .map_err(ConferenceError::from);

        if let Ok(Unregistered { changed: true }) = result {
            metrics::record_registration("unregistered");
            tracing::info!("Unregistered");
        }
        result
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use conference_core::aggregate::{self, Aggregate};
    use conference_core::store::{AggregateStore, CommitBatch};
    use conference_runtime::RetryPolicy;
    use conference_testing::InMemoryAggregateStore;
    use std::sync::Arc;
    use std::time::Duration;

    fn user(id: &str) -> UserIdentity {
        UserIdentity::new(id, format!("{id}@example.com"), id)
    }

    async fn setup(
        max: u32,
    ) -> (Arc<InMemoryAggregateStore>, RegistrationCoordinator, ConferenceId) {
        let store = Arc::new(InMemoryAggregateStore::new());
        let conference = Conference {
            id: ConferenceId::new(),
            organizer_id: ProfileId::new("org"),
            name: "E1".to_string(),
            description: None,
            topics: vec![],
            city: "Default City".to_string(),
            start_date: None,
            end_date: None,
            month: 0,
            max_attendees: max,
            seats_available: max,
        };
        let mut batch = CommitBatch::new();
        batch.put(conference.key(), aggregate::encode(&conference).unwrap());
        store.commit(batch).await.unwrap();

        let policy = RetryPolicy::builder()
            .max_retries(3)
            .initial_delay(Duration::from_millis(1))
            .build();
        let executor = TransactionExecutor::new(store.clone(), policy);
        (store, RegistrationCoordinator::new(executor), conference.id)
    }

    async fn stored<A: Aggregate>(store: &InMemoryAggregateStore, id: &A::Id) -> Option<A> {
        store
            .load(&A::key_for(id))
            .await
            .unwrap()
            .map(|record| aggregate::decode(&record.bytes).unwrap())
    }

    #[tokio::test]
    async fn register_takes_seat_and_records_conference() {
        let (store, coordinator, conference_id) = setup(2).await;

        let registered = coordinator.register(&user("a"), conference_id).await.unwrap();

        assert_eq!(registered.seats_available, 1);
        let profile: Profile = stored(&store, &ProfileId::new("a")).await.unwrap();
        assert!(profile.is_registered_for(conference_id));
        assert_eq!(profile.display_name, "a");
    }

    #[tokio::test]
    async fn register_twice_conflicts_without_mutation() {
        let (store, coordinator, conference_id) = setup(5).await;
        coordinator.register(&user("a"), conference_id).await.unwrap();

        let second = coordinator.register(&user("a"), conference_id).await;

        assert_eq!(second.unwrap_err().conflict(), Some(ConflictKind::AlreadyRegistered));
        let conference: Conference = stored(&store, &conference_id).await.unwrap();
        assert_eq!(conference.seats_available, 4);
    }

    #[tokio::test]
    async fn register_unknown_conference_is_not_found() {
        let (store, coordinator, _) = setup(1).await;

        let result = coordinator.register(&user("a"), ConferenceId::new()).await;

        assert!(matches!(result, Err(ConferenceError::NotFound { entity: "conference", .. })));
        assert!(stored::<Profile>(&store, &ProfileId::new("a")).await.is_none());
    }

    #[tokio::test]
    async fn unregister_unknown_attendee_reports_unchanged() {
        let (store, coordinator, conference_id) = setup(1).await;

        let result = coordinator.unregister(&user("ghost"), conference_id).await.unwrap();

        assert_eq!(result, Unregistered { changed: false });
        assert!(stored::<Profile>(&store, &ProfileId::new("ghost")).await.is_none());
    }

    #[tokio::test]
    async fn unregister_unknown_conference_is_not_found() {
        let (store, coordinator, conference_id) = setup(2).await;
        coordinator.register(&user("a"), conference_id).await.unwrap();

        let result = coordinator.unregister(&user("a"), ConferenceId::new()).await;

        assert!(matches!(result, Err(ConferenceError::NotFound { entity: "conference", .. })));
        let profile: Profile = stored(&store, &ProfileId::new("a")).await.unwrap();
        assert!(profile.is_registered_for(conference_id));
    }

    #[tokio::test]
    async fn register_then_unregister_restores_seats() {
        let (store, coordinator, conference_id) = setup(3).await;
        coordinator.register(&user("a"), conference_id).await.unwrap();

        let result = coordinator.unregister(&user("a"), conference_id).await.unwrap();

        assert!(result.changed);
        let conference: Conference = stored(&store, &conference_id).await.unwrap();
        assert_eq!(conference.seats_available, 3);
        let profile: Profile = stored(&store, &ProfileId::new("a")).await.unwrap();
        assert!(!profile.is_registered_for(conference_id));
    }

    #[tokio::test]
    async fn exhausted_contention_is_transient_and_writes_nothing() {
        let (store, coordinator, conference_id) = setup(3).await;
        store.fail_next_commits(100);

        let result = coordinator.register(&user("a"), conference_id).await;

        assert_eq!(result, Err(ConferenceError::Transient { attempts: 4 }));
        let conference: Conference = stored(&store, &conference_id).await.unwrap();
        assert_eq!(conference.seats_available, 3);
        assert!(stored::<Profile>(&store, &ProfileId::new("a")).await.is_none());
    }
}
