//! Registration scenario tests.
//!
//! Walks attendees through a small conference end to end: seats taken down to
//! sold out, seats given back, and storage contention surfacing as a retryable
//! error.

#![allow(clippy::unwrap_used)]

mod common;

use common::{harness, user};
use conference::{ConferenceDraft, ConferenceError, ConflictKind};

/// Test 1: Sold Out and Back
///
/// A conference with two seats: A and B register, C is turned away, A leaves
/// and a seat opens up again.
#[tokio::test]
async fn test_two_seat_conference_sells_out_and_reopens() {
    let h = harness();
    let conference = h
        .service
        .create_conference(&user("org"), ConferenceDraft::named("Small").max_attendees(2))
        .await
        .unwrap();

    let a = h.service.register(&user("a"), conference.id).await.unwrap();
    assert_eq!(a.seats_available, 1);
    let b = h.service.register(&user("b"), conference.id).await.unwrap();
    assert_eq!(b.seats_available, 0);

    let c = h.service.register(&user("c"), conference.id).await;
    assert_eq!(c.unwrap_err(), ConferenceError::Conflict(ConflictKind::SoldOut));

    let left = h.service.unregister(&user("a"), conference.id).await.unwrap();
    assert!(left.changed);
    let after = h.service.get_conference(conference.id).await.unwrap();
    assert_eq!(after.seats_available, 1);

    // The freed seat goes to the next attendee.
    let c = h.service.register(&user("c"), conference.id).await.unwrap();
    assert_eq!(c.seats_available, 0);
}

/// Test 2: Registering Twice
#[tokio::test]
async fn test_second_registration_is_a_conflict_and_keeps_the_seat_count() {
    let h = harness();
    let conference = h
        .service
        .create_conference(&user("org"), ConferenceDraft::named("Twice").max_attendees(5))
        .await
        .unwrap();

    h.service.register(&user("a"), conference.id).await.unwrap();
    let again = h.service.register(&user("a"), conference.id).await;

    assert_eq!(again.unwrap_err().conflict(), Some(ConflictKind::AlreadyRegistered));
    let after = h.service.get_conference(conference.id).await.unwrap();
    assert_eq!(after.seats_available, 4);
}

/// Test 3: Unregister Without Registration
///
/// Leaving a conference you never joined changes nothing and creates no profile.
#[tokio::test]
async fn test_unregister_without_registration_changes_nothing() {
    let h = harness();
    let conference = h
        .service
        .create_conference(&user("org"), ConferenceDraft::named("Quiet").max_attendees(3))
        .await
        .unwrap();
    let stored = h.store.len();

    let result = h.service.unregister(&user("stranger"), conference.id).await.unwrap();

    assert!(!result.changed);
    assert_eq!(h.store.len(), stored);
    let after = h.service.get_conference(conference.id).await.unwrap();
    assert_eq!(after.seats_available, 3);
}

/// Test 4: Unknown Conference
#[tokio::test]
async fn test_register_for_unknown_conference_is_not_found() {
    let h = harness();
    let missing = conference::ConferenceId::new();

    let result = h.service.register(&user("a"), missing).await;

    assert!(matches!(
        result,
        Err(ConferenceError::NotFound { entity: "conference", .. })
    ));
    assert!(h.service.conferences_to_attend(&user("a")).await.unwrap().is_empty());
}

/// Test 5: Contention Outlasting the Retry Budget
///
/// When every commit hits a version conflict the caller gets a retryable
/// error and no seat is taken.
#[tokio::test]
async fn test_exhausted_retries_surface_as_transient() {
    let h = harness();
    let conference = h
        .service
        .create_conference(&user("org"), ConferenceDraft::named("Busy").max_attendees(3))
        .await
        .unwrap();

    h.store.fail_next_commits(1_000);
    let result = h.service.register(&user("a"), conference.id).await;
    h.store.fail_next_commits(0);

    let error = result.unwrap_err();
    assert!(error.is_retryable());
    assert!(matches!(error, ConferenceError::Transient { .. }));
    let after = h.service.get_conference(conference.id).await.unwrap();
    assert_eq!(after.seats_available, 3);
}

/// Test 6: Brief Contention Is Absorbed
#[tokio::test]
async fn test_transient_conflicts_are_retried_transparently() {
    let h = harness();
    let conference = h
        .service
        .create_conference(&user("org"), ConferenceDraft::named("Retry").max_attendees(3))
        .await
        .unwrap();

    h.store.fail_next_commits(2);
    let registered = h.service.register(&user("a"), conference.id).await.unwrap();

    assert_eq!(registered.seats_available, 2);
}

/// Test 7: Conferences to Attend
#[tokio::test]
async fn test_conferences_to_attend_follows_registrations() {
    let h = harness();
    let org = user("org");
    let first = h
        .service
        .create_conference(&org, ConferenceDraft::named("First").max_attendees(10))
        .await
        .unwrap();
    let second = h
        .service
        .create_conference(&org, ConferenceDraft::named("Second").max_attendees(10))
        .await
        .unwrap();
    let attendee = user("a");

    h.service.register(&attendee, first.id).await.unwrap();
    h.service.register(&attendee, second.id).await.unwrap();
    let mut names: Vec<_> = h
        .service
        .conferences_to_attend(&attendee)
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect();
    names.sort();
    assert_eq!(names, vec!["First", "Second"]);

    h.service.unregister(&attendee, first.id).await.unwrap();
    let attending = h.service.conferences_to_attend(&attendee).await.unwrap();
    assert_eq!(attending.len(), 1);
    assert_eq!(attending[0].id, second.id);
}
