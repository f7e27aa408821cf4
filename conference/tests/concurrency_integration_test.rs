//! Concurrency integration tests.
//!
//! Races for the last seats of a conference. Every registration touches two
//! aggregates; the optimistic transaction must never over-allocate or leave a
//! profile and a conference disagreeing about a seat.
//!
//! Run with: `cargo test --test concurrency_integration_test`

#![allow(clippy::unwrap_used)]

mod common;

use common::{harness_with, user};
use conference::{ConferenceDraft, ConferenceError, ConflictKind};
use futures::future::join_all;

/// Test 1: Last Seat Race
///
/// Two attendees register for the single remaining seat at the same time.
/// Exactly one wins; the other sees `SoldOut`.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_last_seat_goes_to_exactly_one_attendee() {
    let h = harness_with(|config| config.transactions.max_retries = 50);
    let conference = h
        .service
        .create_conference(&user("org"), ConferenceDraft::named("Tiny").max_attendees(1))
        .await
        .unwrap();
    let conference_id = conference.id;

    let contenders = ["a", "b"].map(|id| {
        let service = h.service.clone();
        tokio::spawn(async move { service.register(&user(id), conference_id).await })
    });
    let results: Vec<_> = join_all(contenders)
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();

    let winners = results.iter().filter(|r| r.is_ok()).count();
    let sold_out = results
        .iter()
        .filter(|r| matches!(r, Err(ConferenceError::Conflict(ConflictKind::SoldOut))))
        .count();
    assert_eq!((winners, sold_out), (1, 1));

    let after = h.service.get_conference(conference.id).await.unwrap();
    assert_eq!(after.seats_available, 0);
}

/// Test 2: Oversubscribed Conference
///
/// Twelve attendees race for five seats. Five registrations succeed, the rest
/// are sold out, and the registered profiles match the seats taken.
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_oversubscription_never_over_allocates() {
    let h = harness_with(|config| config.transactions.max_retries = 100);
    let conference = h
        .service
        .create_conference(&user("org"), ConferenceDraft::named("Popular").max_attendees(5))
        .await
        .unwrap();
    let conference_id = conference.id;

    let attendees: Vec<String> = (0..12).map(|i| format!("attendee-{i}")).collect();
    let handles: Vec<_> = attendees
        .iter()
        .map(|id| {
            let service = h.service.clone();
            let attendee = user(id);
            tokio::spawn(async move { service.register(&attendee, conference_id).await })
        })
        .collect();
    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 5);
    assert!(results
        .iter()
        .filter(|r| r.is_err())
        .all(|r| r.as_ref().unwrap_err().conflict() == Some(ConflictKind::SoldOut)));

    let mut registered = 0;
    for id in &attendees {
        let attending = h.service.conferences_to_attend(&user(id)).await.unwrap();
        registered += attending.len();
    }
    let after = h.service.get_conference(conference.id).await.unwrap();
    assert_eq!(registered, 5);
    assert_eq!(after.seats_available, 0);
    assert_eq!(after.seats_taken(), 5);
}

/// Test 3: Churn
///
/// Attendees register and unregister concurrently. Whatever the interleaving,
/// the seat counter ends up matching the number of registered profiles.
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_register_unregister_churn_keeps_counter_consistent() {
    let h = harness_with(|config| config.transactions.max_retries = 100);
    let conference = h
        .service
        .create_conference(&user("org"), ConferenceDraft::named("Churn").max_attendees(3))
        .await
        .unwrap();
    let conference_id = conference.id;

    let handles: Vec<_> = (0..6)
        .map(|i| {
            let service = h.service.clone();
            let attendee = user(&format!("churn-{i}"));
            tokio::spawn(async move {
                let _ = service.register(&attendee, conference_id).await;
                if i % 2 == 0 {
                    service.unregister(&attendee, conference_id).await.unwrap();
                }
            })
        })
        .collect();
    for handle in join_all(handles).await {
        handle.unwrap();
    }

    let mut registered = 0;
    for i in 0..6 {
        let attendee = user(&format!("churn-{i}"));
        registered += h.service.conferences_to_attend(&attendee).await.unwrap().len();
    }
    let after = h.service.get_conference(conference.id).await.unwrap();
    assert_eq!(after.seats_taken() as usize, registered);
    assert!(after.seats_available <= after.max_attendees);
}
