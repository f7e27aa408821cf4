//! Announcement tests.
//!
//! The featured-speaker slot is driven by the task the service dispatches
//! after each new session; the nearly-sold-out slot is refreshed on demand.

#![allow(clippy::unwrap_used)]

mod common;

use chrono::NaiveTime;
use common::{harness, harness_with, user};
use conference::{ConferenceDraft, SessionDraft, SpeakerDraft};
use conference_core::announcement::{FEATURED_SPEAKER_KEY, RECENT_ANNOUNCEMENTS_KEY};
use conference_testing::SlotOp;

fn time(h: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, 0, 0).unwrap()
}

/// Test 1: Second Session Features the Speaker
///
/// One session leaves the slot cleared; the second publishes both names in
/// start order, clearing before setting.
#[tokio::test]
async fn test_second_session_publishes_featured_speaker() {
    let h = harness();
    let org = user("org");
    let conference = h
        .service
        .create_conference(&org, ConferenceDraft::named("RustConf"))
        .await
        .unwrap();
    let speaker = h
        .service
        .create_speaker(&org, SpeakerDraft::named("Ferris"))
        .await
        .unwrap();

    h.service
        .create_session(
            &org,
            conference.id,
            speaker.id,
            SessionDraft::named("Async").at(time(14)),
        )
        .await
        .unwrap();
    h.run_tasks().await;
    assert_eq!(h.service.featured_speaker().await, "");
    assert_eq!(h.slot.ops(), vec![SlotOp::Clear(FEATURED_SPEAKER_KEY.to_string())]);

    h.slot.reset_ops();
    h.service
        .create_session(
            &org,
            conference.id,
            speaker.id,
            SessionDraft::named("Borrowing").at(time(10)),
        )
        .await
        .unwrap();
    assert_eq!(h.run_tasks().await, 1);

    let expected = "Now at RustConf, attend these sessions from speaker Ferris: Borrowing, Async";
    assert_eq!(h.service.featured_speaker().await, expected);
    assert_eq!(
        h.slot.ops(),
        vec![
            SlotOp::Clear(FEATURED_SPEAKER_KEY.to_string()),
            SlotOp::Set(FEATURED_SPEAKER_KEY.to_string(), expected.to_string()),
        ]
    );
}

/// Test 2: Other Speakers Do Not Count
#[tokio::test]
async fn test_featured_speaker_counts_only_their_own_sessions() {
    let h = harness();
    let org = user("org");
    let conference = h
        .service
        .create_conference(&org, ConferenceDraft::named("RustConf"))
        .await
        .unwrap();
    let ferris = h
        .service
        .create_speaker(&org, SpeakerDraft::named("Ferris"))
        .await
        .unwrap();
    let corro = h
        .service
        .create_speaker(&org, SpeakerDraft::named("Corro"))
        .await
        .unwrap();

    for (speaker, name) in [(ferris.id, "One"), (corro.id, "Two")] {
        h.service
            .create_session(&org, conference.id, speaker, SessionDraft::named(name))
            .await
            .unwrap();
    }
    assert_eq!(h.run_tasks().await, 3);

    assert_eq!(h.service.featured_speaker().await, "");
    assert!(h.slot.value(FEATURED_SPEAKER_KEY).is_none());
}

/// Test 3: Nearly Sold Out
///
/// Conferences with at least one and at most the threshold seats left are
/// announced, fewest seats first. Sold-out conferences drop off.
#[tokio::test]
async fn test_nearly_sold_out_conferences_are_announced() {
    let h = harness_with(|config| config.announcements.seat_threshold = 2);
    let org = user("org");
    let mut ids = Vec::new();
    for (name, max) in [("Roomy", 100), ("Almost", 3), ("Last seat", 2), ("Gone", 1)] {
        let conference = h
            .service
            .create_conference(&org, ConferenceDraft::named(name).max_attendees(max))
            .await
            .unwrap();
        ids.push(conference.id);
    }

    assert_eq!(
        h.service.refresh_announcement().await.unwrap().as_deref(),
        Some("Last chance to attend! The following conferences are nearly sold out: Gone, Last seat")
    );

    for (index, attendee) in [(1, "a"), (2, "b"), (3, "c")] {
        h.service.register(&user(attendee), ids[index]).await.unwrap();
    }

    let announcement = h.service.refresh_announcement().await.unwrap().unwrap();
    assert_eq!(
        announcement,
        "Last chance to attend! The following conferences are nearly sold out: Last seat, Almost"
    );
    assert_eq!(h.service.announcement().await, announcement);
    assert_eq!(
        h.slot.value(RECENT_ANNOUNCEMENTS_KEY).as_deref(),
        Some(announcement.as_str())
    );
}

/// Test 4: Announcement Cleared Once Nothing Qualifies
#[tokio::test]
async fn test_announcement_clears_when_seats_free_up() {
    let h = harness_with(|config| config.announcements.seat_threshold = 1);
    let conference = h
        .service
        .create_conference(&user("org"), ConferenceDraft::named("Tight").max_attendees(2))
        .await
        .unwrap();

    h.service.register(&user("a"), conference.id).await.unwrap();
    assert!(h.service.refresh_announcement().await.unwrap().is_some());

    h.service.unregister(&user("a"), conference.id).await.unwrap();
    assert_eq!(h.service.refresh_announcement().await.unwrap(), None);
    assert_eq!(h.service.announcement().await, "");
    assert_eq!(
        h.slot.ops().last(),
        Some(&SlotOp::Clear(RECENT_ANNOUNCEMENTS_KEY.to_string()))
    );
}
