//! Conference Registration Demo
//!
//! Walks through the registration core against in-memory collaborators:
//! - Conference and session creation (with background tasks)
//! - Filtered conference queries
//! - Seat allocation down to sold out
//! - Wishlists and the sweep after a session is deleted
//! - Featured speaker and nearly-sold-out announcements
//!
//! # Usage
//!
//! ```bash
//! RUST_LOG=info,conference=debug cargo run --bin demo
//! ```

use anyhow::Context;
use chrono::NaiveDate;
use conference::{
    Config, ConferenceDraft, ConferenceService, RawClause, SessionDraft, SessionType,
    SpeakerDraft, metrics::register_business_metrics,
};
use conference_core::announcement::{AnnouncementSlot, FEATURED_SPEAKER_KEY};
use conference_core::environment::SystemClock;
use conference_core::identity::UserIdentity;
use conference_runtime::ChannelDispatcher;
use conference_runtime::metrics::MetricsServer;
use conference_testing::{InMemoryAggregateStore, InMemoryAnnouncementSlot, StaticIdentity};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,conference=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!("\n============================================");
    println!("   Conference Registration - Live Demo");
    println!("============================================\n");

    let config = Config::from_env();

    let mut metrics_server = MetricsServer::new(
        config
            .metrics_addr()
            .parse()
            .context("invalid METRICS_HOST/METRICS_PORT")?,
    )
    .with_descriptions(register_business_metrics);
    if config.metrics.enabled {
        metrics_server.start()?;
    }

    let store = Arc::new(InMemoryAggregateStore::new());
    let slot = Arc::new(InMemoryAnnouncementSlot::new());
    let (dispatcher, receiver) = ChannelDispatcher::new();
    let service = ConferenceService::new(
        &config,
        store.clone(),
        slot.clone(),
        Arc::new(dispatcher),
        Arc::new(SystemClock),
    );
    let worker = service.task_worker().spawn(receiver);

    let organizer = ConferenceService::caller(&StaticIdentity::signed_in(UserIdentity::new(
        "ada",
        "ada@example.com",
        "Ada",
    )))?;
    let attendees: Vec<UserIdentity> = ["grace", "alan", "barbara"]
        .iter()
        .map(|name| UserIdentity::new(*name, format!("{name}@example.com"), *name))
        .collect();

    // Step 1: conferences
    println!("1. Creating conferences...");
    let rustconf = service
        .create_conference(
            &organizer,
            ConferenceDraft::named("RustConf")
                .city("Portland")
                .topics(["Systems", "Web"])
                .start_date(NaiveDate::from_ymd_opt(2025, 9, 10).context("bad date")?)
                .max_attendees(2),
        )
        .await?;
    let eurorust = service
        .create_conference(
            &organizer,
            ConferenceDraft::named("EuroRust")
                .city("Paris")
                .start_date(NaiveDate::from_ymd_opt(2025, 10, 9).context("bad date")?)
                .max_attendees(4),
        )
        .await?;
    println!("   ✓ {} ({} seats)", rustconf.name, rustconf.seats_available);
    println!("   ✓ {} ({} seats)\n", eurorust.name, eurorust.seats_available);

    // Step 2: speaker and sessions
    println!("2. Scheduling sessions...");
    let ferris = service
        .create_speaker(&organizer, SpeakerDraft::named("Ferris"))
        .await?;
    let borrowing = service
        .create_session(
            &organizer,
            rustconf.id,
            ferris.id,
            SessionDraft::named("Borrowing without tears").of_type(SessionType::Lecture),
        )
        .await?;
    service
        .create_session(
            &organizer,
            rustconf.id,
            ferris.id,
            SessionDraft::named("Async from scratch").of_type(SessionType::Workshop),
        )
        .await?;
    println!("   ✓ 2 sessions by {}\n", ferris.name);

    // Step 3: queries
    println!("3. Querying conferences...");
    for filters in [
        vec![RawClause::new("CITY", "EQ", "Portland")],
        vec![RawClause::new("MONTH", "GT", "9")],
        vec![
            RawClause::new("MONTH", "GT", "6"),
            RawClause::new("MAX_ATTENDEES", "LT", "10"),
        ],
    ] {
        match service.query_conferences(&filters).await {
            Ok(found) => {
                let names: Vec<_> = found.iter().map(|c| c.name.as_str()).collect();
                println!("   {filters:?} -> {names:?}");
            }
            Err(error) => println!("   {filters:?} -> rejected: {error}"),
        }
    }
    println!();

    // Step 4: registration down to sold out
    println!("4. Registering attendees for {}...", rustconf.name);
    for attendee in &attendees {
        match service.register(attendee, rustconf.id).await {
            Ok(registered) => println!(
                "   ✓ {} registered ({} seats left)",
                attendee.nickname, registered.seats_available
            ),
            Err(error) => println!("   ✗ {}: {error}", attendee.nickname),
        }
    }
    let released = service.unregister(&attendees[0], rustconf.id).await?;
    let seats = service.get_conference(rustconf.id).await?.seats_available;
    println!(
        "   ✓ {} unregistered (changed={}, {seats} seats left)\n",
        attendees[0].nickname, released.changed
    );

    // Step 5: wishlists
    println!("5. Wishlists...");
    for attendee in &attendees {
        service.add_to_wishlist(attendee, borrowing.id).await?;
    }
    service.delete_session(&organizer, borrowing.id).await?;
    println!("   ✓ '{}' bookmarked by 3 attendees, then deleted\n", borrowing.name);

    // Step 6: announcements
    println!("6. Announcements...");
    service.refresh_announcement().await?;
    println!("   {}", service.announcement().await);

    // Dropping the service closes the task channel; the worker drains and stops.
    drop(service);
    worker.await?;

    println!(
        "   {}",
        slot.get(FEATURED_SPEAKER_KEY).await.unwrap_or_default()
    );
    println!("   {} aggregates stored\n", store.len());

    if let Some(rendered) = metrics_server.render() {
        println!("Metrics snapshot:\n{rendered}");
    }

    println!("✓ Demo complete");
    Ok(())
}
