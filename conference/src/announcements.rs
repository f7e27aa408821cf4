//! Nearly-sold-out announcement.
//!
//! Conferences with a handful of seats left are listed in the
//! [`RECENT_ANNOUNCEMENTS_KEY`] slot. Refreshing is cheap and idempotent; callers
//! run it periodically or after registrations.

use crate::error::Result;
use crate::filter::{Field, FilterCompiler, FilterValue, Operator, PredicateClause};
use crate::metrics;
use crate::query::QueryExecutor;
use conference_core::announcement::{AnnouncementSlot, RECENT_ANNOUNCEMENTS_KEY};
use futures::TryStreamExt;
use std::sync::Arc;

/// Publishes the list of conferences that are nearly sold out.
#[derive(Clone)]
pub struct AnnouncementPublisher {
    queries: Arc<dyn QueryExecutor>,
    slot: Arc<dyn AnnouncementSlot>,
    seat_threshold: u32,
}

impl AnnouncementPublisher {
    /// Create a publisher announcing conferences with `1..=seat_threshold` seats left.
    #[must_use]
    pub fn new(
        queries: Arc<dyn QueryExecutor>,
        slot: Arc<dyn AnnouncementSlot>,
        seat_threshold: u32,
    ) -> Self {
        Self {
            queries,
            slot,
            seat_threshold,
        }
    }

    /// Recompute the announcement and write it to the slot.
    ///
    /// Returns the announcement, or `None` when nothing is nearly sold out (the slot
    /// is cleared in that case).
    ///
    /// # Errors
    ///
    /// Store failures while querying conferences.
    #[tracing::instrument(skip(self))]
    pub async fn refresh(&self) -> Result<Option<String>> {
        let plan = FilterCompiler::plan(vec![
            PredicateClause::new(Field::SeatsAvailable, Operator::Gt, FilterValue::Integer(0))?,
            PredicateClause::new(
                Field::SeatsAvailable,
                Operator::LtEq,
                FilterValue::Integer(i64::from(self.seat_threshold)),
            )?,
        ])?;

        let names: Vec<String> = self
            .queries
            .conferences(&plan)
            .map_ok(|conference| conference.name)
            .try_collect()
            .await?;

        if names.is_empty() {
            self.slot.clear(RECENT_ANNOUNCEMENTS_KEY).await;
            return Ok(None);
        }

        let announcement = format!(
            "Last chance to attend! The following conferences are nearly sold out: {}",
            names.join(", ")
        );
        self.slot
            .set(RECENT_ANNOUNCEMENTS_KEY, announcement.clone())
            .await;
        metrics::record_announcement_published(RECENT_ANNOUNCEMENTS_KEY);
        tracing::debug!(conferences = names.len(), "Announcement refreshed");

        Ok(Some(announcement))
    }

    /// The current announcement; empty when none is published.
    pub async fn current(&self) -> String {
        self.slot
            .get(RECENT_ANNOUNCEMENTS_KEY)
            .await
            .unwrap_or_default()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::query::StoreQueryExecutor;
    use crate::types::{Conference, ConferenceId, ProfileId};
    use conference_core::aggregate::{self, Aggregate};
    use conference_core::store::{AggregateStore, CommitBatch};
    use conference_testing::{InMemoryAggregateStore, InMemoryAnnouncementSlot};

    fn conference(name: &str, seats: u32) -> Conference {
        Conference {
            id: ConferenceId::new(),
            organizer_id: ProfileId::new("org"),
            name: name.to_string(),
            description: None,
            topics: vec![],
            city: "Default City".to_string(),
            start_date: None,
            end_date: None,
            month: 0,
            max_attendees: 100,
            seats_available: seats,
        }
    }

    async fn publisher(
        conferences: &[Conference],
    ) -> (AnnouncementPublisher, Arc<InMemoryAnnouncementSlot>) {
        let store = Arc::new(InMemoryAggregateStore::new());
        let mut batch = CommitBatch::new();
        for conference in conferences {
            batch.put(conference.key(), aggregate::encode(conference).unwrap());
        }
        store.commit(batch).await.unwrap();
        let slot = Arc::new(InMemoryAnnouncementSlot::new());
        let publisher =
            AnnouncementPublisher::new(Arc::new(StoreQueryExecutor::new(store)), slot.clone(), 5);
        (publisher, slot)
    }

    #[tokio::test]
    async fn lists_conferences_within_threshold() {
        let (publisher, _slot) = publisher(&[
            conference("Sold out", 0),
            conference("Almost", 5),
            conference("Roomy", 80),
            conference("Last seat", 1),
        ])
        .await;

        let announcement = publisher.refresh().await.unwrap();

        // Sorted by the inequality field first: 1 seat, then 5.
        let expected =
            "Last chance to attend! The following conferences are nearly sold out: Last seat, Almost";
        assert_eq!(announcement.as_deref(), Some(expected));
        assert_eq!(publisher.current().await, expected);
    }

    #[tokio::test]
    async fn clears_when_nothing_is_nearly_sold_out() {
        let (publisher, slot) = publisher(&[conference("Roomy", 80)]).await;

        assert_eq!(publisher.refresh().await.unwrap(), None);
        assert_eq!(slot.value(RECENT_ANNOUNCEMENTS_KEY), None);
        assert_eq!(publisher.current().await, "");
    }
}
