//! Featured speaker announcement.
//!
//! A speaker with more than one session at a conference is featured in the
//! [`FEATURED_SPEAKER_KEY`] slot. Evaluation is idempotent and runs off the request
//! path, normally from the `feature_speaker` task.

use crate::error::{ConferenceError, Result};
use crate::metrics;
use crate::query::{QueryExecutor, SessionQuery};
use crate::types::{Conference, ConferenceId, Session, Speaker, SpeakerId};
use conference_core::announcement::{AnnouncementSlot, FEATURED_SPEAKER_KEY};
use conference_runtime::TransactionExecutor;
use futures::TryStreamExt;
use std::sync::Arc;

/// Decides whether a speaker is featured and publishes the announcement.
#[derive(Clone)]
pub struct FeaturedSpeakerEvaluator {
    executor: TransactionExecutor,
    queries: Arc<dyn QueryExecutor>,
    slot: Arc<dyn AnnouncementSlot>,
}

impl FeaturedSpeakerEvaluator {
    /// Create an evaluator.
    #[must_use]
    pub fn new(
        executor: TransactionExecutor,
        queries: Arc<dyn QueryExecutor>,
        slot: Arc<dyn AnnouncementSlot>,
    ) -> Self {
        Self {
            executor,
            queries,
            slot,
        }
    }

    /// Recompute the featured speaker for one conference.
    ///
    /// Returns the published announcement, or `None` when the speaker has at most
    /// one session there (the slot is cleared in that case).
    ///
    /// # Errors
    ///
    /// - `NotFound` if the conference or speaker does not exist
    /// - Store failures while querying sessions
    #[tracing::instrument(skip(self))]
    pub async fn evaluate(
        &self,
        conference_id: ConferenceId,
        speaker_id: SpeakerId,
    ) -> Result<Option<String>> {
        let conference = self
            .executor
            .get::<Conference>(&conference_id)
            .await?
            .ok_or_else(|| ConferenceError::not_found("conference", conference_id))?;
        let speaker = self
            .executor
            .get::<Speaker>(&speaker_id)
            .await?
            .ok_or_else(|| ConferenceError::not_found("speaker", speaker_id))?;

        let sessions: Vec<Session> = self
            .queries
            .sessions(&SessionQuery::for_conference(conference_id).speaker(speaker_id))
            .try_collect()
            .await?;

        if sessions.len() <= 1 {
            self.slot.clear(FEATURED_SPEAKER_KEY).await;
            tracing::debug!(sessions = sessions.len(), "Speaker not featured");
            return Ok(None);
        }

        let names = sessions
            .iter()
            .map(|session| session.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let announcement = format!(
            "Now at {}, attend these sessions from speaker {}: {names}",
            conference.name, speaker.name
        );

        self.slot.clear(FEATURED_SPEAKER_KEY).await;
        self.slot
            .set(FEATURED_SPEAKER_KEY, announcement.clone())
            .await;
        metrics::record_announcement_published(FEATURED_SPEAKER_KEY);
        tracing::info!(speaker = %speaker.name, "Featured speaker published");

        Ok(Some(announcement))
    }

    /// The current featured-speaker announcement; empty when none is published.
    pub async fn current(&self) -> String {
        self.slot
            .get(FEATURED_SPEAKER_KEY)
            .await
            .unwrap_or_default()
    }
}
