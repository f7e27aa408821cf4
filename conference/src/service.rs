//! Conference service: the operation surface of the registration core.
//!
//! [`ConferenceService`] wires the collaborators (store, announcement slot, task
//! dispatcher, clock) to the components and exposes every operation as an async
//! method. Callers authenticate outside and pass the resulting [`UserIdentity`];
//! [`ConferenceService::caller`] bridges from an [`IdentityProvider`].
//!
//! # Example
//!
//! ```ignore
//! let service = ConferenceService::new(&config, store, slot, dispatcher, clock);
//! let organizer = ConferenceService::caller(&identity)?;
//!
//! let conference = service
//!     .create_conference(&organizer, ConferenceDraft::named("RustConf").max_attendees(2))
//!     .await?;
//! service.register(&organizer, conference.id).await?;
//! ```

use crate::announcements::AnnouncementPublisher;
use crate::config::Config;
use crate::error::{ConferenceError, Result, ValidationError};
use crate::featured::FeaturedSpeakerEvaluator;
use crate::filter::{FilterCompiler, RawClause};
use crate::ledger::SeatLedger;
use crate::metrics;
use crate::query::{QueryExecutor, RecordStream, SessionQuery, StoreQueryExecutor};
use crate::registration::{Registered, RegistrationCoordinator, Unregistered};
use crate::tasks::{self, TaskWorker};
use crate::types::{
    Conference, ConferenceDraft, ConferenceId, Profile, ProfileChanges, ProfileId, Session,
    SessionDraft, SessionId, SessionType, Speaker, SpeakerDraft, SpeakerId,
};
use crate::wishlist::{WishlistManager, WishlistSweeper};
use chrono::{Datelike, NaiveTime};
use conference_core::announcement::AnnouncementSlot;
use conference_core::dispatch::TaskDispatcher;
use conference_core::environment::Clock;
use conference_core::identity::{IdentityProvider, UserIdentity};
use conference_core::store::AggregateStore;
use conference_runtime::TransactionExecutor;
use futures::TryStreamExt;
use std::sync::Arc;

/// City used when a conference is created without one.
pub const DEFAULT_CITY: &str = "Default City";
/// Topics used when a conference is created without any.
pub const DEFAULT_TOPICS: [&str; 2] = ["Default", "Topic"];
/// Session duration in hours when none is given.
pub const DEFAULT_SESSION_DURATION: f64 = 1.0;

fn at_hour(hour: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or_default()
}

/// Entry point for every registration-core operation.
#[derive(Clone)]
pub struct ConferenceService {
    executor: TransactionExecutor,
    queries: Arc<dyn QueryExecutor>,
    dispatcher: Arc<dyn TaskDispatcher>,
    clock: Arc<dyn Clock>,
    registrations: RegistrationCoordinator,
    wishlist: WishlistManager,
    sweeper: WishlistSweeper,
    featured: FeaturedSpeakerEvaluator,
    announcements: AnnouncementPublisher,
}

impl ConferenceService {
    /// Wire a service over the given collaborators.
    #[must_use]
    pub fn new(
        config: &Config,
        store: Arc<dyn AggregateStore>,
        slot: Arc<dyn AnnouncementSlot>,
        dispatcher: Arc<dyn TaskDispatcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let executor = TransactionExecutor::new(Arc::clone(&store), config.retry_policy());
        let queries: Arc<dyn QueryExecutor> = Arc::new(StoreQueryExecutor::new(store));

        Self {
            registrations: RegistrationCoordinator::new(executor.clone()),
            wishlist: WishlistManager::new(executor.clone()),
            sweeper: WishlistSweeper::new(
                executor.clone(),
                Arc::clone(&queries),
                config.wishlist.sweep_batch_size,
            ),
            featured: FeaturedSpeakerEvaluator::new(
                executor.clone(),
                Arc::clone(&queries),
                Arc::clone(&slot),
            ),
            announcements: AnnouncementPublisher::new(
                Arc::clone(&queries),
                slot,
                config.announcements.seat_threshold,
            ),
            executor,
            queries,
            dispatcher,
            clock,
        }
    }

    /// The authenticated caller.
    ///
    /// # Errors
    ///
    /// `Unauthenticated` when nobody is signed in.
    pub fn caller(identity: &dyn IdentityProvider) -> Result<UserIdentity> {
        Ok(identity.require_user()?)
    }

    /// A worker for the tasks this service dispatches.
    #[must_use]
    pub fn task_worker(&self) -> TaskWorker {
        TaskWorker::new(self.featured.clone(), self.sweeper.clone())
    }

    // ========================================================================
    // Conferences
    // ========================================================================

    /// Create a conference organized by the caller.
    ///
    /// Missing fields get defaults; `seats_available` starts at `max_attendees`.
    /// A confirmation email task is dispatched to the organizer.
    ///
    /// # Errors
    ///
    /// - `Validation(MissingName)` when the name is missing or blank
    /// - `Transient` / `Store` on storage failure
    #[tracing::instrument(skip(self, organizer, draft), fields(organizer_id = %organizer.user_id))]
    pub async fn create_conference(
        &self,
        organizer: &UserIdentity,
        draft: ConferenceDraft,
    ) -> Result<Conference> {
        let name = required_name(draft.name, "Conference")?;
        let max_attendees = draft.max_attendees.unwrap_or(0);
        let conference = Conference {
            id: ConferenceId::new(),
            organizer_id: ProfileId::from(organizer),
            name,
            description: draft.description,
            topics: draft
                .topics
                .filter(|topics| !topics.is_empty())
                .unwrap_or_else(|| DEFAULT_TOPICS.map(String::from).to_vec()),
            city: draft
                .city
                .filter(|city| !city.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_CITY.to_string()),
            start_date: draft.start_date,
            end_date: draft.end_date,
            month: draft.start_date.map_or(0, |date| date.month()),
            max_attendees,
            seats_available: max_attendees,
        };

        let created = conference.clone();
        self.executor
            .run_atomic::<_, ConferenceError, _>("create_conference", move |tx| {
                let conference = created.clone();
                Box::pin(async move {
                    tx.save(&conference)?;
                    Ok(())
                })
            })
            .await?;

        metrics::record_conference_created();
        tracing::info!(conference_id = %conference.id, name = %conference.name, "Conference created");
        self.dispatcher.submit(tasks::confirmation_email(
            &organizer.email,
            format!("{conference:?}"),
        ));
        Ok(conference)
    }

    /// Update the supplied fields of a conference. Owner only.
    ///
    /// Setting `start_date` also sets `month`. Changing `max_attendees` shifts
    /// `seats_available` by the same amount.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the conference does not exist
    /// - `Forbidden` if the caller is not the organizer
    /// - `Validation(CapacityBelowRegistered)` when shrinking below the seats taken
    #[tracing::instrument(skip(self, caller, draft), fields(caller_id = %caller.user_id))]
    pub async fn update_conference(
        &self,
        caller: &UserIdentity,
        conference_id: ConferenceId,
        draft: ConferenceDraft,
    ) -> Result<Conference> {
        let caller_id = ProfileId::from(caller);

        Ok(self
            .executor
            .run_atomic::<_, ConferenceError, _>("update_conference", move |tx| {
                let caller_id = caller_id.clone();
                let draft = draft.clone();
                Box::pin(async move {
                    let conference = tx
                        .load::<Conference>(&conference_id)
                        .await?
                        .ok_or_else(|| ConferenceError::not_found("conference", conference_id))?;
                    if !conference.is_organized_by(&caller_id) {
                        return Err(ConferenceError::Forbidden(
                            "Only the owner can update the conference.".to_string(),
                        ));
                    }
                    let updated = apply_draft(conference, draft)?;
                    tx.save(&updated)?;
                    Ok(updated)
                })
            })
            .await?)
    }

    /// Load one conference.
    ///
    /// # Errors
    ///
    /// `NotFound` if it does not exist.
    pub async fn get_conference(&self, conference_id: ConferenceId) -> Result<Conference> {
        self.executor
            .get::<Conference>(&conference_id)
            .await?
            .ok_or_else(|| ConferenceError::not_found("conference", conference_id))
    }

    /// Conferences organized by the caller, by name.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub async fn conferences_created(&self, organizer: &UserIdentity) -> Result<Vec<Conference>> {
        collect(
            self.queries
                .conferences_organized_by(&ProfileId::from(organizer)),
        )
        .await
    }

    /// Conferences the caller is registered for.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub async fn conferences_to_attend(&self, attendee: &UserIdentity) -> Result<Vec<Conference>> {
        let Some(profile) = self
            .executor
            .get::<Profile>(&ProfileId::from(attendee))
            .await?
        else {
            return Ok(Vec::new());
        };

        let mut conferences = Vec::with_capacity(profile.conferences_to_attend.len());
        for conference_id in &profile.conferences_to_attend {
            if let Some(conference) = self.executor.get::<Conference>(conference_id).await? {
                conferences.push(conference);
            }
        }
        Ok(conferences)
    }

    /// Conferences matching caller-supplied filters.
    ///
    /// # Errors
    ///
    /// - `Validation` for a bad field, operator or value, or a second inequality field
    /// - Store failures
    pub async fn query_conferences(&self, filters: &[RawClause]) -> Result<Vec<Conference>> {
        let plan = FilterCompiler::compile(filters)?;
        collect(self.queries.conferences(&plan)).await
    }

    // ========================================================================
    // Profiles
    // ========================================================================

    /// The caller's profile, created from their identity on first access.
    ///
    /// # Errors
    ///
    /// `Transient` / `Store` on storage failure.
    pub async fn profile(&self, caller: &UserIdentity) -> Result<Profile> {
        self.update_profile(caller, ProfileChanges::default()).await
    }

    /// Update the caller's display name and tee-shirt size where supplied.
    ///
    /// # Errors
    ///
    /// `Transient` / `Store` on storage failure.
    pub async fn save_profile(
        &self,
        caller: &UserIdentity,
        changes: ProfileChanges,
    ) -> Result<Profile> {
        self.update_profile(caller, changes).await
    }

    async fn update_profile(&self, caller: &UserIdentity, changes: ProfileChanges) -> Result<Profile> {
        let caller = caller.clone();

        Ok(self
            .executor
            .run_atomic::<_, ConferenceError, _>("profile", move |tx| {
                let caller = caller.clone();
                let changes = changes.clone();
                Box::pin(async move {
                    let profile_id = ProfileId::from(&caller);
                    let existing = tx.load::<Profile>(&profile_id).await?;
                    let is_new = existing.is_none();
                    let mut profile = existing.unwrap_or_else(|| Profile::from_identity(&caller));

                    let mut changed = is_new;
                    if let Some(name) = changes.display_name.filter(|n| !n.trim().is_empty()) {
                        changed |= profile.display_name != name;
                        profile.display_name = name;
                    }
                    if let Some(size) = changes.tee_shirt_size {
                        changed |= profile.tee_shirt_size != size;
                        profile.tee_shirt_size = size;
                    }
                    if changed {
                        tx.save(&profile)?;
                    }
                    Ok(profile)
                })
            })
            .await?)
    }

    // ========================================================================
    // Speakers
    // ========================================================================

    /// Create a speaker.
    ///
    /// # Errors
    ///
    /// - `Validation(MissingName)` when the name is missing or blank
    /// - `Transient` / `Store` on storage failure
    #[tracing::instrument(skip(self, caller, draft), fields(caller_id = %caller.user_id))]
    pub async fn create_speaker(
        &self,
        caller: &UserIdentity,
        draft: SpeakerDraft,
    ) -> Result<Speaker> {
        let speaker = Speaker {
            id: SpeakerId::new(),
            name: required_name(draft.name, "Speaker")?,
            bio: draft.bio,
            organization: draft.organization,
        };

        let created = speaker.clone();
        self.executor
            .run_atomic::<_, ConferenceError, _>("create_speaker", move |tx| {
                let speaker = created.clone();
                Box::pin(async move {
                    tx.save(&speaker)?;
                    Ok(())
                })
            })
            .await?;

        tracing::info!(speaker_id = %speaker.id, "Speaker created");
        Ok(speaker)
    }

    /// Speakers with exactly this name.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub async fn speakers_by_name(&self, name: &str) -> Result<Vec<Speaker>> {
        collect(self.queries.speakers_named(name)).await
    }

    /// The speaker presenting a session.
    ///
    /// # Errors
    ///
    /// `NotFound` if the session or its speaker does not exist.
    pub async fn speaker_for_session(&self, session_id: SessionId) -> Result<Speaker> {
        let session = self.get_session(session_id).await?;
        self.executor
            .get::<Speaker>(&session.speaker_id)
            .await?
            .ok_or_else(|| ConferenceError::not_found("speaker", session.speaker_id))
    }

    // ========================================================================
    // Sessions
    // ========================================================================

    /// Create a session in one of the caller's conferences.
    ///
    /// Missing fields get defaults. A featured-speaker task is dispatched afterwards.
    ///
    /// # Errors
    ///
    /// - `Validation(MissingName)` when the name is missing or blank
    /// - `NotFound` if the conference or speaker does not exist
    /// - `Forbidden` if the caller does not organize the conference
    #[tracing::instrument(skip(self, caller, draft), fields(caller_id = %caller.user_id))]
    pub async fn create_session(
        &self,
        caller: &UserIdentity,
        conference_id: ConferenceId,
        speaker_id: SpeakerId,
        draft: SessionDraft,
    ) -> Result<Session> {
        let session = Session {
            id: SessionId::new(),
            conference_id,
            speaker_id,
            name: required_name(draft.name, "Session")?,
            highlights: draft.highlights.unwrap_or_default(),
            duration: draft.duration.unwrap_or(DEFAULT_SESSION_DURATION),
            start_time: draft.start_time.unwrap_or_else(|| at_hour(12)),
            date: draft.date,
            type_of_session: draft.type_of_session.unwrap_or_default(),
        };
        let caller_id = ProfileId::from(caller);

        let created = session.clone();
        self.executor
            .run_atomic::<_, ConferenceError, _>("create_session", move |tx| {
                let caller_id = caller_id.clone();
                let session = created.clone();
                Box::pin(async move {
                    let conference = tx
                        .load::<Conference>(&conference_id)
                        .await?
                        .ok_or_else(|| ConferenceError::not_found("conference", conference_id))?;
                    if !conference.is_organized_by(&caller_id) {
                        return Err(ConferenceError::Forbidden(
                            "Only the conference organizer can make sessions for the conference"
                                .to_string(),
                        ));
                    }
                    if tx.load::<Speaker>(&speaker_id).await?.is_none() {
                        return Err(ConferenceError::not_found("speaker", speaker_id));
                    }
                    tx.save(&session)?;
                    Ok(())
                })
            })
            .await?;

        tracing::info!(session_id = %session.id, "Session created");
        self.dispatcher
            .submit(tasks::feature_speaker(conference_id, speaker_id));
        Ok(session)
    }

    /// Load one session.
    ///
    /// # Errors
    ///
    /// `NotFound` if it does not exist.
    pub async fn get_session(&self, session_id: SessionId) -> Result<Session> {
        self.executor
            .get::<Session>(&session_id)
            .await?
            .ok_or_else(|| ConferenceError::not_found("session", session_id))
    }

    /// Sessions of one conference.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub async fn conference_sessions(&self, conference_id: ConferenceId) -> Result<Vec<Session>> {
        collect(self.queries.sessions(&SessionQuery::for_conference(conference_id))).await
    }

    /// Sessions of one conference with the given type.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub async fn conference_sessions_by_type(
        &self,
        conference_id: ConferenceId,
        session_type: SessionType,
    ) -> Result<Vec<Session>> {
        let query = SessionQuery::for_conference(conference_id).of_type(session_type);
        collect(self.queries.sessions(&query)).await
    }

    /// Every session a speaker presents.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub async fn sessions_by_speaker(&self, speaker_id: SpeakerId) -> Result<Vec<Session>> {
        collect(self.queries.sessions(&SessionQuery::for_speaker(speaker_id))).await
    }

    /// A speaker's dated sessions from today on.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub async fn upcoming_sessions_for_speaker(
        &self,
        speaker_id: SpeakerId,
    ) -> Result<Vec<Session>> {
        let today = self.clock.now().date_naive();
        let query = SessionQuery::for_speaker(speaker_id).on_or_after(today);
        collect(self.queries.sessions(&query)).await
    }

    /// Sessions that are not workshops and start no later than 19:00.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub async fn non_workshop_sessions_before_seven(&self) -> Result<Vec<Session>> {
        let query = SessionQuery::all()
            .not_of_type(SessionType::Workshop)
            .starts_at_or_before(at_hour(19));
        collect(self.queries.sessions(&query)).await
    }

    /// Delete a session. Organizer only.
    ///
    /// Wishlists referencing the session are cleaned up by a dispatched sweep.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the session or its conference does not exist
    /// - `Forbidden` if the caller does not organize the conference
    #[tracing::instrument(skip(self, caller), fields(caller_id = %caller.user_id))]
    pub async fn delete_session(&self, caller: &UserIdentity, session_id: SessionId) -> Result<()> {
        let caller_id = ProfileId::from(caller);

        self.executor
            .run_atomic::<_, ConferenceError, _>("delete_session", move |tx| {
                let caller_id = caller_id.clone();
                Box::pin(async move {
                    let session = tx
                        .load::<Session>(&session_id)
                        .await?
                        .ok_or_else(|| ConferenceError::not_found("session", session_id))?;
                    let conference = tx
                        .load::<Conference>(&session.conference_id)
                        .await?
                        .ok_or_else(|| {
                            ConferenceError::not_found("conference", session.conference_id)
                        })?;
                    if !conference.is_organized_by(&caller_id) {
                        return Err(ConferenceError::Forbidden(
                            "Only the conference organizer can delete sessions for the conference"
                                .to_string(),
                        ));
                    }
                    tx.delete::<Session>(&session_id);
                    Ok(())
                })
            })
            .await?;

        tracing::info!("Session deleted");
        self.dispatcher.submit(tasks::sweep_wishlists(session_id));
        Ok(())
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Take a seat at a conference. See [`RegistrationCoordinator::register`].
    ///
    /// # Errors
    ///
    /// `NotFound`, `Conflict(AlreadyRegistered)`, `Conflict(SoldOut)`, `Transient`.
    pub async fn register(
        &self,
        attendee: &UserIdentity,
        conference_id: ConferenceId,
    ) -> Result<Registered> {
        self.registrations.register(attendee, conference_id).await
    }

    /// Give a seat back. See [`RegistrationCoordinator::unregister`].
    ///
    /// # Errors
    ///
    /// `NotFound`, `Transient`.
    pub async fn unregister(
        &self,
        attendee: &UserIdentity,
        conference_id: ConferenceId,
    ) -> Result<Unregistered> {
        self.registrations.unregister(attendee, conference_id).await
    }

    // ========================================================================
    // Wishlist
    // ========================================================================

    /// Bookmark a session.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Conflict(AlreadyInWishlist)`, `Transient`.
    pub async fn add_to_wishlist(&self, attendee: &UserIdentity, session_id: SessionId) -> Result<()> {
        self.wishlist.add(attendee, session_id).await
    }

    /// Remove a bookmark.
    ///
    /// # Errors
    ///
    /// `Conflict(NotInWishlist)`, `Transient`.
    pub async fn remove_from_wishlist(
        &self,
        attendee: &UserIdentity,
        session_id: SessionId,
    ) -> Result<()> {
        self.wishlist.remove(attendee, session_id).await
    }

    /// Remove every bookmark; returns how many were removed.
    ///
    /// # Errors
    ///
    /// `Transient`.
    pub async fn clear_wishlist(&self, attendee: &UserIdentity) -> Result<usize> {
        self.wishlist.clear(attendee).await
    }

    /// Bookmarked sessions in insertion order.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub async fn wishlist(&self, attendee: &UserIdentity) -> Result<Vec<Session>> {
        self.wishlist.list(attendee).await
    }

    // ========================================================================
    // Announcements
    // ========================================================================

    /// Recompute the nearly-sold-out announcement.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub async fn refresh_announcement(&self) -> Result<Option<String>> {
        self.announcements.refresh().await
    }

    /// The nearly-sold-out announcement; empty when none.
    pub async fn announcement(&self) -> String {
        self.announcements.current().await
    }

    /// The featured-speaker announcement; empty when none.
    pub async fn featured_speaker(&self) -> String {
        self.featured.current().await
    }
}

/// Trimmed name, or [`ValidationError::MissingName`].
fn required_name(name: Option<String>, entity: &'static str) -> Result<String> {
    name.map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ValidationError::MissingName { entity }.into())
}

/// Copy the supplied draft fields onto `conference`.
fn apply_draft(mut conference: Conference, draft: ConferenceDraft) -> Result<Conference> {
    if let Some(name) = draft.name.filter(|n| !n.trim().is_empty()) {
        conference.name = name;
    }
    if let Some(description) = draft.description {
        conference.description = Some(description);
    }
    if let Some(topics) = draft.topics.filter(|t| !t.is_empty()) {
        conference.topics = topics;
    }
    if let Some(city) = draft.city.filter(|c| !c.trim().is_empty()) {
        conference.city = city;
    }
    if let Some(start_date) = draft.start_date {
        conference.start_date = Some(start_date);
        conference.month = start_date.month();
    }
    if let Some(end_date) = draft.end_date {
        conference.end_date = Some(end_date);
    }
    if let Some(max_attendees) = draft.max_attendees {
        conference = SeatLedger::resize(conference, max_attendees)?;
    }
    Ok(conference)
}

async fn collect<T>(stream: RecordStream<T>) -> Result<Vec<T>> {
    Ok(stream.try_collect().await?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn conference() -> Conference {
        Conference {
            id: ConferenceId::new(),
            organizer_id: ProfileId::new("org"),
            name: "RustConf".to_string(),
            description: None,
            topics: vec!["Web".to_string()],
            city: "Portland".to_string(),
            start_date: None,
            end_date: None,
            month: 0,
            max_attendees: 10,
            seats_available: 7,
        }
    }

    #[test]
    fn required_name_rejects_blank() {
        assert_eq!(required_name(Some("  Talk ".to_string()), "Session").unwrap(), "Talk");
        assert_eq!(
            required_name(Some("   ".to_string()), "Session"),
            Err(ValidationError::MissingName { entity: "Session" }.into())
        );
        assert!(required_name(None, "Speaker").is_err());
    }

    #[test]
    fn draft_copies_only_supplied_fields() {
        let start = NaiveDate::from_ymd_opt(2025, 9, 10).unwrap();
        let draft = ConferenceDraft::named("RustConf 2025").start_date(start);

        let updated = apply_draft(conference(), draft).unwrap();

        assert_eq!(updated.name, "RustConf 2025");
        assert_eq!(updated.month, 9);
        assert_eq!(updated.city, "Portland");
        assert_eq!(updated.topics, vec!["Web"]);
        assert_eq!((updated.max_attendees, updated.seats_available), (10, 7));
    }

    #[test]
    fn draft_capacity_change_keeps_taken_seats() {
        let grown = apply_draft(conference(), ConferenceDraft::default().max_attendees(20)).unwrap();
        assert_eq!((grown.max_attendees, grown.seats_available), (20, 17));

        let too_small = apply_draft(conference(), ConferenceDraft::default().max_attendees(2));
        assert!(matches!(
            too_small,
            Err(ConferenceError::Validation(ValidationError::CapacityBelowRegistered { .. }))
        ));
    }

    #[test]
    fn at_hour_builds_whole_hours() {
        assert_eq!(at_hour(19), NaiveTime::from_hms_opt(19, 0, 0).unwrap());
    }
}
