//! Query executor: runs compiled plans against stored aggregates.
//!
//! The registration core only describes queries ([`QueryPlan`], [`SessionQuery`]);
//! executing them is a collaborator concern behind [`QueryExecutor`]. Results are
//! lazy, finite, non-restartable streams in plan order.
//!
//! [`StoreQueryExecutor`] is the reference implementation. It scans one aggregate
//! kind through [`AggregateStore::scan`] and filters and sorts in memory.

use crate::filter::{Field, FilterValue, QueryPlan};
use crate::types::{
    Conference, ConferenceId, Profile, ProfileId, Session, SessionId, SessionType, Speaker,
    SpeakerId,
};
use chrono::{NaiveDate, NaiveTime};
use conference_core::aggregate::{self, Aggregate};
use conference_core::store::{AggregateStore, StoreError};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use std::cmp::Ordering;
use std::sync::Arc;

/// Stream of query results.
pub type RecordStream<T> = BoxStream<'static, Result<T, StoreError>>;

/// Session lookup: every set criterion must match.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionQuery {
    conference: Option<ConferenceId>,
    speaker: Option<SpeakerId>,
    type_is: Option<SessionType>,
    type_is_not: Option<SessionType>,
    on_or_after: Option<NaiveDate>,
    starts_at_or_before: Option<NaiveTime>,
}

impl SessionQuery {
    /// Every session.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Sessions of one conference.
    #[must_use]
    pub fn for_conference(conference: ConferenceId) -> Self {
        Self {
            conference: Some(conference),
            ..Self::default()
        }
    }

    /// Sessions presented by one speaker.
    #[must_use]
    pub fn for_speaker(speaker: SpeakerId) -> Self {
        Self {
            speaker: Some(speaker),
            ..Self::default()
        }
    }

    /// Restrict to one speaker.
    #[must_use]
    pub const fn speaker(mut self, speaker: SpeakerId) -> Self {
        self.speaker = Some(speaker);
        self
    }

    /// Restrict to one session type.
    #[must_use]
    pub const fn of_type(mut self, kind: SessionType) -> Self {
        self.type_is = Some(kind);
        self
    }

    /// Exclude one session type.
    #[must_use]
    pub const fn not_of_type(mut self, kind: SessionType) -> Self {
        self.type_is_not = Some(kind);
        self
    }

    /// Only dated sessions on or after `date`.
    #[must_use]
    pub const fn on_or_after(mut self, date: NaiveDate) -> Self {
        self.on_or_after = Some(date);
        self
    }

    /// Only sessions starting at or before `time`.
    #[must_use]
    pub const fn starts_at_or_before(mut self, time: NaiveTime) -> Self {
        self.starts_at_or_before = Some(time);
        self
    }

    /// Whether `session` satisfies every criterion.
    #[must_use]
    pub fn matches(&self, session: &Session) -> bool {
        self.conference.is_none_or(|id| session.conference_id == id)
            && self.speaker.is_none_or(|id| session.speaker_id == id)
            && self.type_is.is_none_or(|kind| session.type_of_session == kind)
            && self.type_is_not.is_none_or(|kind| session.type_of_session != kind)
            && self
                .on_or_after
                .is_none_or(|date| session.date.is_some_and(|d| d >= date))
            && self
                .starts_at_or_before
                .is_none_or(|time| session.start_time <= time)
    }
}

/// Executes queries over conference data.
///
/// # Dyn Compatibility
///
/// Every method returns a boxed stream so the trait can be used as
/// `Arc<dyn QueryExecutor>`.
pub trait QueryExecutor: Send + Sync {
    /// Conferences matching `plan`, in plan order.
    fn conferences(&self, plan: &QueryPlan) -> RecordStream<Conference>;

    /// Conferences organized by `organizer`, ordered by name.
    fn conferences_organized_by(&self, organizer: &ProfileId) -> RecordStream<Conference>;

    /// Sessions matching `query`, ordered by date, start time, then name.
    fn sessions(&self, query: &SessionQuery) -> RecordStream<Session>;

    /// Speakers with exactly this name.
    fn speakers_named(&self, name: &str) -> RecordStream<Speaker>;

    /// Ids of the profiles whose wishlist contains `session`.
    ///
    /// The lookup cost belongs to the executor: an indexed backend answers it from a
    /// session→profile index, while [`StoreQueryExecutor`] decodes every profile.
    /// Callers only bound the writes that follow.
    fn profiles_wishlisting(&self, session: SessionId) -> RecordStream<ProfileId>;
}

/// Values of `field` on `conference`; `Topic` is multi-valued.
fn field_values(conference: &Conference, field: Field) -> Vec<FilterValue> {
    match field {
        Field::City => vec![FilterValue::Text(conference.city.clone())],
        Field::Topic => conference
            .topics
            .iter()
            .cloned()
            .map(FilterValue::Text)
            .collect(),
        Field::Month => vec![FilterValue::Integer(i64::from(conference.month))],
        Field::MaxAttendees => vec![FilterValue::Integer(i64::from(conference.max_attendees))],
        Field::SeatsAvailable => vec![FilterValue::Integer(i64::from(conference.seats_available))],
        Field::Name => vec![FilterValue::Text(conference.name.clone())],
    }
}

/// Whether `conference` passes every filter of `plan`.
///
/// A multi-valued field passes a clause when any of its values does.
#[must_use]
pub fn plan_matches(plan: &QueryPlan, conference: &Conference) -> bool {
    plan.filters().iter().all(|clause| {
        field_values(conference, clause.field()).iter().any(|value| {
            value
                .compare(clause.value())
                .is_some_and(|ordering| clause.operator().accepts(ordering))
        })
    })
}

/// Order two conferences by the plan's sort keys.
///
/// A multi-valued field sorts by its smallest value; an empty one sorts first.
#[must_use]
pub fn plan_order(plan: &QueryPlan, a: &Conference, b: &Conference) -> Ordering {
    plan.sorts()
        .map(|field| {
            let key_a = field_values(a, field).into_iter().min_by(compare_values);
            let key_b = field_values(b, field).into_iter().min_by(compare_values);
            match (key_a, key_b) {
                (Some(x), Some(y)) => compare_values(&x, &y),
                (x, y) => x.is_some().cmp(&y.is_some()),
            }
        })
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

fn compare_values(a: &FilterValue, b: &FilterValue) -> Ordering {
    a.compare(b).unwrap_or(Ordering::Equal)
}

/// Query executor backed by kind scans of an [`AggregateStore`].
#[derive(Clone)]
pub struct StoreQueryExecutor {
    store: Arc<dyn AggregateStore>,
}

impl StoreQueryExecutor {
    /// Create an executor over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn AggregateStore>) -> Self {
        Self { store }
    }

    /// Lazily scan and decode every aggregate of kind `A`, then shape the results.
    fn scan<A, T, F>(&self, shape: F) -> RecordStream<T>
    where
        A: Aggregate,
        T: Send + 'static,
        F: FnOnce(Vec<A>) -> Vec<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        stream::once(async move {
            let records = store.scan(A::KIND).await?;
            let decoded = records
                .iter()
                .map(|record| aggregate::decode::<A>(&record.bytes))
                .collect::<Result<Vec<_>, _>>()?;
            Ok::<_, StoreError>(stream::iter(
                shape(decoded).into_iter().map(Ok::<T, StoreError>),
            ))
        })
        .try_flatten()
        .boxed()
    }
}

impl QueryExecutor for StoreQueryExecutor {
    fn conferences(&self, plan: &QueryPlan) -> RecordStream<Conference> {
        tracing::debug!(%plan, "Executing conference query");
        let plan = plan.clone();
        self.scan(move |mut conferences: Vec<Conference>| {
            conferences.retain(|conference| plan_matches(&plan, conference));
            conferences.sort_by(|a, b| plan_order(&plan, a, b));
            conferences
        })
    }

    fn conferences_organized_by(&self, organizer: &ProfileId) -> RecordStream<Conference> {
        let organizer = organizer.clone();
        self.scan(move |mut conferences: Vec<Conference>| {
            conferences.retain(|conference| conference.is_organized_by(&organizer));
            conferences.sort_by(|a, b| a.name.cmp(&b.name));
            conferences
        })
    }

    fn sessions(&self, query: &SessionQuery) -> RecordStream<Session> {
        let query = query.clone();
        self.scan(move |mut sessions: Vec<Session>| {
            sessions.retain(|session| query.matches(session));
            sessions.sort_by(|a, b| {
                a.date
                    .cmp(&b.date)
                    .then(a.start_time.cmp(&b.start_time))
                    .then_with(|| a.name.cmp(&b.name))
            });
            sessions
        })
    }

    fn speakers_named(&self, name: &str) -> RecordStream<Speaker> {
        let name = name.to_string();
        self.scan(move |mut speakers: Vec<Speaker>| {
            speakers.retain(|speaker| speaker.name == name);
            speakers
        })
    }

    fn profiles_wishlisting(&self, session: SessionId) -> RecordStream<ProfileId> {
        self.scan(move |profiles: Vec<Profile>| {
            profiles
                .into_iter()
                .filter(|profile| profile.session_wishlist.contains(&session))
                .map(|profile| profile.id)
                .collect()
        })
    }
}
