//! Domain types for the conference registration core.
//!
//! Four aggregates live here, each independently versioned by the store:
//!
//! - [`Conference`]: owns capacity (`max_attendees`, `seats_available`)
//! - [`Profile`]: the attendee, owns registrations and the session wishlist
//! - [`Session`]: a child of one conference, presented by one speaker
//! - [`Speaker`]
//!
//! Drafts ([`ConferenceDraft`], [`SessionDraft`], [`SpeakerDraft`],
//! [`ProfileChanges`]) carry caller input with every field optional; the service
//! applies defaults and validation.

use chrono::{NaiveDate, NaiveTime};
use conference_core::aggregate::Aggregate;
use conference_core::identity::UserIdentity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random id
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create an id from a `Uuid`
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

uuid_id! {
    /// Unique identifier for a conference
    ConferenceId
}

uuid_id! {
    /// Unique identifier for a session
    SessionId
}

uuid_id! {
    /// Unique identifier for a speaker
    SpeakerId
}

/// Attendee profile id: the stable user id from the identity provider.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProfileId(String);

impl ProfileId {
    /// Wrap a user id.
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        Self(user_id.into())
    }

    /// The underlying user id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&UserIdentity> for ProfileId {
    fn from(identity: &UserIdentity) -> Self {
        Self(identity.user_id.clone())
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Enumerations
// ============================================================================

/// Kind of session.
///
/// Unknown names parse to [`SessionType::NotSpecified`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionType {
    /// No type given
    #[default]
    NotSpecified,
    /// Hands-on workshop
    Workshop,
    /// Lecture
    Lecture,
    /// Keynote
    Keynote,
    /// Live demo
    Demo,
    /// Panel discussion
    Panel,
    /// Anything else
    Other,
}

impl SessionType {
    /// Every variant, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::NotSpecified,
        Self::Workshop,
        Self::Lecture,
        Self::Keynote,
        Self::Demo,
        Self::Panel,
        Self::Other,
    ];

    /// Canonical name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotSpecified => "NOT_SPECIFIED",
            Self::Workshop => "WORKSHOP",
            Self::Lecture => "LECTURE",
            Self::Keynote => "KEYNOTE",
            Self::Demo => "DEMO",
            Self::Panel => "PANEL",
            Self::Other => "OTHER",
        }
    }

    /// Parse a name case-insensitively, falling back to `NotSpecified`.
    #[must_use]
    pub fn parse(name: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|variant| variant.as_str().eq_ignore_ascii_case(name.trim()))
            .unwrap_or_default()
    }
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// T-shirt size on an attendee profile.
///
/// Unknown names parse to [`TeeShirtSize::NotSpecified`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum TeeShirtSize {
    #[default]
    NotSpecified,
    XsM,
    XsW,
    SM,
    SW,
    MM,
    MW,
    LM,
    LW,
    XlM,
    XlW,
    XxlM,
    XxlW,
    XxxlM,
    XxxlW,
}

impl TeeShirtSize {
    /// Every variant, in declaration order.
    pub const ALL: [Self; 15] = [
        Self::NotSpecified,
        Self::XsM,
        Self::XsW,
        Self::SM,
        Self::SW,
        Self::MM,
        Self::MW,
        Self::LM,
        Self::LW,
        Self::XlM,
        Self::XlW,
        Self::XxlM,
        Self::XxlW,
        Self::XxxlM,
        Self::XxxlW,
    ];

    /// Canonical name, e.g. `"XL_W"`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotSpecified => "NOT_SPECIFIED",
            Self::XsM => "XS_M",
            Self::XsW => "XS_W",
            Self::SM => "S_M",
            Self::SW => "S_W",
            Self::MM => "M_M",
            Self::MW => "M_W",
            Self::LM => "L_M",
            Self::LW => "L_W",
            Self::XlM => "XL_M",
            Self::XlW => "XL_W",
            Self::XxlM => "XXL_M",
            Self::XxlW => "XXL_W",
            Self::XxxlM => "XXXL_M",
            Self::XxxlW => "XXXL_W",
        }
    }

    /// Parse a name case-insensitively, falling back to `NotSpecified`.
    #[must_use]
    pub fn parse(name: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|variant| variant.as_str().eq_ignore_ascii_case(name.trim()))
            .unwrap_or_default()
    }
}

impl fmt::Display for TeeShirtSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Aggregates
// ============================================================================

/// A conference: the event record that owns capacity.
///
/// Invariant: `seats_available <= max_attendees` at every committed state.
/// Unsigned counters make the lower bound unrepresentable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conference {
    /// Conference id
    pub id: ConferenceId,
    /// Profile id of the organizer (owner)
    pub organizer_id: ProfileId,
    /// Display name; the canonical sort field
    pub name: String,
    /// Free-form description
    pub description: Option<String>,
    /// Topics, matched element-wise by topic filters
    pub topics: Vec<String>,
    /// Host city
    pub city: String,
    /// First day
    pub start_date: Option<NaiveDate>,
    /// Last day
    pub end_date: Option<NaiveDate>,
    /// Month of `start_date` (1-12), or 0 when there is no start date
    pub month: u32,
    /// Capacity
    pub max_attendees: u32,
    /// Unallocated seats
    pub seats_available: u32,
}

impl Conference {
    /// Number of seats currently allocated to attendees.
    #[must_use]
    pub const fn seats_taken(&self) -> u32 {
        self.max_attendees.saturating_sub(self.seats_available)
    }

    /// Whether `profile` organizes this conference.
    #[must_use]
    pub fn is_organized_by(&self, profile: &ProfileId) -> bool {
        &self.organizer_id == profile
    }
}

impl Aggregate for Conference {
    type Id = ConferenceId;
    const KIND: &'static str = "conference";

    fn id(&self) -> &ConferenceId {
        &self.id
    }
}

/// An attendee profile.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Profile id (user id)
    pub id: ProfileId,
    /// Name shown to other users
    pub display_name: String,
    /// Contact email
    pub main_email: String,
    /// T-shirt size
    pub tee_shirt_size: TeeShirtSize,
    /// Conferences this attendee holds a seat at
    pub conferences_to_attend: BTreeSet<ConferenceId>,
    /// Bookmarked sessions in insertion order, no duplicates
    pub session_wishlist: Vec<SessionId>,
}

impl Profile {
    /// A fresh profile seeded from the caller's identity.
    #[must_use]
    pub fn from_identity(identity: &UserIdentity) -> Self {
        Self {
            id: ProfileId::from(identity),
            display_name: identity.nickname.clone(),
            main_email: identity.email.clone(),
            tee_shirt_size: TeeShirtSize::NotSpecified,
            conferences_to_attend: BTreeSet::new(),
            session_wishlist: Vec::new(),
        }
    }

    /// Whether this attendee holds a seat at `conference`.
    #[must_use]
    pub fn is_registered_for(&self, conference: ConferenceId) -> bool {
        self.conferences_to_attend.contains(&conference)
    }
}

impl Aggregate for Profile {
    type Id = ProfileId;
    const KIND: &'static str = "profile";

    fn id(&self) -> &ProfileId {
        &self.id
    }
}

/// A session within a conference.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Session id
    pub id: SessionId,
    /// Parent conference
    pub conference_id: ConferenceId,
    /// Presenting speaker
    pub speaker_id: SpeakerId,
    /// Title
    pub name: String,
    /// Short highlights
    pub highlights: String,
    /// Duration in hours
    pub duration: f64,
    /// Local start time
    pub start_time: NaiveTime,
    /// Day of the session
    pub date: Option<NaiveDate>,
    /// Kind of session
    pub type_of_session: SessionType,
}

impl Aggregate for Session {
    type Id = SessionId;
    const KIND: &'static str = "session";

    fn id(&self) -> &SessionId {
        &self.id
    }
}

/// A speaker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Speaker {
    /// Speaker id
    pub id: SpeakerId,
    /// Full name
    pub name: String,
    /// Biography
    pub bio: Option<String>,
    /// Affiliation
    pub organization: Option<String>,
}

impl Aggregate for Speaker {
    type Id = SpeakerId;
    const KIND: &'static str = "speaker";

    fn id(&self) -> &SpeakerId {
        &self.id
    }
}

// ============================================================================
// Drafts
// ============================================================================

/// Caller-supplied conference fields.
///
/// On create, `name` is required and missing fields take defaults. On update,
/// only supplied fields are copied.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConferenceDraft {
    /// Display name
    pub name: Option<String>,
    /// Description
    pub description: Option<String>,
    /// Topics (an empty list counts as not supplied)
    pub topics: Option<Vec<String>>,
    /// Host city
    pub city: Option<String>,
    /// First day
    pub start_date: Option<NaiveDate>,
    /// Last day
    pub end_date: Option<NaiveDate>,
    /// Capacity
    pub max_attendees: Option<u32>,
}

impl ConferenceDraft {
    /// Draft with just a name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Set the host city.
    #[must_use]
    pub fn city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self
    }

    /// Set the topics.
    #[must_use]
    pub fn topics<I, S>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.topics = Some(topics.into_iter().map(Into::into).collect());
        self
    }

    /// Set the start date.
    #[must_use]
    pub const fn start_date(mut self, date: NaiveDate) -> Self {
        self.start_date = Some(date);
        self
    }

    /// Set the end date.
    #[must_use]
    pub const fn end_date(mut self, date: NaiveDate) -> Self {
        self.end_date = Some(date);
        self
    }

    /// Set the capacity.
    #[must_use]
    pub const fn max_attendees(mut self, max: u32) -> Self {
        self.max_attendees = Some(max);
        self
    }
}

/// Caller-supplied session fields.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionDraft {
    /// Title (required)
    pub name: Option<String>,
    /// Highlights (default `""`)
    pub highlights: Option<String>,
    /// Duration in hours (default 1.0)
    pub duration: Option<f64>,
    /// Start time (default 12:00)
    pub start_time: Option<NaiveTime>,
    /// Day of the session
    pub date: Option<NaiveDate>,
    /// Kind (default `NotSpecified`)
    pub type_of_session: Option<SessionType>,
}

impl SessionDraft {
    /// Draft with just a name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Set the session type.
    #[must_use]
    pub const fn of_type(mut self, kind: SessionType) -> Self {
        self.type_of_session = Some(kind);
        self
    }

    /// Set the date.
    #[must_use]
    pub const fn on(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    /// Set the start time.
    #[must_use]
    pub const fn at(mut self, time: NaiveTime) -> Self {
        self.start_time = Some(time);
        self
    }
}

/// Caller-supplied speaker fields.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeakerDraft {
    /// Full name (required)
    pub name: Option<String>,
    /// Biography
    pub bio: Option<String>,
    /// Affiliation
    pub organization: Option<String>,
}

impl SpeakerDraft {
    /// Draft with just a name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }
}

/// User-editable profile fields.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileChanges {
    /// New display name
    pub display_name: Option<String>,
    /// New t-shirt size
    pub tee_shirt_size: Option<TeeShirtSize>,
}
