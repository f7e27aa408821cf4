//! Conference registration core.
//!
//! Organizers publish conferences with finite capacity; attendees discover,
//! filter, register for and bookmark sessions. Two pieces carry the weight:
//!
//! - **Filter compiler**: caller clauses become a validated [`QueryPlan`] with at
//!   most one inequality field and a deterministic sort order
//! - **Transactional allocation**: seat accounting and wishlist mutations run as
//!   optimistic transactions across independently versioned aggregates
//!
//! # Architecture
//!
//! ```text
//!                    ┌────────────────────┐
//!   caller ────────▶ │ ConferenceService  │ ───── Task ─────▶ TaskWorker
//!                    └────────────────────┘                       │
//!                      │        │        │                        │
//!         ┌────────────┘        │        └───────────┐            │
//!         ▼                     ▼                    ▼            ▼
//!  ┌──────────────┐   ┌──────────────────┐  ┌────────────────────────┐
//!  │ Registration │   │ WishlistManager  │  │ FeaturedSpeaker /      │
//!  │ Coordinator  │   │ WishlistSweeper  │  │ AnnouncementPublisher  │
//!  └──────────────┘   └──────────────────┘  └────────────────────────┘
//!         │                     │                    │
//!         └──────── TransactionExecutor ─────────────┤
//!                          │                   QueryExecutor
//!                    AggregateStore                  │
//!                                           AnnouncementSlot
//! ```
//!
//! # Seat invariant
//!
//! ```text
//! 0 <= seats_available <= max_attendees
//! seats_available == max_attendees - |profiles registered for the conference|
//! ```
//!
//! A seat moves between a `Conference` and a `Profile` only inside one
//! transaction, so concurrent registrations for the last seat yield exactly one
//! success and one `SoldOut`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod announcements;
pub mod config;
pub mod error;
pub mod featured;
pub mod filter;
pub mod ledger;
pub mod metrics;
pub mod query;
pub mod registration;
pub mod service;
pub mod tasks;
pub mod types;
pub mod wishlist;

pub use announcements::AnnouncementPublisher;
pub use config::Config;
pub use error::{ConferenceError, ConflictKind, Result, ValidationError};
pub use featured::FeaturedSpeakerEvaluator;
pub use filter::{Field, FilterCompiler, FilterValue, Operator, PredicateClause, QueryPlan, RawClause};
pub use ledger::{NoSeatsAvailable, SeatLedger};
pub use query::{QueryExecutor, RecordStream, SessionQuery, StoreQueryExecutor};
pub use registration::{Registered, RegistrationCoordinator, Unregistered};
pub use service::ConferenceService;
pub use tasks::{TaskError, TaskWorker};
pub use types::*;
pub use wishlist::{WishlistManager, WishlistSweeper};
