//! Seat ledger: the capacity invariant and its allowed transitions.
//!
//! Pure functions over an already-loaded [`Conference`]. Callers run them inside
//! a transaction so the read-modify-write of `seats_available` is atomic.

use crate::error::ValidationError;
use crate::types::Conference;
use thiserror::Error;

/// The conference has no seats left.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("No seats available")]
pub struct NoSeatsAvailable;

/// Capacity accounting on a conference.
pub struct SeatLedger;

impl SeatLedger {
    /// Take one seat.
    ///
    /// # Errors
    ///
    /// [`NoSeatsAvailable`] when `seats_available` is 0.
    pub fn try_allocate(mut conference: Conference) -> Result<Conference, NoSeatsAvailable> {
        conference.seats_available = conference
            .seats_available
            .checked_sub(1)
            .ok_or(NoSeatsAvailable)?;
        Ok(conference)
    }

    /// Return one previously allocated seat.
    #[must_use]
    pub fn release(mut conference: Conference) -> Conference {
        conference.seats_available = conference.seats_available.saturating_add(1);
        debug_assert!(
            conference.seats_available <= conference.max_attendees,
            "released a seat that was never allocated"
        );
        conference
    }

    /// Change capacity, shifting `seats_available` by the same delta.
    ///
    /// # Errors
    ///
    /// [`ValidationError::CapacityBelowRegistered`] when the new capacity is smaller
    /// than the number of seats already taken.
    pub fn resize(mut conference: Conference, max_attendees: u32) -> Result<Conference, ValidationError> {
        let taken = conference.seats_taken();
        if max_attendees < taken {
            return Err(ValidationError::CapacityBelowRegistered {
                registered: taken,
                requested: max_attendees,
            });
        }
        conference.max_attendees = max_attendees;
        conference.seats_available = max_attendees - taken;
        Ok(conference)
    }
}
