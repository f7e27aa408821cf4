//! Error taxonomy for the registration core.
//!
//! | Kind | Retry? |
//! |------|--------|
//! | [`ConferenceError::Validation`] | never, caller bug |
//! | [`ConferenceError::NotFound`] | no |
//! | [`ConferenceError::Conflict`] | no, render a specific message |
//! | [`ConferenceError::Forbidden`] / [`ConferenceError::Unauthenticated`] | no |
//! | [`ConferenceError::Transient`] | yes, from outside |
//! | [`ConferenceError::Store`] | backend failure |

use conference_core::identity::Unauthenticated;
use conference_core::store::StoreError;
use conference_runtime::TransactionError;
use thiserror::Error;

/// Malformed caller input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A filter used an unknown field or operator token.
    #[error("Filter contains invalid field or operator: {field} {operator}")]
    InvalidFieldOrOperator {
        /// Field token as supplied
        field: String,
        /// Operator token as supplied
        operator: String,
    },

    /// A filter value does not have the field's type.
    #[error("Invalid value {value:?} for field {field}")]
    InvalidValue {
        /// Field name
        field: &'static str,
        /// Value as supplied
        value: String,
    },

    /// Two different fields carry non-equality operators.
    #[error("Inequality filter is allowed on only one field (got {first} and {second})")]
    MultipleInequalityFields {
        /// First inequality field
        first: &'static str,
        /// Second, conflicting inequality field
        second: &'static str,
    },

    /// A required `name` was missing or blank.
    #[error("{entity} 'name' field required")]
    MissingName {
        /// Kind of entity being created
        entity: &'static str,
    },

    /// Capacity cannot shrink below the seats already allocated.
    #[error("Cannot set max attendees to {requested}: {registered} seats already taken")]
    CapacityBelowRegistered {
        /// Seats currently allocated
        registered: u32,
        /// Requested capacity
        requested: u32,
    },
}

/// Business-rule conflicts, each rendered with its own message.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// The attendee already holds a seat.
    #[error("You have already registered for this conference")]
    AlreadyRegistered,
    /// No seats left.
    #[error("There are no seats available")]
    SoldOut,
    /// The session is already bookmarked.
    #[error("Session already exists in the wishlist")]
    AlreadyInWishlist,
    /// The session is not bookmarked.
    #[error("Session does not exist in the wishlist")]
    NotInWishlist,
}

/// Every error a registration-core operation can return.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConferenceError {
    /// Malformed input.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A referenced entity does not exist.
    #[error("No {entity} found with key: {id}")]
    NotFound {
        /// Kind of entity
        entity: &'static str,
        /// Id as text
        id: String,
    },

    /// Business-rule conflict.
    #[error(transparent)]
    Conflict(#[from] ConflictKind),

    /// The caller is not allowed to perform this operation.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// No authenticated caller.
    #[error(transparent)]
    Unauthenticated(#[from] Unauthenticated),

    /// Storage contention outlasted the retry budget; safe to retry.
    #[error("Temporarily unavailable after {attempts} attempts, please retry")]
    Transient {
        /// Attempts made before giving up
        attempts: usize,
    },

    /// Non-contention storage failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ConferenceError {
    /// Shorthand for [`ConferenceError::NotFound`].
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Whether the caller may retry the operation unchanged.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// The conflict kind, if this is a conflict.
    #[must_use]
    pub const fn conflict(&self) -> Option<ConflictKind> {
        match self {
            Self::Conflict(kind) => Some(*kind),
            _ => None,
        }
    }
}

impl From<TransactionError<Self>> for ConferenceError {
    fn from(error: TransactionError<Self>) -> Self {
        match error {
            TransactionError::Aborted(error) => error,
            TransactionError::Exhausted { attempts } => Self::Transient { attempts },
            TransactionError::Store(error) => Self::Store(error),
        }
    }
}

/// Result alias for registration-core operations.
pub type Result<T> = std::result::Result<T, ConferenceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_transaction_is_transient() {
        let error = ConferenceError::from(TransactionError::Exhausted { attempts: 4 });
        assert_eq!(error, ConferenceError::Transient { attempts: 4 });
        assert!(error.is_retryable());
    }

    #[test]
    fn aborted_transaction_unwraps_body_error() {
        let error = ConferenceError::from(TransactionError::Aborted(ConferenceError::from(
            ConflictKind::SoldOut,
        )));
        assert_eq!(error.conflict(), Some(ConflictKind::SoldOut));
        assert!(!error.is_retryable());
    }

    #[test]
    fn messages_are_specific() {
        assert_eq!(
            ConferenceError::from(ConflictKind::AlreadyRegistered).to_string(),
            "You have already registered for this conference"
        );
        assert_eq!(
            ConferenceError::not_found("conference", "abc").to_string(),
            "No conference found with key: abc"
        );
        assert_eq!(
            ValidationError::MissingName { entity: "Conference" }.to_string(),
            "Conference 'name' field required"
        );
    }
}
