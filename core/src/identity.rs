//! Caller identity.
//!
//! Authentication happens outside the core. An [`IdentityProvider`] hands the core
//! an already-verified [`UserIdentity`]; the core never sees credentials.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserIdentity {
    /// Stable user id; doubles as the attendee profile id.
    pub user_id: String,
    /// Primary email address.
    pub email: String,
    /// Display nickname supplied by the identity provider.
    pub nickname: String,
}

impl UserIdentity {
    /// Create a new identity.
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        email: impl Into<String>,
        nickname: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
            nickname: nickname.into(),
        }
    }
}

/// Returned when an operation requires an authenticated caller and there is none.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Authorization required")]
pub struct Unauthenticated;

/// Supplies the identity of the current caller.
pub trait IdentityProvider: Send + Sync {
    /// The current caller, if authenticated.
    fn current_user(&self) -> Option<UserIdentity>;

    /// The current caller, or [`Unauthenticated`].
    ///
    /// # Errors
    ///
    /// Returns [`Unauthenticated`] when no caller is signed in.
    fn require_user(&self) -> Result<UserIdentity, Unauthenticated> {
        self.current_user().ok_or(Unauthenticated)
    }
}
