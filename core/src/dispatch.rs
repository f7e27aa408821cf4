//! Fire-and-forget task submission.
//!
//! Work that should not block the caller (confirmation emails, featured-speaker
//! recomputation, wishlist sweeps) is described as a [`Task`] and handed to a
//! [`TaskDispatcher`]. The submitter never awaits completion and never inspects the
//! delivery outcome.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A unit of background work: a route name plus string parameters.
///
/// # Examples
///
/// ```
/// use conference_core::dispatch::Task;
///
/// let task = Task::new("send_confirmation_email")
///     .with_param("email", "ada@example.com")
///     .with_param("conference_info", "RustConf");
///
/// assert_eq!(task.route(), "send_confirmation_email");
/// assert_eq!(task.param("email"), Some("ada@example.com"));
/// assert_eq!(task.param("missing"), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    route: String,
    params: BTreeMap<String, String>,
}

impl Task {
    /// Create a task for the given route with no parameters.
    #[must_use]
    pub fn new(route: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            params: BTreeMap::new(),
        }
    }

    /// Add a parameter.
    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// The route this task is addressed to.
    #[must_use]
    pub fn route(&self) -> &str {
        &self.route
    }

    /// Look up a parameter by name.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// All parameters, ordered by name.
    #[must_use]
    pub const fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }
}

/// Fire-and-forget submission of background work.
///
/// Implementations must not block; a dispatcher that cannot accept the task logs
/// and drops it.
pub trait TaskDispatcher: Send + Sync {
    /// Submit a task for asynchronous execution.
    fn submit(&self, task: Task);
}
