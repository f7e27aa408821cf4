//! Background task routes and the worker that consumes them.
//!
//! The service submits fire-and-forget [`Task`]s through a `TaskDispatcher`. The
//! [`TaskWorker`] drains a channel of tasks and routes each one to its handler.
//! Failures are logged and never reach the submitter.

use crate::error::ConferenceError;
use crate::featured::FeaturedSpeakerEvaluator;
use crate::types::{ConferenceId, SessionId, SpeakerId};
use crate::wishlist::WishlistSweeper;
use conference_core::dispatch::Task;
use conference_runtime::TaskReceiver;
use std::str::FromStr;
use thiserror::Error;
use tokio::task::JoinHandle;

/// Route: email the organizer a copy of a newly created conference.
pub const SEND_CONFIRMATION_EMAIL: &str = "send_confirmation_email";
/// Route: recompute the featured speaker of a conference.
pub const FEATURE_SPEAKER: &str = "feature_speaker";
/// Route: remove a deleted session from every wishlist.
pub const SWEEP_WISHLISTS: &str = "sweep_wishlists";

/// Confirmation email task.
#[must_use]
pub fn confirmation_email(email: &str, conference_info: String) -> Task {
    Task::new(SEND_CONFIRMATION_EMAIL)
        .with_param("email", email)
        .with_param("conference_info", conference_info)
}

/// Featured speaker task.
#[must_use]
pub fn feature_speaker(conference_id: ConferenceId, speaker_id: SpeakerId) -> Task {
    Task::new(FEATURE_SPEAKER)
        .with_param("conference_id", conference_id.to_string())
        .with_param("speaker_id", speaker_id.to_string())
}

/// Wishlist sweep task.
#[must_use]
pub fn sweep_wishlists(session_id: SessionId) -> Task {
    Task::new(SWEEP_WISHLISTS).with_param("session_id", session_id.to_string())
}

/// Why a task could not be handled.
#[derive(Error, Debug)]
pub enum TaskError {
    /// No handler for the route.
    #[error("Unknown task route: {0}")]
    UnknownRoute(String),

    /// A required parameter is absent.
    #[error("Task {route} is missing parameter {param}")]
    MissingParam {
        /// Task route
        route: String,
        /// Parameter name
        param: &'static str,
    },

    /// A parameter does not parse.
    #[error("Task {route} has invalid parameter {param}: {value:?}")]
    InvalidParam {
        /// Task route
        route: String,
        /// Parameter name
        param: &'static str,
        /// Value as received
        value: String,
    },

    /// The handler itself failed.
    #[error(transparent)]
    Failed(#[from] ConferenceError),
}

/// Routes dispatched tasks to their handlers.
#[derive(Clone)]
pub struct TaskWorker {
    featured: FeaturedSpeakerEvaluator,
    sweeper: WishlistSweeper,
}

impl TaskWorker {
    /// Create a worker.
    #[must_use]
    pub const fn new(featured: FeaturedSpeakerEvaluator, sweeper: WishlistSweeper) -> Self {
        Self { featured, sweeper }
    }

    /// Handle tasks until every sender is dropped.
    pub async fn run(self, mut receiver: TaskReceiver) {
        tracing::info!("Task worker started");
        while let Some(task) = receiver.recv().await {
            if let Err(error) = self.handle(&task).await {
                tracing::error!(route = task.route(), %error, "Task failed");
            }
        }
        tracing::info!("Task worker stopped");
    }

    /// Run the worker on the tokio runtime.
    #[must_use]
    pub fn spawn(self, receiver: TaskReceiver) -> JoinHandle<()> {
        tokio::spawn(self.run(receiver))
    }

    /// Handle a single task.
    ///
    /// # Errors
    ///
    /// - [`TaskError::UnknownRoute`]
    /// - [`TaskError::MissingParam`] / [`TaskError::InvalidParam`]
    /// - [`TaskError::Failed`] when the handler fails
    #[tracing::instrument(skip(self, task), fields(route = task.route()))]
    pub async fn handle(&self, task: &Task) -> Result<(), TaskError> {
        match task.route() {
            SEND_CONFIRMATION_EMAIL => {
                let email = param(task, "email")?;
                let info = task.param("conference_info").unwrap_or_default();
                // Delivery belongs to the mail collaborator.
                tracing::info!(email, conference_info = info, "Conference confirmation email queued");
                Ok(())
            }
            FEATURE_SPEAKER => {
                let conference_id = parsed::<ConferenceId>(task, "conference_id")?;
                let speaker_id = parsed::<SpeakerId>(task, "speaker_id")?;
                self.featured.evaluate(conference_id, speaker_id).await?;
                Ok(())
            }
            SWEEP_WISHLISTS => {
                let session_id = parsed::<SessionId>(task, "session_id")?;
                self.sweeper.sweep(session_id).await?;
                Ok(())
            }
            other => Err(TaskError::UnknownRoute(other.to_string())),
        }
    }
}

fn param<'t>(task: &'t Task, name: &'static str) -> Result<&'t str, TaskError> {
    task.param(name).ok_or_else(|| TaskError::MissingParam {
        route: task.route().to_string(),
        param: name,
    })
}

fn parsed<T: FromStr>(task: &Task, name: &'static str) -> Result<T, TaskError> {
    let value = param(task, name)?;
    value.parse().map_err(|_| TaskError::InvalidParam {
        route: task.route().to_string(),
        param: name,
        value: value.to_string(),
    })
}
