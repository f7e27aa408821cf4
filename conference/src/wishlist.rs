//! Session wishlists.
//!
//! A wishlist is owned by the attendee's [`Profile`]: duplicate-free and kept in
//! insertion order. Every mutation is a single-aggregate transaction.
//!
//! Deleting a session leaves dangling wishlist entries behind. [`WishlistSweeper`]
//! removes them afterwards, in bounded batches.

use crate::error::{ConferenceError, ConflictKind, Result};
use crate::metrics;
use crate::query::QueryExecutor;
use crate::types::{Profile, ProfileId, Session, SessionId};
use conference_core::identity::UserIdentity;
use conference_runtime::TransactionExecutor;
use futures::StreamExt;
use futures::future::try_join_all;
use std::sync::Arc;

/// Add, remove and list bookmarked sessions.
#[derive(Clone)]
pub struct WishlistManager {
    executor: TransactionExecutor,
}

impl WishlistManager {
    /// Create a manager running on `executor`.
    #[must_use]
    pub const fn new(executor: TransactionExecutor) -> Self {
        Self { executor }
    }

    /// Append `session_id` to the caller's wishlist.
    ///
    /// Creates the caller's profile on first use.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the session does not exist
    /// - `Conflict(AlreadyInWishlist)`
    /// - `Transient` if contention outlasted the retry budget
    #[tracing::instrument(skip(self, attendee), fields(attendee_id = %attendee.user_id))]
    pub async fn add(&self, attendee: &UserIdentity, session_id: SessionId) -> Result<()> {
        let attendee = attendee.clone();

        self.executor
            .run_atomic::<_, ConferenceError, _>("wishlist_add", move |tx| {
                let attendee = attendee.clone();
                Box::pin(async move {
                    if tx.load::<Session>(&session_id).await?.is_none() {
                        return Err(ConferenceError::not_found("session", session_id));
                    }
                    let mut profile = tx
                        .load_or_else::<Profile, _>(&ProfileId::from(&attendee), || {
                            Profile::from_identity(&attendee)
                        })
                        .await?;
                    if profile.session_wishlist.contains(&session_id) {
                        return Err(ConflictKind::AlreadyInWishlist.into());
                    }
                    profile.session_wishlist.push(session_id);
                    tx.save(&profile)?;
                    Ok(())
                })
            })
            .await?;

        metrics::record_wishlist_change("add");
        Ok(())
    }

    /// Remove `session_id` from the caller's wishlist.
    ///
    /// # Errors
    ///
    /// - `Conflict(NotInWishlist)`, also when the caller has no profile yet
    /// - `Transient` if contention outlasted the retry budget
    #[tracing::instrument(skip(self, attendee), fields(attendee_id = %attendee.user_id))]
    pub async fn remove(&self, attendee: &UserIdentity, session_id: SessionId) -> Result<()> {
        let profile_id = ProfileId::from(attendee);

        self.executor
            .run_atomic::<_, ConferenceError, _>("wishlist_remove", move |tx| {
                let profile_id = profile_id.clone();
                Box::pin(async move {
                    let mut profile = tx
                        .load::<Profile>(&profile_id)
                        .await?
                        .filter(|p| p.session_wishlist.contains(&session_id))
                        .ok_or(ConflictKind::NotInWishlist)?;
                    profile.session_wishlist.retain(|id| *id != session_id);
                    tx.save(&profile)?;
                    Ok(())
                })
            })
            .await?;

        metrics::record_wishlist_change("remove");
        Ok(())
    }

    /// Empty the caller's wishlist. Returns how many entries were removed.
    ///
    /// Always succeeds on an already-empty wishlist; an unknown caller gets no profile.
    ///
    /// # Errors
    ///
    /// `Transient` if contention outlasted the retry budget.
    #[tracing::instrument(skip(self, attendee), fields(attendee_id = %attendee.user_id))]
    pub async fn clear(&self, attendee: &UserIdentity) -> Result<usize> {
        let profile_id = ProfileId::from(attendee);

        let removed = self
            .executor
            .run_atomic::<_, ConferenceError, _>("wishlist_clear", move |tx| {
                let profile_id = profile_id.clone();
                Box::pin(async move {
                    let Some(mut profile) = tx.load::<Profile>(&profile_id).await? else {
                        return Ok(0);
                    };
                    let removed = profile.session_wishlist.len();
                    if removed > 0 {
                        profile.session_wishlist.clear();
                        tx.save(&profile)?;
                    }
                    Ok(removed)
                })
            })
            .await?;

        if removed > 0 {
            metrics::record_wishlist_change("clear");
        }
        Ok(removed)
    }

    /// Sessions on the caller's wishlist, in insertion order.
    ///
    /// Entries whose session no longer exists are skipped.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub async fn list(&self, attendee: &UserIdentity) -> Result<Vec<Session>> {
        let Some(profile) = self
            .executor
            .get::<Profile>(&ProfileId::from(attendee))
            .await?
        else {
            return Ok(Vec::new());
        };

        let mut sessions = Vec::with_capacity(profile.session_wishlist.len());
        for session_id in &profile.session_wishlist {
            match self.executor.get::<Session>(session_id).await? {
                Some(session) => sessions.push(session),
                None => tracing::debug!(%session_id, "Skipping deleted wishlist session"),
            }
        }
        Ok(sessions)
    }
}

/// Removes a deleted session from every wishlist that still holds it.
#[derive(Clone)]
pub struct WishlistSweeper {
    executor: TransactionExecutor,
    queries: Arc<dyn QueryExecutor>,
    batch_size: usize,
}

impl WishlistSweeper {
    /// Create a sweeper that updates at most `batch_size` profiles concurrently.
    #[must_use]
    pub fn new(
        executor: TransactionExecutor,
        queries: Arc<dyn QueryExecutor>,
        batch_size: usize,
    ) -> Self {
        Self {
            executor,
            queries,
            batch_size: batch_size.max(1),
        }
    }

    /// Remove `session_id` from every wishlist. Returns the number of profiles changed.
    ///
    /// Each profile is its own transaction; a failure stops the sweep but keeps the
    /// profiles already cleaned. Running it again is safe.
    ///
    /// # Errors
    ///
    /// The first store or transaction failure.
    #[tracing::instrument(skip(self))]
    pub async fn sweep(&self, session_id: SessionId) -> Result<usize> {
        let mut batches = self
            .queries
            .profiles_wishlisting(session_id)
            .chunks(self.batch_size);

        let mut changed = 0;
        while let Some(batch) = batches.next().await {
            let ids = batch.into_iter().collect::<std::result::Result<Vec<_>, _>>()?;
            let removed =
                try_join_all(ids.into_iter().map(|id| self.sweep_one(id, session_id))).await?;
            changed += removed.into_iter().filter(|r| *r).count();
        }

        tracing::info!(changed, "Wishlist sweep finished");
        Ok(changed)
    }

    async fn sweep_one(&self, profile_id: ProfileId, session_id: SessionId) -> Result<bool> {
        let removed = self
            .executor
            .run_atomic::<_, ConferenceError, _>("wishlist_sweep", move |tx| {
                let profile_id = profile_id.clone();
                Box::pin(async move {
                    let Some(mut profile) = tx.load::<Profile>(&profile_id).await? else {
                        return Ok(false);
                    };
                    let before = profile.session_wishlist.len();
                    profile.session_wishlist.retain(|id| *id != session_id);
                    if profile.session_wishlist.len() == before {
                        return Ok(false);
                    }
                    tx.save(&profile)?;
                    Ok(true)
                })
            })
            .await?;

        if removed {
            metrics::record_wishlist_change("sweep");
        }
        Ok(removed)
    }
}
