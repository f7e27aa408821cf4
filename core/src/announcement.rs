//! Announcement slot: a small external key-value side channel.
//!
//! Announcements are derived strings (e.g. "featured speaker", "nearly sold out")
//! that readers fetch by a well-known key. The slot is not owned by the core and
//! behaves like a cache: writes are best-effort and last-writer-wins.

use std::future::Future;
use std::pin::Pin;

/// Slot holding the current featured-speaker announcement.
pub const FEATURED_SPEAKER_KEY: &str = "FEATURED_SPEAKER";

/// Slot holding the current nearly-sold-out announcement.
pub const RECENT_ANNOUNCEMENTS_KEY: &str = "RECENT_ANNOUNCEMENTS";

/// External key-value store for published announcement strings.
///
/// Implementations must be `Send + Sync`. Operations never fail from the
/// caller's point of view; a backend that loses a write simply serves a stale or
/// empty announcement, which readers already tolerate.
pub trait AnnouncementSlot: Send + Sync {
    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: String) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;

    /// Remove the value under `key` (no-op if absent).
    fn clear(&self, key: &str) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;

    /// Read the value under `key`.
    fn get(&self, key: &str) -> Pin<Box<dyn Future<Output = Option<String>> + Send + '_>>;
}
