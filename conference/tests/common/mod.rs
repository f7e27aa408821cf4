//! Shared fixtures for the integration tests.

#![allow(dead_code)]
#![allow(clippy::unwrap_used)]

use conference::{Config, ConferenceService};
use conference_core::identity::UserIdentity;
use conference_testing::{
    InMemoryAggregateStore, InMemoryAnnouncementSlot, RecordingDispatcher, test_clock,
};
use std::sync::Arc;

/// A service wired to in-memory collaborators that tests can inspect.
pub struct Harness {
    pub service: ConferenceService,
    pub store: Arc<InMemoryAggregateStore>,
    pub slot: Arc<InMemoryAnnouncementSlot>,
    pub dispatcher: Arc<RecordingDispatcher>,
}

impl Harness {
    /// Run every recorded task through the service's task worker, oldest first.
    pub async fn run_tasks(&self) -> usize {
        let worker = self.service.task_worker();
        let tasks = self.dispatcher.drain();
        for task in &tasks {
            worker.handle(task).await.unwrap();
        }
        tasks.len()
    }
}

/// Harness with a fast retry budget.
pub fn harness() -> Harness {
    harness_with(|_| {})
}

/// Harness with a fast retry budget and further config tweaks.
pub fn harness_with(configure: impl FnOnce(&mut Config)) -> Harness {
    conference_testing::init_test_tracing();

    let mut config = Config::default();
    config.transactions.initial_delay_ms = 1;
    config.transactions.max_delay_ms = 5;
    configure(&mut config);

    let store = Arc::new(InMemoryAggregateStore::new());
    let slot = Arc::new(InMemoryAnnouncementSlot::new());
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let service = ConferenceService::new(
        &config,
        store.clone(),
        slot.clone(),
        dispatcher.clone(),
        Arc::new(test_clock()),
    );

    Harness {
        service,
        store,
        slot,
        dispatcher,
    }
}

/// A signed-in user whose id, email and nickname derive from `id`.
pub fn user(id: &str) -> UserIdentity {
    UserIdentity::new(id, format!("{id}@example.com"), id)
}
