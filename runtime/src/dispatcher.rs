//! In-process task dispatch over a tokio channel.
//!
//! [`ChannelDispatcher`] implements [`TaskDispatcher`] by pushing tasks onto an
//! unbounded channel. A worker (see the `conference` crate's task worker) drains
//! the receiving end and routes each task by name.

use conference_core::dispatch::{Task, TaskDispatcher};
use tokio::sync::mpsc;

/// Receiving end handed to the task worker.
pub type TaskReceiver = mpsc::UnboundedReceiver<Task>;

/// Fire-and-forget dispatcher backed by an unbounded channel.
#[derive(Clone, Debug)]
pub struct ChannelDispatcher {
    sender: mpsc::UnboundedSender<Task>,
}

impl ChannelDispatcher {
    /// Create a dispatcher and the receiver its tasks arrive on.
    #[must_use]
    pub fn new() -> (Self, TaskReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl TaskDispatcher for ChannelDispatcher {
    fn submit(&self, task: Task) {
        let route = task.route().to_string();
        if self.sender.send(task).is_err() {
            tracing::warn!(route, "Task worker stopped, dropping task");
        } else {
            tracing::trace!(route, "Task submitted");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn submitted_tasks_arrive_in_order() {
        let (dispatcher, mut receiver) = ChannelDispatcher::new();

        dispatcher.submit(Task::new("first"));
        dispatcher.submit(Task::new("second").with_param("k", "v"));

        assert_eq!(receiver.recv().await.unwrap().route(), "first");
        let second = receiver.recv().await.unwrap();
        assert_eq!(second.param("k"), Some("v"));
    }

    #[test]
    fn submit_after_worker_stopped_does_not_panic() {
        let (dispatcher, receiver) = ChannelDispatcher::new();
        drop(receiver);
        dispatcher.submit(Task::new("orphan"));
    }
}
