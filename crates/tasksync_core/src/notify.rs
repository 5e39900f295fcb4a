//! crates/tasksync_core/src/notify.rs
//!
//! Fan-out of committed task changes to the users they affect.
//!
//! Delivery is best effort: a failed push is logged and reported back to the
//! caller, but it never undoes the mutation that produced the event.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::TaskEvent;
use crate::ports::NotificationService;

/// Outcome of one fan-out, by recipient name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: Vec<String>,
    /// Recipients without a live connection; their events were dropped.
    pub offline: Vec<String>,
    pub failed: Vec<String>,
}

impl DeliveryReport {
    /// True when no connected recipient missed its event.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    notifier: Arc<dyn NotificationService>,
}

impl Dispatcher {
    pub fn new(notifier: Arc<dyn NotificationService>) -> Self {
        Self { notifier }
    }

    /// Pushes each event to its recipient.
    pub async fn dispatch(&self, events: Vec<(String, TaskEvent)>) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for (recipient, event) in events {
            match self.notifier.send_to(&recipient, &event).await {
                Ok(true) => {
                    debug!("Pushed event for task {} to {}", event.task_id(), recipient);
                    report.delivered.push(recipient);
                }
                Ok(false) => report.offline.push(recipient),
                Err(e) => {
                    warn!(
                        "Failed to push event for task {} to {}: {}",
                        event.task_id(),
                        recipient,
                        e
                    );
                    report.failed.push(recipient);
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{PortError, PortResult};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records pushes; "carol" is connected but broken, "dave" is offline.
    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(String, i64)>>,
    }

    #[async_trait]
    impl NotificationService for RecordingNotifier {
        async fn send_to(&self, user: &str, event: &TaskEvent) -> PortResult<bool> {
            match user {
                "carol" => Err(PortError::Delivery("queue full".to_string())),
                "dave" => Ok(false),
                _ => {
                    self.sent
                        .lock()
                        .map_err(|e| PortError::Unexpected(e.to_string()))?
                        .push((user.to_string(), event.task_id()));
                    Ok(true)
                }
            }
        }
    }

    #[tokio::test]
    async fn dispatch_sorts_recipients_by_outcome() {
        let notifier = Arc::new(RecordingNotifier::default());
        let dispatcher = Dispatcher::new(notifier.clone());

        let report = dispatcher
            .dispatch(vec![
                ("bob".to_string(), TaskEvent::Deleted { task_id: 7 }),
                ("carol".to_string(), TaskEvent::Deleted { task_id: 7 }),
                ("dave".to_string(), TaskEvent::Deleted { task_id: 7 }),
            ])
            .await;

        assert_eq!(report.delivered, vec!["bob".to_string()]);
        assert_eq!(report.failed, vec!["carol".to_string()]);
        assert_eq!(report.offline, vec!["dave".to_string()]);
        assert!(!report.is_complete());
        assert_eq!(
            *notifier.sent.lock().unwrap(),
            vec![("bob".to_string(), 7)]
        );
    }

    #[tokio::test]
    async fn empty_fan_out_is_complete() {
        let dispatcher = Dispatcher::new(Arc::new(RecordingNotifier::default()));
        let report = dispatcher.dispatch(Vec::new()).await;
        assert!(report.is_complete());
        assert!(report.delivered.is_empty());
    }
}
