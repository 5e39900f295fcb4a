//! services/api/src/adapters/registry.rs
//!
//! The live session registry: at most one push connection per user name.
//!
//! Each connection owns a bounded outbound queue drained by its own writer
//! task, so a notification never waits on a socket write. This adapter
//! implements the `NotificationService` port from the `core` crate.

use std::collections::HashMap;

use async_trait::async_trait;
use tasksync_core::domain::TaskEvent;
use tasksync_core::ports::{NotificationService, PortError, PortResult};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::web::protocol::ServerMessage;

/// Identifies one registered connection, so a replaced connection can be told apart.
pub type ConnectionId = Uuid;

struct ConnectionHandle {
    id: ConnectionId,
    sender: mpsc::Sender<ServerMessage>,
}

pub struct ConnectionRegistry {
    connections: Mutex<HashMap<String, ConnectionHandle>>,
    queue_capacity: usize,
}

impl ConnectionRegistry {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Registers a new connection for `user` and returns the receiving end of
    /// its outbound queue. A previous connection of the same user stops
    /// receiving notifications but is not closed.
    pub async fn register(&self, user: &str) -> (ConnectionId, mpsc::Receiver<ServerMessage>) {
        let (sender, receiver) = mpsc::channel(self.queue_capacity);
        let id = Uuid::new_v4();

        let mut connections = self.connections.lock().await;
        if connections
            .insert(user.to_string(), ConnectionHandle { id, sender })
            .is_some()
        {
            info!("Replaced existing push connection of {}", user);
        }
        (id, receiver)
    }

    /// Removes the entry for `user` if it still belongs to connection `id`.
    pub async fn unregister(&self, user: &str, id: ConnectionId) -> bool {
        let mut connections = self.connections.lock().await;
        match connections.get(user) {
            Some(handle) if handle.id == id => {
                connections.remove(user);
                true
            }
            _ => false,
        }
    }

    pub async fn is_connected(&self, user: &str) -> bool {
        self.connections.lock().await.contains_key(user)
    }

    /// Queues a message for the user's connection.
    ///
    /// `Ok(false)` when the user is not connected. A full queue means the
    /// client is not keeping up and the message is dropped with an error.
    pub async fn send_message(&self, user: &str, message: ServerMessage) -> PortResult<bool> {
        let mut connections = self.connections.lock().await;
        let Some(handle) = connections.get(user) else {
            return Ok(false);
        };

        match handle.sender.try_send(message) {
            Ok(()) => {
                debug!("Queued push message for {}", user);
                Ok(true)
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Push queue of {} is full; dropping message", user);
                Err(PortError::Delivery(format!("push queue of {} is full", user)))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                connections.remove(user);
                warn!("Push connection of {} is gone; unregistered", user);
                Err(PortError::Delivery(format!("connection of {} is closed", user)))
            }
        }
    }
}

//=========================================================================================
// `NotificationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl NotificationService for ConnectionRegistry {
    async fn send_to(&self, user: &str, event: &TaskEvent) -> PortResult<bool> {
        self.send_message(user, ServerMessage::from(event)).await
    }
}
