//! services/api/src/web/protocol.rs
//!
//! Defines the JSON shapes exchanged with the browser client: the task and
//! category payloads used by the REST routes, and the WebSocket push messages.
//! Field names follow the existing web client (`desc`, `isDone`, `cat_name`).

use serde::{Deserialize, Serialize};
use tasksync_core::domain::{Category, Task, TaskEvent};
use utoipa::ToSchema;

//=========================================================================================
// Shared Payloads
//=========================================================================================

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, ToSchema)]
pub struct CategoryPayload {
    pub id: i64,
    pub cat_name: String,
    pub color_header: String,
    pub color_body: String,
    #[serde(default)]
    pub is_default: bool,
}

impl From<Category> for CategoryPayload {
    fn from(category: Category) -> Self {
        Self {
            id: category.id,
            cat_name: category.name,
            color_header: category.color_header,
            color_body: category.color_body,
            is_default: category.is_default,
        }
    }
}

/// A task as the requesting (or notified) user sees it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, ToSchema)]
pub struct TaskPayload {
    pub id: i64,
    pub title: String,
    pub desc: String,
    #[serde(rename = "isDone")]
    pub is_done: bool,
    pub category: CategoryPayload,
    pub owner: String,
    pub shared: Vec<String>,
    pub order: i64,
}

impl From<Task> for TaskPayload {
    fn from(task: Task) -> Self {
        Self {
            id: task.id,
            title: task.title,
            desc: task.description,
            is_done: task.is_done,
            category: task.category.into(),
            owner: task.owner,
            shared: task.shared,
            order: task.order,
        }
    }
}

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

/// The push channel is server-to-client; the client only keeps it alive.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Ping,
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

/// Represents the structured text messages the server can push to the client.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A task was shared with this user and now appears in their list.
    TaskShared { task: TaskPayload },

    /// A task visible to this user changed.
    TaskUpdated { task: TaskPayload },

    /// The owner deleted a task that was shared with this user.
    TaskDeleted { task_id: i64 },

    /// This user's access to a task was revoked.
    TaskUnshared { task_id: i64 },

    Pong,

    /// Reports an error to the client, which should display an error message.
    Error { message: String },
}

impl From<&TaskEvent> for ServerMessage {
    fn from(event: &TaskEvent) -> Self {
        match event {
            TaskEvent::Shared(task) => Self::TaskShared {
                task: task.clone().into(),
            },
            TaskEvent::Updated(task) => Self::TaskUpdated {
                task: task.clone().into(),
            },
            TaskEvent::Deleted { task_id } => Self::TaskDeleted { task_id: *task_id },
            TaskEvent::Unshared { task_id } => Self::TaskUnshared { task_id: *task_id },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_task() -> Task {
        Task {
            id: 3,
            title: "Pay rent".to_string(),
            description: "before the 5th".to_string(),
            is_done: true,
            category: Category {
                id: 1,
                name: "default".to_string(),
                color_header: "#00a4ba".to_string(),
                color_body: "#00ceea".to_string(),
                is_default: true,
            },
            owner: "alice".to_string(),
            shared: vec![],
            order: 1,
        }
    }

    #[test]
    fn updated_event_uses_client_field_names() {
        let message = ServerMessage::from(&TaskEvent::Updated(sample_task()));
        let value = serde_json::to_value(&message).unwrap();

        assert_eq!(value["type"], "task_updated");
        assert_eq!(value["task"]["isDone"], true);
        assert_eq!(value["task"]["desc"], "before the 5th");
        assert_eq!(value["task"]["category"]["cat_name"], "default");
        assert_eq!(value["task"]["shared"], json!([]));
    }

    #[test]
    fn deletion_carries_only_the_id() {
        let message = ServerMessage::from(&TaskEvent::Deleted { task_id: 9 });
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({ "type": "task_deleted", "task_id": 9 })
        );
    }

    #[test]
    fn ping_parses_from_tagged_json() {
        let parsed: ClientMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(parsed, ClientMessage::Ping));
    }
}
