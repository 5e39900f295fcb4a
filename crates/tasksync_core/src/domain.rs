//! crates/tasksync_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

/// Name given to the category every user receives at registration.
pub const DEFAULT_CATEGORY_NAME: &str = "default";
pub const DEFAULT_COLOR_HEADER: &str = "#00a4ba";
pub const DEFAULT_COLOR_BODY: &str = "#00ceea";

// Represents a user - used throughout app
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub name: String,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub name: String,
    pub password_hash: String,
}

/// A user-owned grouping of tasks with its display colors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub color_header: String,
    pub color_body: String,
    /// The fallback category; exactly one per user and never deletable.
    pub is_default: bool,
}

/// The fields a caller supplies when creating or editing a category.
#[derive(Debug, Clone)]
pub struct CategoryDraft {
    pub name: String,
    pub color_header: String,
    pub color_body: String,
}

/// A task as seen by one particular user.
///
/// `order` is the task's position in *that* user's sequence, and `shared`
/// is only populated when the viewer is the owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub is_done: bool,
    pub category: Category,
    pub owner: String,
    pub shared: Vec<String>,
    pub order: i64,
}

/// Input for creating a task.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    /// `None` files the task under the owner's default category.
    pub category_id: Option<i64>,
    /// `None` appends the task at the end of the owner's sequence.
    pub position: Option<i64>,
}

/// A full replacement of a task's editable fields.
///
/// Only the owner may change anything but `is_done`.
#[derive(Debug, Clone)]
pub struct TaskChanges {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub is_done: bool,
    pub category_id: i64,
}

/// How a user relates to a given task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskRole {
    Owner,
    Recipient,
    Outsider,
}

/// The result of the authorization lookup that precedes every task mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskAccess {
    pub owner: String,
    pub role: TaskRole,
}

/// A change pushed to connected users after a mutation has been committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent {
    /// A task was shared with the recipient; carries the recipient's view.
    Shared(Task),
    /// A task visible to the recipient changed.
    Updated(Task),
    Deleted { task_id: i64 },
    Unshared { task_id: i64 },
}

impl TaskEvent {
    pub fn task_id(&self) -> i64 {
        match self {
            Self::Shared(task) | Self::Updated(task) => task.id,
            Self::Deleted { task_id } | Self::Unshared { task_id } => *task_id,
        }
    }
}
