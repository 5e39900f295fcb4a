//! crates/tasksync_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the concrete database and connection handling.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    Category, CategoryDraft, NewTask, Task, TaskAccess, TaskChanges, TaskEvent, User,
    UserCredentials,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, sockets).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Notification could not be delivered: {0}")]
    Delivery(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Creates the user together with its default category.
    async fn create_user(&self, name: &str, password_hash: &str) -> PortResult<User>;

    async fn get_user_credentials(&self, name: &str) -> PortResult<UserCredentials>;

    async fn user_exists(&self, name: &str) -> PortResult<bool>;

    // --- Auth Methods ---
    async fn create_auth_session(
        &self,
        token: &str,
        user_name: &str,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// Resolves a token to its user name; missing or expired tokens are `Unauthorized`.
    async fn validate_auth_session(&self, token: &str) -> PortResult<String>;

    async fn delete_auth_session(&self, token: &str) -> PortResult<()>;
}

/// Transactional storage for tasks, categories, sharing grants and per-user ordering.
///
/// Every mutating method runs as a single transaction: on error nothing it
/// touched stays changed, and the per-user order sequences are dense again
/// when it returns.
#[async_trait]
pub trait TaskStore: Send + Sync {
    // --- Authorization ---
    async fn task_access(&self, user: &str, task_id: i64) -> PortResult<TaskAccess>;

    // --- Task Management ---
    async fn insert_task(&self, owner: &str, task: &NewTask) -> PortResult<i64>;

    /// Deletes an owned task and returns the users it had been shared with.
    async fn delete_task(&self, owner: &str, task_id: i64) -> PortResult<Vec<String>>;

    async fn update_task_as_owner(&self, owner: &str, changes: &TaskChanges) -> PortResult<()>;

    /// Sets `is_done` only while `recipient` still holds a grant on the task;
    /// a revoked grant yields `Forbidden`.
    async fn update_task_completion(
        &self,
        recipient: &str,
        task_id: i64,
        is_done: bool,
    ) -> PortResult<()>;

    async fn task_for_user(&self, user: &str, task_id: i64) -> PortResult<Task>;

    async fn tasks_for_user(&self, user: &str) -> PortResult<Vec<Task>>;

    // --- Sharing ---
    /// Grants `target` access and returns the position appended to its sequence.
    async fn share_task(&self, task_id: i64, target: &str) -> PortResult<i64>;

    async fn unshare_task(&self, task_id: i64, target: &str) -> PortResult<()>;

    async fn share_targets(&self, task_id: i64) -> PortResult<Vec<String>>;

    // --- Ordering ---
    async fn swap_order(&self, user: &str, task_id_up: i64, task_id_down: i64) -> PortResult<()>;

    async fn move_task(&self, user: &str, task_id: i64, position: i64) -> PortResult<()>;

    // --- Category Management ---
    async fn insert_category(&self, owner: &str, draft: &CategoryDraft) -> PortResult<i64>;

    async fn update_category(&self, owner: &str, id: i64, draft: &CategoryDraft)
        -> PortResult<()>;

    /// Moves the category's tasks to the owner's default category, then removes it.
    async fn delete_category(&self, owner: &str, id: i64) -> PortResult<()>;

    async fn categories_for_user(&self, user: &str) -> PortResult<Vec<Category>>;
}

#[async_trait]
pub trait NotificationService: Send + Sync {
    /// Pushes an event to the user's live connection.
    ///
    /// Returns `Ok(false)` when the user has no connection; the event is dropped.
    async fn send_to(&self, user: &str, event: &TaskEvent) -> PortResult<bool>;
}
