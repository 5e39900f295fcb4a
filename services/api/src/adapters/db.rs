//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `TaskStore` and `UserStore` ports from the `core` crate. It handles all
//! interactions with the SQLite database using `sqlx`.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tasksync_core::domain::{
    Category, CategoryDraft, NewTask, Task, TaskAccess, TaskChanges, TaskRole, User,
    UserCredentials, DEFAULT_CATEGORY_NAME, DEFAULT_COLOR_BODY, DEFAULT_COLOR_HEADER,
};
use tasksync_core::ordering;
use tasksync_core::ports::{PortError, PortResult, TaskStore, UserStore};
use tracing::debug;

use super::ordering as sequence;
use super::write_tx::WriteTx;

/// Translates `sqlx` errors into port errors, keeping duplicate keys apart.
pub(crate) fn map_db_error(e: sqlx::Error) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound("row not found".to_string()),
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            PortError::Conflict(db.message().to_string())
        }
        other => PortError::Unexpected(other.to_string()),
    }
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `TaskStore` and `UserStore` ports.
///
/// Every mutation that reads before it writes runs in a `WriteTx`; single
/// statement writes run on their own.
pub struct DbAdapter {
    pool: SqlitePool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens a pool with foreign keys enforced, WAL journaling so readers do
    /// not block the writer, and a busy timeout for waiting writers.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        // In-memory databases live exactly as long as their connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Ok(Self::new(pool))
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct CredentialsRecord {
    name: String,
    password_hash: String,
}
impl CredentialsRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            name: self.name,
            password_hash: self.password_hash,
        }
    }
}

#[derive(FromRow)]
struct AuthSessionRecord {
    user_name: String,
    expires_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct CategoryRecord {
    id: i64,
    name: String,
    color_header: String,
    color_body: String,
    is_default: bool,
}
impl CategoryRecord {
    fn to_domain(self) -> Category {
        Category {
            id: self.id,
            name: self.name,
            color_header: self.color_header,
            color_body: self.color_body,
            is_default: self.is_default,
        }
    }
}

/// One task joined with its category and the viewer's position.
#[derive(FromRow)]
struct TaskRecord {
    id: i64,
    title: String,
    description: String,
    is_done: bool,
    owner_name: String,
    category_id: i64,
    category_name: String,
    color_header: String,
    color_body: String,
    category_is_default: bool,
    position: i64,
}
impl TaskRecord {
    fn to_domain(self, shared: Vec<String>) -> Task {
        Task {
            id: self.id,
            title: self.title,
            description: self.description,
            is_done: self.is_done,
            category: Category {
                id: self.category_id,
                name: self.category_name,
                color_header: self.color_header,
                color_body: self.color_body,
                is_default: self.category_is_default,
            },
            owner: self.owner_name,
            shared,
            order: self.position,
        }
    }
}

/// The viewer's visible tasks: owned plus shared to them, in their order.
const VISIBLE_TASKS_SQL: &str = "SELECT t.id, t.title, t.description, t.is_done, t.owner_name,
        c.id AS category_id, c.name AS category_name, c.color_header, c.color_body,
        c.is_default AS category_is_default, o.position
    FROM task_order o
    INNER JOIN tasks t ON t.id = o.task_id
    INNER JOIN categories c ON c.id = t.category_id
    WHERE o.user_name = ?
      AND (t.owner_name = ?
           OR EXISTS (SELECT 1 FROM sharing s WHERE s.task_id = t.id AND s.target_name = ?))";

//=========================================================================================
// Transaction Helpers
//=========================================================================================

async fn task_owner(conn: &mut SqliteConnection, task_id: i64) -> PortResult<String> {
    sqlx::query_scalar::<_, String>("SELECT owner_name FROM tasks WHERE id = ?")
        .bind(task_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(map_db_error)?
        .ok_or_else(|| PortError::NotFound(format!("Task {} not found", task_id)))
}

async fn fetch_share_targets(conn: &mut SqliteConnection, task_id: i64) -> PortResult<Vec<String>> {
    sqlx::query_scalar::<_, String>(
        "SELECT target_name FROM sharing WHERE task_id = ? ORDER BY target_name ASC",
    )
    .bind(task_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(map_db_error)
}

async fn default_category_id(conn: &mut SqliteConnection, owner: &str) -> PortResult<i64> {
    sqlx::query_scalar::<_, i64>(
        "SELECT id FROM categories WHERE owner_name = ? AND is_default = 1",
    )
    .bind(owner)
    .fetch_optional(&mut *conn)
    .await
    .map_err(map_db_error)?
    .ok_or_else(|| PortError::NotFound(format!("Default category of {} not found", owner)))
}

async fn require_owned_category(
    conn: &mut SqliteConnection,
    owner: &str,
    category_id: i64,
) -> PortResult<()> {
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM categories WHERE id = ? AND owner_name = ?)",
    )
    .bind(category_id)
    .bind(owner)
    .fetch_one(&mut *conn)
    .await
    .map_err(map_db_error)?;
    if !exists {
        return Err(PortError::NotFound(format!(
            "Category {} not found",
            category_id
        )));
    }
    Ok(())
}

async fn user_exists_in(conn: &mut SqliteConnection, name: &str) -> PortResult<bool> {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE name = ?)")
        .bind(name)
        .fetch_one(&mut *conn)
        .await
        .map_err(map_db_error)
}

//=========================================================================================
// Write Transactions
//=========================================================================================

async fn create_user_in(
    conn: &mut SqliteConnection,
    name: &str,
    password_hash: &str,
) -> PortResult<User> {
    if user_exists_in(conn, name).await? {
        return Err(PortError::Conflict(format!("User {} already exists", name)));
    }

    sqlx::query("INSERT INTO users (name, password_hash) VALUES (?, ?)")
        .bind(name)
        .bind(password_hash)
        .execute(&mut *conn)
        .await
        .map_err(map_db_error)?;

    sqlx::query(
        "INSERT INTO categories (name, color_header, color_body, owner_name, is_default)
         VALUES (?, ?, ?, ?, 1)",
    )
    .bind(DEFAULT_CATEGORY_NAME)
    .bind(DEFAULT_COLOR_HEADER)
    .bind(DEFAULT_COLOR_BODY)
    .bind(name)
    .execute(&mut *conn)
    .await
    .map_err(map_db_error)?;

    Ok(User {
        name: name.to_string(),
    })
}

async fn insert_task_in(
    conn: &mut SqliteConnection,
    owner: &str,
    task: &NewTask,
) -> PortResult<i64> {
    let category_id = match task.category_id {
        Some(id) => {
            require_owned_category(conn, owner, id).await?;
            id
        }
        None => default_category_id(conn, owner).await?,
    };

    let visible = sequence::visible_task_count(conn, owner).await?;
    let position = match task.position {
        Some(position) => {
            ordering::check_insert(position, visible)?;
            position
        }
        None => ordering::append_position(visible),
    };

    let task_id = sqlx::query(
        "INSERT INTO tasks (title, description, is_done, category_id, owner_name)
         VALUES (?, ?, 0, ?, ?)",
    )
    .bind(&task.title)
    .bind(&task.description)
    .bind(category_id)
    .bind(owner)
    .execute(&mut *conn)
    .await
    .map_err(map_db_error)?
    .last_insert_rowid();

    sequence::insert_at(conn, owner, task_id, position).await?;
    Ok(task_id)
}

/// Removes the task from every sequence it appears in, then the task itself.
/// Returns the users it had been shared with.
async fn delete_task_in(
    conn: &mut SqliteConnection,
    owner: &str,
    task_id: i64,
) -> PortResult<Vec<String>> {
    let actual_owner = task_owner(conn, task_id).await?;
    if actual_owner != owner {
        return Err(PortError::Forbidden(format!(
            "task {} is not owned by {}",
            task_id, owner
        )));
    }

    let targets = fetch_share_targets(conn, task_id).await?;
    for target in &targets {
        sequence::remove_entry(conn, target, task_id).await?;
    }

    sqlx::query("DELETE FROM sharing WHERE task_id = ?")
        .bind(task_id)
        .execute(&mut *conn)
        .await
        .map_err(map_db_error)?;

    sequence::remove_entry(conn, owner, task_id).await?;

    let deleted = sqlx::query("DELETE FROM tasks WHERE id = ? AND owner_name = ?")
        .bind(task_id)
        .bind(owner)
        .execute(&mut *conn)
        .await
        .map_err(map_db_error)?;
    if deleted.rows_affected() == 0 {
        return Err(PortError::NotFound(format!("Task {} not found", task_id)));
    }
    Ok(targets)
}

async fn update_task_as_owner_in(
    conn: &mut SqliteConnection,
    owner: &str,
    changes: &TaskChanges,
) -> PortResult<()> {
    require_owned_category(conn, owner, changes.category_id).await?;

    let updated = sqlx::query(
        "UPDATE tasks SET title = ?, description = ?, is_done = ?, category_id = ?
         WHERE id = ? AND owner_name = ?",
    )
    .bind(&changes.title)
    .bind(&changes.description)
    .bind(changes.is_done)
    .bind(changes.category_id)
    .bind(changes.id)
    .bind(owner)
    .execute(&mut *conn)
    .await
    .map_err(map_db_error)?;
    if updated.rows_affected() == 0 {
        return Err(PortError::NotFound(format!("Task {} not found", changes.id)));
    }
    Ok(())
}

async fn share_task_in(conn: &mut SqliteConnection, task_id: i64, target: &str) -> PortResult<i64> {
    if !user_exists_in(conn, target).await? {
        return Err(PortError::NotFound(format!("User {} not found", target)));
    }
    let owner = task_owner(conn, task_id).await?;
    if owner == target {
        return Err(PortError::Validation(
            "owner and share target must differ".to_string(),
        ));
    }

    let already_shared = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM sharing WHERE task_id = ? AND target_name = ?)",
    )
    .bind(task_id)
    .bind(target)
    .fetch_one(&mut *conn)
    .await
    .map_err(map_db_error)?;
    if already_shared {
        return Err(PortError::Conflict(format!(
            "Task {} is already shared with {}",
            task_id, target
        )));
    }

    let position = sequence::append_shared(conn, target, task_id).await?;

    sqlx::query("INSERT INTO sharing (task_id, target_name) VALUES (?, ?)")
        .bind(task_id)
        .bind(target)
        .execute(&mut *conn)
        .await
        .map_err(map_db_error)?;
    Ok(position)
}

async fn unshare_task_in(conn: &mut SqliteConnection, task_id: i64, target: &str) -> PortResult<()> {
    let removed = sqlx::query("DELETE FROM sharing WHERE task_id = ? AND target_name = ?")
        .bind(task_id)
        .bind(target)
        .execute(&mut *conn)
        .await
        .map_err(map_db_error)?;
    if removed.rows_affected() == 0 {
        return Err(PortError::NotFound(format!(
            "Task {} is not shared with {}",
            task_id, target
        )));
    }

    sequence::remove_entry(conn, target, task_id).await?;
    Ok(())
}

async fn delete_category_in(conn: &mut SqliteConnection, owner: &str, id: i64) -> PortResult<()> {
    let is_default = sqlx::query_scalar::<_, bool>(
        "SELECT is_default FROM categories WHERE id = ? AND owner_name = ?",
    )
    .bind(id)
    .bind(owner)
    .fetch_optional(&mut *conn)
    .await
    .map_err(map_db_error)?
    .ok_or_else(|| PortError::NotFound(format!("Category {} not found", id)))?;
    if is_default {
        return Err(PortError::Validation(
            "the default category cannot be deleted".to_string(),
        ));
    }

    let fallback = default_category_id(conn, owner).await?;
    let moved = sqlx::query(
        "UPDATE tasks SET category_id = ? WHERE category_id = ? AND owner_name = ?",
    )
    .bind(fallback)
    .bind(id)
    .bind(owner)
    .execute(&mut *conn)
    .await
    .map_err(map_db_error)?;
    debug!(
        "Moved {} tasks of {} to the default category",
        moved.rows_affected(),
        owner
    );

    sqlx::query("DELETE FROM categories WHERE id = ? AND owner_name = ?")
        .bind(id)
        .bind(owner)
        .execute(&mut *conn)
        .await
        .map_err(map_db_error)?;
    Ok(())
}

//=========================================================================================
// `UserStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl UserStore for DbAdapter {
    async fn create_user(&self, name: &str, password_hash: &str) -> PortResult<User> {
        let mut tx = WriteTx::begin(&self.pool).await?;
        let result = create_user_in(&mut tx, name, password_hash).await;
        tx.finish(result).await
    }

    async fn get_user_credentials(&self, name: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT name, password_hash FROM users WHERE name = ?",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", name)),
            _ => map_db_error(e),
        })?;
        Ok(record.to_domain())
    }

    async fn user_exists(&self, name: &str) -> PortResult<bool> {
        let mut conn = self.pool.acquire().await.map_err(map_db_error)?;
        user_exists_in(&mut conn, name).await
    }

    async fn create_auth_session(
        &self,
        token: &str,
        user_name: &str,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (token, user_name, expires_at) VALUES (?, ?, ?)")
            .bind(token)
            .bind(user_name)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;
        Ok(())
    }

    async fn validate_auth_session(&self, token: &str) -> PortResult<String> {
        let record = sqlx::query_as::<_, AuthSessionRecord>(
            "SELECT user_name, expires_at FROM auth_sessions WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?
        .ok_or(PortError::Unauthorized)?;

        if record.expires_at <= Utc::now() {
            debug!("Rejected expired token for {}", record.user_name);
            return Err(PortError::Unauthorized);
        }
        Ok(record.user_name)
    }

    async fn delete_auth_session(&self, token: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;
        Ok(())
    }
}

//=========================================================================================
// `TaskStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl TaskStore for DbAdapter {
    async fn task_access(&self, user: &str, task_id: i64) -> PortResult<TaskAccess> {
        let mut conn = self.pool.acquire().await.map_err(map_db_error)?;
        let owner = task_owner(&mut conn, task_id).await?;
        if owner == user {
            return Ok(TaskAccess {
                owner,
                role: TaskRole::Owner,
            });
        }

        let is_recipient = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM sharing WHERE task_id = ? AND target_name = ?)",
        )
        .bind(task_id)
        .bind(user)
        .fetch_one(&mut *conn)
        .await
        .map_err(map_db_error)?;

        let role = if is_recipient {
            TaskRole::Recipient
        } else {
            TaskRole::Outsider
        };
        Ok(TaskAccess { owner, role })
    }

    async fn insert_task(&self, owner: &str, task: &NewTask) -> PortResult<i64> {
        let mut tx = WriteTx::begin(&self.pool).await?;
        let result = insert_task_in(&mut tx, owner, task).await;
        tx.finish(result).await
    }

    async fn delete_task(&self, owner: &str, task_id: i64) -> PortResult<Vec<String>> {
        let mut tx = WriteTx::begin(&self.pool).await?;
        let result = delete_task_in(&mut tx, owner, task_id).await;
        tx.finish(result).await
    }

    async fn update_task_as_owner(&self, owner: &str, changes: &TaskChanges) -> PortResult<()> {
        let mut tx = WriteTx::begin(&self.pool).await?;
        let result = update_task_as_owner_in(&mut tx, owner, changes).await;
        tx.finish(result).await
    }

    async fn update_task_completion(
        &self,
        recipient: &str,
        task_id: i64,
        is_done: bool,
    ) -> PortResult<()> {
        // The grant is checked in the same statement, so a concurrent unshare
        // cannot slip in between the access check and the write.
        let updated = sqlx::query(
            "UPDATE tasks SET is_done = ? WHERE id = ?
               AND EXISTS (SELECT 1 FROM sharing WHERE task_id = ? AND target_name = ?)",
        )
        .bind(is_done)
        .bind(task_id)
        .bind(task_id)
        .bind(recipient)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;
        if updated.rows_affected() > 0 {
            return Ok(());
        }

        let mut conn = self.pool.acquire().await.map_err(map_db_error)?;
        task_owner(&mut conn, task_id).await?;
        Err(PortError::Forbidden(format!(
            "task {} is not shared with {}",
            task_id, recipient
        )))
    }

    async fn task_for_user(&self, user: &str, task_id: i64) -> PortResult<Task> {
        let mut conn = self.pool.acquire().await.map_err(map_db_error)?;
        let record = sqlx::query_as::<_, TaskRecord>(&format!("{} AND t.id = ?", VISIBLE_TASKS_SQL))
            .bind(user)
            .bind(user)
            .bind(user)
            .bind(task_id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(map_db_error)?
            .ok_or_else(|| {
                PortError::NotFound(format!("Task {} is not visible to {}", task_id, user))
            })?;

        let shared = if record.owner_name == user {
            fetch_share_targets(&mut conn, task_id).await?
        } else {
            Vec::new()
        };
        Ok(record.to_domain(shared))
    }

    async fn tasks_for_user(&self, user: &str) -> PortResult<Vec<Task>> {
        let mut conn = self.pool.acquire().await.map_err(map_db_error)?;
        let records = sqlx::query_as::<_, TaskRecord>(&format!(
            "{} ORDER BY o.position ASC",
            VISIBLE_TASKS_SQL
        ))
        .bind(user)
        .bind(user)
        .bind(user)
        .fetch_all(&mut *conn)
        .await
        .map_err(map_db_error)?;

        let grants = sqlx::query_as::<_, (i64, String)>(
            "SELECT s.task_id, s.target_name FROM sharing s
             INNER JOIN tasks t ON t.id = s.task_id
             WHERE t.owner_name = ?
             ORDER BY s.target_name ASC",
        )
        .bind(user)
        .fetch_all(&mut *conn)
        .await
        .map_err(map_db_error)?;

        let mut shared: HashMap<i64, Vec<String>> = HashMap::new();
        for (task_id, target) in grants {
            shared.entry(task_id).or_default().push(target);
        }

        let tasks = records
            .into_iter()
            .map(|r| {
                let targets = if r.owner_name == user {
                    shared.remove(&r.id).unwrap_or_default()
                } else {
                    Vec::new()
                };
                r.to_domain(targets)
            })
            .collect();
        Ok(tasks)
    }

    async fn share_task(&self, task_id: i64, target: &str) -> PortResult<i64> {
        let mut tx = WriteTx::begin(&self.pool).await?;
        let result = share_task_in(&mut tx, task_id, target).await;
        tx.finish(result).await
    }

    async fn unshare_task(&self, task_id: i64, target: &str) -> PortResult<()> {
        let mut tx = WriteTx::begin(&self.pool).await?;
        let result = unshare_task_in(&mut tx, task_id, target).await;
        tx.finish(result).await
    }

    async fn share_targets(&self, task_id: i64) -> PortResult<Vec<String>> {
        let mut conn = self.pool.acquire().await.map_err(map_db_error)?;
        fetch_share_targets(&mut conn, task_id).await
    }

    async fn swap_order(&self, user: &str, task_id_up: i64, task_id_down: i64) -> PortResult<()> {
        let mut tx = WriteTx::begin(&self.pool).await?;
        let result = sequence::swap(&mut tx, user, task_id_up, task_id_down).await;
        tx.finish(result).await
    }

    async fn move_task(&self, user: &str, task_id: i64, position: i64) -> PortResult<()> {
        let mut tx = WriteTx::begin(&self.pool).await?;
        let result = sequence::move_entry(&mut tx, user, task_id, position).await;
        tx.finish(result).await
    }

    async fn insert_category(&self, owner: &str, draft: &CategoryDraft) -> PortResult<i64> {
        let result = sqlx::query(
            "INSERT INTO categories (name, color_header, color_body, owner_name, is_default)
             VALUES (?, ?, ?, ?, 0)",
        )
        .bind(&draft.name)
        .bind(&draft.color_header)
        .bind(&draft.color_body)
        .bind(owner)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(result.last_insert_rowid())
    }

    async fn update_category(
        &self,
        owner: &str,
        id: i64,
        draft: &CategoryDraft,
    ) -> PortResult<()> {
        let updated = sqlx::query(
            "UPDATE categories SET name = ?, color_header = ?, color_body = ?
             WHERE id = ? AND owner_name = ?",
        )
        .bind(&draft.name)
        .bind(&draft.color_header)
        .bind(&draft.color_body)
        .bind(id)
        .bind(owner)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;
        if updated.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Category {} not found", id)));
        }
        Ok(())
    }

    async fn delete_category(&self, owner: &str, id: i64) -> PortResult<()> {
        let mut tx = WriteTx::begin(&self.pool).await?;
        let result = delete_category_in(&mut tx, owner, id).await;
        tx.finish(result).await
    }

    async fn categories_for_user(&self, user: &str) -> PortResult<Vec<Category>> {
        let records = sqlx::query_as::<_, CategoryRecord>(
            "SELECT id, name, color_header, color_body, is_default
             FROM categories WHERE owner_name = ? ORDER BY id ASC",
        )
        .bind(user)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        let categories = records.into_iter().map(|r| r.to_domain()).collect();
        Ok(categories)
    }
}
