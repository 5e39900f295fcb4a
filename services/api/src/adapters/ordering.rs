//! services/api/src/adapters/ordering.rs
//!
//! The SQL half of the ordering engine. Every function runs on the caller's
//! transaction so position changes commit or roll back together with the
//! task and sharing rows they belong to. Callers hold a `WriteTx`, so no
//! other writer can touch a sequence between reading and rewriting it.

use sqlx::SqliteConnection;
use tasksync_core::ordering::{self, plan_move};
use tasksync_core::ports::{PortError, PortResult};

use super::db::map_db_error;

/// Number of tasks a user can see: the ones they own plus the ones shared to them.
const VISIBLE_COUNT_SQL: &str = "SELECT COUNT(*) FROM (
    SELECT id FROM tasks WHERE owner_name = ?
    UNION
    SELECT task_id FROM sharing WHERE target_name = ?
)";

//=========================================================================================
// Sequence Queries
//=========================================================================================

pub async fn visible_task_count(conn: &mut SqliteConnection, user: &str) -> PortResult<i64> {
    sqlx::query_scalar::<_, i64>(VISIBLE_COUNT_SQL)
        .bind(user)
        .bind(user)
        .fetch_one(&mut *conn)
        .await
        .map_err(map_db_error)
}

pub async fn position_of(
    conn: &mut SqliteConnection,
    user: &str,
    task_id: i64,
) -> PortResult<Option<i64>> {
    sqlx::query_scalar::<_, i64>(
        "SELECT position FROM task_order WHERE user_name = ? AND task_id = ?",
    )
    .bind(user)
    .bind(task_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(map_db_error)
}

/// All positions of a user's sequence, ascending.
pub async fn positions(conn: &mut SqliteConnection, user: &str) -> PortResult<Vec<i64>> {
    sqlx::query_scalar::<_, i64>(
        "SELECT position FROM task_order WHERE user_name = ? ORDER BY position ASC",
    )
    .bind(user)
    .fetch_all(&mut *conn)
    .await
    .map_err(map_db_error)
}

async fn require_position(
    conn: &mut SqliteConnection,
    user: &str,
    task_id: i64,
) -> PortResult<i64> {
    position_of(conn, user, task_id).await?.ok_or_else(|| {
        PortError::NotFound(format!("Task {} is not in the list of {}", task_id, user))
    })
}

//=========================================================================================
// Sequence Mutations
//=========================================================================================

/// Inserts an entry at `position`, pushing the entries at or after it one place later.
pub async fn insert_at(
    conn: &mut SqliteConnection,
    user: &str,
    task_id: i64,
    position: i64,
) -> PortResult<()> {
    sqlx::query(
        "UPDATE task_order SET position = position + 1 WHERE user_name = ? AND position >= ?",
    )
    .bind(user)
    .bind(position)
    .execute(&mut *conn)
    .await
    .map_err(map_db_error)?;

    sqlx::query("INSERT INTO task_order (user_name, task_id, position) VALUES (?, ?, ?)")
        .bind(user)
        .bind(task_id)
        .bind(position)
        .execute(&mut *conn)
        .await
        .map_err(map_db_error)?;
    Ok(())
}

/// Appends a newly shared task to the target's sequence.
///
/// The count and the insert are one statement. Must run before the sharing
/// row exists, otherwise the task would be counted twice.
pub async fn append_shared(
    conn: &mut SqliteConnection,
    target: &str,
    task_id: i64,
) -> PortResult<i64> {
    sqlx::query(
        "INSERT INTO task_order (user_name, task_id, position)
         SELECT ?, ?, COUNT(*) + 1 FROM (
             SELECT id FROM tasks WHERE owner_name = ?
             UNION
             SELECT task_id FROM sharing WHERE target_name = ?
         )",
    )
    .bind(target)
    .bind(task_id)
    .bind(target)
    .bind(target)
    .execute(&mut *conn)
    .await
    .map_err(map_db_error)?;

    position_of(conn, target, task_id).await?.ok_or_else(|| {
        PortError::Unexpected(format!(
            "order entry for task {} vanished after insert",
            task_id
        ))
    })
}

/// Removes a user's entry for a task and closes the gap it leaves.
///
/// Returns the removed position, or `None` when the user had no entry.
pub async fn remove_entry(
    conn: &mut SqliteConnection,
    user: &str,
    task_id: i64,
) -> PortResult<Option<i64>> {
    let Some(position) = position_of(conn, user, task_id).await? else {
        return Ok(None);
    };

    sqlx::query("DELETE FROM task_order WHERE user_name = ? AND task_id = ?")
        .bind(user)
        .bind(task_id)
        .execute(&mut *conn)
        .await
        .map_err(map_db_error)?;

    sqlx::query(
        "UPDATE task_order SET position = position - 1 WHERE user_name = ? AND position > ?",
    )
    .bind(user)
    .bind(position)
    .execute(&mut *conn)
    .await
    .map_err(map_db_error)?;

    Ok(Some(position))
}

/// Exchanges two neighbouring entries: `task_id_up` moves one place later,
/// `task_id_down` one place earlier.
pub async fn swap(
    conn: &mut SqliteConnection,
    user: &str,
    task_id_up: i64,
    task_id_down: i64,
) -> PortResult<()> {
    let position_up = require_position(conn, user, task_id_up).await?;
    let position_down = require_position(conn, user, task_id_down).await?;
    ordering::check_adjacent(position_up, position_down)?;

    sqlx::query("UPDATE task_order SET position = ? WHERE user_name = ? AND task_id = ?")
        .bind(position_down)
        .bind(user)
        .bind(task_id_up)
        .execute(&mut *conn)
        .await
        .map_err(map_db_error)?;

    sqlx::query("UPDATE task_order SET position = ? WHERE user_name = ? AND task_id = ?")
        .bind(position_up)
        .bind(user)
        .bind(task_id_down)
        .execute(&mut *conn)
        .await
        .map_err(map_db_error)?;
    Ok(())
}

/// Moves one entry to `position`, shifting everything in between by one.
pub async fn move_entry(
    conn: &mut SqliteConnection,
    user: &str,
    task_id: i64,
    position: i64,
) -> PortResult<()> {
    let current = require_position(conn, user, task_id).await?;
    let visible = visible_task_count(conn, user).await?;
    ordering::check_move(position, visible)?;

    let Some(shift) = plan_move(current, position) else {
        return Ok(());
    };

    sqlx::query(
        "UPDATE task_order SET position = position + ?
         WHERE user_name = ? AND position BETWEEN ? AND ?",
    )
    .bind(shift.delta)
    .bind(user)
    .bind(shift.from)
    .bind(shift.to)
    .execute(&mut *conn)
    .await
    .map_err(map_db_error)?;

    sqlx::query("UPDATE task_order SET position = ? WHERE user_name = ? AND task_id = ?")
        .bind(position)
        .bind(user)
        .bind(task_id)
        .execute(&mut *conn)
        .await
        .map_err(map_db_error)?;
    Ok(())
}
