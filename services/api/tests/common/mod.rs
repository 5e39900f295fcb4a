//! Shared setup for the integration tests: a SQLite database with the real
//! migrations, wired exactly like the server.

#![allow(dead_code)]

use std::sync::Arc;

use api_lib::{
    adapters::{db::DbAdapter, ordering},
    config::Config,
    router::build_state,
    web::state::AppState,
};
use tasksync_core::{domain::NewTask, ordering::is_dense, service::TaskService, Task};
use tempfile::TempDir;

pub struct Harness {
    pub db: Arc<DbAdapter>,
    pub state: Arc<AppState>,
    /// Keeps a file-backed database alive until the harness is dropped.
    _dir: Option<TempDir>,
}

/// One connection keeps the in-memory database alive for the whole test.
pub async fn setup() -> Harness {
    build("sqlite::memory:".to_string(), 1, None).await
}

/// A database file in a temp directory behind a pool of `max_connections`,
/// so transactions really run side by side.
pub async fn setup_file_backed(max_connections: u32) -> Harness {
    let dir = tempfile::tempdir().expect("temp dir");
    let url = format!("sqlite://{}", dir.path().join("tasks.db").display());
    build(url, max_connections, Some(dir)).await
}

async fn build(database_url: String, max_connections: u32, dir: Option<TempDir>) -> Harness {
    let config = Config::from_lookup(|key| match key {
        "DATABASE_URL" => Some(database_url.clone()),
        "NOTIFY_QUEUE_CAPACITY" => Some("8".to_string()),
        _ => None,
    })
    .expect("test config");

    let db = Arc::new(
        DbAdapter::connect(&config.database_url, max_connections)
            .await
            .expect("test database"),
    );
    db.run_migrations().await.expect("migrations");

    let state = build_state(Arc::new(config), db.clone());
    Harness {
        db,
        state,
        _dir: dir,
    }
}

impl Harness {
    pub fn service(&self) -> &TaskService {
        &self.state.service
    }

    pub async fn register(&self, name: &str) {
        self.service()
            .register_user(name, "not-a-real-hash")
            .await
            .expect("register user");
    }

    /// Appends a task with default category.
    pub async fn create(&self, owner: &str, title: &str) -> i64 {
        self.service()
            .create_task(
                owner,
                NewTask {
                    title: title.to_string(),
                    ..NewTask::default()
                },
            )
            .await
            .expect("create task")
    }

    pub async fn tasks(&self, user: &str) -> Vec<Task> {
        self.service().tasks_for_user(user).await.expect("list tasks")
    }

    /// Task titles in the user's display order.
    pub async fn titles(&self, user: &str) -> Vec<String> {
        self.tasks(user).await.into_iter().map(|t| t.title).collect()
    }

    /// Raw positions stored for the user, ascending.
    pub async fn positions(&self, user: &str) -> Vec<i64> {
        let mut conn = self.db.pool().acquire().await.expect("connection");
        ordering::positions(&mut conn, user).await.expect("positions")
    }

    pub async fn assert_dense(&self, user: &str) {
        let positions = self.positions(user).await;
        assert!(
            is_dense(&positions),
            "order of {} is not dense: {:?}",
            user,
            positions
        );
        assert_eq!(
            positions.len(),
            self.tasks(user).await.len(),
            "order of {} does not cover exactly its visible tasks",
            user
        );
    }
}
