//! crates/tasksync_core/src/service.rs
//!
//! The application service invoked by the web layer with an already
//! authenticated user name.
//!
//! Every operation follows the same steps: validate the input, run the
//! explicit authorization check, execute one store transaction, and only
//! after it has committed push events to the affected users.

use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::{
    Category, CategoryDraft, NewTask, Task, TaskChanges, TaskEvent, TaskRole, User,
};
use crate::notify::{DeliveryReport, Dispatcher};
use crate::ports::{PortError, PortResult, TaskStore, UserStore};

#[derive(Clone)]
pub struct TaskService {
    store: Arc<dyn TaskStore>,
    users: Arc<dyn UserStore>,
    dispatcher: Dispatcher,
}

fn require_non_empty(field: &str, value: &str) -> PortResult<()> {
    if value.trim().is_empty() {
        return Err(PortError::Validation(format!("{} must not be empty", field)));
    }
    Ok(())
}

impl TaskService {
    pub fn new(
        store: Arc<dyn TaskStore>,
        users: Arc<dyn UserStore>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            store,
            users,
            dispatcher,
        }
    }

    //=====================================================================================
    // Users
    //=====================================================================================

    /// Registers a user; the store creates the user's default category alongside.
    pub async fn register_user(&self, name: &str, password_hash: &str) -> PortResult<User> {
        require_non_empty("user name", name)?;
        let user = self.users.create_user(name, password_hash).await?;
        info!("Registered user {}", user.name);
        Ok(user)
    }

    //=====================================================================================
    // Tasks
    //=====================================================================================

    pub async fn create_task(&self, owner: &str, task: NewTask) -> PortResult<i64> {
        require_non_empty("title", &task.title)?;
        let id = self.store.insert_task(owner, &task).await?;
        info!("User {} created task {}", owner, id);
        Ok(id)
    }

    /// Deletes an owned task and tells every user it was shared with.
    pub async fn delete_task(&self, owner: &str, task_id: i64) -> PortResult<DeliveryReport> {
        let access = self.store.task_access(owner, task_id).await?;
        if access.role != TaskRole::Owner {
            return Err(PortError::Forbidden(format!(
                "task {} is not owned by {}",
                task_id, owner
            )));
        }

        let targets = self.store.delete_task(owner, task_id).await?;
        info!(
            "User {} deleted task {} (shared with {} users)",
            owner,
            task_id,
            targets.len()
        );

        let events = targets
            .into_iter()
            .map(|target| (target, TaskEvent::Deleted { task_id }))
            .collect();
        Ok(self.dispatcher.dispatch(events).await)
    }

    /// Applies `changes` on behalf of `actor`.
    ///
    /// The owner may edit every field. A share recipient may only toggle
    /// completion; the other fields of `changes` are ignored for them.
    pub async fn update_task(
        &self,
        actor: &str,
        changes: TaskChanges,
    ) -> PortResult<DeliveryReport> {
        let access = self.store.task_access(actor, changes.id).await?;
        match access.role {
            TaskRole::Owner => {
                require_non_empty("title", &changes.title)?;
                self.store.update_task_as_owner(actor, &changes).await?;
            }
            TaskRole::Recipient => {
                self.store
                    .update_task_completion(actor, changes.id, changes.is_done)
                    .await?;
            }
            TaskRole::Outsider => {
                return Err(PortError::Forbidden(format!(
                    "task {} is not visible to {}",
                    changes.id, actor
                )));
            }
        }

        let mut recipients = self.store.share_targets(changes.id).await?;
        if recipients.is_empty() {
            return Ok(DeliveryReport::default());
        }
        if access.owner != actor {
            recipients.push(access.owner);
        }
        Ok(self.push_snapshots(changes.id, recipients).await)
    }

    pub async fn tasks_for_user(&self, user: &str) -> PortResult<Vec<Task>> {
        self.store.tasks_for_user(user).await
    }

    //=====================================================================================
    // Sharing
    //=====================================================================================

    /// Shares an owned task with `target` and pushes the task to them.
    pub async fn share_task(
        &self,
        actor: &str,
        task_id: i64,
        target: &str,
    ) -> PortResult<DeliveryReport> {
        require_non_empty("target user", target)?;
        let access = self.store.task_access(actor, task_id).await?;
        if access.role != TaskRole::Owner {
            return Err(PortError::Forbidden(format!(
                "only the owner can share task {}",
                task_id
            )));
        }
        if target == access.owner {
            return Err(PortError::Validation(
                "owner and share target must differ".to_string(),
            ));
        }
        if !self.users.user_exists(target).await? {
            return Err(PortError::NotFound(format!("User {} not found", target)));
        }

        let position = self.store.share_task(task_id, target).await?;
        info!(
            "Task {} shared with {} at position {}",
            task_id, target, position
        );

        let snapshot = match self.store.task_for_user(target, task_id).await {
            Ok(task) => task,
            Err(e) => {
                warn!("Could not load shared task {} for {}: {}", task_id, target, e);
                return Ok(DeliveryReport {
                    failed: vec![target.to_string()],
                    ..DeliveryReport::default()
                });
            }
        };
        Ok(self
            .dispatcher
            .dispatch(vec![(target.to_string(), TaskEvent::Shared(snapshot))])
            .await)
    }

    /// Revokes `target`'s grant. The owner may revoke any grant; a recipient
    /// may only drop their own.
    pub async fn unshare_task(
        &self,
        actor: &str,
        task_id: i64,
        target: &str,
    ) -> PortResult<DeliveryReport> {
        let access = self.store.task_access(actor, task_id).await?;
        let allowed = match access.role {
            TaskRole::Owner => true,
            TaskRole::Recipient => actor == target,
            TaskRole::Outsider => false,
        };
        if !allowed {
            return Err(PortError::Forbidden(format!(
                "{} cannot revoke sharing of task {} for {}",
                actor, task_id, target
            )));
        }

        self.store.unshare_task(task_id, target).await?;
        info!("Task {} no longer shared with {}", task_id, target);

        Ok(self
            .dispatcher
            .dispatch(vec![(target.to_string(), TaskEvent::Unshared { task_id })])
            .await)
    }

    //=====================================================================================
    // Ordering
    //=====================================================================================

    /// Swaps two neighbouring tasks: `task_id_up` moves one place later and
    /// `task_id_down` one place earlier.
    pub async fn swap_order(
        &self,
        user: &str,
        task_id_up: i64,
        task_id_down: i64,
    ) -> PortResult<()> {
        if task_id_up == task_id_down {
            return Err(PortError::Validation(
                "cannot swap a task with itself".to_string(),
            ));
        }
        self.store.swap_order(user, task_id_up, task_id_down).await
    }

    pub async fn move_task(&self, user: &str, task_id: i64, position: i64) -> PortResult<()> {
        self.store.move_task(user, task_id, position).await
    }

    //=====================================================================================
    // Categories
    //=====================================================================================

    pub async fn create_category(&self, owner: &str, draft: CategoryDraft) -> PortResult<i64> {
        require_non_empty("category name", &draft.name)?;
        self.store.insert_category(owner, &draft).await
    }

    pub async fn update_category(
        &self,
        owner: &str,
        id: i64,
        draft: CategoryDraft,
    ) -> PortResult<()> {
        require_non_empty("category name", &draft.name)?;
        self.store.update_category(owner, id, &draft).await
    }

    /// Deletes a category and returns the owner's refreshed task list.
    pub async fn delete_category(&self, owner: &str, id: i64) -> PortResult<Vec<Task>> {
        self.store.delete_category(owner, id).await?;
        info!("User {} deleted category {}", owner, id);
        self.store.tasks_for_user(owner).await
    }

    pub async fn categories_for_user(&self, user: &str) -> PortResult<Vec<Category>> {
        self.store.categories_for_user(user).await
    }

    //=====================================================================================
    // Helpers
    //=====================================================================================

    /// Loads each recipient's own view of the task and pushes it as an update.
    async fn push_snapshots(&self, task_id: i64, recipients: Vec<String>) -> DeliveryReport {
        let mut events = Vec::with_capacity(recipients.len());
        let mut unloaded = Vec::new();
        for recipient in recipients {
            match self.store.task_for_user(&recipient, task_id).await {
                Ok(task) => events.push((recipient, TaskEvent::Updated(task))),
                Err(e) => {
                    warn!(
                        "Could not load task {} for {}: {}",
                        task_id, recipient, e
                    );
                    unloaded.push(recipient);
                }
            }
        }
        let mut report = self.dispatcher.dispatch(events).await;
        report.failed.extend(unloaded);
        report
    }
}
