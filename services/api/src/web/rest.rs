//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the task and category REST endpoints and the
//! master definition of the OpenAPI document.
//!
//! Every handler here runs behind `require_auth` and acts as the `AuthUser`
//! it finds in the request extensions.

use crate::{
    error::ApiError,
    web::{
        auth::{CredentialsRequest, LoginResponse, SignupResponse},
        protocol::{CategoryPayload, TaskPayload},
        state::{AppState, AuthUser},
    },
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tasksync_core::{
    domain::{CategoryDraft, NewTask, TaskChanges},
    notify::DeliveryReport,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi, ToSchema,
};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::web::auth::signup_handler,
        crate::web::auth::login_handler,
        crate::web::auth::logout_handler,
        list_tasks_handler,
        create_task_handler,
        update_task_handler,
        delete_task_handler,
        share_task_handler,
        unshare_task_handler,
        swap_order_handler,
        move_task_handler,
        list_categories_handler,
        create_category_handler,
        update_category_handler,
        delete_category_handler,
    ),
    components(
        schemas(
            CredentialsRequest, SignupResponse, LoginResponse, TaskPayload, CategoryPayload,
            CategoryRef, CreateTaskRequest, UpdateTaskRequest, CategoryRequest,
            CreatedResponse, DeliveryResponse, TasksResponse, CategoriesResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Task Sync API", description = "Shared task lists with per-user ordering and live updates.")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_token",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}

//=========================================================================================
// API Request and Response Structs
//=========================================================================================

/// Refers to a category by id; other category fields sent by the client are ignored.
#[derive(Deserialize, ToSchema)]
pub struct CategoryRef {
    pub id: i64,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateTaskRequest {
    pub title: String,
    #[serde(default)]
    pub desc: String,
    /// Omit to file the task under the default category.
    pub category: Option<CategoryRef>,
    /// 1-based position in the caller's list; omit to append.
    pub order: Option<i64>,
}

/// A full replacement of the task's fields. Share recipients may only change `isDone`.
#[derive(Deserialize, ToSchema)]
pub struct UpdateTaskRequest {
    pub title: String,
    #[serde(default)]
    pub desc: String,
    #[serde(rename = "isDone")]
    pub is_done: bool,
    pub category: CategoryRef,
}

#[derive(Deserialize, ToSchema)]
pub struct CategoryRequest {
    pub cat_name: String,
    pub color_header: String,
    pub color_body: String,
}

impl From<CategoryRequest> for CategoryDraft {
    fn from(req: CategoryRequest) -> Self {
        Self {
            name: req.cat_name,
            color_header: req.color_header,
            color_body: req.color_body,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct CreatedResponse {
    pub id: i64,
}

/// Which affected users received the live notification for a change.
#[derive(Serialize, ToSchema)]
pub struct DeliveryResponse {
    pub delivered: Vec<String>,
    pub offline: Vec<String>,
    pub failed: Vec<String>,
}

impl From<DeliveryReport> for DeliveryResponse {
    fn from(report: DeliveryReport) -> Self {
        Self {
            delivered: report.delivered,
            offline: report.offline,
            failed: report.failed,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct TasksResponse {
    pub tasks: Vec<TaskPayload>,
}

#[derive(Serialize, ToSchema)]
pub struct CategoriesResponse {
    pub categories: Vec<CategoryPayload>,
}

fn tasks_response(tasks: Vec<tasksync_core::domain::Task>) -> TasksResponse {
    TasksResponse {
        tasks: tasks.into_iter().map(TaskPayload::from).collect(),
    }
}

//=========================================================================================
// Task Handlers
//=========================================================================================

/// List the caller's own and shared tasks in the caller's order.
#[utoipa::path(
    get,
    path = "/api/tasks",
    responses(
        (status = 200, description = "The caller's tasks", body = TasksResponse),
        (status = 401, description = "Missing or expired token")
    ),
    security(("bearer_token" = []))
)]
pub async fn list_tasks_handler(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
) -> Result<Json<TasksResponse>, ApiError> {
    let tasks = state.service.tasks_for_user(&user).await?;
    Ok(Json(tasks_response(tasks)))
}

/// Create a task owned by the caller.
#[utoipa::path(
    post,
    path = "/api/tasks",
    request_body = CreateTaskRequest,
    responses(
        (status = 201, description = "Task created", body = CreatedResponse),
        (status = 400, description = "Empty title or position out of range"),
        (status = 404, description = "Unknown category")
    ),
    security(("bearer_token" = []))
)]
pub async fn create_task_handler(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Json(req): Json<CreateTaskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let task = NewTask {
        title: req.title,
        description: req.desc,
        category_id: req.category.map(|c| c.id),
        position: req.order,
    };
    let id = state.service.create_task(&user, task).await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

/// Update a task. The owner may change every field; a share recipient only `isDone`.
#[utoipa::path(
    patch,
    path = "/api/tasks/{id}",
    request_body = UpdateTaskRequest,
    params(("id" = i64, Path, description = "The task id")),
    responses(
        (status = 200, description = "Task updated", body = DeliveryResponse),
        (status = 403, description = "The task is not visible to the caller"),
        (status = 404, description = "Unknown task or category")
    ),
    security(("bearer_token" = []))
)]
pub async fn update_task_handler(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateTaskRequest>,
) -> Result<Json<DeliveryResponse>, ApiError> {
    let changes = TaskChanges {
        id,
        title: req.title,
        description: req.desc,
        is_done: req.is_done,
        category_id: req.category.id,
    };
    let report = state.service.update_task(&user, changes).await?;
    Ok(Json(report.into()))
}

/// Delete an owned task.
#[utoipa::path(
    delete,
    path = "/api/tasks/{id}",
    params(("id" = i64, Path, description = "The task id")),
    responses(
        (status = 200, description = "Task deleted", body = DeliveryResponse),
        (status = 403, description = "The caller does not own the task"),
        (status = 404, description = "Unknown task")
    ),
    security(("bearer_token" = []))
)]
pub async fn delete_task_handler(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<DeliveryResponse>, ApiError> {
    let report = state.service.delete_task(&user, id).await?;
    Ok(Json(report.into()))
}

/// Share an owned task with another user.
#[utoipa::path(
    post,
    path = "/api/tasks/{id}/share/{target}",
    params(
        ("id" = i64, Path, description = "The task id"),
        ("target" = String, Path, description = "The user to share with")
    ),
    responses(
        (status = 201, description = "Task shared", body = DeliveryResponse),
        (status = 400, description = "Sharing with the owner"),
        (status = 403, description = "The caller does not own the task"),
        (status = 404, description = "Unknown task or user"),
        (status = 409, description = "Already shared with that user")
    ),
    security(("bearer_token" = []))
)]
pub async fn share_task_handler(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path((id, target)): Path<(i64, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let report = state.service.share_task(&user, id, &target).await?;
    Ok((StatusCode::CREATED, Json(DeliveryResponse::from(report))))
}

/// Revoke a grant. Owners may revoke any grant, recipients only their own.
#[utoipa::path(
    delete,
    path = "/api/tasks/{id}/share/{target}",
    params(
        ("id" = i64, Path, description = "The task id"),
        ("target" = String, Path, description = "The user to revoke")
    ),
    responses(
        (status = 200, description = "Sharing revoked", body = DeliveryResponse),
        (status = 403, description = "The caller may not revoke this grant"),
        (status = 404, description = "Unknown task or grant")
    ),
    security(("bearer_token" = []))
)]
pub async fn unshare_task_handler(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path((id, target)): Path<(i64, String)>,
) -> Result<Json<DeliveryResponse>, ApiError> {
    let report = state.service.unshare_task(&user, id, &target).await?;
    Ok(Json(report.into()))
}

/// Swap two neighbouring tasks in the caller's order.
#[utoipa::path(
    patch,
    path = "/api/tasks/order/{id_up}/{id_down}",
    params(
        ("id_up" = i64, Path, description = "The task moving one place later"),
        ("id_down" = i64, Path, description = "The task moving one place earlier")
    ),
    responses(
        (status = 204, description = "Order swapped"),
        (status = 400, description = "The tasks are not neighbours"),
        (status = 404, description = "A task is not in the caller's list")
    ),
    security(("bearer_token" = []))
)]
pub async fn swap_order_handler(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path((id_up, id_down)): Path<(i64, i64)>,
) -> Result<StatusCode, ApiError> {
    state.service.swap_order(&user, id_up, id_down).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Move a task to any position of the caller's order.
#[utoipa::path(
    patch,
    path = "/api/tasks/{id}/position/{position}",
    params(
        ("id" = i64, Path, description = "The task id"),
        ("position" = i64, Path, description = "The new 1-based position")
    ),
    responses(
        (status = 204, description = "Task moved"),
        (status = 400, description = "Position out of range"),
        (status = 404, description = "The task is not in the caller's list")
    ),
    security(("bearer_token" = []))
)]
pub async fn move_task_handler(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path((id, position)): Path<(i64, i64)>,
) -> Result<StatusCode, ApiError> {
    state.service.move_task(&user, id, position).await?;
    Ok(StatusCode::NO_CONTENT)
}

//=========================================================================================
// Category Handlers
//=========================================================================================

#[utoipa::path(
    get,
    path = "/api/categories",
    responses(
        (status = 200, description = "The caller's categories", body = CategoriesResponse)
    ),
    security(("bearer_token" = []))
)]
pub async fn list_categories_handler(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
) -> Result<Json<CategoriesResponse>, ApiError> {
    let categories = state.service.categories_for_user(&user).await?;
    Ok(Json(CategoriesResponse {
        categories: categories.into_iter().map(CategoryPayload::from).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/categories",
    request_body = CategoryRequest,
    responses(
        (status = 201, description = "Category created", body = CreatedResponse),
        (status = 400, description = "Empty name")
    ),
    security(("bearer_token" = []))
)]
pub async fn create_category_handler(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Json(req): Json<CategoryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = state.service.create_category(&user, req.into()).await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

#[utoipa::path(
    patch,
    path = "/api/categories/{id}",
    request_body = CategoryRequest,
    params(("id" = i64, Path, description = "The category id")),
    responses(
        (status = 204, description = "Category updated"),
        (status = 404, description = "Unknown category")
    ),
    security(("bearer_token" = []))
)]
pub async fn update_category_handler(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(req): Json<CategoryRequest>,
) -> Result<StatusCode, ApiError> {
    state.service.update_category(&user, id, req.into()).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Delete a category; its tasks move to the default category.
#[utoipa::path(
    delete,
    path = "/api/categories/{id}",
    params(("id" = i64, Path, description = "The category id")),
    responses(
        (status = 200, description = "Category deleted; the refreshed task list", body = TasksResponse),
        (status = 400, description = "The default category cannot be deleted"),
        (status = 404, description = "Unknown category")
    ),
    security(("bearer_token" = []))
)]
pub async fn delete_category_handler(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<TasksResponse>, ApiError> {
    let tasks = state.service.delete_category(&user, id).await?;
    Ok(Json(tasks_response(tasks)))
}
