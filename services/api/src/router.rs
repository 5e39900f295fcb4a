//! services/api/src/router.rs
//!
//! Wires the adapters into the shared `AppState` and builds the axum router.

use crate::{
    adapters::{db::DbAdapter, registry::ConnectionRegistry},
    config::{Config, ConfigError},
    web::{
        auth::{login_handler, logout_handler, signup_handler},
        require_auth,
        rest::{
            create_category_handler, create_task_handler, delete_category_handler,
            delete_task_handler, list_categories_handler, list_tasks_handler, move_task_handler,
            share_task_handler, swap_order_handler, unshare_task_handler,
            update_category_handler, update_task_handler, ApiDoc,
        },
        state::AppState,
        ws_handler,
    },
};
use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tasksync_core::{notify::Dispatcher, service::TaskService};
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Builds the shared state: the registry doubles as the notification port
/// and the database adapter as both stores.
pub fn build_state(config: Arc<Config>, db: Arc<DbAdapter>) -> Arc<AppState> {
    let registry = Arc::new(ConnectionRegistry::new(config.notify_queue_capacity));
    let dispatcher = Dispatcher::new(registry.clone());
    let service = Arc::new(TaskService::new(db.clone(), db.clone(), dispatcher));

    Arc::new(AppState {
        service,
        users: db,
        registry,
        config,
    })
}

pub fn build_router(app_state: Arc<AppState>) -> Result<Router, ConfigError> {
    let origin = app_state
        .config
        .cors_origin
        .parse::<HeaderValue>()
        .map_err(|e| ConfigError::InvalidValue("CORS_ORIGIN".to_string(), e.to_string()))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // Public routes (no bearer token; the push channel checks its own query token)
    let public_routes = Router::new()
        .route("/api/users/new", post(signup_handler))
        .route("/api/users", post(login_handler))
        .route("/api/users/logout", post(logout_handler))
        .route("/ws", get(ws_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/api/tasks", get(list_tasks_handler).post(create_task_handler))
        .route(
            "/api/tasks/{id}",
            patch(update_task_handler).delete(delete_task_handler),
        )
        .route(
            "/api/tasks/{id}/share/{target}",
            post(share_task_handler).delete(unshare_task_handler),
        )
        .route("/api/tasks/order/{id_up}/{id_down}", patch(swap_order_handler))
        .route("/api/tasks/{id}/position/{position}", patch(move_task_handler))
        .route(
            "/api/categories",
            get(list_categories_handler).post(create_category_handler),
        )
        .route(
            "/api/categories/{id}",
            patch(update_category_handler).delete(delete_category_handler),
        )
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    Ok(Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())))
}
