//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for user signup, login, and logout.

use axum::{extract::State, http::HeaderMap, http::StatusCode, response::IntoResponse, Json};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tasksync_core::ports::PortError;
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::ApiError,
    web::{
        middleware::bearer_token,
        protocol::{CategoryPayload, TaskPayload},
        state::AppState,
    },
};

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct CredentialsRequest {
    pub name: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct SignupResponse {
    pub name: String,
}

/// Everything the client needs to render its first screen after logging in.
#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub tasks: Vec<TaskPayload>,
    pub categories: Vec<CategoryPayload>,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /api/users/new - Create a new user account
#[utoipa::path(
    post,
    path = "/api/users/new",
    request_body = CredentialsRequest,
    responses(
        (status = 201, description = "User created successfully", body = SignupResponse),
        (status = 400, description = "Empty name or password"),
        (status = 409, description = "The name is already taken"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CredentialsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.password.is_empty() {
        return Err(PortError::Validation("password must not be empty".to_string()).into());
    }

    // 1. Hash the password
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            ApiError::Internal("Failed to hash password".to_string())
        })?
        .to_string();

    // 2. Create the user and its default category
    let user = state
        .service
        .register_user(req.name.trim(), &password_hash)
        .await?;

    Ok((StatusCode::CREATED, Json(SignupResponse { name: user.name })))
}

/// POST /api/users - Login with existing account
#[utoipa::path(
    post,
    path = "/api/users",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CredentialsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // 1. Get the stored credentials; an unknown name looks like a bad password.
    let credentials = match state.users.get_user_credentials(req.name.trim()).await {
        Ok(credentials) => credentials,
        Err(PortError::NotFound(_)) => return Err(PortError::Unauthorized.into()),
        Err(e) => return Err(e.into()),
    };

    // 2. Verify password
    let parsed_hash = PasswordHash::new(&credentials.password_hash).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        ApiError::Internal("Authentication error".to_string())
    })?;
    if Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .is_err()
    {
        return Err(PortError::Unauthorized.into());
    }

    // 3. Issue a token
    let token = Uuid::new_v4().to_string();
    let expires_at = Utc::now() + Duration::hours(state.config.auth_token_ttl_hours);
    state
        .users
        .create_auth_session(&token, &credentials.name, expires_at)
        .await?;
    info!("User {} logged in", credentials.name);

    // 4. Return the initial view
    let tasks = state.service.tasks_for_user(&credentials.name).await?;
    let categories = state.service.categories_for_user(&credentials.name).await?;

    Ok(Json(LoginResponse {
        token,
        tasks: tasks.into_iter().map(TaskPayload::from).collect(),
        categories: categories.into_iter().map(CategoryPayload::from).collect(),
    }))
}

/// POST /api/users/logout - Invalidate the presented token
#[utoipa::path(
    post,
    path = "/api/users/logout",
    responses(
        (status = 204, description = "Logout successful"),
        (status = 401, description = "No token presented")
    ),
    security(("bearer_token" = []))
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let token = bearer_token(&headers).ok_or(PortError::Unauthorized)?;
    state.users.delete_auth_session(token).await?;
    Ok(StatusCode::NO_CONTENT)
}
