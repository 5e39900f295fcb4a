//! services/api/src/web/state.rs
//!
//! Defines the application state shared by every handler and push connection.

use crate::{adapters::registry::ConnectionRegistry, config::Config};
use std::sync::Arc;
use tasksync_core::{ports::UserStore, service::TaskService};

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TaskService>,
    /// Used directly by the auth routes and middleware for credentials and tokens.
    pub users: Arc<dyn UserStore>,
    pub registry: Arc<ConnectionRegistry>,
    pub config: Arc<Config>,
}

/// The authenticated user name, placed in request extensions by `require_auth`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser(pub String);
