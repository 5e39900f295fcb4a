//! services/api/src/lib.rs
//!
//! The HTTP and WebSocket service around `tasksync_core`: SQLite storage,
//! the live connection registry, configuration and the axum router.

pub mod adapters;
pub mod config;
pub mod error;
pub mod router;
pub mod web;
