//! Axum HTTP API server.
//!
//! This crate provides:
//! - Job lifecycle REST routes (create, list, inspect, cancel, download,
//!   delete) keyed by the gateway-supplied user identity
//! - The storage-webhook ingress feeding the upload queue
//! - The relay subscriber persisting worker events and fanning them out
//!   to per-job WebSocket rooms
//! - Prometheus metrics

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod rooms;
pub mod routes;
pub mod state;
pub mod subscriber;
pub mod ws;

pub use auth::AuthUser;
pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use rooms::JobRooms;
pub use routes::create_router;
pub use state::AppState;
pub use subscriber::run_subscriber;
