// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! HTTP API module for the DHCP control plane
//!
//! # Endpoints
//! - `GET /health`: health check
//! - `GET /metrics`: Prometheus metrics
//! - `POST /discover`, `POST /request`: relay-facing DHCP decisions
//! - `GET /switches/{ip}/ports`: inventory ports joined with the live bridge port map

pub mod handlers;
mod state;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;

pub use state::AppState;

/// Creates the main Axum router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_handler))
        .route("/discover", post(handlers::discover_handler))
        .route("/request", post(handlers::request_handler))
        .route("/switches/{ip}/ports", get(handlers::switch_ports_handler))
        .with_state(state)
}
