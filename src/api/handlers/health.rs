// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::AppState;

/// Health check endpoint response structure
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Background roles enabled in this process
    pub roles: Vec<String>,
}

/// GET /health
///
/// Returns "ok", the application version and which roles this process runs.
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let config = &state.config;
    let roles = [
        ("http", config.enable_http),
        ("topology_builder", config.enable_topology_builder),
        ("port_verifier", config.enable_port_verifier),
    ]
    .into_iter()
    .filter(|(_, enabled)| *enabled)
    .map(|(role, _)| role.to_string())
    .collect();

    let response = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        roles,
    };

    (StatusCode::OK, Json(response))
}
