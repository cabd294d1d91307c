// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Read-only switch diagnostics

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use std::net::Ipv4Addr;
use std::sync::Arc;

use crate::api::AppState;

#[derive(Debug, Serialize)]
pub struct PortView {
    pub bridge_port: u32,
    pub if_index: u32,
    /// Wiring identifier of the jack cabled to this port
    pub dvo: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SwitchPortsResponse {
    pub ip: Ipv4Addr,
    pub name: String,
    pub dorm: String,
    pub level: i32,
    pub ports: Vec<PortView>,
}

/// GET /switches/{ip}/ports
pub async fn switch_ports_handler(
    State(state): State<Arc<AppState>>,
    Path(ip): Path<Ipv4Addr>,
) -> Response {
    let switches = match state.inventory.list_switches().await {
        Ok(switches) => switches,
        Err(e) => {
            tracing::error!("Failed to list switches: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({}))).into_response();
        }
    };
    let Some(switch) = switches.into_iter().find(|s| s.ip == ip) else {
        return (StatusCode::NOT_FOUND, Json(json!({}))).into_response();
    };

    let wiring = match state.inventory.list_ports(ip).await {
        Ok(wiring) => wiring,
        Err(e) => {
            tracing::error!("Failed to list ports of {}: {}", ip, e);
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({}))).into_response();
        }
    };
    let bridge_ports = match state.probe.list_bridge_ports(ip, &switch.community).await {
        Ok(ports) => ports,
        Err(e) => {
            tracing::warn!("Bridge port walk of {} failed: {}", ip, e);
            return (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": "switch unreachable" })),
            )
                .into_response();
        }
    };

    let ports = bridge_ports
        .into_iter()
        .map(|port| PortView {
            bridge_port: port.bridge_port,
            if_index: port.if_index,
            dvo: wiring
                .iter()
                .find(|entry| entry.port == port.bridge_port)
                .map(|entry| entry.dvo()),
        })
        .collect();

    let response = SwitchPortsResponse {
        ip: switch.ip,
        name: switch.name,
        dorm: switch.dorm,
        level: switch.level,
        ports,
    };
    (StatusCode::OK, Json(response)).into_response()
}
