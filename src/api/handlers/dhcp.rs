// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Relay-facing DISCOVER / REQUEST endpoints
//!
//! Engine errors are mapped to a status code here and nowhere else. Bodies
//! never carry error detail; that goes to the log. A body that does not
//! parse is treated like a request with no usable fields.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::sync::Arc;

use crate::api::AppState;
use crate::dhcp::{DhcpBody, DhcpError, DhcpRequest, MessageKind, Resolution};

/// POST /discover
pub async fn discover_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<DhcpBody>, JsonRejection>,
) -> Response {
    let result = match parse_body(MessageKind::Discover, payload) {
        Ok(request) => {
            let result = state.engine.discover(&request).await;
            (Some(request), result)
        }
        Err(e) => (None, Err(e)),
    };
    respond(&state, MessageKind::Discover, result)
}

/// POST /request
pub async fn request_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<DhcpBody>, JsonRejection>,
) -> Response {
    let result = match parse_body(MessageKind::Request, payload) {
        Ok(request) => {
            let result = state.engine.request(&request).await;
            (Some(request), result)
        }
        Err(e) => (None, Err(e)),
    };
    respond(&state, MessageKind::Request, result)
}

fn parse_body(
    kind: MessageKind,
    payload: Result<Json<DhcpBody>, JsonRejection>,
) -> Result<DhcpRequest, DhcpError> {
    let Json(body) = payload.map_err(|rejection| {
        tracing::warn!("{} body rejected: {}", kind.as_str(), rejection.body_text());
        DhcpError::NotFound("relay body")
    })?;
    DhcpRequest::try_from(body)
}

/// Status policy for engine errors
fn error_status(kind: MessageKind, err: &DhcpError) -> StatusCode {
    match err {
        DhcpError::NotFound(_) | DhcpError::VendorUnrecognized { .. } | DhcpError::Option82(_) => {
            StatusCode::NOT_FOUND
        }
        // an exhausted fake lease budget means nothing can be offered at all
        DhcpError::RateLimited { .. } => match kind {
            MessageKind::Discover => StatusCode::NOT_FOUND,
            MessageKind::Request => StatusCode::FORBIDDEN,
        },
        DhcpError::OptionMismatch { .. }
        | DhcpError::XidNotMatched { .. }
        | DhcpError::SnmpNotFound { .. }
        | DhcpError::UserIpNotFound { .. } => StatusCode::FORBIDDEN,
        DhcpError::Snmp(_) | DhcpError::Cache(_) | DhcpError::Codec(_) | DhcpError::Inventory(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn respond(
    state: &AppState,
    kind: MessageKind,
    (request, result): (Option<DhcpRequest>, Result<Resolution, DhcpError>),
) -> Response {
    let endpoint = kind.as_str();
    let err = match result {
        Ok(resolution) => {
            state
                .metrics
                .record_response(endpoint, resolution.source.as_str());
            return (StatusCode::OK, Json(resolution.lease)).into_response();
        }
        Err(err) => err,
    };

    let status = error_status(kind, &err);
    let (chaddr, xid) = request
        .as_ref()
        .map(|r| (r.chaddr.to_string(), r.xid.clone()))
        .unwrap_or_default();
    let outcome = if status == StatusCode::FORBIDDEN {
        tracing::info!(%chaddr, %xid, "{} refused: {}", endpoint, err);
        "forbidden"
    } else if status == StatusCode::NOT_FOUND {
        tracing::info!(%chaddr, %xid, "{} not resolvable: {}", endpoint, err);
        "not_found"
    } else {
        tracing::error!(%chaddr, %xid, "{} failed: {:?}", endpoint, err);
        "error"
    };
    state.metrics.record_response(endpoint, outcome);

    let requested_ip = request
        .and_then(|r| r.requested_ip)
        .filter(|_| kind == MessageKind::Request && status == StatusCode::FORBIDDEN);
    let body = match requested_ip {
        Some(ip) => json!({ "requested_ip_address": ip }),
        None => json!({}),
    };
    (status, Json(body)).into_response()
}
