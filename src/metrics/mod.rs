// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Prometheus metrics for DHCP decisions, topology cycles and port checks

mod labels;
mod registry;

/// Labels for responses, switches and port checks
pub use labels::{PortCheckLabels, ResponseLabels, SwitchLabels};

/// Prometheus metrics registry
pub use registry::MetricsRegistry;
