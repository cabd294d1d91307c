// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

mod dhcp;
mod health;
mod metrics;
mod switches;

pub use dhcp::{discover_handler, request_handler};
pub use health::health_check;
pub use metrics::metrics_handler;
pub use switches::switch_ports_handler;
