// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Metric update helpers used by the handlers, the builder and the verifier

use crate::metrics::labels::{PortCheckLabels, ResponseLabels, SwitchLabels};

use super::MetricsRegistry;

impl MetricsRegistry {
    pub fn record_response(&self, endpoint: &str, outcome: &str) {
        self.dhcp_responses
            .get_or_create(&ResponseLabels {
                endpoint: endpoint.to_string(),
                outcome: outcome.to_string(),
            })
            .inc();
    }

    pub fn record_topology_cycle(&self, duration_secs: f64, entries: usize, ambiguous: usize) {
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        let millis = (duration_secs * 1000.0).round() as i64;
        self.topology_cycle_duration_milliseconds.set(millis);
        #[allow(clippy::cast_possible_wrap)]
        {
            self.topology_entries.set(entries as i64);
            self.topology_ambiguous_ports.set(ambiguous as i64);
        }
    }

    pub fn record_cycle_skipped(&self) {
        self.topology_cycles_skipped.inc();
    }

    pub fn record_port_bounce(&self, switch: &str) {
        self.port_bounces
            .get_or_create(&SwitchLabels {
                switch: switch.to_string(),
            })
            .inc();
    }

    /// `result` is one of `unchanged`, `relocated`, `failed`
    pub fn record_port_check(&self, result: &str) {
        self.port_checks
            .get_or_create(&PortCheckLabels {
                result: result.to_string(),
            })
            .inc();
    }

    #[must_use]
    pub fn response_count(&self, endpoint: &str, outcome: &str) -> u64 {
        self.dhcp_responses
            .get_or_create(&ResponseLabels {
                endpoint: endpoint.to_string(),
                outcome: outcome.to_string(),
            })
            .get()
    }

    #[must_use]
    pub fn port_check_count(&self, result: &str) -> u64 {
        self.port_checks
            .get_or_create(&PortCheckLabels {
                result: result.to_string(),
            })
            .get()
    }

    #[must_use]
    pub fn bounce_count(&self, switch: &str) -> u64 {
        self.port_bounces
            .get_or_create(&SwitchLabels {
                switch: switch.to_string(),
            })
            .get()
    }

    #[must_use]
    pub fn skipped_cycles(&self) -> u64 {
        self.topology_cycles_skipped.get()
    }
}
