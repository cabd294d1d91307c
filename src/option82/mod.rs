// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! DHCP relay agent information (option 82) decoding
//!
//! The raw option is a run of `(tag, length, value)` sub-options. Which
//! sub-option carries the ingress port, and how, depends on the relaying
//! switch, so extraction is dispatched through a registry of vendor rules
//! matched against the switch model name.

mod vendors;

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use thiserror::Error;

pub use vendors::builtin_rules;

/// Circuit ID sub-option
pub const CIRCUIT_ID: u8 = 1;
/// Remote ID sub-option
pub const REMOTE_ID: u8 = 2;

/// Sub-options keyed by tag; a repeated tag keeps the last value
pub type SubOptions = BTreeMap<u8, Vec<u8>>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Option82Error {
    #[error("sub-option at offset {offset} overruns the option")]
    Truncated { offset: usize },

    #[error("circuit id sub-option missing")]
    MissingCircuitId,

    #[error("circuit id too short for {vendor}: {len} bytes")]
    ShortCircuitId { vendor: &'static str, len: usize },
}

/// Fields extracted by a vendor rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CircuitFields {
    pub slot: Option<u8>,
    pub port: u32,
    pub vlan: Option<u16>,
    pub extra: Vec<u8>,
}

/// Decoded relay agent information
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelayAgentInfo {
    pub vendor: &'static str,
    pub slot: Option<u8>,
    pub port: u32,
    pub vlan: Option<u16>,
    pub extra: Vec<u8>,
    /// Sub-options the vendor rule did not consume, by raw tag
    pub unrecognized: SubOptions,
}

/// A vendor decoding rule: the predicate selects the rule by switch model,
/// the extractor removes the sub-options it understands
#[derive(Clone, Copy)]
pub struct VendorRule {
    pub vendor: &'static str,
    pub matches: fn(&str) -> bool,
    pub extract: fn(&mut SubOptions) -> Result<CircuitFields, Option82Error>,
}

impl std::fmt::Debug for VendorRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VendorRule")
            .field("vendor", &self.vendor)
            .finish_non_exhaustive()
    }
}

/// Ordered rule table; the first matching rule wins
#[derive(Debug, Clone)]
pub struct VendorRegistry {
    rules: Vec<VendorRule>,
}

impl Default for VendorRegistry {
    fn default() -> Self {
        Self {
            rules: builtin_rules(),
        }
    }
}

static DEFAULT_REGISTRY: LazyLock<VendorRegistry> = LazyLock::new(VendorRegistry::default);

impl VendorRegistry {
    #[must_use]
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Appends a rule after the existing ones
    pub fn register(&mut self, rule: VendorRule) {
        self.rules.push(rule);
    }

    #[must_use]
    pub fn rule_for(&self, model: &str) -> Option<&VendorRule> {
        self.rules.iter().find(|rule| (rule.matches)(model))
    }

    /// Decodes `raw` for a switch of the given model
    ///
    /// `Ok(None)` means no rule recognizes the model; callers decide what an
    /// unsupported vendor means for them.
    pub fn decode(&self, model: &str, raw: &[u8]) -> Result<Option<RelayAgentInfo>, Option82Error> {
        let mut sub_options = parse_sub_options(raw)?;
        let Some(rule) = self.rule_for(model) else {
            tracing::debug!("No option 82 rule for switch model '{}'", model);
            return Ok(None);
        };

        let fields = (rule.extract)(&mut sub_options)?;
        Ok(Some(RelayAgentInfo {
            vendor: rule.vendor,
            slot: fields.slot,
            port: fields.port,
            vlan: fields.vlan,
            extra: fields.extra,
            unrecognized: sub_options,
        }))
    }
}

/// Decodes with the built-in rule table
pub fn decode(model: &str, raw: &[u8]) -> Result<Option<RelayAgentInfo>, Option82Error> {
    DEFAULT_REGISTRY.decode(model, raw)
}

/// Splits the option into sub-options, left to right
pub fn parse_sub_options(raw: &[u8]) -> Result<SubOptions, Option82Error> {
    let mut sub_options = SubOptions::new();
    let mut offset = 0;
    while offset < raw.len() {
        let (Some(&tag), Some(&len)) = (raw.get(offset), raw.get(offset + 1)) else {
            return Err(Option82Error::Truncated { offset });
        };
        let start = offset + 2;
        let end = start + usize::from(len);
        let value = raw
            .get(start..end)
            .ok_or(Option82Error::Truncated { offset })?;
        sub_options.insert(tag, value.to_vec());
        offset = end;
    }
    Ok(sub_options)
}
