// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! DHCP resolution engine and the relay wire format

mod engine;
mod error;
pub mod events;
mod lease;
mod wire;

#[cfg(test)]
mod tests;

pub use engine::{DhcpEngine, EngineConfig, LeaseSource, Resolution};
pub use error::DhcpError;
pub use events::{DhcpEvent, MessageKind};
pub use lease::{FAKE_LEASE_SECONDS, FakeLease, Lease, LeasePolicy};
pub use wire::{DhcpBody, DhcpRequest};
