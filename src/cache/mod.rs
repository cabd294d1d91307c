// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Shared key-value store, FIFO queue and notification channel
//!
//! Every process of the control plane meets in this store. Values are the
//! colon-delimited strings documented per entity in [`codec`]; they are
//! decoded into typed records right after a read and encoded right before a
//! write.

pub mod codec;
pub mod keys;
mod memory;
mod redis_store;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

pub use codec::{CodecError, LeaseRecord, SwitchInfo, VerificationJob};
pub use memory::MemoryStore;
pub use redis_store::RedisStore;

/// Topology and switch identity entries (30 minutes)
pub const TOPOLOGY_TTL_SECS: u64 = 1800;
/// DISCOVER lease staged for the matching REQUEST (5 minutes)
pub const STAGED_XID_TTL_SECS: u64 = 300;
/// Pending fake-lease xids per MAC (1 hour)
pub const FAKE_PENDING_TTL_SECS: u64 = 3600;
/// MAC lease cache lives this many lease periods
pub const MAC_LEASE_TTL_FACTOR: u64 = 10;
/// Fake leases granted per MAC inside the pending window
pub const FAKE_LEASE_LIMIT: usize = 10;

/// Port verification queue
pub const CHECK_PORT_QUEUE: &str = "check_port";
/// Wakes the port verifier, one message per queued job
pub const CHECK_PORT_CHANNEL: &str = "check_port:notify";
/// DHCP decision feed
pub const DHCP_EVENTS_CHANNEL: &str = "dhcp";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Store operations the control plane relies on
///
/// Mirrors the subset of Redis commands in use, so that another process
/// speaking the Redis protocol can share the same keys.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), CacheError>;

    /// Reads and deletes in one step; at most one caller observes the value
    async fn take(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn push(&self, key: &str, value: &str) -> Result<(), CacheError>;

    /// Appends to a list and (re)arms its expiry atomically
    async fn push_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), CacheError>;

    async fn llen(&self, key: &str) -> Result<usize, CacheError>;

    /// Removes the first occurrence of `value`; returns whether one was removed
    async fn lrem(&self, key: &str, value: &str) -> Result<bool, CacheError>;

    async fn lpop(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn publish(&self, channel: &str, message: &str) -> Result<(), CacheError>;

    /// Messages published on `channel` from now on
    async fn subscribe(&self, channel: &str) -> Result<mpsc::Receiver<String>, CacheError>;
}
