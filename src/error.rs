//! Error types for the dormitory DHCP control plane

use thiserror::Error;

use crate::cache::CacheError;
use crate::inventory::InventoryError;
use crate::snmp::SnmpError;

/// Main application error type
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network or IO error
    #[error("IO error")]
    Io(#[from] std::io::Error),

    /// Shared cache / queue error
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// SNMP transport or protocol error
    #[error("SNMP error: {0}")]
    Snmp(#[from] SnmpError),

    /// Inventory collaborator error
    #[error("Inventory error: {0}")]
    Inventory(#[from] InventoryError),

    /// Metrics encoding error
    #[error("Metrics error: {0}")]
    Metrics(String),

    /// Address parsing error
    #[error("Address parse error")]
    AddrParse(#[from] std::net::AddrParseError),
}

/// Convenient alias for Result with application error
pub type Result<T> = std::result::Result<T, AppError>;
