//! Error types for the cabinet controller

use thiserror::Error;

/// Failure reported by a collaborator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HardwareError {
    #[error("Lamp error on channel {channel}: {message}")]
    Lamp { channel: u8, message: String },

    #[error("Lever error: {0}")]
    Lever(String),
}

/// Core error type
#[derive(Error, Debug)]
pub enum CabinetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Attempted to republish the round outcome while stop requests are still accepted
    #[error("Outcome republished while stop acceptance is open")]
    OutcomeLocked,

    /// Blocking wait interrupted by process shutdown
    #[error("Shutdown requested")]
    Shutdown,
}

/// Result type alias
pub type CabinetResult<T> = Result<T, CabinetError>;
