//! Shared types for the spatial voice client
//!
//! Identifiers, the unified error type, transform math, audio parameter
//! types and the observer primitives used by every other crate.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod audio;
pub mod events;
pub mod math;
pub mod observable;

// Re-export commonly used types
pub use audio::{
    resolve_panner, AudioModifier, AudioModifierUpdate, DistanceModel, PannerOptions,
    PannerOverride, PanningModel,
};
pub use events::{DisconnectInfo, ErrorKind, ErrorReport};
pub use math::{Transform, TransformUpdate, Vec3};
pub use observable::{Event, ListenerId, Observable};

/// Identifier of a player, as assigned by the signaling server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the server has not assigned an identifier yet
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for PlayerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for PlayerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status of the signaling connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connecting,
    Open,
    Closing,
    Closed,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionStatus::Connecting => write!(f, "connecting"),
            ConnectionStatus::Open => write!(f, "open"),
            ConnectionStatus::Closing => write!(f, "closing"),
            ConnectionStatus::Closed => write!(f, "closed"),
        }
    }
}

/// Unified error type for the application.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    /// A frame that does not follow the `name;payload` layout
    #[error("Framing error: {0}")]
    Framing(String),

    /// Unknown packet, or a packet that references an unknown participant
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Failure while producing or applying an offer, answer or candidate
    #[error("Negotiation error: {0}")]
    Negotiation(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error), // Catch-all for other errors
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
