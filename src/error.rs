//! Crate-wide error types
//!
//! Per-connection failures are contained at their origin (logged, connection
//! dropped); only startup failures such as an unbindable control port are
//! allowed to escape `main`.

use crate::protocol::ConferenceId;

/// Error type for conferencing operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Underlying socket failure
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Line was not a valid JSON envelope
    #[error("invalid JSON message: {0}")]
    Json(#[from] serde_json::Error),

    /// Request was syntactically valid JSON but not a known envelope
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// The port pool could not satisfy an allocation
    #[error("no ports available in the configured range")]
    PortsExhausted,

    /// Lookup of a live conference failed
    #[error("conference {0} not found")]
    ConferenceNotFound(ConferenceId),

    /// quickJoin with no conference currently live
    #[error("no active conference to join")]
    NoActiveConference,

    /// Cancel attempted by a connection other than the creator's
    #[error("conference {0} can only be cancelled by its creator")]
    NotCreator(ConferenceId),

    /// Media payload failed frame validation
    #[error("malformed media frame: {0}")]
    BadFrame(String),
}

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;
