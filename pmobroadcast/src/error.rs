//! Error types for the broadcast engine

use pmoagenda::AgendaError;

/// Result type alias for broadcast operations
pub type Result<T> = std::result::Result<T, BroadcastError>;

/// Errors surfaced by the pool and the agenda services.
///
/// Expected absences (unknown segment, station missing from the pool on a
/// read) are `Option`s, not errors.
#[derive(Debug, thiserror::Error)]
pub enum BroadcastError {
    /// No station definition exists for this brand
    #[error("Station not found: {0}")]
    StationNotFound(String),

    /// The station has no script to build an agenda from
    #[error("Station {0} has no script assigned")]
    NoScript(String),

    /// Agenda build failed
    #[error("Agenda build failed: {0}")]
    Agenda(#[from] AgendaError),

    /// Station repository lookup failed
    #[error("Station repository error: {0}")]
    Repository(#[source] anyhow::Error),

    /// Generic error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
