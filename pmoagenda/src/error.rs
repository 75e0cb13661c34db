//! Error types for agenda construction

use uuid::Uuid;

/// Result type alias for scheduling operations
pub type Result<T> = std::result::Result<T, AgendaError>;

/// Errors raised while building an agenda
#[derive(Debug, thiserror::Error)]
pub enum AgendaError {
    /// The script referenced by a station does not exist
    #[error("Script not found: {0}")]
    ScriptNotFound(Uuid),

    /// A scene's song pool could not be fetched; the whole build is aborted
    #[error("Failed to fetch songs for scene {scene_id}: {source}")]
    SongPool {
        scene_id: Uuid,
        #[source]
        source: anyhow::Error,
    },

    /// Repository lookup failed
    #[error("Repository error: {0}")]
    Repository(#[source] anyhow::Error),

    /// Generic error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
