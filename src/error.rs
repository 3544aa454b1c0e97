use thiserror::Error;

/// Errors surfaced by the playback core.
///
/// Precondition violations (`PermissionDenied`, `VoiceNotConnected`,
/// `QueueFull`, `InvalidIndex`) are returned to the caller so the command
/// layer can report them. Media errors (`ResolutionFailure`,
/// `SourceConstructionFailure`) are produced by collaborators and, when they
/// happen during an in-flight playback attempt, are logged and skipped by
/// the player instead of being returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlayerError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("not connected to a voice channel")]
    VoiceNotConnected,

    #[error("the queue is full (max {max} tracks)")]
    QueueFull { max: usize },

    #[error("invalid queue position {index} (queue has {len} tracks)")]
    InvalidIndex { index: usize, len: usize },

    #[error("could not resolve track: {0}")]
    ResolutionFailure(String),

    #[error("could not build audio source: {0}")]
    SourceConstructionFailure(String),

    #[error("voice transport error: {0}")]
    VoiceTransport(String),
}

pub type PlayerResult<T> = std::result::Result<T, PlayerError>;
