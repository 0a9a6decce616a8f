//! Error types for the playback engine.

use thiserror::Error;

/// Failures reported by the native audio primitive.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The resource behind a track URL could not be opened.
    #[error("failed to open {uri}: {source}")]
    Open {
        uri: String,
        #[source]
        source: std::io::Error,
    },

    /// The resource was opened but could not be decoded.
    #[error("failed to decode {uri}: {reason}")]
    Decode { uri: String, reason: String },

    /// The URL scheme is not something this backend can play.
    #[error("unsupported track url: {0}")]
    UnsupportedUrl(String),

    /// No audio output device could be opened.
    #[error("audio output unavailable: {0}")]
    Output(String),

    /// The handle refused to seek.
    #[error("seek failed: {0}")]
    Seek(String),
}

/// Errors surfaced by engine operations.
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// Loading the track at `index` into the backend failed.
    ///
    /// `current_index` may already point at `index` when this is returned.
    #[error("failed to load track {index}: {source}")]
    BackendLoad {
        index: usize,
        #[source]
        source: BackendError,
    },

    /// A transport primitive failed.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Rejected argument. Only returned when strict arguments are enabled;
    /// otherwise invalid arguments are ignored.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The player thread is gone.
    #[error("player thread has shut down")]
    Disconnected,

    /// A player command was issued from inside a listener. Listeners run on
    /// the engine thread, which cannot wait on itself.
    #[error("player commands cannot be issued from the engine thread")]
    Reentrant,
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
