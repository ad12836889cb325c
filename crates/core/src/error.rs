//! Error types for the sample source library.

/// Errors that can occur while establishing or driving a demuxer session.
///
/// These are the recoverable failures. They are captured by the
/// [`SourceReader`](crate::session::SourceReader) when detected and handed
/// back only when the consumer polls
/// [`maybe_throw_error`](crate::session::SampleSourceReader::maybe_throw_error).
///
/// Caller contract violations (track index out of range, use before
/// `prepare`, use after `release`) are not represented here: they panic.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Underlying I/O failure (file or socket).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The demuxer could not establish a session for the URI.
    #[error("unable to open {uri}: {reason}")]
    Open { uri: String, reason: String },

    /// The source opened but exposes no selectable tracks.
    #[error("no tracks found in {uri}")]
    NoTracks { uri: String },

    /// The URI scheme or path is not understood by the demuxer.
    #[error("invalid source URI: {0}")]
    InvalidUri(String),

    /// [`engine::init`](crate::engine::init) has not been called, or the
    /// engine was shut down.
    #[error("demuxer engine not initialized")]
    EngineNotInitialized,
}

/// Convenience alias for `Result<T, SourceError>`.
pub type Result<T> = std::result::Result<T, SourceError>;
