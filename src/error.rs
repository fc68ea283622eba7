use thiserror::Error;

/// Errors raised by audio frame sources.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The underlying device or file could not be opened.
    #[error("audio source unavailable: {0}")]
    Unavailable(String),

    #[error("audio io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("audio decode error: {0}")]
    Decode(String),
}

/// Opaque decode failure surfaced by a speech engine binding.
#[derive(Debug, Error)]
#[error("engine decode failed: {0}")]
pub struct EngineError(pub String);

/// Errors surfaced by session control operations.
///
/// Failures inside the decode loop are not propagated through this type;
/// they are logged, reported to the sink, and converted into a session stop.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("audio source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("session is already recording")]
    AlreadyRecording,

    #[error("decode failed: {0}")]
    DecodeFailure(String),
}
