//! Streaming speech-to-text session core.
//!
//! The pipeline pulls fixed-size PCM frames from a microphone or a decoded
//! audio file, feeds them to a stateful incremental decoder behind the
//! [`SpeechEngine`] capability trait, merges the decoder's full-hypothesis
//! emissions into a stable transcript, and records per-word first-seen
//! timestamps. Finished transcripts can be scored against references with
//! Levenshtein word error rate ([`scoring`]).

pub mod audio;
pub mod engine;
pub mod error;
pub mod scoring;
pub mod streaming;

pub use audio::{AudioFrame, AudioFrameSource, FileFrameSource, FramePull, MicrophoneSource};
pub use engine::{DecoderEmission, SpeechEngine};
pub use error::{EngineError, SessionError, SourceError};
pub use streaming::{
    SessionEvent, SessionState, SessionSummary, StreamingTranscriptionSession, TranscriptSink,
};
