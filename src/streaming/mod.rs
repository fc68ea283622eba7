//! Streaming transcription pipeline.
//!
//! [`session::StreamingTranscriptionSession`] drives the frame pull → decode
//! → reconcile → timestamp loop; [`reconciler::TranscriptReconciler`] merges
//! full-hypothesis emissions into a stable transcript;
//! [`timestamps::WordTimestampTracker`] records first-seen word times.

pub mod reconciler;
pub mod session;
pub mod timestamps;

pub use reconciler::TranscriptReconciler;
pub use session::{
    SessionEvent, SessionState, SessionSummary, StreamingTranscriptionSession, TranscriptSink,
};
pub use timestamps::WordTimestampTracker;
