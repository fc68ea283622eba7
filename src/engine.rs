//! Engine-agnostic decoder capability.
//!
//! Every speech engine binding (sherpa-ncnn, sherpa-onnx, Vosk, ...) is
//! driven through this one polling surface; the session loop is written once
//! against it. There are no engine callbacks: readiness and endpoint state
//! are polled by the caller.

use crate::error::EngineError;

/// One decode step's output.
///
/// `text` restates the decoder's entire current hypothesis for the active
/// utterance, not a delta since the previous step. The reconciler is
/// responsible for extracting what is actually new.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecoderEmission {
    pub text: String,
    /// The decoder considers the current utterance complete; the caller
    /// should reset per-utterance state before feeding more audio.
    pub is_endpoint: bool,
}

/// Stateful incremental decoder.
///
/// Implementations are driven from the session worker thread. The session
/// guards every call with a lock, so implementors do not need interior
/// synchronization, but the type must be movable to the worker.
pub trait SpeechEngine: Send {
    /// Feed one frame of 16 kHz mono PCM, normalized to [-1.0, 1.0].
    fn accept_frame(&mut self, samples: &[f32]);

    /// Whether enough audio has accumulated for another decode step.
    fn has_pending_output(&self) -> bool;

    /// Run one decode step and return the current hypothesis.
    fn decode_step(&mut self) -> Result<DecoderEmission, EngineError>;

    /// Whether the decoder has detected an utterance boundary.
    fn is_endpoint_detected(&self) -> bool;

    /// Reset decoding state. `full_reinitialize` additionally drops any
    /// cached utterance context, as for a brand-new session.
    fn reset(&mut self, full_reinitialize: bool);
}
