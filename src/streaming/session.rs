//! Streaming transcription session.
//!
//! Owns the decode loop: a dedicated worker thread pulls frames from an
//! [`AudioFrameSource`], feeds them to the shared [`SpeechEngine`], and
//! routes every emission through the reconciler and timestamp tracker.
//! `start()`/`stop()` are called from a separate control context; engine
//! access is a mutually exclusive critical section between the two.

use log::{debug, error, info};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{SystemTime, UNIX_EPOCH};

use super::{TranscriptReconciler, WordTimestampTracker};
use crate::audio::{AudioFrameSource, FramePull};
use crate::engine::SpeechEngine;
use crate::error::SessionError;

/// Events delivered to the transcript sink as the session progresses.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum SessionEvent {
    Started,
    /// The decoder's current full hypothesis for the active utterance.
    LiveText { text: String },
    /// Word tokens that newly appeared since the previous emission.
    Words { tokens: Vec<String> },
    /// An utterance was finalized on endpoint detection.
    UtteranceFinal { text: String },
    Ended { final_text: String, duration_ms: u64 },
    Error { message: String },
}

/// Receives transcript updates from the session worker.
///
/// Implementations must not call back into the session; `stop()` joins the
/// worker thread that is delivering the event.
pub trait TranscriptSink: Send + Sync {
    fn on_event(&self, event: SessionEvent);
}

impl<F> TranscriptSink for F
where
    F: Fn(SessionEvent) + Send + Sync,
{
    fn on_event(&self, event: SessionEvent) {
        self(event)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Recording,
}

/// Result of a completed session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    /// Confirmed transcript across all utterances.
    pub transcript: String,
    /// Deduplicated word-occurrence keys with their timestamps.
    pub word_timestamps: Vec<(String, u64)>,
    /// Span from first to last deduplicated observation.
    pub duration_ms: u64,
}

/// How many distinct hypothesis texts the diagnostic no-repeat log keeps
/// before recycling.
const LOGGED_TEXT_CAP: usize = 256;

pub struct StreamingTranscriptionSession {
    engine: Arc<Mutex<Box<dyn SpeechEngine>>>,
    sink: Arc<dyn TranscriptSink>,
    state: Arc<Mutex<SessionState>>,
    reconciler: Arc<Mutex<TranscriptReconciler>>,
    tracker: Arc<Mutex<WordTimestampTracker>>,
    stop_flag: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl StreamingTranscriptionSession {
    pub fn new(engine: Box<dyn SpeechEngine>, sink: Arc<dyn TranscriptSink>) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
            sink,
            state: Arc::new(Mutex::new(SessionState::Idle)),
            reconciler: Arc::new(Mutex::new(TranscriptReconciler::new())),
            tracker: Arc::new(Mutex::new(WordTimestampTracker::new())),
            stop_flag: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
        }
    }

    /// Start decoding frames from `source` on a dedicated worker thread.
    ///
    /// Resets the engine and all per-session transcript state first.
    pub fn start(&self, mut source: Box<dyn AudioFrameSource>) -> Result<(), SessionError> {
        {
            let mut state = self.state.lock().unwrap();
            if *state == SessionState::Recording {
                return Err(SessionError::AlreadyRecording);
            }
            *state = SessionState::Recording;
        }

        // A previous run may have ended on its own; reap its worker.
        if let Some(handle) = self.worker.lock().unwrap().take() {
            let _ = handle.join();
        }

        self.reconciler.lock().unwrap().reset();
        self.tracker.lock().unwrap().reset();
        self.engine.lock().unwrap().reset(true);
        self.stop_flag.store(false, Ordering::SeqCst);

        self.sink.on_event(SessionEvent::Started);

        let engine = self.engine.clone();
        let reconciler = self.reconciler.clone();
        let tracker = self.tracker.clone();
        let sink = self.sink.clone();
        let state = self.state.clone();
        let stop_flag = self.stop_flag.clone();

        let handle = thread::spawn(move || {
            run_decode_loop(
                source.as_mut(),
                &engine,
                &reconciler,
                &tracker,
                sink.as_ref(),
                &stop_flag,
            );
            source.close();

            let final_text = {
                let mut reconciler = reconciler.lock().unwrap();
                reconciler.finish_utterance();
                reconciler.confirmed().to_string()
            };
            let duration_ms = tracker
                .lock()
                .unwrap()
                .utterance_duration_ms()
                .unwrap_or(0);

            *state.lock().unwrap() = SessionState::Idle;
            sink.on_event(SessionEvent::Ended {
                final_text,
                duration_ms,
            });
            debug!("Session worker finished");
        });

        *self.worker.lock().unwrap() = Some(handle);
        info!("Transcription session started");
        Ok(())
    }

    /// Stop the session and return its summary.
    ///
    /// Joins the worker, so once this returns no further event reaches the
    /// sink and the capture resource has been released. Returns `None` if
    /// no session was ever started since the last `stop()`.
    pub fn stop(&self) -> Option<SessionSummary> {
        let handle = self.worker.lock().unwrap().take()?;

        self.stop_flag.store(true, Ordering::SeqCst);
        if handle.join().is_err() {
            error!("Session worker panicked");
        }
        *self.state.lock().unwrap() = SessionState::Idle;

        let transcript = self.reconciler.lock().unwrap().confirmed().to_string();
        let tracker = self.tracker.lock().unwrap();
        let word_timestamps = tracker.deduplicated();
        let duration_ms = tracker.utterance_duration_ms().unwrap_or(0);

        info!("Transcription session stopped: '{}'", transcript);
        Some(SessionSummary {
            transcript,
            word_timestamps,
            duration_ms,
        })
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap()
    }

    pub fn is_active(&self) -> bool {
        self.state() == SessionState::Recording
    }

    /// Confirmed transcript plus the live hypothesis, as currently known.
    pub fn transcript(&self) -> String {
        self.reconciler.lock().unwrap().transcript()
    }
}

fn run_decode_loop(
    source: &mut dyn AudioFrameSource,
    engine: &Mutex<Box<dyn SpeechEngine>>,
    reconciler: &Mutex<TranscriptReconciler>,
    tracker: &Mutex<WordTimestampTracker>,
    sink: &dyn TranscriptSink,
    stop_flag: &AtomicBool,
) {
    let mut emission_log = EmissionLog::new(LOGGED_TEXT_CAP);

    loop {
        if stop_flag.load(Ordering::SeqCst) {
            debug!("Stop requested, leaving decode loop");
            return;
        }

        let frame = match source.next_frame() {
            Ok(FramePull::Frame(frame)) => frame,
            Ok(FramePull::Pending) => continue,
            Ok(FramePull::Exhausted) => {
                debug!("Frame source exhausted");
                return;
            }
            Err(e) => {
                error!("Frame read failed, stopping session: {e}");
                sink.on_event(SessionEvent::Error {
                    message: e.to_string(),
                });
                return;
            }
        };

        // Engine access is a critical section shared with the resets in
        // start()/stop(). Events are collected under the lock and delivered
        // after it is released.
        let (events, failed) = {
            let mut engine = engine.lock().unwrap();
            engine.accept_frame(&frame);
            drain_pending_output(
                engine.as_mut(),
                reconciler,
                tracker,
                &mut emission_log,
            )
        };

        for event in events {
            sink.on_event(event);
        }
        if failed {
            return;
        }
    }
}

/// Run decode steps while the engine has output ready. Returns the events
/// to deliver and whether a decode failure ended the session.
fn drain_pending_output(
    engine: &mut dyn SpeechEngine,
    reconciler: &Mutex<TranscriptReconciler>,
    tracker: &Mutex<WordTimestampTracker>,
    emission_log: &mut EmissionLog,
) -> (Vec<SessionEvent>, bool) {
    let mut events = Vec::new();

    while engine.has_pending_output() {
        let emission = match engine.decode_step() {
            Ok(emission) => emission,
            Err(e) => {
                error!("Decode step failed, stopping session: {e}");
                events.push(SessionEvent::Error {
                    message: e.to_string(),
                });
                return (events, true);
            }
        };

        let now = epoch_millis();
        let new_tokens = reconciler.lock().unwrap().reconcile(&emission);

        if !new_tokens.is_empty() {
            // Sequence indexes count within the utterance tokenization: the
            // new tokens are the tail of the current hypothesis.
            let total = emission.text.split_whitespace().count();
            let base = total - new_tokens.len();
            let mut tracker = tracker.lock().unwrap();
            for (offset, token) in new_tokens.iter().enumerate() {
                tracker.observe(token, base + offset, now);
            }
        }

        if !emission.text.trim().is_empty() {
            emission_log.log_once(&emission.text, now);
            events.push(SessionEvent::LiveText {
                text: emission.text.clone(),
            });
        }
        if !new_tokens.is_empty() {
            events.push(SessionEvent::Words { tokens: new_tokens });
        }

        if emission.is_endpoint || engine.is_endpoint_detected() {
            let finalized = reconciler.lock().unwrap().finish_utterance();
            engine.reset(false);
            if !finalized.is_empty() {
                events.push(SessionEvent::UtteranceFinal { text: finalized });
            }
        }
    }

    (events, false)
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64
}

/// Diagnostic no-repeat log of hypothesis texts, bounded so a long session
/// cannot grow it without limit.
struct EmissionLog {
    seen: HashSet<String>,
    cap: usize,
}

impl EmissionLog {
    fn new(cap: usize) -> Self {
        Self {
            seen: HashSet::new(),
            cap,
        }
    }

    fn log_once(&mut self, text: &str, at_ms: u64) {
        if self.seen.contains(text) {
            return;
        }
        if self.seen.len() >= self.cap {
            self.seen.clear();
        }
        self.seen.insert(text.to_string());
        info!("Text: {}, Timestamp: {} ms", text, at_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{FileFrameSource, FRAME_SAMPLES};
    use crate::engine::DecoderEmission;
    use crate::error::EngineError;
    use std::collections::VecDeque;
    use std::time::Duration;

    /// Engine that releases one scripted emission per accepted frame.
    struct ScriptedEngine {
        script: VecDeque<DecoderEmission>,
        pending: VecDeque<DecoderEmission>,
        full_resets: usize,
        soft_resets: usize,
        fail_on_decode: bool,
    }

    impl ScriptedEngine {
        fn new(script: Vec<DecoderEmission>) -> Self {
            Self {
                script: script.into(),
                pending: VecDeque::new(),
                full_resets: 0,
                soft_resets: 0,
                fail_on_decode: false,
            }
        }
    }

    impl SpeechEngine for ScriptedEngine {
        fn accept_frame(&mut self, _samples: &[f32]) {
            if let Some(emission) = self.script.pop_front() {
                self.pending.push_back(emission);
            }
        }

        fn has_pending_output(&self) -> bool {
            !self.pending.is_empty()
        }

        fn decode_step(&mut self) -> Result<DecoderEmission, EngineError> {
            if self.fail_on_decode {
                return Err(EngineError("scripted failure".to_string()));
            }
            Ok(self.pending.pop_front().unwrap_or_default())
        }

        fn is_endpoint_detected(&self) -> bool {
            false
        }

        fn reset(&mut self, full_reinitialize: bool) {
            if full_reinitialize {
                self.full_resets += 1;
            } else {
                self.soft_resets += 1;
            }
            self.pending.clear();
        }
    }

    fn emission(text: &str, is_endpoint: bool) -> DecoderEmission {
        DecoderEmission {
            text: text.to_string(),
            is_endpoint,
        }
    }

    fn collecting_sink() -> (Arc<dyn TranscriptSink>, Arc<Mutex<Vec<SessionEvent>>>) {
        let events: Arc<Mutex<Vec<SessionEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let events_in_sink = events.clone();
        let sink = Arc::new(move |event: SessionEvent| {
            events_in_sink.lock().unwrap().push(event);
        });
        (sink, events)
    }

    fn source_with_frames(count: usize) -> Box<FileFrameSource> {
        Box::new(FileFrameSource::from_samples(vec![0.1; FRAME_SAMPLES * count]))
    }

    fn wait_until_idle(session: &StreamingTranscriptionSession) {
        for _ in 0..200 {
            if !session.is_active() {
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("session did not finish in time");
    }

    #[test]
    fn session_transcribes_scripted_emissions() {
        let engine = ScriptedEngine::new(vec![
            emission("THE", false),
            emission("THE CAT", false),
            emission("THE CAT SAT", true),
        ]);
        let (sink, events) = collecting_sink();
        let session = StreamingTranscriptionSession::new(Box::new(engine), sink);

        session.start(source_with_frames(4)).unwrap();
        wait_until_idle(&session);
        let summary = session.stop().unwrap();

        assert_eq!(summary.transcript, "THE CAT SAT");
        let keys: Vec<&str> = summary
            .word_timestamps
            .iter()
            .map(|(k, _)| k.as_str())
            .collect();
        assert_eq!(keys, vec!["THE_0", "CAT_1", "SAT_2"]);

        let events = events.lock().unwrap();
        assert!(matches!(events.first(), Some(SessionEvent::Started)));
        assert!(events
            .iter()
            .any(|e| matches!(e, SessionEvent::UtteranceFinal { text } if text == "THE CAT SAT")));
        assert!(matches!(events.last(), Some(SessionEvent::Ended { .. })));
    }

    #[test]
    fn endpoint_resets_engine_but_keeps_confirmed_words() {
        let engine = ScriptedEngine::new(vec![
            emission("HELLO", true),
            emission("WORLD", true),
        ]);
        let (sink, _events) = collecting_sink();
        let session = StreamingTranscriptionSession::new(Box::new(engine), sink);

        session.start(source_with_frames(3)).unwrap();
        wait_until_idle(&session);
        let summary = session.stop().unwrap();

        assert_eq!(summary.transcript, "HELLO WORLD");
    }

    #[test]
    fn restart_produces_fresh_state() {
        let (sink, _events) = collecting_sink();
        let session = StreamingTranscriptionSession::new(
            Box::new(ScriptedEngine::new(vec![emission("FIRST RUN", true)])),
            sink,
        );

        session.start(source_with_frames(2)).unwrap();
        wait_until_idle(&session);
        let first = session.stop().unwrap();
        assert_eq!(first.transcript, "FIRST RUN");

        // The scripted engine is exhausted, so the second run sees silence.
        session.start(source_with_frames(2)).unwrap();
        wait_until_idle(&session);
        let second = session.stop().unwrap();

        assert_eq!(second.transcript, "");
        assert!(second.word_timestamps.is_empty());
    }

    /// Live-like source that never yields audio; keeps a session running
    /// until it is stopped.
    struct SilentSource {
        closed: bool,
    }

    impl AudioFrameSource for SilentSource {
        fn next_frame(&mut self) -> Result<FramePull, crate::error::SourceError> {
            if self.closed {
                return Ok(FramePull::Exhausted);
            }
            std::thread::sleep(Duration::from_millis(5));
            Ok(FramePull::Pending)
        }

        fn close(&mut self) {
            self.closed = true;
        }
    }

    #[test]
    fn start_while_recording_is_rejected() {
        let (sink, _events) = collecting_sink();
        let session = StreamingTranscriptionSession::new(
            Box::new(ScriptedEngine::new(Vec::new())),
            sink,
        );

        session.start(Box::new(SilentSource { closed: false })).unwrap();
        let second = session.start(Box::new(SilentSource { closed: false }));
        assert!(matches!(second, Err(SessionError::AlreadyRecording)));
        session.stop();
    }

    #[test]
    fn no_events_after_stop_returns() {
        let (sink, events) = collecting_sink();
        let session = StreamingTranscriptionSession::new(
            Box::new(ScriptedEngine::new(vec![
                emission("A", false),
                emission("A B", false),
                emission("A B C", false),
            ])),
            sink,
        );

        session.start(source_with_frames(500)).unwrap();
        std::thread::sleep(Duration::from_millis(50));
        session.stop().unwrap();

        let count = events.lock().unwrap().len();
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(events.lock().unwrap().len(), count);
    }

    #[test]
    fn decode_failure_stops_the_session() {
        let mut engine = ScriptedEngine::new(vec![emission("DOOMED", false)]);
        engine.fail_on_decode = true;
        let (sink, events) = collecting_sink();
        let session = StreamingTranscriptionSession::new(Box::new(engine), sink);

        session.start(source_with_frames(3)).unwrap();
        wait_until_idle(&session);

        assert!(!session.is_active());
        let events = events.lock().unwrap();
        assert!(events
            .iter()
            .any(|e| matches!(e, SessionEvent::Error { .. })));
    }

    #[test]
    fn events_serialize_with_tagged_shape() {
        let json = serde_json::to_value(SessionEvent::LiveText {
            text: "HI".to_string(),
        })
        .unwrap();
        assert_eq!(json["type"], "LiveText");
        assert_eq!(json["data"]["text"], "HI");
    }
}
