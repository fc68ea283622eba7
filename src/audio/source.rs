//! Audio frame sources for the transcription session.
//!
//! A source yields fixed-size frames of mono 16 kHz PCM. The live
//! microphone source is unbounded and blocks (with a short internal
//! timeout) until hardware delivers data; the file-backed source is finite.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use log::{debug, error, info};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use super::{decode_audio_file, FrameResampler, FRAME_SAMPLES, SAMPLE_RATE};
use crate::error::SourceError;

/// One fixed-duration frame of mono PCM, normalized to [-1.0, 1.0].
pub type AudioFrame = Vec<f32>;

/// Outcome of a single frame pull.
#[derive(Debug, Clone, PartialEq)]
pub enum FramePull {
    Frame(AudioFrame),
    /// No frame yet; the caller may check its stop condition and pull again.
    /// Only live sources return this.
    Pending,
    /// The source is closed or out of audio. No further frames will arrive.
    Exhausted,
}

/// A lazy, finite-or-infinite sequence of audio frames.
///
/// A closed source yields `Exhausted` rather than an error.
pub trait AudioFrameSource: Send {
    fn next_frame(&mut self) -> Result<FramePull, SourceError>;

    /// Release the underlying device or file. Idempotent; subsequent pulls
    /// yield `Exhausted`.
    fn close(&mut self);
}

/* ──────────────────────────────────────────────────────────────── */

/// How long a live pull waits before reporting `Pending`.
const PULL_TIMEOUT_MS: u64 = 50;

/// Live capture from the default input device.
///
/// cpal streams are not `Send`, so the stream lives on a dedicated capture
/// thread for its entire lifetime. Device samples are averaged to mono,
/// resampled to 16 kHz and chunked to exact frames inside the stream
/// callback; finished frames cross to the consumer over a channel.
pub struct MicrophoneSource {
    frames: Receiver<AudioFrame>,
    closed: Arc<AtomicBool>,
    capture_thread: Option<JoinHandle<()>>,
}

impl MicrophoneSource {
    /// Open the default input device and start capturing.
    pub fn open() -> Result<Self, SourceError> {
        let (frame_tx, frame_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();
        let closed = Arc::new(AtomicBool::new(false));

        let closed_in_thread = closed.clone();
        let capture_thread = std::thread::spawn(move || {
            match build_capture_stream(frame_tx) {
                Ok((stream, ctx)) => {
                    let _ = ready_tx.send(Ok(()));
                    // Keep the stream alive until the source is closed.
                    while !closed_in_thread.load(Ordering::SeqCst) {
                        std::thread::sleep(Duration::from_millis(PULL_TIMEOUT_MS));
                    }
                    drop(stream);
                    // Trailing audio buffered in the resampler still belongs
                    // to the session; pad it out as a final frame.
                    ctx.lock().unwrap().finish();
                    debug!("Capture stream released");
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            }
        });

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                frames: frame_rx,
                closed,
                capture_thread: Some(capture_thread),
            }),
            Ok(Err(e)) => {
                let _ = capture_thread.join();
                Err(e)
            }
            Err(_) => Err(SourceError::Unavailable(
                "capture thread exited before the stream was ready".to_string(),
            )),
        }
    }
}

impl AudioFrameSource for MicrophoneSource {
    fn next_frame(&mut self) -> Result<FramePull, SourceError> {
        if self.closed.load(Ordering::SeqCst) {
            return Ok(FramePull::Exhausted);
        }

        match self.frames.recv_timeout(Duration::from_millis(PULL_TIMEOUT_MS)) {
            Ok(frame) => Ok(FramePull::Frame(frame)),
            Err(RecvTimeoutError::Timeout) => Ok(FramePull::Pending),
            Err(RecvTimeoutError::Disconnected) => Ok(FramePull::Exhausted),
        }
    }

    fn close(&mut self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.capture_thread.take() {
            let _ = handle.join();
        }
        debug!("Microphone source closed");
    }
}

impl Drop for MicrophoneSource {
    fn drop(&mut self) {
        self.close();
    }
}

/// Per-stream state shared by the sample-format-specific callbacks.
struct CaptureContext {
    channels: usize,
    interleaved: Vec<f32>,
    mono: Vec<f32>,
    resampler: FrameResampler,
    frames: Sender<AudioFrame>,
}

impl CaptureContext {
    fn new(channels: usize, in_hz: usize, frames: Sender<AudioFrame>) -> Self {
        Self {
            channels,
            interleaved: Vec::new(),
            mono: Vec::new(),
            resampler: FrameResampler::new(in_hz, SAMPLE_RATE as usize, FRAME_SAMPLES),
            frames,
        }
    }

    fn push(&mut self, samples: impl Iterator<Item = f32>) {
        self.interleaved.extend(samples);

        // Only process whole interleaved frames; a partial frame waits for
        // the next callback.
        let whole = self.interleaved.len() / self.channels * self.channels;
        self.mono.clear();
        for chunk in self.interleaved[..whole].chunks(self.channels) {
            self.mono.push(chunk.iter().sum::<f32>() / self.channels as f32);
        }
        self.interleaved.drain(..whole);

        let Self {
            resampler,
            mono,
            frames,
            ..
        } = self;
        resampler.push(mono, |frame| {
            // The receiver may already be gone during shutdown.
            let _ = frames.send(frame.to_vec());
        });
    }

    /// Flush the resampler; the final partial frame goes out zero-padded.
    fn finish(&mut self) {
        let Self {
            resampler, frames, ..
        } = self;
        resampler.finish(|frame| {
            let _ = frames.send(frame.to_vec());
        });
    }
}

fn log_stream_error(e: cpal::StreamError) {
    error!("Input stream error: {e}");
}

fn build_capture_stream(
    frames: Sender<AudioFrame>,
) -> Result<(cpal::Stream, Arc<Mutex<CaptureContext>>), SourceError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| SourceError::Unavailable("no input device available".to_string()))?;

    let config = device
        .default_input_config()
        .map_err(|e| SourceError::Unavailable(format!("no supported input config: {e}")))?;

    let channels = config.channels() as usize;
    let in_hz = config.sample_rate().0 as usize;
    info!(
        "Capturing from {:?} at {} Hz, {} channel(s)",
        device.name().unwrap_or_else(|_| "<unknown>".to_string()),
        in_hz,
        channels
    );

    let stream_config: cpal::StreamConfig = config.clone().into();
    let ctx = Arc::new(Mutex::new(CaptureContext::new(channels, in_hz, frames)));

    let stream = match config.sample_format() {
        cpal::SampleFormat::F32 => {
            let ctx = ctx.clone();
            device.build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    ctx.lock().unwrap().push(data.iter().copied());
                },
                log_stream_error,
                None,
            )
        }
        cpal::SampleFormat::I16 => {
            let ctx = ctx.clone();
            device.build_input_stream(
                &stream_config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    ctx.lock().unwrap().push(data.iter().map(|s| *s as f32 / 32768.0));
                },
                log_stream_error,
                None,
            )
        }
        cpal::SampleFormat::U16 => {
            let ctx = ctx.clone();
            device.build_input_stream(
                &stream_config,
                move |data: &[u16], _: &cpal::InputCallbackInfo| {
                    ctx.lock()
                        .unwrap()
                        .push(data.iter().map(|s| *s as f32 / 32768.0 - 1.0));
                },
                log_stream_error,
                None,
            )
        }
        other => {
            return Err(SourceError::Unavailable(format!(
                "unsupported sample format: {other:?}"
            )))
        }
    }
    .map_err(|e| SourceError::Unavailable(format!("failed to build input stream: {e}")))?;

    stream
        .play()
        .map_err(|e| SourceError::Unavailable(format!("failed to start input stream: {e}")))?;

    Ok((stream, ctx))
}

/* ──────────────────────────────────────────────────────────────── */

/// Finite source backed by a decoded audio file.
pub struct FileFrameSource {
    samples: Vec<f32>,
    cursor: usize,
    closed: bool,
}

impl FileFrameSource {
    /// Decode `path` and frame it. Fails with `Unavailable` if the file
    /// cannot be opened, `Decode` if the contents cannot be decoded.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SourceError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(SourceError::Unavailable(format!(
                "no such audio file: {:?}",
                path
            )));
        }

        let samples = decode_audio_file(path).map_err(|e| SourceError::Decode(e.to_string()))?;
        debug!("File source ready: {:?}, {} samples", path, samples.len());
        Ok(Self::from_samples(samples))
    }

    /// Frame an in-memory sample buffer. Useful for replaying captured audio
    /// and for tests.
    pub fn from_samples(samples: Vec<f32>) -> Self {
        Self {
            samples,
            cursor: 0,
            closed: false,
        }
    }

    pub fn duration_ms(&self) -> u64 {
        (self.samples.len() as u64 * 1000) / SAMPLE_RATE as u64
    }
}

impl AudioFrameSource for FileFrameSource {
    fn next_frame(&mut self) -> Result<FramePull, SourceError> {
        if self.closed || self.cursor >= self.samples.len() {
            return Ok(FramePull::Exhausted);
        }

        let end = (self.cursor + FRAME_SAMPLES).min(self.samples.len());
        let mut frame = self.samples[self.cursor..end].to_vec();
        frame.resize(FRAME_SAMPLES, 0.0);
        self.cursor = end;
        Ok(FramePull::Frame(frame))
    }

    fn close(&mut self) {
        self.closed = true;
    }
}
