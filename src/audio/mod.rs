// Re-export all audio components
pub mod decoder;
pub mod resampler;
pub mod source;
pub mod utils;

pub use decoder::decode_audio_file;
pub use resampler::FrameResampler;
pub use source::{AudioFrame, AudioFrameSource, FileFrameSource, FramePull, MicrophoneSource};
pub use utils::{load_wav_file, save_wav_file};

/// Pipeline sample rate; engines consume 16 kHz mono PCM.
pub const SAMPLE_RATE: u32 = 16_000;

/// Nominal duration of one frame pulled from a source per decode step.
pub const FRAME_DURATION_MS: u32 = 100;

/// Samples per frame at `SAMPLE_RATE`.
pub const FRAME_SAMPLES: usize = (SAMPLE_RATE as usize / 1000) * FRAME_DURATION_MS as usize;
