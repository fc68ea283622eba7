use anyhow::{Context, Result};
use log::debug;
use rodio::Source;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use super::{FrameResampler, FRAME_SAMPLES, SAMPLE_RATE};

/// Decode an audio file (WAV, MP3, FLAC, ...) to mono PCM at the pipeline
/// sample rate.
///
/// Multi-channel audio is averaged to mono; other sample rates are
/// resampled to 16 kHz. Samples come back normalized to [-1.0, 1.0].
pub fn decode_audio_file<P: AsRef<Path>>(path: P) -> Result<Vec<f32>> {
    let path = path.as_ref();
    debug!("Decoding audio file: {:?}", path);

    let file =
        File::open(path).with_context(|| format!("Failed to open audio file: {:?}", path))?;

    let source = rodio::Decoder::new(BufReader::new(file))
        .with_context(|| format!("Failed to decode audio file: {:?}", path))?;

    let source_sample_rate = source.sample_rate();
    let source_channels = source.channels();

    let samples: Vec<f32> = source.collect();
    debug!(
        "Decoded {} samples at {} Hz, {} channel(s)",
        samples.len(),
        source_sample_rate,
        source_channels
    );

    let mono = mix_to_mono(&samples, source_channels as usize);

    if source_sample_rate == SAMPLE_RATE {
        return Ok(mono);
    }

    debug!(
        "Resampling from {} Hz to {} Hz",
        source_sample_rate, SAMPLE_RATE
    );
    let mut resampler = FrameResampler::new(
        source_sample_rate as usize,
        SAMPLE_RATE as usize,
        FRAME_SAMPLES,
    );

    let mut output = Vec::new();
    resampler.push(&mono, |frame| output.extend_from_slice(frame));
    resampler.finish(|frame| output.extend_from_slice(frame));
    Ok(output)
}

/// Average interleaved samples down to one channel.
fn mix_to_mono(samples: &[f32], num_channels: usize) -> Vec<f32> {
    if num_channels <= 1 {
        return samples.to_vec();
    }

    let num_frames = samples.len() / num_channels;
    let mut mono = Vec::with_capacity(num_frames);

    for frame in samples.chunks_exact(num_channels) {
        mono.push(frame.iter().sum::<f32>() / num_channels as f32);
    }

    debug_assert_eq!(mono.len(), num_frames);
    mono
}
