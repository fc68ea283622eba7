//! Streams arbitrary-rate input into fixed-size output frames.

use rubato::{FftFixedIn, Resampler};

const RESAMPLER_CHUNK_SIZE: usize = 1024;

/// Converts mono samples from `in_hz` to `out_hz` and emits them in frames
/// of exactly `frame_samples` samples. When the rates match, only the
/// reframing happens.
pub struct FrameResampler {
    inner: Option<FftFixedIn<f32>>,
    chunk_in: usize,
    in_buf: Vec<f32>,
    frame_samples: usize,
    pending: Vec<f32>,
}

impl FrameResampler {
    pub fn new(in_hz: usize, out_hz: usize, frame_samples: usize) -> Self {
        assert!(frame_samples > 0, "frame_samples must be non-zero");

        let inner = (in_hz != out_hz).then(|| {
            FftFixedIn::<f32>::new(in_hz, out_hz, RESAMPLER_CHUNK_SIZE, 1, 1)
                .expect("Failed to create resampler")
        });

        Self {
            inner,
            chunk_in: RESAMPLER_CHUNK_SIZE,
            in_buf: Vec::with_capacity(RESAMPLER_CHUNK_SIZE),
            frame_samples,
            pending: Vec::with_capacity(frame_samples),
        }
    }

    pub fn push(&mut self, mut src: &[f32], mut emit: impl FnMut(&[f32])) {
        if self.inner.is_none() {
            self.emit_frames(src, &mut emit);
            return;
        }

        while !src.is_empty() {
            let space = self.chunk_in - self.in_buf.len();
            let take = space.min(src.len());
            self.in_buf.extend_from_slice(&src[..take]);
            src = &src[take..];

            if self.in_buf.len() == self.chunk_in {
                if let Ok(out) = self.inner.as_mut().unwrap().process(&[&self.in_buf[..]], None) {
                    self.emit_frames(&out[0], &mut emit);
                }
                self.in_buf.clear();
            }
        }
    }

    /// Flush buffered input. The final frame is zero-padded to full size.
    pub fn finish(&mut self, mut emit: impl FnMut(&[f32])) {
        if let Some(ref mut inner) = self.inner {
            if !self.in_buf.is_empty() {
                self.in_buf.resize(self.chunk_in, 0.0);
                if let Ok(out) = inner.process(&[&self.in_buf[..]], None) {
                    Self::frames_from(&mut self.pending, self.frame_samples, &out[0], &mut emit);
                }
                self.in_buf.clear();
            }
        }

        if !self.pending.is_empty() {
            self.pending.resize(self.frame_samples, 0.0);
            emit(&self.pending);
            self.pending.clear();
        }
    }

    fn emit_frames(&mut self, data: &[f32], emit: &mut impl FnMut(&[f32])) {
        Self::frames_from(&mut self.pending, self.frame_samples, data, emit);
    }

    fn frames_from(
        pending: &mut Vec<f32>,
        frame_samples: usize,
        mut data: &[f32],
        emit: &mut impl FnMut(&[f32]),
    ) {
        while !data.is_empty() {
            let space = frame_samples - pending.len();
            let take = space.min(data.len());
            pending.extend_from_slice(&data[..take]);
            data = &data[take..];

            if pending.len() == frame_samples {
                emit(pending);
                pending.clear();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reframes_without_resampling() {
        let mut resampler = FrameResampler::new(16_000, 16_000, 4);
        let mut frames = Vec::new();

        resampler.push(&[0.1; 10], |frame| frames.push(frame.to_vec()));
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].len(), 4);

        resampler.finish(|frame| frames.push(frame.to_vec()));
        assert_eq!(frames.len(), 3);
        // Last frame carries the 2 leftover samples, zero-padded.
        assert_eq!(frames[2], vec![0.1, 0.1, 0.0, 0.0]);
    }

    #[test]
    fn downsamples_to_target_rate() {
        let mut resampler = FrameResampler::new(48_000, 16_000, 160);
        let input = vec![0.0f32; 4800];
        let mut out_samples = 0;

        resampler.push(&input, |frame| out_samples += frame.len());
        resampler.finish(|frame| out_samples += frame.len());

        // Output only ever arrives in whole frames.
        assert!(out_samples > 0);
        assert_eq!(out_samples % 160, 0);
    }
}
