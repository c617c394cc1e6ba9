//! In-memory PCM audio.
//!
//! [`PcmAudio`] holds decoded multi-channel float audio as one sample vector
//! per channel. Both encoders read from it, and both quantise samples to
//! 16-bit integers with [`quantize`].
//!
//! # Example
//!
//! ```
//! use resound::{PcmAudio, quantize};
//!
//! let audio = PcmAudio::new(44_100, vec![vec![0.0, 1.0], vec![-1.0, 0.5]])?;
//! assert_eq!(audio.interleave().as_ref(), &[0.0, -1.0, 1.0, 0.5]);
//! assert_eq!(quantize(-1.0), i16::MIN);
//! # Ok::<(), resound::ResoundError>(())
//! ```

use std::{borrow::Cow, time::Duration};

use crate::error::ResoundError;

/// Quantise a float sample to signed 16-bit PCM.
///
/// The sample is clamped to `[-1.0, 1.0]`; negative values scale by 32768
/// and non-negative values by 32767 before rounding to the nearest integer,
/// so `-1.0` maps to `-32768` and `1.0` to `32767`. NaN maps to 0.
pub fn quantize(sample: f32) -> i16 {
    let clamped = sample.clamp(-1.0, 1.0);
    let scaled = if clamped < 0.0 {
        clamped * 32_768.0
    } else {
        clamped * 32_767.0
    };
    // `as` saturates and maps NaN to 0.
    scaled.round() as i16
}

/// Quantise a slice of samples with [`quantize`].
pub fn quantize_block(samples: &[f32]) -> Vec<i16> {
    samples.iter().copied().map(quantize).collect()
}

/// Decoded audio: a sample rate plus one equally long sample vector per
/// channel.
///
/// The shape is validated once in [`PcmAudio::new`]; afterwards the model is
/// read-only and is handed from stage to stage by value.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmAudio {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

impl PcmAudio {
    /// Build a model from per-channel sample vectors.
    ///
    /// # Errors
    ///
    /// Returns [`ResoundError::ShapeError`] if `sample_rate` is zero, if no
    /// channel is given, or if the channels differ in length.
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> Result<Self, ResoundError> {
        if sample_rate == 0 {
            return Err(ResoundError::ShapeError(
                "sample rate must be positive".to_string(),
            ));
        }
        let Some(first) = channels.first() else {
            return Err(ResoundError::ShapeError(
                "audio must have at least one channel".to_string(),
            ));
        };
        let frame_count = first.len();
        if let Some((index, channel)) = channels
            .iter()
            .enumerate()
            .find(|(_, channel)| channel.len() != frame_count)
        {
            return Err(ResoundError::ShapeError(format!(
                "channel {index} has {} frames, expected {frame_count}",
                channel.len()
            )));
        }

        Ok(Self {
            sample_rate,
            channels,
        })
    }

    /// Build a single-channel model.
    ///
    /// # Errors
    ///
    /// Returns [`ResoundError::ShapeError`] if `sample_rate` is zero.
    pub fn mono(sample_rate: u32, samples: Vec<f32>) -> Result<Self, ResoundError> {
        Self::new(sample_rate, vec![samples])
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of channels (always at least 1).
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of samples in each channel.
    pub fn frame_count(&self) -> usize {
        self.channels[0].len()
    }

    /// Samples of one channel, or `None` if `index` is out of range.
    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    /// All channels, in order.
    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// Playback length of the audio.
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frame_count() as f64 / f64::from(self.sample_rate))
    }

    /// Samples in frame-major order: `f0c0, f0c1, .., f1c0, f1c1, ..`.
    ///
    /// Mono audio is returned as-is without copying.
    pub fn interleave(&self) -> Cow<'_, [f32]> {
        if let [only] = self.channels.as_slice() {
            return Cow::Borrowed(only.as_slice());
        }

        let channel_count = self.channel_count();
        let mut interleaved = Vec::with_capacity(self.frame_count() * channel_count);
        for frame in 0..self.frame_count() {
            for channel in &self.channels {
                interleaved.push(channel[frame]);
            }
        }
        Cow::Owned(interleaved)
    }

    /// Consume the model and return its channels.
    pub fn into_channels(self) -> Vec<Vec<f32>> {
        self.channels
    }
}
