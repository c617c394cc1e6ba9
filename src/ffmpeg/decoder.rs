//! Decoding with FFmpeg.
//!
//! Audio is decoded frame by frame and resampled to packed `f32`, keeping
//! the source's channel layout (and, unless a target rate is requested, its
//! sample rate), then split into one buffer per channel.

use std::{io::Write, path::Path};

use ffmpeg_next::{
    ChannelLayout, Error as FfmpegError, Packet,
    codec::context::Context as CodecContext,
    decoder::Audio as FfmpegAudioDecoder,
    format::{Sample, sample::Type as SampleType},
    frame::Audio as AudioFrame,
    media::Type,
    software::resampling::Context as ResamplingContext,
};

use crate::{acquisition::AudioDecoder, error::ResoundError, pcm::PcmAudio};

/// Decodes whole media files through FFmpeg.
///
/// Input bytes are written to a temporary file that is removed once
/// decoding finishes.
#[derive(Debug)]
pub struct FfmpegDecoder {
    _private: (),
}

impl FfmpegDecoder {
    /// Create a decoder, initialising FFmpeg if needed.
    ///
    /// # Errors
    ///
    /// Returns [`ResoundError::UnsupportedEnvironment`] if FFmpeg fails to
    /// initialise.
    pub fn new() -> Result<Self, ResoundError> {
        super::init()?;
        Ok(Self { _private: () })
    }
}

impl AudioDecoder for FfmpegDecoder {
    fn decode(&self, data: &[u8]) -> Result<PcmAudio, ResoundError> {
        let mut scratch = tempfile::Builder::new()
            .prefix("resound-decode-")
            .tempfile()?;
        scratch.write_all(data)?;
        scratch.flush()?;
        decode_file(scratch.path(), None, &mut |_| {})
    }
}

/// Decode the best audio stream of the file at `path`.
///
/// `target_rate` resamples to a fixed rate; `None` keeps the source rate.
/// `progress` receives the ratio of the stream decoded so far, when the
/// container reports a duration.
pub(crate) fn decode_file(
    path: &Path,
    target_rate: Option<u32>,
    progress: &mut dyn FnMut(f64),
) -> Result<PcmAudio, ResoundError> {
    log::debug!("Decoding audio from {}", path.display());
    let mut input_context = ffmpeg_next::format::input(&path)
        .map_err(|error| ResoundError::DecodeError(format!("cannot open media: {error}")))?;

    let stream = input_context
        .streams()
        .best(Type::Audio)
        .ok_or_else(|| ResoundError::DecodeError("no audio stream".to_string()))?;
    let audio_stream_index = stream.index();
    let time_base = f64::from(stream.time_base());
    let decoder_context = CodecContext::from_parameters(stream.parameters())
        .map_err(|error| ResoundError::DecodeError(error.to_string()))?;
    let mut decoder = decoder_context.decoder().audio().map_err(|error| {
        ResoundError::DecodeError(format!("Failed to create audio decoder: {error}"))
    })?;

    let duration_microseconds = input_context.duration();
    let duration_seconds = if duration_microseconds > 0 {
        duration_microseconds as f64 / 1_000_000.0
    } else {
        0.0
    };

    let mut collector = PcmCollector::new(target_rate);
    let mut decoded_frame = AudioFrame::empty();
    let mut packet = Packet::empty();
    loop {
        match packet.read(&mut input_context) {
            Ok(()) => {
                if packet.stream() != audio_stream_index {
                    continue;
                }
                if duration_seconds > 0.0
                    && let Some(pts) = packet.pts()
                {
                    progress((pts as f64 * time_base / duration_seconds).clamp(0.0, 1.0));
                }
                if let Err(error) = decoder.send_packet(&packet) {
                    log::debug!("Skipping undecodable audio packet: {error}");
                    continue;
                }
                receive_frames(&mut decoder, &mut decoded_frame, &mut collector)?;
            }
            Err(FfmpegError::Eof) => break,
            Err(error) => {
                log::debug!("Stopping at demuxer error: {error}");
                break;
            }
        }
    }

    let _ = decoder.send_eof();
    receive_frames(&mut decoder, &mut decoded_frame, &mut collector)?;
    progress(1.0);
    collector.finish()
}

// ── Private helpers ────────────────────────────────────────────────────

fn receive_frames(
    decoder: &mut FfmpegAudioDecoder,
    decoded_frame: &mut AudioFrame,
    collector: &mut PcmCollector,
) -> Result<(), ResoundError> {
    while decoder.receive_frame(decoded_frame).is_ok() {
        collector.push(decoded_frame)?;
    }
    Ok(())
}

/// Resamples decoded frames to packed `f32` and gathers them per channel.
struct PcmCollector {
    target_rate: Option<u32>,
    resampler: Option<ResamplingContext>,
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

impl PcmCollector {
    fn new(target_rate: Option<u32>) -> Self {
        Self {
            target_rate,
            resampler: None,
            sample_rate: 0,
            channels: Vec::new(),
        }
    }

    fn push(&mut self, frame: &AudioFrame) -> Result<(), ResoundError> {
        if self.resampler.is_none() {
            self.resampler = Some(self.open_resampler(frame)?);
        }
        let mut resampled_frame = AudioFrame::empty();
        if let Some(resampler) = self.resampler.as_mut() {
            resampler
                .run(frame, &mut resampled_frame)
                .map_err(|error| ResoundError::DecodeError(format!("Resample error: {error}")))?;
        }
        self.append(&resampled_frame);
        Ok(())
    }

    fn finish(mut self) -> Result<PcmAudio, ResoundError> {
        if let Some(resampler) = self.resampler.as_mut() {
            let mut remaining = AudioFrame::empty();
            if resampler.flush(&mut remaining).is_ok() {
                self.append(&remaining);
            }
        }
        if self.channels.first().is_none_or(Vec::is_empty) {
            return Err(ResoundError::DecodeError(
                "no audio samples were decoded".to_string(),
            ));
        }
        PcmAudio::new(self.sample_rate, self.channels)
    }

    fn open_resampler(&mut self, frame: &AudioFrame) -> Result<ResamplingContext, ResoundError> {
        let layout = if frame.channel_layout().bits() == 0 {
            // No channel layout set; fall back based on channel count.
            match frame.channels() {
                1 => ChannelLayout::MONO,
                _ => ChannelLayout::STEREO,
            }
        } else {
            frame.channel_layout()
        };
        let output_rate = self.target_rate.unwrap_or(frame.rate());
        log::debug!(
            "Resampling {:?} at {} Hz to packed f32 at {} Hz",
            frame.format(),
            frame.rate(),
            output_rate
        );

        let resampler = ResamplingContext::get(
            frame.format(),
            layout,
            frame.rate(),
            Sample::F32(SampleType::Packed),
            layout,
            output_rate,
        )
        .map_err(|error| {
            ResoundError::DecodeError(format!("Failed to create resampler: {error}"))
        })?;
        self.sample_rate = output_rate;
        Ok(resampler)
    }

    fn append(&mut self, frame: &AudioFrame) {
        let sample_count = frame.samples();
        let channel_count = usize::from(frame.channels());
        if sample_count == 0 || channel_count == 0 {
            return;
        }
        if self.channels.is_empty() {
            self.channels = vec![Vec::new(); channel_count];
        }

        let data = frame.data(0);
        let value_count = (sample_count * channel_count).min(data.len() / size_of::<f32>());
        // SAFETY: the resampler emits packed F32, so plane 0 holds the
        // interleaved samples of every channel. FFmpeg allocates frame
        // buffers with at least 16-byte alignment, and `value_count` is
        // capped by the byte length of the plane.
        let interleaved: &[f32] =
            unsafe { std::slice::from_raw_parts(data.as_ptr() as *const f32, value_count) };
        for frame_samples in interleaved.chunks_exact(channel_count) {
            for (channel, sample) in self.channels.iter_mut().zip(frame_samples) {
                channel.push(*sample);
            }
        }
    }
}
