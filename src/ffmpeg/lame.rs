//! libmp3lame through FFmpeg.

use ffmpeg_next::{
    ChannelLayout, Packet, Rational,
    codec::{Id, context::Context as CodecContext},
    encoder::Audio as AudioEncoder,
    format::{Sample, sample::Type as SampleType},
    frame::Audio as AudioFrame,
    software::resampling::Context as ResamplingContext,
};

use crate::{
    error::ResoundError,
    mp3::{FrameEncoder, MP3_BLOCK_FRAMES, Mp3Codec},
};

/// libmp3lame requires planar input.
const LAME_SAMPLE_FORMAT: Sample = Sample::I16(SampleType::Planar);

/// Sample rates MPEG-1, MPEG-2 and MPEG-2.5 Layer III can carry, in Hz.
const LAME_SAMPLE_RATES: [u32; 9] = [
    8_000, 11_025, 12_000, 16_000, 22_050, 24_000, 32_000, 44_100, 48_000,
];

/// Output samples reserved per resampler call beyond the rate ratio.
const RESAMPLE_HEADROOM: usize = 256;

/// An [`Mp3Codec`] backed by FFmpeg's libmp3lame encoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct LameCodec;

impl LameCodec {
    /// Whether this FFmpeg build has an MP3 encoder.
    pub fn is_available() -> bool {
        find_encoder().is_some()
    }

    /// The rate audio at `sample_rate` is encoded at: `sample_rate` itself
    /// when MP3 can carry it, otherwise the nearest rate it can.
    ///
    /// ```
    /// use resound::LameCodec;
    ///
    /// assert_eq!(LameCodec::encoder_rate(44_100), 44_100);
    /// assert_eq!(LameCodec::encoder_rate(96_000), 48_000);
    /// assert_eq!(LameCodec::encoder_rate(7_000), 8_000);
    /// ```
    pub fn encoder_rate(sample_rate: u32) -> u32 {
        LAME_SAMPLE_RATES
            .into_iter()
            .min_by_key(|rate| rate.abs_diff(sample_rate))
            .unwrap_or(44_100)
    }
}

impl Mp3Codec for LameCodec {
    fn open(
        &self,
        channel_count: u16,
        sample_rate: u32,
        bitrate_kbps: u32,
    ) -> Result<Box<dyn FrameEncoder>, ResoundError> {
        let codec = find_encoder().ok_or_else(|| {
            ResoundError::EncoderUnavailable(
                "libmp3lame is not available in this FFmpeg build".to_string(),
            )
        })?;
        let encoder_rate = Self::encoder_rate(sample_rate);
        let rate = encoder_rate as i32;
        let channel_layout = if channel_count == 1 {
            ChannelLayout::MONO
        } else {
            ChannelLayout::STEREO
        };

        let resampler = if encoder_rate == sample_rate {
            None
        } else {
            log::debug!("MP3 cannot carry {sample_rate} Hz; resampling to {encoder_rate} Hz");
            let resampler = ResamplingContext::get(
                LAME_SAMPLE_FORMAT,
                channel_layout,
                sample_rate,
                LAME_SAMPLE_FORMAT,
                channel_layout,
                encoder_rate,
            )
            .map_err(|error| {
                ResoundError::ShapeError(format!(
                    "{sample_rate} Hz audio cannot be resampled to {encoder_rate} Hz for MP3: {error}"
                ))
            })?;
            Some(resampler)
        };

        let mut encoder_context = CodecContext::new_with_codec(codec)
            .encoder()
            .audio()
            .map_err(|error| ResoundError::EncoderUnavailable(error.to_string()))?;
        encoder_context.set_rate(rate);
        encoder_context.set_channel_layout(channel_layout);
        encoder_context.set_format(LAME_SAMPLE_FORMAT);
        encoder_context.set_bit_rate(bitrate_kbps as usize * 1000);
        encoder_context.set_time_base(Rational(1, rate));

        let encoder = encoder_context
            .open_as(codec)
            .map_err(|error| ResoundError::EncoderUnavailable(error.to_string()))?;
        let frame_size = match encoder.frame_size() {
            0 => MP3_BLOCK_FRAMES,
            size => size as usize,
        };
        log::debug!(
            "Opened libmp3lame ({channel_count} channel(s), {encoder_rate} Hz, {bitrate_kbps} kbit/s, {frame_size} samples per frame)"
        );

        Ok(Box::new(LameFrameEncoder {
            encoder,
            resampler,
            channel_layout,
            source_rate: sample_rate,
            sample_rate: encoder_rate,
            frame_size,
            pts: 0,
            pending: vec![Vec::new(); usize::from(channel_count.clamp(1, 2))],
        }))
    }
}

/// Feeds blocks to libmp3lame in whole encoder frames.
///
/// Samples that do not fill a frame wait in `pending` until the next block
/// or the flush, which sends them as a short final frame. When the source
/// rate is one MP3 cannot carry, blocks pass through `resampler` first and
/// `pending` holds samples at `sample_rate`.
struct LameFrameEncoder {
    encoder: AudioEncoder,
    resampler: Option<ResamplingContext>,
    channel_layout: ChannelLayout,
    source_rate: u32,
    sample_rate: u32,
    frame_size: usize,
    pts: i64,
    pending: Vec<Vec<i16>>,
}

impl FrameEncoder for LameFrameEncoder {
    fn encode_block(
        &mut self,
        left: &[i16],
        right: Option<&[i16]>,
    ) -> Result<Vec<u8>, ResoundError> {
        let inputs = [left, right.unwrap_or(left)];
        if self.resampler.is_some() {
            self.resample_block(&inputs)?;
        } else {
            for (pending, input) in self.pending.iter_mut().zip(inputs) {
                pending.extend_from_slice(input);
            }
        }

        let mut encoded = Vec::new();
        while self.pending_len() >= self.frame_size {
            self.send_frame(self.frame_size, &mut encoded)?;
        }
        Ok(encoded)
    }

    fn flush(&mut self) -> Result<Vec<u8>, ResoundError> {
        self.drain_resampler()?;

        let mut encoded = Vec::new();
        while self.pending_len() > self.frame_size {
            self.send_frame(self.frame_size, &mut encoded)?;
        }
        let remaining = self.pending_len();
        if remaining > 0 {
            self.send_frame(remaining, &mut encoded)?;
        }
        self.encoder
            .send_eof()
            .map_err(|error| ResoundError::EncodeError(error.to_string()))?;
        self.receive_packets(&mut encoded);
        Ok(encoded)
    }
}

impl LameFrameEncoder {
    fn pending_len(&self) -> usize {
        self.pending.first().map_or(0, Vec::len)
    }

    fn resample_block(&mut self, inputs: &[&[i16]; 2]) -> Result<(), ResoundError> {
        let sample_count = inputs[0].len();
        if sample_count == 0 {
            return Ok(());
        }
        let mut input = AudioFrame::new(LAME_SAMPLE_FORMAT, sample_count, self.channel_layout);
        input.set_rate(self.source_rate);
        for (index, samples) in inputs.iter().take(self.pending.len()).enumerate() {
            input.plane_mut::<i16>(index).copy_from_slice(samples);
        }

        let capacity = (sample_count as u64 * u64::from(self.sample_rate)
            / u64::from(self.source_rate)) as usize
            + RESAMPLE_HEADROOM;
        let mut output = AudioFrame::new(LAME_SAMPLE_FORMAT, capacity, self.channel_layout);
        if let Some(resampler) = self.resampler.as_mut() {
            resampler
                .run(&input, &mut output)
                .map_err(|error| ResoundError::EncodeError(format!("Resample error: {error}")))?;
        }
        self.append_resampled(&output);
        Ok(())
    }

    /// Move whatever the resampler still buffers into `pending`.
    fn drain_resampler(&mut self) -> Result<(), ResoundError> {
        let Some(resampler) = self.resampler.as_mut() else {
            return Ok(());
        };
        let mut drained = Vec::new();
        loop {
            let mut output =
                AudioFrame::new(LAME_SAMPLE_FORMAT, self.frame_size, self.channel_layout);
            resampler
                .flush(&mut output)
                .map_err(|error| ResoundError::EncodeError(format!("Resample error: {error}")))?;
            if output.samples() == 0 {
                break;
            }
            drained.push(output);
        }
        for output in &drained {
            self.append_resampled(output);
        }
        Ok(())
    }

    fn append_resampled(&mut self, frame: &AudioFrame) {
        if frame.samples() == 0 {
            return;
        }
        for (index, pending) in self.pending.iter_mut().enumerate() {
            pending.extend_from_slice(frame.plane::<i16>(index));
        }
    }

    fn send_frame(&mut self, sample_count: usize, encoded: &mut Vec<u8>) -> Result<(), ResoundError> {
        let mut frame = AudioFrame::new(LAME_SAMPLE_FORMAT, sample_count, self.channel_layout);
        frame.set_rate(self.sample_rate);
        for (index, pending) in self.pending.iter_mut().enumerate() {
            frame
                .plane_mut::<i16>(index)
                .copy_from_slice(&pending[..sample_count]);
            pending.drain(..sample_count);
        }
        frame.set_pts(Some(self.pts));
        self.pts += sample_count as i64;

        self.encoder
            .send_frame(&frame)
            .map_err(|error| ResoundError::EncodeError(error.to_string()))?;
        self.receive_packets(encoded);
        Ok(())
    }

    fn receive_packets(&mut self, encoded: &mut Vec<u8>) {
        let mut packet = Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            if let Some(data) = packet.data() {
                encoded.extend_from_slice(data);
            }
        }
    }
}

fn find_encoder() -> Option<ffmpeg_next::Codec> {
    ffmpeg_next::encoder::find_by_name("libmp3lame").or_else(|| ffmpeg_next::encoder::find(Id::MP3))
}
