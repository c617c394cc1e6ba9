//! MP3 encoding.
//!
//! The MPEG bitstream itself is produced by an external frame encoder (see
//! [`Mp3Codec`]); this module owns what happens around it. [`encode_mp3`]
//! cuts the first two channels into 1152-frame blocks, quantises each block,
//! feeds the blocks to the frame encoder in order and concatenates every
//! non-empty chunk it emits, followed by the flush chunk.
//!
//! With the `ffmpeg` feature, [`LameCodec`](crate::ffmpeg::LameCodec)
//! provides a libmp3lame-backed codec.

use crate::{
    error::ResoundError,
    pcm::{PcmAudio, quantize_block},
};

/// Number of frames per block handed to the frame encoder (one MPEG-1
/// Layer III granule pair).
pub const MP3_BLOCK_FRAMES: usize = 1152;

/// Default MP3 bitrate in kbit/s.
pub const DEFAULT_MP3_BITRATE_KBPS: u32 = 160;

/// A constructed MP3 frame encoder.
///
/// Each call may emit zero or more bytes of MPEG audio; the encoder buffers
/// internally and releases what is left on [`flush`](FrameEncoder::flush).
pub trait FrameEncoder: Send {
    /// Encode one block of quantised samples. `right` is `None` for mono.
    fn encode_block(&mut self, left: &[i16], right: Option<&[i16]>)
    -> Result<Vec<u8>, ResoundError>;

    /// Drain the encoder's internal buffers.
    fn flush(&mut self) -> Result<Vec<u8>, ResoundError>;
}

/// Factory for [`FrameEncoder`]s.
pub trait Mp3Codec: Send + Sync {
    /// Construct an encoder for the given stream parameters.
    ///
    /// # Errors
    ///
    /// Implementations return [`ResoundError::EncoderUnavailable`] when the
    /// codec cannot be constructed and [`ResoundError::ShapeError`] when the
    /// stream parameters cannot be encoded.
    fn open(
        &self,
        channel_count: u16,
        sample_rate: u32,
        bitrate_kbps: u32,
    ) -> Result<Box<dyn FrameEncoder>, ResoundError>;
}

/// Encode PCM audio as an MP3 byte stream.
///
/// Only channels 0 and 1 are encoded; any further channels are dropped.
///
/// # Errors
///
/// - [`ResoundError::EncoderUnavailable`] if `codec` cannot open an encoder.
/// - [`ResoundError::ShapeError`] if `codec` cannot encode audio of this
///   shape, such as an unusable sample rate.
/// - Whatever the frame encoder returns while encoding or flushing.
pub fn encode_mp3(
    audio: &PcmAudio,
    codec: &dyn Mp3Codec,
    bitrate_kbps: u32,
) -> Result<Vec<u8>, ResoundError> {
    if audio.channel_count() > 2 {
        log::warn!(
            "MP3 output keeps 2 of {} channels; channels 2.. are dropped",
            audio.channel_count()
        );
    }
    let channel_count: u16 = if audio.channel_count() > 1 { 2 } else { 1 };

    let mut encoder = codec
        .open(channel_count, audio.sample_rate(), bitrate_kbps)
        .map_err(|error| match error {
            ResoundError::EncoderUnavailable(_) | ResoundError::ShapeError(_) => error,
            other => ResoundError::EncoderUnavailable(other.to_string()),
        })?;

    let left = audio.channel(0).unwrap_or_default();
    let right = audio.channel(1);

    let mut chunks: Vec<Vec<u8>> = Vec::new();
    let mut blocks = 0_usize;
    for (index, left_block) in left.chunks(MP3_BLOCK_FRAMES).enumerate() {
        let left_pcm = quantize_block(left_block);
        let right_pcm = right.map(|right| {
            let start = index * MP3_BLOCK_FRAMES;
            quantize_block(&right[start..start + left_block.len()])
        });

        let chunk = encoder.encode_block(&left_pcm, right_pcm.as_deref())?;
        if !chunk.is_empty() {
            chunks.push(chunk);
        }
        blocks += 1;
    }

    let tail = encoder.flush()?;
    if !tail.is_empty() {
        chunks.push(tail);
    }

    let mp3 = chunks.concat();
    log::debug!(
        "Encoded MP3 ({} Hz, {} kbit/s, {} block(s), {} bytes)",
        audio.sample_rate(),
        bitrate_kbps,
        blocks,
        mp3.len()
    );
    Ok(mp3)
}
