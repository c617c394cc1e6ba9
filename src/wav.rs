//! RIFF/WAVE encoding.
//!
//! [`encode_wav`] writes a canonical 44-byte header followed by interleaved
//! 16-bit little-endian PCM.

use crate::{
    error::ResoundError,
    pcm::{PcmAudio, quantize},
};

/// Length of the canonical RIFF/WAVE header.
pub const WAV_HEADER_LEN: usize = 44;

const BYTES_PER_SAMPLE: usize = 2;
const BITS_PER_SAMPLE: u16 = 16;
const FMT_CHUNK_SIZE: u32 = 16;
const PCM_FORMAT_TAG: u16 = 1;

/// Encode PCM audio as a 16-bit PCM WAV file.
///
/// The output is always `44 + frame_count × channel_count × 2` bytes long.
///
/// # Errors
///
/// Returns [`ResoundError::ShapeError`] if the audio has more than 32767
/// channels, its byte rate does not fit in 32 bits, or its data chunk would
/// not fit a RIFF size field.
///
/// # Example
///
/// ```
/// use resound::{PcmAudio, encode_wav};
///
/// let audio = PcmAudio::mono(44_100, vec![0.0, 0.5, -0.5, 1.0])?;
/// let wav = encode_wav(&audio)?;
/// assert_eq!(wav.len(), 52);
/// assert_eq!(&wav[0..4], b"RIFF");
/// # Ok::<(), resound::ResoundError>(())
/// ```
pub fn encode_wav(audio: &PcmAudio) -> Result<Vec<u8>, ResoundError> {
    let (channel_count, block_align) = u16::try_from(audio.channel_count())
        .ok()
        .zip(u16::try_from(audio.channel_count() * BYTES_PER_SAMPLE).ok())
        .ok_or_else(|| {
            ResoundError::ShapeError(format!(
                "{} channels cannot be stored in a WAV header",
                audio.channel_count()
            ))
        })?;
    let interleaved = audio.interleave();

    let data_len = interleaved
        .len()
        .checked_mul(BYTES_PER_SAMPLE)
        .and_then(|len| u32::try_from(len).ok())
        .filter(|len| len.checked_add(36).is_some())
        .ok_or_else(|| {
            ResoundError::ShapeError(format!(
                "{} samples exceed the RIFF size limit",
                interleaved.len()
            ))
        })?;

    let byte_rate = audio
        .sample_rate()
        .checked_mul(u32::from(block_align))
        .ok_or_else(|| {
            ResoundError::ShapeError(format!(
                "{} Hz with {channel_count} channels overflows the WAV byte rate",
                audio.sample_rate()
            ))
        })?;

    let mut wav = Vec::with_capacity(WAV_HEADER_LEN + data_len as usize);
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVE");
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&FMT_CHUNK_SIZE.to_le_bytes());
    wav.extend_from_slice(&PCM_FORMAT_TAG.to_le_bytes());
    wav.extend_from_slice(&channel_count.to_le_bytes());
    wav.extend_from_slice(&audio.sample_rate().to_le_bytes());
    wav.extend_from_slice(&byte_rate.to_le_bytes());
    wav.extend_from_slice(&block_align.to_le_bytes());
    wav.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());

    for &sample in interleaved.iter() {
        wav.extend_from_slice(&quantize(sample).to_le_bytes());
    }

    log::debug!(
        "Encoded WAV ({} Hz, {} channel(s), {} bytes)",
        audio.sample_rate(),
        channel_count,
        wav.len()
    );
    Ok(wav)
}
