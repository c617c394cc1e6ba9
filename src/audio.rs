//! Output formats and the encoded result.
//!
//! [`AudioFormat`] selects the encoder and decides the mime type and file
//! extension of the [`EncodedAudio`] blob a conversion returns.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

use crate::error::ResoundError;

/// Audio output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AudioFormat {
    /// MP3 (MPEG Audio Layer III). Lossy, widely supported.
    #[default]
    Mp3,
    /// WAV (PCM signed 16-bit little-endian). Lossless, universally supported.
    Wav,
}

impl Display for AudioFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            AudioFormat::Mp3 => write!(f, "MP3"),
            AudioFormat::Wav => write!(f, "WAV"),
        }
    }
}

impl FromStr for AudioFormat {
    type Err = ResoundError;

    /// Parse `mp3` or `wav`, ignoring case and a leading dot.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "mp3" | "mpeg" => Ok(AudioFormat::Mp3),
            "wav" | "wave" => Ok(AudioFormat::Wav),
            _ => Err(ResoundError::UnsupportedAudioFormat(value.to_string())),
        }
    }
}

impl AudioFormat {
    /// Mime type of encoded output.
    pub fn mime_type(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::Wav => "audio/wav",
        }
    }

    /// File extension of encoded output, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
        }
    }

    /// Name of the encoder the embedded codec engine is asked to use.
    pub fn engine_codec_name(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "libmp3lame",
            AudioFormat::Wav => "pcm_s16le",
        }
    }

    /// Inverse of [`engine_codec_name`](AudioFormat::engine_codec_name).
    pub fn from_engine_codec_name(name: &str) -> Option<Self> {
        match name {
            "libmp3lame" | "mp3" => Some(AudioFormat::Mp3),
            "pcm_s16le" => Some(AudioFormat::Wav),
            _ => None,
        }
    }
}

/// The encoded result of a conversion.
///
/// Owned by the caller once returned; the crate keeps no reference to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedAudio {
    bytes: Vec<u8>,
    format: AudioFormat,
    file_name: String,
}

impl EncodedAudio {
    /// Wrap encoded bytes.
    pub fn new(bytes: Vec<u8>, format: AudioFormat, file_name: impl Into<String>) -> Self {
        Self {
            bytes,
            format,
            file_name: file_name.into(),
        }
    }

    /// The encoded bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume the blob and return its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Size of the encoded data in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` if no bytes were produced.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Output format.
    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// `audio/mpeg` or `audio/wav`.
    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    /// `mp3` or `wav`.
    pub fn extension(&self) -> &'static str {
        self.format.extension()
    }

    /// Suggested download name, `<input base name>.<extension>`.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }
}
