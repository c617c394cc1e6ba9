//! Error types for the `resound` crate.
//!
//! This module defines [`ResoundError`], the unified error type returned by
//! every fallible operation in the crate. Acquisition, encoding and platform
//! failures each have their own variant; the orchestrator wraps whatever
//! stopped a run in [`ResoundError::ConversionError`], whose message is meant
//! for the person who picked the file rather than for a log.

use std::io::Error as IoError;

#[cfg(feature = "ffmpeg")]
use ffmpeg_next::Error as FfmpegError;
use thiserror::Error;

/// The unified error type for all `resound` operations.
///
/// Every public method that can fail returns `Result<T, ResoundError>`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ResoundError {
    /// A platform capability the pipeline depends on is missing.
    ///
    /// Fatal: nothing can be converted until the environment changes.
    #[error("Unsupported environment: {0}")]
    UnsupportedEnvironment(String),

    /// The input bytes could not be decoded into PCM audio.
    ///
    /// The only error that lets the orchestrator fall back to another
    /// acquisition strategy.
    #[error("Failed to decode audio: {0}")]
    DecodeError(String),

    /// Playback capture failed: routing, recording, or an empty recording.
    #[error("Failed to capture audio: {0}")]
    CaptureError(String),

    /// The embedded codec engine could not be loaded.
    #[error("Codec engine unavailable: {0}")]
    EngineUnavailable(String),

    /// The MP3 frame encoder could not be constructed.
    #[error("MP3 encoder unavailable: {0}")]
    EncoderUnavailable(String),

    /// A PCM model is malformed (no channels, zero sample rate, channels of
    /// different lengths) or cannot be represented by the target format.
    #[error("Malformed PCM audio: {0}")]
    ShapeError(String),

    /// An encoder accepted its configuration but failed while encoding.
    #[error("Failed to encode audio: {0}")]
    EncodeError(String),

    /// A requested output format is not one of the supported formats.
    #[error("Unsupported audio format: {0}")]
    UnsupportedAudioFormat(String),

    /// The codec engine was handed arguments it does not understand.
    #[error("Invalid engine command: {0}")]
    InvalidEngineCommand(String),

    /// A conversion run failed. `message` is the user-facing text; `source`
    /// keeps the technical cause.
    #[error("{message}")]
    ConversionError {
        /// Human-readable status text.
        message: String,
        /// The error that stopped the run.
        #[source]
        source: Box<ResoundError>,
    },

    /// An I/O error occurred while reading input or scratch files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error originating from the FFmpeg libraries.
    #[cfg(feature = "ffmpeg")]
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),
}

impl ResoundError {
    /// Returns `true` if the orchestrator may try the next acquisition
    /// strategy after this error.
    pub fn allows_fallback(&self) -> bool {
        matches!(self, ResoundError::DecodeError(_))
    }

    /// A short, non-technical description of the failure.
    ///
    /// # Example
    ///
    /// ```
    /// use resound::ResoundError;
    ///
    /// let error = ResoundError::CaptureError("Captured audio stream was empty.".into());
    /// assert_eq!(error.user_message(), "Captured audio stream was empty.");
    /// ```
    pub fn user_message(&self) -> String {
        match self {
            ResoundError::UnsupportedEnvironment(_) => {
                "This converter needs a platform with audio decoding and recording support."
                    .to_string()
            }
            ResoundError::DecodeError(_) => {
                "The audio in this file could not be decoded. Please try another file.".to_string()
            }
            ResoundError::CaptureError(reason) => reason.clone(),
            ResoundError::EngineUnavailable(_) => {
                "The conversion engine failed to load. Please reload and try again.".to_string()
            }
            ResoundError::EncoderUnavailable(_) => {
                "MP3 encoder library missing. Please reload and try again.".to_string()
            }
            ResoundError::UnsupportedAudioFormat(format) => {
                format!("{format} is not a supported output format.")
            }
            ResoundError::ConversionError { message, .. } => message.clone(),
            _ => "The conversion failed. Please try another file.".to_string(),
        }
    }

    /// Wrap this error as a [`ResoundError::ConversionError`] for display.
    ///
    /// Already-wrapped errors are returned unchanged.
    pub fn into_conversion_error(self) -> ResoundError {
        match self {
            wrapped @ ResoundError::ConversionError { .. } => wrapped,
            other => ResoundError::ConversionError {
                message: other.user_message(),
                source: Box::new(other),
            },
        }
    }
}

#[cfg(feature = "ffmpeg")]
impl From<FfmpegError> for ResoundError {
    fn from(error: FfmpegError) -> Self {
        ResoundError::FfmpegError(error.to_string())
    }
}
