//! FFmpeg-backed capabilities.
//!
//! Available with the `ffmpeg` cargo feature (on by default):
//!
//! - [`FfmpegDecoder`]: an [`AudioDecoder`](crate::AudioDecoder) for any
//!   container FFmpeg can demux.
//! - [`LameCodec`]: an [`Mp3Codec`](crate::Mp3Codec) using libmp3lame.
//! - [`FfmpegEngine`] / [`FfmpegEngineLoader`]: a
//!   [`CodecEngine`](crate::CodecEngine) with a scratch directory as its
//!   virtual filesystem.
//!
//! [`Converter::with_ffmpeg`](crate::Converter::with_ffmpeg) wires all three.
//!
//! # Note
//!
//! FFmpeg writes its own diagnostics to stderr, separately from the `log`
//! crate. [`set_log_level`] maps a `log` level filter onto FFmpeg's
//! verbosity so both can be tuned together.

mod decoder;
mod engine;
mod lame;

use ffmpeg_next::util::log::Level;

pub use decoder::FfmpegDecoder;
pub(crate) use decoder::decode_file;
pub use engine::{FfmpegEngine, FfmpegEngineLoader};
pub use lame::LameCodec;

use crate::error::ResoundError;

/// Initialise the FFmpeg libraries. Safe to call more than once.
///
/// # Errors
///
/// Returns [`ResoundError::UnsupportedEnvironment`] if FFmpeg fails to
/// initialise.
pub fn init() -> Result<(), ResoundError> {
    ffmpeg_next::init().map_err(|error| {
        ResoundError::UnsupportedEnvironment(format!("FFmpeg failed to initialise: {error}"))
    })
}

/// Set FFmpeg's console verbosity to match a `log` level filter.
///
/// # Example
///
/// ```no_run
/// // Only let FFmpeg print errors.
/// resound::ffmpeg::set_log_level(log::LevelFilter::Error);
/// ```
pub fn set_log_level(filter: log::LevelFilter) {
    let level = match filter {
        log::LevelFilter::Off => Level::Quiet,
        log::LevelFilter::Error => Level::Error,
        log::LevelFilter::Warn => Level::Warning,
        log::LevelFilter::Info => Level::Info,
        log::LevelFilter::Debug => Level::Debug,
        log::LevelFilter::Trace => Level::Trace,
    };
    ffmpeg_next::util::log::set_level(level);
}
