//! An embedded codec engine built on FFmpeg.
//!
//! The "virtual filesystem" is a private scratch directory that lives as
//! long as the engine. File names are flat: anything that could escape the
//! directory is rejected.

use std::{fs, path::PathBuf, sync::Arc};

use tempfile::TempDir;

use super::{LameCodec, decode_file};
use crate::{
    acquisition::{CodecEngine, EngineCommand, EngineLoader},
    audio::AudioFormat,
    error::ResoundError,
    mp3::{DEFAULT_MP3_BITRATE_KBPS, encode_mp3},
    wav::encode_wav,
};

/// Share of the progress ratio spent decoding; encoding takes the rest.
const DECODE_PROGRESS_SHARE: f64 = 0.9;

/// A [`CodecEngine`] that decodes with FFmpeg and encodes with the crate's
/// WAV writer or libmp3lame.
#[derive(Debug)]
pub struct FfmpegEngine {
    root: TempDir,
    mp3: LameCodec,
}

impl FfmpegEngine {
    /// Create an engine with a fresh scratch directory.
    ///
    /// # Errors
    ///
    /// - [`ResoundError::UnsupportedEnvironment`] if FFmpeg fails to
    ///   initialise.
    /// - [`ResoundError::IoError`] if the scratch directory cannot be
    ///   created.
    pub fn new() -> Result<Self, ResoundError> {
        super::init()?;
        let root = tempfile::Builder::new().prefix("resound-engine-").tempdir()?;
        log::debug!("Codec engine scratch directory: {}", root.path().display());
        Ok(Self {
            root,
            mp3: LameCodec,
        })
    }

    fn resolve(&self, name: &str) -> Result<PathBuf, ResoundError> {
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
            return Err(ResoundError::InvalidEngineCommand(format!(
                "invalid file name '{name}'"
            )));
        }
        Ok(self.root.path().join(name))
    }
}

impl CodecEngine for FfmpegEngine {
    fn write_file(&self, name: &str, data: &[u8]) -> Result<(), ResoundError> {
        fs::write(self.resolve(name)?, data)?;
        Ok(())
    }

    fn read_file(&self, name: &str) -> Result<Vec<u8>, ResoundError> {
        Ok(fs::read(self.resolve(name)?)?)
    }

    fn delete_file(&self, name: &str) -> Result<(), ResoundError> {
        fs::remove_file(self.resolve(name)?)?;
        Ok(())
    }

    fn exec(&self, args: &[String], progress: &mut dyn FnMut(f64)) -> Result<(), ResoundError> {
        let command = EngineCommand::parse(args)?;
        let input = self.resolve(&command.input)?;
        let output = self.resolve(&command.output)?;
        log::debug!("Engine exec: {}", args.join(" "));

        let audio = decode_file(&input, command.sample_rate, &mut |ratio| {
            progress(ratio * DECODE_PROGRESS_SHARE)
        })?;
        let bytes = match command.format {
            AudioFormat::Wav => encode_wav(&audio)?,
            AudioFormat::Mp3 => encode_mp3(
                &audio,
                &self.mp3,
                command.bitrate_kbps.unwrap_or(DEFAULT_MP3_BITRATE_KBPS),
            )?,
        };
        fs::write(output, bytes)?;
        progress(1.0);
        Ok(())
    }
}

/// Loads an [`FfmpegEngine`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegEngineLoader;

impl EngineLoader for FfmpegEngineLoader {
    fn load(&self) -> Result<Arc<dyn CodecEngine>, ResoundError> {
        Ok(Arc::new(FfmpegEngine::new()?))
    }
}
