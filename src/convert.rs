//! The conversion orchestrator.
//!
//! [`Converter`] ties the pieces together: it checks which acquisition
//! strategies the injected capabilities allow, acquires the input's audio
//! with the first of them (falling back once to the next if the input turns
//! out not to be decodable), encodes PCM with the encoder matching the
//! requested format, and wraps the bytes as [`EncodedAudio`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use resound::{AudioFormat, ConvertOptions, Converter, MediaSource, ProgressInfo};
//!
//! # async fn example() -> Result<(), resound::ResoundError> {
//! let options = ConvertOptions::new().with_progress(Arc::new(|info: &ProgressInfo| {
//!     println!("{}%", info.percentage);
//! }));
//! let converter = Converter::with_ffmpeg(options)?;
//!
//! let source = MediaSource::open("holiday.mp4")?;
//! let audio = converter.convert(&source, AudioFormat::Mp3).await?;
//! std::fs::write(audio.file_name(), audio.bytes())?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use crate::{
    acquisition::{
        Acquired, CaptureBackend, CaptureSession, DecodeContext, EngineHost, Strategy,
    },
    audio::{AudioFormat, EncodedAudio},
    configuration::ConvertOptions,
    error::ResoundError,
    mp3::{Mp3Codec, encode_mp3},
    pcm::PcmAudio,
    progress::{
        CAPTURE_DECODE_PERCENT, ConversionStage, DIRECT_DECODE_PERCENT, DIRECT_DECODED_PERCENT,
        ProgressTracker,
    },
    source::MediaSource,
    wav::encode_wav,
};

/// Converts media files to MP3 or WAV.
///
/// A converter holds the capabilities it was given and can run any number of
/// conversions; the decode context and engine it holds are reused between
/// runs. Capabilities that are not provided disable the strategies that need
/// them.
#[derive(Clone)]
pub struct Converter {
    options: ConvertOptions,
    decode: Option<Arc<DecodeContext>>,
    capture: Option<Arc<dyn CaptureBackend>>,
    engine: Option<Arc<EngineHost>>,
    mp3: Option<Arc<dyn Mp3Codec>>,
}

impl std::fmt::Debug for Converter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converter")
            .field("options", &self.options)
            .field("available_strategies", &self.available_strategies())
            .field("has_mp3_codec", &self.mp3.is_some())
            .finish()
    }
}

impl Converter {
    /// Create a converter with no capabilities attached.
    pub fn new(options: ConvertOptions) -> Self {
        Self {
            options,
            decode: None,
            capture: None,
            engine: None,
            mp3: None,
        }
    }

    /// Create a converter backed by FFmpeg: direct decoding, the embedded
    /// engine, and libmp3lame for MP3 output.
    ///
    /// # Errors
    ///
    /// Returns [`ResoundError::UnsupportedEnvironment`] if FFmpeg cannot be
    /// initialised.
    #[cfg(feature = "ffmpeg")]
    pub fn with_ffmpeg(options: ConvertOptions) -> Result<Self, ResoundError> {
        use crate::{
            acquisition::AudioDecoder,
            ffmpeg::{FfmpegDecoder, FfmpegEngineLoader, LameCodec},
        };

        crate::ffmpeg::init()?;
        let decode = DecodeContext::new(|| {
            let decoder: Arc<dyn AudioDecoder> = Arc::new(FfmpegDecoder::new()?);
            Ok(decoder)
        });
        Ok(Self::new(options)
            .with_decode_context(Arc::new(decode))
            .with_engine(Arc::new(EngineHost::new(Arc::new(FfmpegEngineLoader))))
            .with_mp3_codec(Arc::new(LameCodec)))
    }

    /// Enable direct decoding (and decoding of captured audio).
    #[must_use]
    pub fn with_decode_context(mut self, decode: Arc<DecodeContext>) -> Self {
        self.decode = Some(decode);
        self
    }

    /// Enable playback capture.
    #[must_use]
    pub fn with_capture(mut self, backend: Arc<dyn CaptureBackend>) -> Self {
        self.capture = Some(backend);
        self
    }

    /// Enable the embedded codec engine.
    #[must_use]
    pub fn with_engine(mut self, engine: Arc<EngineHost>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Set the codec used for MP3 output of decoded audio.
    #[must_use]
    pub fn with_mp3_codec(mut self, codec: Arc<dyn Mp3Codec>) -> Self {
        self.mp3 = Some(codec);
        self
    }

    /// The converter's configuration.
    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    /// Strategies that can run with the attached capabilities, in policy
    /// order.
    pub fn available_strategies(&self) -> Vec<Strategy> {
        self.options
            .policy
            .filter_available(|strategy| self.is_available(strategy))
    }

    /// Check up front whether any conversion can succeed.
    ///
    /// # Errors
    ///
    /// Returns [`ResoundError::UnsupportedEnvironment`] if no strategy is
    /// available.
    pub fn check_environment(&self) -> Result<(), ResoundError> {
        if self.available_strategies().is_empty() {
            return Err(ResoundError::UnsupportedEnvironment(
                "no audio acquisition strategy is available".to_string(),
            ));
        }
        Ok(())
    }

    /// Convert the audio of `source` to `format`.
    ///
    /// Progress starts at 0, never decreases and ends at 100 on success.
    ///
    /// # Errors
    ///
    /// Every failure is returned as [`ResoundError::ConversionError`]; its
    /// message is meant for the user and its source is the technical cause.
    pub async fn convert(
        &self,
        source: &MediaSource,
        format: AudioFormat,
    ) -> Result<EncodedAudio, ResoundError> {
        log::debug!("Converting {} to {format}", source.name());
        let mut progress = ProgressTracker::new(self.options.progress());
        progress.report(ConversionStage::Loading, 0.0);

        match self.run(source, format, &mut progress).await {
            Ok(encoded) => {
                progress.report(ConversionStage::Complete, 100.0);
                log::debug!(
                    "Converted {} to {} ({} bytes)",
                    source.name(),
                    encoded.file_name(),
                    encoded.len()
                );
                Ok(encoded)
            }
            Err(error) => {
                log::error!("Conversion of {} failed: {error}", source.name());
                Err(error.into_conversion_error())
            }
        }
    }

    // ── Private helpers ────────────────────────────────────────────────

    fn is_available(&self, strategy: Strategy) -> bool {
        match strategy {
            Strategy::DirectDecode => self.decode.is_some(),
            Strategy::PlaybackCapture => {
                self.decode.is_some()
                    && self
                        .capture
                        .as_ref()
                        .is_some_and(|backend| backend.is_available())
            }
            Strategy::EmbeddedEngine => self.engine.is_some(),
        }
    }

    async fn run(
        &self,
        source: &MediaSource,
        format: AudioFormat,
        progress: &mut ProgressTracker,
    ) -> Result<EncodedAudio, ResoundError> {
        let strategies = self.available_strategies();
        let Some(&first) = strategies.first() else {
            return Err(ResoundError::UnsupportedEnvironment(
                "no audio acquisition strategy is available".to_string(),
            ));
        };

        let acquired = match self.acquire(first, source, format, progress).await {
            Ok(acquired) => acquired,
            Err(error) if error.allows_fallback() && strategies.len() > 1 => {
                let next = strategies[1];
                log::warn!("{first} failed ({error}); falling back to {next}");
                self.acquire(next, source, format, progress).await?
            }
            Err(error) => return Err(error),
        };

        let bytes = match acquired {
            Acquired::Encoded(bytes) => bytes,
            Acquired::Pcm(audio) => self.encode(&audio, format, progress)?,
        };
        Ok(EncodedAudio::new(bytes, format, source.output_file_name(format)))
    }

    async fn acquire(
        &self,
        strategy: Strategy,
        source: &MediaSource,
        format: AudioFormat,
        progress: &mut ProgressTracker,
    ) -> Result<Acquired, ResoundError> {
        log::debug!("Acquiring audio via {strategy}");
        match strategy {
            Strategy::DirectDecode => {
                let decode = self.decode_context()?;
                progress.report(ConversionStage::Decoding, DIRECT_DECODE_PERCENT);
                let audio = decode.decode(source.shared_bytes()).await?;
                progress.report(ConversionStage::Decoding, DIRECT_DECODED_PERCENT);
                Ok(Acquired::Pcm(audio))
            }
            Strategy::PlaybackCapture => {
                let backend = self.capture.as_deref().ok_or_else(|| {
                    ResoundError::UnsupportedEnvironment(
                        "no playback capture backend is configured".to_string(),
                    )
                })?;
                let decode = self.decode_context()?;
                let mut session = CaptureSession::new(backend, &self.options.capture);
                let captured = session.run(source, progress).await?;

                progress.report(ConversionStage::Decoding, CAPTURE_DECODE_PERCENT);
                let audio = decode.decode(captured.bytes.into()).await?;
                Ok(Acquired::Pcm(audio))
            }
            Strategy::EmbeddedEngine => {
                let engine = self.engine.as_ref().ok_or_else(|| {
                    ResoundError::EngineUnavailable("no codec engine is configured".to_string())
                })?;
                let bytes = engine
                    .transcode(source, format, &self.options.engine, progress)
                    .await?;
                Ok(Acquired::Encoded(bytes))
            }
        }
    }

    fn decode_context(&self) -> Result<&DecodeContext, ResoundError> {
        self.decode.as_deref().ok_or_else(|| {
            ResoundError::UnsupportedEnvironment("no audio decoder is configured".to_string())
        })
    }

    fn encode(
        &self,
        audio: &PcmAudio,
        format: AudioFormat,
        progress: &mut ProgressTracker,
    ) -> Result<Vec<u8>, ResoundError> {
        progress.enter(ConversionStage::Encoding);
        match format {
            AudioFormat::Wav => encode_wav(audio),
            AudioFormat::Mp3 => {
                let codec = self.mp3.as_deref().ok_or_else(|| {
                    ResoundError::EncoderUnavailable("no MP3 codec is configured".to_string())
                })?;
                encode_mp3(audio, codec, self.options.mp3_bitrate_kbps)
            }
        }
    }
}
