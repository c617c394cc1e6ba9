//! # resound
//!
//! Extract the audio track of a video file and re-encode it as MP3 or WAV,
//! entirely in-process.
//!
//! `resound` obtains the input's audio through one of three acquisition
//! strategies, in order of preference, and encodes the result itself:
//!
//! 1. **Direct decode**: an [`AudioDecoder`] turns the container bytes into
//!    PCM samples.
//! 2. **Playback capture**: a [`CaptureBackend`] plays the file in real time
//!    while recording it; the recording is then decoded.
//! 3. **Embedded engine**: a sandboxed [`CodecEngine`] transcodes the whole
//!    file and returns final bytes.
//!
//! If the first available strategy cannot decode the input, the next one is
//! tried once. Decoded audio is written as 16-bit WAV by the crate itself,
//! or as MP3 through an [`Mp3Codec`].
//!
//! ## Quick Start
//!
//! ### Convert a File
//!
//! ```no_run
//! use resound::{AudioFormat, ConvertOptions, Converter, MediaSource};
//!
//! # async fn example() -> Result<(), resound::ResoundError> {
//! let converter = Converter::with_ffmpeg(ConvertOptions::new())?;
//! let source = MediaSource::open("holiday.mp4")?;
//! let audio = converter.convert(&source, AudioFormat::Wav).await?;
//! std::fs::write(audio.file_name(), audio.bytes())?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Encode PCM Directly
//!
//! ```
//! use resound::{PcmAudio, encode_wav};
//!
//! let audio = PcmAudio::mono(8_000, vec![0.0, 0.5, -0.5, 1.0]).unwrap();
//! let wav = encode_wav(&audio).unwrap();
//! assert_eq!(wav.len(), 44 + 4 * 2);
//! ```
//!
//! ### Track Progress
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use resound::{ConvertOptions, ProgressInfo};
//!
//! let options = ConvertOptions::new().with_progress(Arc::new(|info: &ProgressInfo| {
//!     println!("{:?}: {}%", info.stage, info.percentage);
//! }));
//! ```
//!
//! ## Features
//!
//! - **Bit-exact quantisation**: asymmetric `f32` to `i16` scaling shared by
//!   both encoders
//! - **Canonical WAV**: 44-byte RIFF header, interleaved little-endian PCM
//! - **Block-wise MP3**: 1152-frame blocks through a pluggable frame encoder
//! - **Capture state machine**: guaranteed teardown of players and recorders
//!   on every exit path
//! - **Shared resources**: decoders and engines are created once and reused
//! - **Monotonic progress**: reports never go backwards within a run
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `ffmpeg` | FFmpeg-backed decoder, libmp3lame codec and codec engine (default) |
//!
//! ## Requirements
//!
//! With the `ffmpeg` feature, FFmpeg development libraries must be installed
//! on your system.

pub mod acquisition;
pub mod audio;
pub mod configuration;
pub mod convert;
pub mod error;
#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;
pub mod mp3;
pub mod pcm;
pub mod progress;
pub mod shared;
pub mod source;
pub mod wav;

pub use acquisition::{
    AcquisitionPolicy, AttachedPlayer, AudioDecoder, AudioRecorder, CaptureBackend, CapturePhase,
    CaptureSession, CapturedAudio, CodecEngine, ConnectedRecorder, DecodeContext, EngineCommand,
    EngineHost, EngineLoader, MediaPlayer, PlayerEvent, RecorderEvent, Strategy,
    engine_arguments, select_recorder_mime_type,
};
pub use audio::{AudioFormat, EncodedAudio};
pub use configuration::{CaptureOptions, ConvertOptions, EngineOptions};
pub use convert::Converter;
pub use error::ResoundError;
#[cfg(feature = "ffmpeg")]
pub use ffmpeg::{FfmpegDecoder, FfmpegEngine, FfmpegEngineLoader, LameCodec};
pub use mp3::{DEFAULT_MP3_BITRATE_KBPS, FrameEncoder, MP3_BLOCK_FRAMES, Mp3Codec, encode_mp3};
pub use pcm::{PcmAudio, quantize, quantize_block};
pub use progress::{ConversionStage, ProgressCallback, ProgressInfo, ProgressTracker};
pub use shared::{ResourceState, SharedResource};
pub use source::MediaSource;
pub use wav::{WAV_HEADER_LEN, encode_wav};
