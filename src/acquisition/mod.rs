//! Audio acquisition strategies.
//!
//! A conversion first needs the input's audio. Three strategies can provide
//! it, each backed by a platform capability injected into the
//! [`Converter`](crate::Converter):
//!
//! - [`Strategy::DirectDecode`]: an [`AudioDecoder`] turns the container
//!   bytes into PCM.
//! - [`Strategy::PlaybackCapture`]: a [`CaptureBackend`] plays the input in
//!   real time while a recorder captures it; the recording is then decoded.
//! - [`Strategy::EmbeddedEngine`]: a [`CodecEngine`] transcodes the whole
//!   file and returns final bytes.
//!
//! [`AcquisitionPolicy`] decides the order in which available strategies
//! are tried.

pub mod capture;
pub mod decode;
pub mod engine;

use std::fmt::{Display, Formatter, Result as FmtResult};

pub use capture::{
    AttachedPlayer, AudioRecorder, CaptureBackend, CapturePhase, CaptureSession, CapturedAudio,
    ConnectedRecorder, MediaPlayer, PlayerEvent, RECORDER_MIME_CANDIDATES, RecorderEvent,
    select_recorder_mime_type,
};
pub use decode::{AudioDecoder, DecodeContext};
pub use engine::{CodecEngine, EngineCommand, EngineHost, EngineLoader, engine_arguments};

use crate::pcm::PcmAudio;

/// A way of obtaining the audio of an input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Decode the container bytes directly.
    DirectDecode,
    /// Play the input back and record the output.
    PlaybackCapture,
    /// Transcode the whole file with the embedded codec engine.
    EmbeddedEngine,
}

impl Display for Strategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Strategy::DirectDecode => write!(f, "direct decode"),
            Strategy::PlaybackCapture => write!(f, "playback capture"),
            Strategy::EmbeddedEngine => write!(f, "embedded engine"),
        }
    }
}

/// Preference order of acquisition strategies.
///
/// Duplicates are ignored; the first occurrence wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionPolicy {
    order: Vec<Strategy>,
}

impl Default for AcquisitionPolicy {
    fn default() -> Self {
        Self::new([
            Strategy::DirectDecode,
            Strategy::PlaybackCapture,
            Strategy::EmbeddedEngine,
        ])
    }
}

impl AcquisitionPolicy {
    /// Create a policy trying `order` front to back.
    pub fn new(order: impl IntoIterator<Item = Strategy>) -> Self {
        let mut deduplicated = Vec::new();
        for strategy in order {
            if !deduplicated.contains(&strategy) {
                deduplicated.push(strategy);
            }
        }
        Self {
            order: deduplicated,
        }
    }

    /// Strategies in preference order.
    pub fn strategies(&self) -> &[Strategy] {
        &self.order
    }

    /// The strategies in preference order for which `is_available` holds.
    pub fn filter_available(&self, is_available: impl Fn(Strategy) -> bool) -> Vec<Strategy> {
        self.order
            .iter()
            .copied()
            .filter(|strategy| is_available(*strategy))
            .collect()
    }
}

/// What a strategy produced.
#[derive(Debug)]
pub enum Acquired {
    /// Decoded samples that still need encoding.
    Pcm(PcmAudio),
    /// Final encoded bytes in the requested format.
    Encoded(Vec<u8>),
}
