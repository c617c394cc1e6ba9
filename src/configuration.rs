//! Conversion configuration.
//!
//! [`ConvertOptions`] is a builder that threads the progress callback,
//! encoder settings, acquisition policy and per-strategy tuning through a
//! [`Converter`](crate::Converter) without widening every signature.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//!
//! use resound::{AcquisitionPolicy, ConvertOptions, ProgressInfo, Strategy};
//!
//! let options = ConvertOptions::new()
//!     .with_progress(std::sync::Arc::new(|info: &ProgressInfo| {
//!         println!("{}%", info.percentage);
//!     }))
//!     .with_mp3_bitrate(128)
//!     .with_policy(AcquisitionPolicy::new([Strategy::DirectDecode, Strategy::EmbeddedEngine]))
//!     .with_metadata_timeout(Some(Duration::from_secs(10)));
//! assert_eq!(options.mp3_bitrate_kbps(), 128);
//! ```

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    sync::Arc,
    time::Duration,
};

use crate::{
    acquisition::AcquisitionPolicy,
    mp3::DEFAULT_MP3_BITRATE_KBPS,
    progress::{NoOpProgress, ProgressCallback},
};

/// Tuning for the playback-capture strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureOptions {
    /// How often the recorder delivers a chunk. Defaults to 500 ms.
    pub recorder_timeslice: Duration,
    /// How long to wait for the source's metadata before giving up. `None`
    /// waits until the backend reports an error or closes. Defaults to 30 s.
    pub metadata_timeout: Option<Duration>,
    /// Highest percentage reported while recording. Defaults to 95;
    /// larger values are clamped to 95.
    pub recording_ceiling: f64,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            recorder_timeslice: Duration::from_millis(500),
            metadata_timeout: Some(Duration::from_secs(30)),
            recording_ceiling: 95.0,
        }
    }
}

/// Arguments the embedded codec engine is run with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// MP3 bitrate in kbit/s. Defaults to 192.
    pub mp3_bitrate_kbps: u32,
    /// WAV output sample rate in Hz. Defaults to 44100.
    pub wav_sample_rate: u32,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            mp3_bitrate_kbps: 192,
            wav_sample_rate: 44_100,
        }
    }
}

/// Configuration for conversion runs.
///
/// All fields have defaults; a default-constructed config reports no
/// progress, encodes MP3 at 160 kbit/s and tries the strategies in the
/// order decode, capture, engine.
#[derive(Clone)]
pub struct ConvertOptions {
    pub(crate) progress: Arc<dyn ProgressCallback>,
    pub(crate) mp3_bitrate_kbps: u32,
    pub(crate) policy: AcquisitionPolicy,
    pub(crate) capture: CaptureOptions,
    pub(crate) engine: EngineOptions,
}

impl Debug for ConvertOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ConvertOptions")
            .field("has_progress", &true)
            .field("mp3_bitrate_kbps", &self.mp3_bitrate_kbps)
            .field("policy", &self.policy)
            .field("capture", &self.capture)
            .field("engine", &self.engine)
            .finish()
    }
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ConvertOptions {
    /// Create a new configuration with default settings.
    pub fn new() -> Self {
        Self {
            progress: Arc::new(NoOpProgress),
            mp3_bitrate_kbps: DEFAULT_MP3_BITRATE_KBPS,
            policy: AcquisitionPolicy::default(),
            capture: CaptureOptions::default(),
            engine: EngineOptions::default(),
        }
    }

    /// Attach a progress callback.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Set the bitrate used when this crate encodes MP3 itself.
    ///
    /// Clamped to a minimum of 8 kbit/s.
    #[must_use]
    pub fn with_mp3_bitrate(mut self, kbps: u32) -> Self {
        self.mp3_bitrate_kbps = kbps.max(8);
        self
    }

    /// Set the order in which acquisition strategies are tried.
    #[must_use]
    pub fn with_policy(mut self, policy: AcquisitionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set how often the capture recorder delivers chunks.
    #[must_use]
    pub fn with_recorder_timeslice(mut self, timeslice: Duration) -> Self {
        self.capture.recorder_timeslice = timeslice;
        self
    }

    /// Set how long capture waits for the source's metadata.
    #[must_use]
    pub fn with_metadata_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.capture.metadata_timeout = timeout;
        self
    }

    /// Replace all capture settings.
    #[must_use]
    pub fn with_capture_options(mut self, capture: CaptureOptions) -> Self {
        self.capture = capture;
        self
    }

    /// Replace the arguments used by the embedded codec engine.
    #[must_use]
    pub fn with_engine_options(mut self, engine: EngineOptions) -> Self {
        self.engine = engine;
        self
    }

    /// Bitrate used for MP3 encoding, in kbit/s.
    pub fn mp3_bitrate_kbps(&self) -> u32 {
        self.mp3_bitrate_kbps
    }

    /// Strategy order.
    pub fn policy(&self) -> &AcquisitionPolicy {
        &self.policy
    }

    /// Capture settings.
    pub fn capture(&self) -> &CaptureOptions {
        &self.capture
    }

    /// Engine arguments.
    pub fn engine(&self) -> &EngineOptions {
        &self.engine
    }

    pub(crate) fn progress(&self) -> Arc<dyn ProgressCallback> {
        Arc::clone(&self.progress)
    }
}
