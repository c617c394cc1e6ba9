//! Real-time playback capture.
//!
//! When the input cannot be decoded directly, a platform player may still be
//! able to play it. [`CaptureSession`] attaches the input to a player,
//! routes the player's audio into a recorder (and, silenced, to the output
//! device), plays the file from start to end and collects the recorder's
//! chunks into a single blob. That blob is then decoded like any other
//! input.
//!
//! A session moves through [`CapturePhase`]s in order:
//!
//! ```text
//! Idle -> Loading -> Recording -> Stopping -> Captured
//!            \           \            \
//!             +-----------+------------+---> Failed
//! ```
//!
//! Capture takes as long as playback does. Every player and recorder the
//! session acquires is released exactly once, whichever way the run ends.

use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;

use crate::{
    configuration::CaptureOptions,
    error::ResoundError,
    progress::{CAPTURE_FLUSHED_PERCENT, ConversionStage, METADATA_READY_PERCENT, ProgressTracker},
    source::MediaSource,
};

/// Recorder formats to ask for, most preferred first.
pub const RECORDER_MIME_CANDIDATES: [&str; 3] =
    ["audio/webm;codecs=opus", "audio/ogg;codecs=opus", "audio/mp4"];

/// Mime type assumed when neither the recorder nor the selection names one.
const DEFAULT_RECORDING_MIME_TYPE: &str = "audio/webm";

/// Upper bound for the recording ceiling; the rest belongs to decoding.
const MAX_RECORDING_PERCENT: f64 = 95.0;

/// Signals emitted by a [`MediaPlayer`].
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// The media's metadata is known. The duration may be infinite or NaN
    /// for streams without a fixed length.
    MetadataLoaded {
        /// Total playback time in seconds.
        duration_seconds: f64,
    },
    /// Playback advanced.
    TimeUpdate {
        /// Current playback position in seconds.
        position_seconds: f64,
    },
    /// Playback reached the end of the media.
    Ended,
    /// Playback failed.
    Error(String),
}

/// Signals emitted by an [`AudioRecorder`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecorderEvent {
    /// A chunk of recorded, encoded audio.
    Data(Vec<u8>),
    /// The recorder stopped and delivered its final chunk.
    Stopped,
    /// Recording failed.
    Error(String),
}

/// A player the input has been attached to, with its event stream.
pub struct AttachedPlayer {
    /// The player.
    pub player: Box<dyn MediaPlayer>,
    /// Events from the player, in order.
    pub events: UnboundedReceiver<PlayerEvent>,
}

/// A recorder wired to a player's output, with its event stream.
pub struct ConnectedRecorder {
    /// The recorder.
    pub recorder: Box<dyn AudioRecorder>,
    /// Events from the recorder, in order.
    pub events: UnboundedReceiver<RecorderEvent>,
}

/// The platform's playback and recording capability.
pub trait CaptureBackend: Send + Sync {
    /// Whether playback capture works on this platform at all.
    fn is_available(&self) -> bool {
        true
    }

    /// Whether the recorder can produce `mime_type`.
    fn supports_recorder_type(&self, mime_type: &str) -> bool;

    /// Create a hidden, muted player for `source`. Loading starts
    /// immediately; [`PlayerEvent::MetadataLoaded`] follows once the media
    /// is understood.
    fn attach(&self, source: &MediaSource) -> Result<AttachedPlayer, ResoundError>;
}

/// A hidden player driven by a [`CaptureSession`].
pub trait MediaPlayer: Send {
    /// Route the player's audio to a new recorder, and through a zero-gain
    /// path to the output device. `mime_type` is the requested recording
    /// format; `None` leaves the choice to the recorder.
    fn connect_recorder(&mut self, mime_type: Option<&str>)
    -> Result<ConnectedRecorder, ResoundError>;

    /// Start playback.
    fn play(&mut self) -> Result<(), ResoundError>;

    /// Pause, detach the media, and release every platform handle the player
    /// holds. Called exactly once.
    fn release(&mut self);
}

/// A recorder fed by a [`MediaPlayer`].
pub trait AudioRecorder: Send {
    /// Start recording, delivering a chunk every `timeslice`.
    fn start(&mut self, timeslice: Duration) -> Result<(), ResoundError>;

    /// Stop recording. The recorder emits its last chunk, then
    /// [`RecorderEvent::Stopped`].
    fn stop(&mut self);

    /// Whether the recorder is currently recording.
    fn is_active(&self) -> bool;

    /// The format the recorder actually produces, if it reports one.
    fn mime_type(&self) -> Option<String>;

    /// Remove the recorder's audio routing. Called exactly once.
    fn disconnect(&mut self);
}

/// The concatenated recording of a capture run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedAudio {
    /// Recorded bytes in `mime_type`'s format.
    pub bytes: Vec<u8>,
    /// Format of `bytes`.
    pub mime_type: String,
}

/// Phase of a [`CaptureSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapturePhase {
    /// Not started.
    Idle,
    /// Waiting for the player to load the media's metadata.
    Loading,
    /// Playing and recording.
    Recording,
    /// Playback ended; waiting for the recorder to flush.
    Stopping,
    /// The recording is complete.
    Captured,
    /// The run failed.
    Failed,
}

/// The first of [`RECORDER_MIME_CANDIDATES`] that `backend` supports.
pub fn select_recorder_mime_type(backend: &dyn CaptureBackend) -> Option<&'static str> {
    RECORDER_MIME_CANDIDATES
        .into_iter()
        .find(|candidate| backend.supports_recorder_type(candidate))
}

/// One capture run.
pub struct CaptureSession<'a> {
    backend: &'a dyn CaptureBackend,
    options: CaptureOptions,
    phase: CapturePhase,
    position_seconds: f64,
    duration_seconds: Option<f64>,
    chunks: Vec<Vec<u8>>,
}

impl<'a> CaptureSession<'a> {
    /// Prepare a session on `backend`.
    ///
    /// The recording ceiling is clamped to `0..=95`; a NaN ceiling falls
    /// back to 95.
    pub fn new(backend: &'a dyn CaptureBackend, options: &CaptureOptions) -> Self {
        Self {
            backend,
            options: CaptureOptions {
                recording_ceiling: clamp_ceiling(options.recording_ceiling),
                ..options.clone()
            },
            phase: CapturePhase::Idle,
            position_seconds: 0.0,
            duration_seconds: None,
            chunks: Vec::new(),
        }
    }

    /// Current phase.
    pub fn phase(&self) -> CapturePhase {
        self.phase
    }

    /// Last reported playback position, in seconds.
    pub fn position_seconds(&self) -> f64 {
        self.position_seconds
    }

    /// Media duration, once the metadata has loaded.
    pub fn duration_seconds(&self) -> Option<f64> {
        self.duration_seconds
    }

    /// Play `source` to the end while recording it.
    ///
    /// Progress is reported at 5 once the metadata is known, proportionally
    /// up to the configured ceiling (95) during playback, and at 97 once the
    /// recording has been flushed.
    ///
    /// # Errors
    ///
    /// - [`ResoundError::UnsupportedEnvironment`] if the backend is not
    ///   available.
    /// - [`ResoundError::CaptureError`] if the metadata never loads, playback
    ///   or recording fails, or nothing was recorded.
    pub async fn run(
        &mut self,
        source: &MediaSource,
        progress: &mut ProgressTracker,
    ) -> Result<CapturedAudio, ResoundError> {
        if !self.backend.is_available() {
            return Err(ResoundError::UnsupportedEnvironment(
                "playback capture is not available".to_string(),
            ));
        }

        let result = self.capture(source, progress).await;
        match &result {
            Ok(captured) => {
                self.transition(CapturePhase::Captured);
                log::debug!(
                    "Captured {} bytes of {}",
                    captured.bytes.len(),
                    captured.mime_type
                );
            }
            Err(error) => {
                self.transition(CapturePhase::Failed);
                log::debug!("Capture failed: {error}");
            }
        }
        result
    }

    // ── Private helpers ────────────────────────────────────────────────

    async fn capture(
        &mut self,
        source: &MediaSource,
        progress: &mut ProgressTracker,
    ) -> Result<CapturedAudio, ResoundError> {
        self.transition(CapturePhase::Loading);
        let AttachedPlayer {
            player,
            events: mut player_events,
        } = self.backend.attach(source).map_err(|error| match error {
            ResoundError::CaptureError(_) => error,
            other => ResoundError::CaptureError(format!("Unable to load the video: {other}")),
        })?;
        let mut resources = CaptureResources {
            player,
            recorder: None,
        };

        let duration = self.wait_for_metadata(&mut player_events).await?;
        self.duration_seconds = Some(duration);
        progress.report(ConversionStage::Loading, METADATA_READY_PERCENT);

        let selected_mime_type = select_recorder_mime_type(self.backend);
        let ConnectedRecorder {
            recorder,
            events: mut recorder_events,
        } = resources
            .player
            .connect_recorder(selected_mime_type)
            .map_err(|error| {
                log::debug!("Recorder creation failed: {error}");
                ResoundError::CaptureError(
                    "Unable to start recording on this platform.".to_string(),
                )
            })?;
        let recorder = resources.recorder.insert(recorder);
        recorder.start(self.options.recorder_timeslice).map_err(|error| {
            log::debug!("Recorder start failed: {error}");
            ResoundError::CaptureError("Unable to start recording on this platform.".to_string())
        })?;

        self.transition(CapturePhase::Recording);
        resources
            .player
            .play()
            .map_err(|error| ResoundError::CaptureError(format!("Video playback failed: {error}")))?;

        let ceiling = self.options.recording_ceiling;
        let mut recorder_done = false;
        loop {
            tokio::select! {
                event = player_events.recv() => match event {
                    Some(PlayerEvent::TimeUpdate { position_seconds }) => {
                        self.position_seconds = position_seconds;
                        if let Some(duration) = self.duration_seconds
                            && let Some(percent) = recording_percent(position_seconds, duration, ceiling)
                        {
                            progress.report(ConversionStage::Recording, percent);
                        }
                    }
                    Some(PlayerEvent::MetadataLoaded { duration_seconds }) => {
                        self.duration_seconds = Some(duration_seconds);
                    }
                    Some(PlayerEvent::Ended) => {
                        progress.report(ConversionStage::Recording, ceiling);
                        break;
                    }
                    Some(PlayerEvent::Error(message)) => {
                        return Err(ResoundError::CaptureError(format!(
                            "Video playback failed: {message}"
                        )));
                    }
                    None => {
                        return Err(ResoundError::CaptureError(
                            "Video playback stopped before the end.".to_string(),
                        ));
                    }
                },
                event = recorder_events.recv(), if !recorder_done => match event {
                    Some(RecorderEvent::Data(bytes)) => self.push_chunk(bytes),
                    Some(RecorderEvent::Stopped) | None => {
                        log::debug!("Recorder stopped before playback ended");
                        recorder_done = true;
                    }
                    Some(RecorderEvent::Error(message)) => {
                        return Err(ResoundError::CaptureError(format!(
                            "Recorder error occurred: {message}"
                        )));
                    }
                },
            }
        }

        self.transition(CapturePhase::Stopping);
        if let Some(recorder) = resources.recorder.as_mut()
            && recorder.is_active()
        {
            recorder.stop();
        }
        while !recorder_done {
            match recorder_events.recv().await {
                Some(RecorderEvent::Data(bytes)) => self.push_chunk(bytes),
                Some(RecorderEvent::Stopped) | None => recorder_done = true,
                Some(RecorderEvent::Error(message)) => {
                    return Err(ResoundError::CaptureError(format!(
                        "Recorder error occurred: {message}"
                    )));
                }
            }
        }

        let bytes = std::mem::take(&mut self.chunks).concat();
        if bytes.is_empty() {
            return Err(ResoundError::CaptureError(
                "Captured audio stream was empty.".to_string(),
            ));
        }
        let mime_type = resources
            .recorder
            .as_ref()
            .and_then(|recorder| recorder.mime_type())
            .filter(|mime_type| !mime_type.is_empty())
            .or_else(|| selected_mime_type.map(str::to_string))
            .unwrap_or_else(|| DEFAULT_RECORDING_MIME_TYPE.to_string());

        progress.report(ConversionStage::Recording, CAPTURE_FLUSHED_PERCENT);
        Ok(CapturedAudio { bytes, mime_type })
    }

    async fn wait_for_metadata(
        &self,
        events: &mut UnboundedReceiver<PlayerEvent>,
    ) -> Result<f64, ResoundError> {
        let wait = async {
            loop {
                match events.recv().await {
                    Some(PlayerEvent::MetadataLoaded { duration_seconds }) => {
                        return Ok(duration_seconds);
                    }
                    Some(PlayerEvent::TimeUpdate { .. }) => {}
                    Some(PlayerEvent::Ended) => {
                        return Err(ResoundError::CaptureError(
                            "Video ended before its metadata loaded.".to_string(),
                        ));
                    }
                    Some(PlayerEvent::Error(message)) => {
                        return Err(ResoundError::CaptureError(format!(
                            "Video playback failed: {message}"
                        )));
                    }
                    None => {
                        return Err(ResoundError::CaptureError(
                            "Video metadata could not be loaded.".to_string(),
                        ));
                    }
                }
            }
        };

        match self.options.metadata_timeout {
            Some(limit) => tokio::time::timeout(limit, wait).await.map_err(|_| {
                ResoundError::CaptureError("Timed out waiting for video metadata.".to_string())
            })?,
            None => wait.await,
        }
    }

    fn push_chunk(&mut self, bytes: Vec<u8>) {
        if !bytes.is_empty() {
            self.chunks.push(bytes);
        }
    }

    fn transition(&mut self, next: CapturePhase) {
        log::debug!("Capture phase {:?} -> {:?}", self.phase, next);
        self.phase = next;
    }
}

/// Recording progress for `position` out of `duration`, scaled to
/// `ceiling`. `None` when the duration is not a finite positive number.
pub(crate) fn recording_percent(position: f64, duration: f64, ceiling: f64) -> Option<f64> {
    (duration.is_finite() && duration > 0.0).then(|| (position / duration * ceiling).min(ceiling))
}

fn clamp_ceiling(ceiling: f64) -> f64 {
    if ceiling.is_nan() {
        MAX_RECORDING_PERCENT
    } else {
        ceiling.clamp(0.0, MAX_RECORDING_PERCENT)
    }
}

/// Owns the player and recorder of a session and tears them down on drop.
struct CaptureResources {
    player: Box<dyn MediaPlayer>,
    recorder: Option<Box<dyn AudioRecorder>>,
}

impl Drop for CaptureResources {
    fn drop(&mut self) {
        if let Some(mut recorder) = self.recorder.take() {
            if recorder.is_active() {
                recorder.stop();
            }
            recorder.disconnect();
        }
        self.player.release();
        log::debug!("Released capture player and recorder");
    }
}
