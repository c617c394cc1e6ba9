//! Progress reporting.
//!
//! A conversion reports an integer percentage through a [`ProgressCallback`].
//! Values never decrease within one run: [`ProgressTracker`] clamps every
//! report to `0..=100` and holds the highest value seen so far, so a
//! fallback strategy that restarts its own progress does not make the bar
//! jump backwards.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use resound::{ConvertOptions, ProgressCallback, ProgressInfo};
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!("[{:?}] {}%", info.stage, info.percentage);
//!     }
//! }
//!
//! let options = ConvertOptions::new().with_progress(Arc::new(PrintProgress));
//! ```

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

/// Progress after the playback source reported its metadata.
pub(crate) const METADATA_READY_PERCENT: f64 = 5.0;
/// Progress once a capture has been flushed into a single blob.
pub(crate) const CAPTURE_FLUSHED_PERCENT: f64 = 97.0;
/// Progress when the captured blob starts decoding.
pub(crate) const CAPTURE_DECODE_PERCENT: f64 = 98.0;
/// Progress when direct decoding starts.
pub(crate) const DIRECT_DECODE_PERCENT: f64 = 10.0;
/// Progress after direct decoding finished.
pub(crate) const DIRECT_DECODED_PERCENT: f64 = 90.0;

/// The part of the pipeline a progress report comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConversionStage {
    /// Preparing the input (attaching, reading metadata).
    Loading,
    /// Decoding container bytes into PCM.
    Decoding,
    /// Playing the input back in real time while recording it.
    Recording,
    /// Encoding PCM into the output format.
    Encoding,
    /// Whole-file transcoding inside the codec engine.
    Transcoding,
    /// The result is ready.
    Complete,
}

/// A snapshot of conversion progress.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Stage that produced this report.
    pub stage: ConversionStage,
    /// Completion percentage, `0..=100`.
    pub percentage: u8,
    /// Wall-clock time since the run started.
    pub elapsed: Duration,
}

/// Trait for receiving progress updates during a conversion.
///
/// Progress callbacks are **infallible**: they observe the run but cannot
/// halt it. Closures taking `&ProgressInfo` implement this trait.
pub trait ProgressCallback: Send + Sync {
    /// Called whenever the reported percentage or stage changes.
    fn on_progress(&self, info: &ProgressInfo);
}

impl<F> ProgressCallback for F
where
    F: Fn(&ProgressInfo) + Send + Sync,
{
    fn on_progress(&self, info: &ProgressInfo) {
        self(info)
    }
}

/// A no-op implementation that discards all progress notifications.
///
/// This is the default when no callback is configured.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Per-run progress state: clamps, rounds, and keeps reports
/// non-decreasing.
pub struct ProgressTracker {
    callback: Arc<dyn ProgressCallback>,
    start_time: Instant,
    last: Option<(ConversionStage, u8)>,
}

impl ProgressTracker {
    /// Start tracking a new run.
    pub fn new(callback: Arc<dyn ProgressCallback>) -> Self {
        Self {
            callback,
            start_time: Instant::now(),
            last: None,
        }
    }

    /// A tracker that reports nowhere.
    pub fn silent() -> Self {
        Self::new(Arc::new(NoOpProgress))
    }

    /// Report `percent` for `stage`.
    ///
    /// The value is clamped to `0..=100` and rounded; a value below the last
    /// reported one is raised to it. Nothing is emitted if neither the stage
    /// nor the rounded percentage changed.
    pub fn report(&mut self, stage: ConversionStage, percent: f64) {
        let rounded = if percent.is_nan() {
            0
        } else {
            percent.clamp(0.0, 100.0).round() as u8
        };
        let percentage = self.last.map_or(rounded, |(_, last)| rounded.max(last));
        if self.last == Some((stage, percentage)) {
            return;
        }
        self.last = Some((stage, percentage));

        let info = ProgressInfo {
            stage,
            percentage,
            elapsed: self.start_time.elapsed(),
        };
        self.callback.on_progress(&info);
    }

    /// Move to `stage` without advancing the percentage.
    pub fn enter(&mut self, stage: ConversionStage) {
        let current = self.percentage().map_or(0.0, f64::from);
        self.report(stage, current);
    }

    /// The last emitted percentage, if anything was reported.
    pub fn percentage(&self) -> Option<u8> {
        self.last.map(|(_, percentage)| percentage)
    }
}
