//! Direct decoding.
//!
//! [`DecodeContext`] owns the process-lifetime [`AudioDecoder`]. The decoder
//! is created through an injected factory the first time it is needed and
//! recreated when it reports itself closed. Decoding is CPU-bound, so it
//! runs on Tokio's blocking pool.

use std::sync::Arc;

use crate::{
    error::ResoundError,
    pcm::PcmAudio,
    shared::{ResourceState, SharedResource},
};

/// A platform capability that decodes container bytes into PCM.
pub trait AudioDecoder: Send + Sync {
    /// Decode a complete media file.
    ///
    /// # Errors
    ///
    /// Implementations return [`ResoundError::DecodeError`] when the bytes
    /// are not decodable audio.
    fn decode(&self, data: &[u8]) -> Result<PcmAudio, ResoundError>;

    /// Whether the decoder has been shut down and must be replaced.
    fn is_closed(&self) -> bool {
        false
    }
}

type DecoderFactory = dyn Fn() -> Result<Arc<dyn AudioDecoder>, ResoundError> + Send + Sync;

/// Lazily created, shared decoder.
pub struct DecodeContext {
    factory: Box<DecoderFactory>,
    decoder: SharedResource<dyn AudioDecoder>,
}

impl std::fmt::Debug for DecodeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodeContext")
            .field("decoder", &self.decoder)
            .finish()
    }
}

impl DecodeContext {
    /// Create a context whose decoder is built by `factory` on first use.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn AudioDecoder>, ResoundError> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            decoder: SharedResource::new("audio decoder"),
        }
    }

    /// Lifecycle state of the underlying decoder.
    pub fn state(&self) -> ResourceState {
        self.decoder.state()
    }

    /// Return the shared decoder, creating or recreating it as needed.
    ///
    /// # Errors
    ///
    /// Returns [`ResoundError::UnsupportedEnvironment`] if the factory fails.
    pub async fn decoder(&self) -> Result<Arc<dyn AudioDecoder>, ResoundError> {
        self.decoder
            .get_or_try_init_if(
                |decoder| !decoder.is_closed(),
                || async { (self.factory)().map_err(|error| error.to_string()) },
            )
            .await
            .map_err(ResoundError::UnsupportedEnvironment)
    }

    /// Decode `data` on the blocking pool.
    ///
    /// # Errors
    ///
    /// - [`ResoundError::DecodeError`] if `data` is empty or not decodable.
    /// - [`ResoundError::UnsupportedEnvironment`] if no decoder can be
    ///   created.
    pub async fn decode(&self, data: Arc<[u8]>) -> Result<PcmAudio, ResoundError> {
        if data.is_empty() {
            return Err(ResoundError::DecodeError("input is empty".to_string()));
        }

        let decoder = self.decoder().await?;
        log::debug!("Decoding {} bytes", data.len());
        let audio = tokio::task::spawn_blocking(move || decoder.decode(&data))
            .await
            .map_err(|error| ResoundError::DecodeError(format!("decode task failed: {error}")))??;

        log::debug!(
            "Decoded {} channel(s), {} frames at {} Hz",
            audio.channel_count(),
            audio.frame_count(),
            audio.sample_rate()
        );
        Ok(audio)
    }
}
