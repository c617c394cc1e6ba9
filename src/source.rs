//! Conversion input.
//!
//! A [`MediaSource`] is the file-like object a conversion starts from: a
//! display name plus the raw container bytes. The bytes sit behind an
//! [`Arc`] so every acquisition strategy can hand them to a blocking worker
//! or a playback backend without copying.

use std::{fmt, path::Path, sync::Arc};

use crate::{audio::AudioFormat, error::ResoundError};

/// Name used for output files when the input name has no base.
pub const FALLBACK_BASE_NAME: &str = "audio";

/// A user-selected media file.
#[derive(Clone)]
pub struct MediaSource {
    name: String,
    data: Arc<[u8]>,
}

impl fmt::Debug for MediaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaSource")
            .field("name", &self.name)
            .field("len", &self.data.len())
            .finish()
    }
}

impl MediaSource {
    /// Wrap an in-memory file.
    pub fn from_bytes(name: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }

    /// Read a file from disk. The source is named after the file name
    /// component of `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ResoundError::IoError`] if the file cannot be read.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ResoundError> {
        let path = path.as_ref();
        log::debug!("Reading media source: {}", path.display());
        let data = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::from_bytes(name, data))
    }

    /// Display name of the source, usually its file name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw container bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// A cheap shared handle to the bytes.
    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.data)
    }

    /// Size of the source in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the source holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The name with its last extension removed.
    ///
    /// Only a non-empty suffix after the final `.` that contains no `/`
    /// counts as an extension: `clip.final.mp4` becomes `clip.final`, while
    /// `notes` and `trailing.` are returned unchanged.
    pub fn base_name(&self) -> &str {
        match self.name.rfind('.') {
            Some(dot) if dot + 1 < self.name.len() && !self.name[dot + 1..].contains('/') => {
                &self.name[..dot]
            }
            _ => &self.name,
        }
    }

    /// The name's extension, if [`base_name`](MediaSource::base_name)
    /// stripped one.
    pub fn extension(&self) -> Option<&str> {
        let base = self.base_name();
        (base.len() < self.name.len()).then(|| &self.name[base.len() + 1..])
    }

    /// Download name for output in `format`: `<base name>.<mp3|wav>`, with
    /// `audio` standing in for an empty base name.
    pub fn output_file_name(&self, format: AudioFormat) -> String {
        let base = match self.base_name() {
            "" => FALLBACK_BASE_NAME,
            base => base,
        };
        format!("{base}.{}", format.extension())
    }
}
