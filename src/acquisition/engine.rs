//! Whole-file transcoding through an embedded codec engine.
//!
//! The engine is a sandboxed transcoder with its own virtual filesystem and
//! a command-line style interface. [`EngineHost`] loads it once, writes the
//! input into the virtual filesystem, runs the arguments for the requested
//! format, reads the result back and removes both files again, whether or
//! not the run succeeded.
//!
//! The engine produces final encoded bytes, so this path never builds a
//! [`PcmAudio`](crate::PcmAudio).

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use crate::{
    audio::AudioFormat,
    configuration::EngineOptions,
    error::ResoundError,
    progress::{ConversionStage, ProgressTracker},
    shared::{ResourceState, SharedResource},
    source::MediaSource,
};

/// A loaded codec engine.
pub trait CodecEngine: Send + Sync {
    /// Create or replace a file in the virtual filesystem.
    fn write_file(&self, name: &str, data: &[u8]) -> Result<(), ResoundError>;

    /// Read a file from the virtual filesystem.
    fn read_file(&self, name: &str) -> Result<Vec<u8>, ResoundError>;

    /// Remove a file from the virtual filesystem.
    fn delete_file(&self, name: &str) -> Result<(), ResoundError>;

    /// Run the engine with `args`, calling `progress` with a ratio in
    /// `0.0..=1.0` as work advances. Blocks until the run finishes.
    fn exec(&self, args: &[String], progress: &mut dyn FnMut(f64)) -> Result<(), ResoundError>;
}

/// Loads a [`CodecEngine`]. Called at most once per [`EngineHost`].
pub trait EngineLoader: Send + Sync {
    /// Load the engine. May block.
    fn load(&self) -> Result<Arc<dyn CodecEngine>, ResoundError>;
}

/// Owner of the lazily loaded engine.
pub struct EngineHost {
    loader: Arc<dyn EngineLoader>,
    engine: SharedResource<dyn CodecEngine>,
    next_job: AtomicU64,
}

impl std::fmt::Debug for EngineHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHost")
            .field("engine", &self.engine)
            .finish()
    }
}

impl EngineHost {
    /// Create a host that loads its engine through `loader` on first use.
    pub fn new(loader: Arc<dyn EngineLoader>) -> Self {
        Self {
            loader,
            engine: SharedResource::new("codec engine"),
            next_job: AtomicU64::new(0),
        }
    }

    /// Lifecycle state of the engine.
    pub fn state(&self) -> ResourceState {
        self.engine.state()
    }

    /// Return the engine, loading it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`ResoundError::EngineUnavailable`] if loading fails, now or
    /// in an earlier call.
    pub async fn engine(&self) -> Result<Arc<dyn CodecEngine>, ResoundError> {
        let loader = Arc::clone(&self.loader);
        self.engine
            .get_or_try_init(|| async move {
                tokio::task::spawn_blocking(move || loader.load())
                    .await
                    .map_err(|error| error.to_string())?
                    .map_err(|error| error.to_string())
            })
            .await
            .map_err(ResoundError::EngineUnavailable)
    }

    /// Transcode `source` into `format`, returning the encoded bytes.
    ///
    /// Progress is reported under [`ConversionStage::Transcoding`] as the
    /// engine's ratio scaled to `0..=100`.
    ///
    /// # Errors
    ///
    /// - [`ResoundError::EngineUnavailable`] if the engine cannot be loaded.
    /// - Whatever the engine reports while writing, running or reading.
    pub async fn transcode(
        &self,
        source: &MediaSource,
        format: AudioFormat,
        options: &EngineOptions,
        progress: &mut ProgressTracker,
    ) -> Result<Vec<u8>, ResoundError> {
        let engine = self.engine().await?;

        let job = self.next_job.fetch_add(1, Ordering::Relaxed);
        let input_name = match source.extension() {
            Some(extension) => format!("input-{job}.{extension}"),
            None => format!("input-{job}"),
        };
        let output_name = format!("output-{job}.{}", format.extension());
        log::debug!(
            "Transcoding {} with the codec engine ({input_name} -> {output_name})",
            source.name()
        );

        let mut files = VirtualFiles {
            engine: Arc::clone(&engine),
            names: Vec::with_capacity(2),
        };
        files.names.push(input_name.clone());
        engine.write_file(&input_name, source.bytes())?;
        files.names.push(output_name.clone());

        let args = engine_arguments(&input_name, &output_name, format, options);
        let (sender, mut receiver) = tokio::sync::mpsc::unbounded_channel::<f64>();
        let task_engine = Arc::clone(&engine);
        let mut handle = tokio::task::spawn_blocking(move || {
            let mut report = |ratio: f64| {
                let _ = sender.send(ratio);
            };
            task_engine.exec(&args, &mut report)
        });

        let joined = loop {
            tokio::select! {
                Some(ratio) = receiver.recv() => {
                    progress.report(ConversionStage::Transcoding, ratio * 100.0);
                }
                joined = &mut handle => break joined,
            }
        };
        while let Ok(ratio) = receiver.try_recv() {
            progress.report(ConversionStage::Transcoding, ratio * 100.0);
        }
        joined.map_err(|error| ResoundError::EncodeError(format!("engine task failed: {error}")))??;

        let output = engine.read_file(&output_name)?;
        log::debug!("Codec engine produced {} bytes", output.len());
        Ok(output)
    }
}

/// Arguments that make the engine extract the audio of `input` into
/// `output` as `format`.
///
/// # Example
///
/// ```
/// use resound::{AudioFormat, EngineOptions, engine_arguments};
///
/// let args = engine_arguments("in.mp4", "out.wav", AudioFormat::Wav, &EngineOptions::default());
/// assert_eq!(
///     args,
///     ["-i", "in.mp4", "-vn", "-acodec", "pcm_s16le", "-ar", "44100", "out.wav"]
/// );
/// ```
pub fn engine_arguments(
    input: &str,
    output: &str,
    format: AudioFormat,
    options: &EngineOptions,
) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-i".into(),
        input.into(),
        "-vn".into(),
        "-acodec".into(),
        format.engine_codec_name().into(),
    ];
    match format {
        AudioFormat::Mp3 => {
            args.push("-b:a".into());
            args.push(format!("{}k", options.mp3_bitrate_kbps));
        }
        AudioFormat::Wav => {
            args.push("-ar".into());
            args.push(options.wav_sample_rate.to_string());
        }
    }
    args.push(output.into());
    args
}

/// A parsed engine invocation.
///
/// Understands the options [`engine_arguments`] emits: `-i`, `-vn`,
/// `-acodec`, `-b:a`, `-ar` and a trailing output path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineCommand {
    /// Virtual path of the input file.
    pub input: String,
    /// Virtual path of the output file.
    pub output: String,
    /// Output format selected by `-acodec`.
    pub format: AudioFormat,
    /// `-b:a`, in kbit/s.
    pub bitrate_kbps: Option<u32>,
    /// `-ar`, in Hz.
    pub sample_rate: Option<u32>,
}

impl EngineCommand {
    /// Parse an argument list.
    ///
    /// # Errors
    ///
    /// Returns [`ResoundError::InvalidEngineCommand`] for unknown options,
    /// missing values, unknown codecs, or a missing input or output.
    pub fn parse<S: AsRef<str>>(args: &[S]) -> Result<Self, ResoundError> {
        let mut input = None;
        let mut output = None;
        let mut format = None;
        let mut bitrate_kbps = None;
        let mut sample_rate = None;

        let mut args = args.iter().map(AsRef::as_ref);
        while let Some(arg) = args.next() {
            match arg {
                "-i" => input = Some(option_value(arg, args.next())?.to_string()),
                "-vn" => {}
                "-acodec" | "-c:a" => {
                    let codec = option_value(arg, args.next())?;
                    format = Some(AudioFormat::from_engine_codec_name(codec).ok_or_else(|| {
                        ResoundError::InvalidEngineCommand(format!("unknown codec '{codec}'"))
                    })?);
                }
                "-b:a" => bitrate_kbps = Some(parse_bitrate(option_value(arg, args.next())?)?),
                "-ar" => {
                    let value = option_value(arg, args.next())?;
                    sample_rate = Some(value.parse::<u32>().ok().filter(|rate| *rate > 0).ok_or_else(
                        || ResoundError::InvalidEngineCommand(format!("invalid sample rate '{value}'")),
                    )?);
                }
                option if option.starts_with('-') => {
                    return Err(ResoundError::InvalidEngineCommand(format!(
                        "unsupported option '{option}'"
                    )));
                }
                path => {
                    if output.replace(path.to_string()).is_some() {
                        return Err(ResoundError::InvalidEngineCommand(
                            "more than one output path".to_string(),
                        ));
                    }
                }
            }
        }

        Ok(Self {
            input: input
                .ok_or_else(|| ResoundError::InvalidEngineCommand("missing '-i'".to_string()))?,
            output: output
                .ok_or_else(|| ResoundError::InvalidEngineCommand("missing output".to_string()))?,
            format: format
                .ok_or_else(|| ResoundError::InvalidEngineCommand("missing '-acodec'".to_string()))?,
            bitrate_kbps,
            sample_rate,
        })
    }
}

// ── Private helpers ────────────────────────────────────────────────────

/// Removes virtual files when dropped. Deletion errors are logged only.
struct VirtualFiles {
    engine: Arc<dyn CodecEngine>,
    names: Vec<String>,
}

impl Drop for VirtualFiles {
    fn drop(&mut self) {
        for name in &self.names {
            if let Err(error) = self.engine.delete_file(name) {
                log::debug!("Could not delete engine file {name}: {error}");
            }
        }
    }
}

fn option_value<'a>(option: &str, value: Option<&'a str>) -> Result<&'a str, ResoundError> {
    value.ok_or_else(|| ResoundError::InvalidEngineCommand(format!("'{option}' needs a value")))
}

/// `192k` is 192 kbit/s; a bare number is bit/s.
fn parse_bitrate(value: &str) -> Result<u32, ResoundError> {
    let invalid = || ResoundError::InvalidEngineCommand(format!("invalid bitrate '{value}'"));
    let kbps = match value.strip_suffix(['k', 'K']) {
        Some(kilo) => kilo.parse::<u32>().map_err(|_| invalid())?,
        None => value.parse::<u32>().map_err(|_| invalid())? / 1000,
    };
    if kbps == 0 {
        return Err(invalid());
    }
    Ok(kbps)
}
