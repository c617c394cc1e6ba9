//! Shared fakes for the integration tests.
//!
//! Each fake stands in for one platform capability and counts how often its
//! resources are acquired and released.

#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use resound::{
    AttachedPlayer, AudioDecoder, AudioFormat, AudioRecorder, CaptureBackend, CodecEngine,
    ConnectedRecorder, DecodeContext, EngineCommand, EngineLoader, FrameEncoder, MediaPlayer,
    MediaSource, Mp3Codec, PcmAudio, PlayerEvent, ProgressCallback, ProgressInfo, RecorderEvent,
    ResoundError,
};
use tokio::sync::mpsc::{UnboundedSender, unbounded_channel};

/// Bytes the fake decoder understands must start with this.
pub const DECODABLE: &[u8] = b"DECODABLE";

/// Frames per channel produced by [`PrefixDecoder`].
pub const DECODED_FRAMES: usize = 1000;

// ── Progress ───────────────────────────────────────────────────────

/// Records every progress report.
#[derive(Default)]
pub struct RecordingProgress {
    infos: Mutex<Vec<ProgressInfo>>,
}

impl RecordingProgress {
    pub fn percentages(&self) -> Vec<u8> {
        self.infos
            .lock()
            .unwrap()
            .iter()
            .map(|info| info.percentage)
            .collect()
    }

    pub fn infos(&self) -> Vec<ProgressInfo> {
        self.infos.lock().unwrap().clone()
    }
}

impl ProgressCallback for RecordingProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        self.infos.lock().unwrap().push(info.clone());
    }
}

// ── Decoder ────────────────────────────────────────────────────────

/// Decodes anything starting with [`DECODABLE`] into stereo audio.
#[derive(Default)]
pub struct PrefixDecoder {
    pub calls: AtomicUsize,
    pub closed: AtomicBool,
}

impl AudioDecoder for PrefixDecoder {
    fn decode(&self, data: &[u8]) -> Result<PcmAudio, ResoundError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !data.starts_with(DECODABLE) {
            return Err(ResoundError::DecodeError("unrecognised container".into()));
        }
        PcmAudio::new(
            8_000,
            vec![vec![0.5; DECODED_FRAMES], vec![-0.5; DECODED_FRAMES]],
        )
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// A decode context around one shared [`PrefixDecoder`], plus a counter of
/// how often the factory ran.
pub fn decode_context(decoder: Arc<PrefixDecoder>) -> (DecodeContext, Arc<AtomicUsize>) {
    let created = Arc::new(AtomicUsize::new(0));
    let factory_count = Arc::clone(&created);
    let context = DecodeContext::new(move || {
        factory_count.fetch_add(1, Ordering::SeqCst);
        let decoder: Arc<dyn AudioDecoder> = Arc::clone(&decoder) as Arc<dyn AudioDecoder>;
        Ok(decoder)
    });
    (context, created)
}

// ── Capture ────────────────────────────────────────────────────────

/// How often each capture resource was touched.
#[derive(Default)]
pub struct CaptureCounters {
    pub attached: AtomicUsize,
    pub released: AtomicUsize,
    pub connected: AtomicUsize,
    pub started: AtomicUsize,
    pub stopped: AtomicUsize,
    pub disconnected: AtomicUsize,
}

/// Current value of a counter.
pub fn count(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}

/// A capture backend that replays scripted events.
///
/// Player events are queued on attach, recorder events on connect, and
/// `after_stop` events when the recorder is stopped.
#[derive(Default)]
pub struct ScriptedCapture {
    pub player_events: Vec<PlayerEvent>,
    pub recorder_events: Vec<RecorderEvent>,
    pub after_stop: Vec<RecorderEvent>,
    pub supported_types: Vec<&'static str>,
    pub recorder_mime_type: Option<String>,
    pub fail_connect: bool,
    pub unavailable: bool,
    pub counters: Arc<CaptureCounters>,
    pub requested_mime_type: Arc<Mutex<Option<String>>>,
}

impl ScriptedCapture {
    /// A source of `duration` seconds whose recording yields `chunks`
    /// before the stop and `tail` afterwards.
    pub fn playing(duration: f64, chunks: &[&[u8]], tail: &[u8]) -> Self {
        let mut player_events = vec![PlayerEvent::MetadataLoaded {
            duration_seconds: duration,
        }];
        let steps = 4;
        for step in 1..=steps {
            player_events.push(PlayerEvent::TimeUpdate {
                position_seconds: duration * f64::from(step) / f64::from(steps),
            });
        }
        player_events.push(PlayerEvent::Ended);

        let mut after_stop = Vec::new();
        if !tail.is_empty() {
            after_stop.push(RecorderEvent::Data(tail.to_vec()));
        }
        after_stop.push(RecorderEvent::Stopped);

        Self {
            player_events,
            recorder_events: chunks
                .iter()
                .map(|chunk| RecorderEvent::Data(chunk.to_vec()))
                .collect(),
            after_stop,
            supported_types: vec!["audio/webm;codecs=opus"],
            ..Self::default()
        }
    }
}

impl CaptureBackend for ScriptedCapture {
    fn is_available(&self) -> bool {
        !self.unavailable
    }

    fn supports_recorder_type(&self, mime_type: &str) -> bool {
        self.supported_types.contains(&mime_type)
    }

    fn attach(&self, _source: &MediaSource) -> Result<AttachedPlayer, ResoundError> {
        self.counters.attached.fetch_add(1, Ordering::SeqCst);
        let (sender, events) = unbounded_channel();
        for event in &self.player_events {
            sender.send(event.clone()).unwrap();
        }
        Ok(AttachedPlayer {
            player: Box::new(ScriptedPlayer {
                _events: sender,
                recorder_events: self.recorder_events.clone(),
                after_stop: self.after_stop.clone(),
                recorder_mime_type: self.recorder_mime_type.clone(),
                fail_connect: self.fail_connect,
                counters: Arc::clone(&self.counters),
                requested_mime_type: Arc::clone(&self.requested_mime_type),
            }),
            events,
        })
    }
}

struct ScriptedPlayer {
    _events: UnboundedSender<PlayerEvent>,
    recorder_events: Vec<RecorderEvent>,
    after_stop: Vec<RecorderEvent>,
    recorder_mime_type: Option<String>,
    fail_connect: bool,
    counters: Arc<CaptureCounters>,
    requested_mime_type: Arc<Mutex<Option<String>>>,
}

impl MediaPlayer for ScriptedPlayer {
    fn connect_recorder(
        &mut self,
        mime_type: Option<&str>,
    ) -> Result<ConnectedRecorder, ResoundError> {
        *self.requested_mime_type.lock().unwrap() = mime_type.map(str::to_string);
        if self.fail_connect {
            return Err(ResoundError::UnsupportedEnvironment("no recorder".into()));
        }
        self.counters.connected.fetch_add(1, Ordering::SeqCst);
        let (sender, events) = unbounded_channel();
        for event in &self.recorder_events {
            sender.send(event.clone()).unwrap();
        }
        Ok(ConnectedRecorder {
            recorder: Box::new(ScriptedRecorder {
                sender,
                after_stop: self.after_stop.clone(),
                mime_type: self.recorder_mime_type.clone(),
                active: false,
                counters: Arc::clone(&self.counters),
            }),
            events,
        })
    }

    fn play(&mut self) -> Result<(), ResoundError> {
        Ok(())
    }

    fn release(&mut self) {
        self.counters.released.fetch_add(1, Ordering::SeqCst);
    }
}

struct ScriptedRecorder {
    sender: UnboundedSender<RecorderEvent>,
    after_stop: Vec<RecorderEvent>,
    mime_type: Option<String>,
    active: bool,
    counters: Arc<CaptureCounters>,
}

impl AudioRecorder for ScriptedRecorder {
    fn start(&mut self, _timeslice: Duration) -> Result<(), ResoundError> {
        self.counters.started.fetch_add(1, Ordering::SeqCst);
        self.active = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.counters.stopped.fetch_add(1, Ordering::SeqCst);
        self.active = false;
        for event in self.after_stop.drain(..) {
            let _ = self.sender.send(event);
        }
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn mime_type(&self) -> Option<String> {
        self.mime_type.clone()
    }

    fn disconnect(&mut self) {
        self.counters.disconnected.fetch_add(1, Ordering::SeqCst);
    }
}

// ── Engine ─────────────────────────────────────────────────────────

/// An engine whose filesystem is a map and whose "transcode" writes a
/// marker naming the requested format.
#[derive(Default)]
pub struct MemoryEngine {
    pub files: Mutex<HashMap<String, Vec<u8>>>,
    pub deleted: Mutex<Vec<String>>,
    pub commands: Mutex<Vec<EngineCommand>>,
    pub fail_exec: bool,
}

impl MemoryEngine {
    pub fn output_for(format: AudioFormat) -> Vec<u8> {
        format!("ENCODED:{}", format.extension()).into_bytes()
    }
}

impl CodecEngine for MemoryEngine {
    fn write_file(&self, name: &str, data: &[u8]) -> Result<(), ResoundError> {
        self.files
            .lock()
            .unwrap()
            .insert(name.to_string(), data.to_vec());
        Ok(())
    }

    fn read_file(&self, name: &str) -> Result<Vec<u8>, ResoundError> {
        self.files
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| ResoundError::EncodeError(format!("{name} does not exist")))
    }

    fn delete_file(&self, name: &str) -> Result<(), ResoundError> {
        self.deleted.lock().unwrap().push(name.to_string());
        self.files
            .lock()
            .unwrap()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| ResoundError::EncodeError(format!("{name} does not exist")))
    }

    fn exec(&self, args: &[String], progress: &mut dyn FnMut(f64)) -> Result<(), ResoundError> {
        let command = EngineCommand::parse(args)?;
        self.commands.lock().unwrap().push(command.clone());
        progress(0.25);
        progress(0.75);
        if self.fail_exec {
            return Err(ResoundError::DecodeError("engine could not read input".into()));
        }
        progress(1.0);
        self.write_file(&command.output, &Self::output_for(command.format))
    }
}

/// Hands out one shared engine and counts loads.
pub struct CountingLoader {
    pub engine: Arc<MemoryEngine>,
    pub loads: AtomicUsize,
    pub fail: bool,
}

impl CountingLoader {
    pub fn new(engine: Arc<MemoryEngine>) -> Self {
        Self {
            engine,
            loads: AtomicUsize::new(0),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(Arc::new(MemoryEngine::default()))
        }
    }
}

impl EngineLoader for CountingLoader {
    fn load(&self) -> Result<Arc<dyn CodecEngine>, ResoundError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ResoundError::EngineUnavailable("engine download failed".into()));
        }
        let engine: Arc<dyn CodecEngine> = Arc::clone(&self.engine) as Arc<dyn CodecEngine>;
        Ok(engine)
    }
}

// ── MP3 codec ──────────────────────────────────────────────────────

/// What a [`RecordingCodec`] saw.
#[derive(Debug, Default)]
pub struct CodecLog {
    pub opened: Vec<(u16, u32, u32)>,
    pub blocks: Vec<(usize, Option<usize>)>,
    pub samples: Vec<(Vec<i16>, Option<Vec<i16>>)>,
    pub flushed: usize,
}

/// An MP3 codec that records its calls. The first block produces no
/// output; every later block produces `[block index; 2]`, and the flush
/// produces `b"END"`.
#[derive(Default)]
pub struct RecordingCodec {
    pub log: Arc<Mutex<CodecLog>>,
    pub fail_open: bool,
    pub max_sample_rate: Option<u32>,
}

impl Mp3Codec for RecordingCodec {
    fn open(
        &self,
        channel_count: u16,
        sample_rate: u32,
        bitrate_kbps: u32,
    ) -> Result<Box<dyn FrameEncoder>, ResoundError> {
        if self.fail_open {
            return Err(ResoundError::EncodeError("lame.js missing".into()));
        }
        if let Some(max) = self.max_sample_rate
            && sample_rate > max
        {
            return Err(ResoundError::ShapeError(format!("{sample_rate} Hz is above {max} Hz")));
        }
        self.log
            .lock()
            .unwrap()
            .opened
            .push((channel_count, sample_rate, bitrate_kbps));
        Ok(Box::new(RecordingEncoder {
            log: Arc::clone(&self.log),
        }))
    }
}

struct RecordingEncoder {
    log: Arc<Mutex<CodecLog>>,
}

impl FrameEncoder for RecordingEncoder {
    fn encode_block(
        &mut self,
        left: &[i16],
        right: Option<&[i16]>,
    ) -> Result<Vec<u8>, ResoundError> {
        let mut log = self.log.lock().unwrap();
        let index = log.blocks.len();
        log.blocks.push((left.len(), right.map(<[i16]>::len)));
        log.samples.push((left.to_vec(), right.map(<[i16]>::to_vec)));
        if index == 0 {
            Ok(Vec::new())
        } else {
            Ok(vec![index as u8; 2])
        }
    }

    fn flush(&mut self) -> Result<Vec<u8>, ResoundError> {
        self.log.lock().unwrap().flushed += 1;
        Ok(b"END".to_vec())
    }
}
