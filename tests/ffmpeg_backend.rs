//! FFmpeg backend integration tests.
//!
//! Inputs are generated with the crate's own WAV writer. The video test
//! additionally needs `tests/fixtures/sample_video.mp4` (see
//! `tests/fixtures/generate_fixtures.sh`) and is skipped without it.

#![cfg(feature = "ffmpeg")]

use std::{f32::consts::TAU, path::Path};

use resound::{
    AudioDecoder, AudioFormat, CodecEngine, ConvertOptions, Converter, EngineOptions,
    FfmpegDecoder, FfmpegEngine, LameCodec, MediaSource, PcmAudio, ResoundError,
    engine_arguments, encode_mp3, encode_wav,
};

const RATE: u32 = 44_100;

fn sample_video_path() -> &'static str {
    "tests/fixtures/sample_video.mp4"
}

fn tone(sample_rate: u32, seconds: f32, channels: usize) -> PcmAudio {
    let frames = (sample_rate as f32 * seconds) as usize;
    let samples: Vec<f32> = (0..frames)
        .map(|index| 0.5 * (TAU * 440.0 * index as f32 / sample_rate as f32).sin())
        .collect();
    PcmAudio::new(sample_rate, vec![samples; channels]).unwrap()
}

fn header_rate(wav: &[u8]) -> u32 {
    u32::from_le_bytes([wav[24], wav[25], wav[26], wav[27]])
}

// ── Decoder ────────────────────────────────────────────────────────

#[test]
fn decodes_wav_bytes_back_to_pcm() {
    let original = PcmAudio::new(RATE, vec![vec![0.5; 4410], vec![-0.25; 4410]]).unwrap();
    let wav = encode_wav(&original).unwrap();

    let decoder = FfmpegDecoder::new().unwrap();
    let decoded = decoder.decode(&wav).unwrap();

    assert_eq!(decoded.sample_rate(), RATE);
    assert_eq!(decoded.channel_count(), 2);
    assert!(decoded.frame_count().abs_diff(4410) <= 64);

    let middle = decoded.frame_count() / 2;
    let left = decoded.channel(0).unwrap()[middle];
    let right = decoded.channel(1).unwrap()[middle];
    assert!((left - 0.5).abs() < 1e-3, "left sample was {left}");
    assert!((right + 0.25).abs() < 1e-3, "right sample was {right}");
}

#[test]
fn garbage_is_a_decode_error() {
    let decoder = FfmpegDecoder::new().unwrap();
    let result = decoder.decode(b"definitely not a media container");
    assert!(matches!(result, Err(ResoundError::DecodeError(_))));
}

// ── MP3 ────────────────────────────────────────────────────────────

#[test]
fn lame_output_decodes_as_mp3() {
    if !LameCodec::is_available() {
        return;
    }

    let mp3 = encode_mp3(&tone(RATE, 1.0, 1), &LameCodec, 128).unwrap();
    assert!(!mp3.is_empty());

    let decoded = FfmpegDecoder::new().unwrap().decode(&mp3).unwrap();
    assert_eq!(decoded.sample_rate(), RATE);
    assert_eq!(decoded.channel_count(), 1);
    // Encoder delay and padding shift the length by a few MPEG frames.
    let frames = decoded.frame_count();
    assert!(frames > RATE as usize * 9 / 10, "decoded {frames} frames");
    assert!(frames < RATE as usize + 4 * 1152, "decoded {frames} frames");
}

#[test]
fn lame_resamples_hi_res_input_to_48k() {
    if !LameCodec::is_available() {
        return;
    }

    let mp3 = encode_mp3(&tone(96_000, 0.5, 2), &LameCodec, 192).unwrap();

    let decoded = FfmpegDecoder::new().unwrap().decode(&mp3).unwrap();
    assert_eq!(decoded.sample_rate(), 48_000);
    assert_eq!(decoded.channel_count(), 2);
    let frames = decoded.frame_count();
    assert!(frames > 24_000 * 9 / 10, "decoded {frames} frames");
    assert!(frames < 24_000 + 4 * 1152, "decoded {frames} frames");
}

#[test]
fn lame_raises_low_rates_to_8k() {
    if !LameCodec::is_available() {
        return;
    }

    let mp3 = encode_mp3(&tone(7_000, 0.5, 1), &LameCodec, 64).unwrap();

    let decoded = FfmpegDecoder::new().unwrap().decode(&mp3).unwrap();
    assert_eq!(decoded.sample_rate(), 8_000);
    assert!(decoded.frame_count() > 4_000 * 9 / 10);
}

#[test]
fn supported_rates_are_kept() {
    for rate in [8_000, 11_025, 12_000, 16_000, 22_050, 24_000, 32_000, 44_100, 48_000] {
        assert_eq!(LameCodec::encoder_rate(rate), rate);
    }
    assert_eq!(LameCodec::encoder_rate(88_200), 48_000);
    assert_eq!(LameCodec::encoder_rate(192_000), 48_000);
    assert_eq!(LameCodec::encoder_rate(1), 8_000);
}

// ── Engine ─────────────────────────────────────────────────────────

#[test]
fn engine_resamples_wav_output() {
    let engine = FfmpegEngine::new().unwrap();
    let wav = encode_wav(&tone(48_000, 0.5, 2)).unwrap();
    engine.write_file("input-0.wav", &wav).unwrap();

    let options = EngineOptions {
        wav_sample_rate: 22_050,
        ..EngineOptions::default()
    };
    let args = engine_arguments("input-0.wav", "output-0.wav", AudioFormat::Wav, &options);
    let mut ratios = Vec::new();
    engine.exec(&args, &mut |ratio| ratios.push(ratio)).unwrap();

    let output = engine.read_file("output-0.wav").unwrap();
    assert_eq!(&output[0..4], b"RIFF");
    assert_eq!(header_rate(&output), 22_050);
    assert_eq!(ratios.last(), Some(&1.0));
    assert!(ratios.windows(2).all(|pair| pair[0] <= pair[1]));

    engine.delete_file("input-0.wav").unwrap();
    engine.delete_file("output-0.wav").unwrap();
    assert!(engine.read_file("output-0.wav").is_err());
}

#[test]
fn engine_encodes_hi_res_input_as_mp3() {
    if !LameCodec::is_available() {
        return;
    }

    let engine = FfmpegEngine::new().unwrap();
    let wav = encode_wav(&tone(96_000, 0.5, 2)).unwrap();
    engine.write_file("input-0.wav", &wav).unwrap();

    let args = engine_arguments(
        "input-0.wav",
        "output-0.mp3",
        AudioFormat::Mp3,
        &EngineOptions::default(),
    );
    engine.exec(&args, &mut |_| {}).unwrap();

    let output = engine.read_file("output-0.mp3").unwrap();
    let decoded = FfmpegDecoder::new().unwrap().decode(&output).unwrap();
    assert_eq!(decoded.sample_rate(), 48_000);
}

#[test]
fn engine_rejects_paths_outside_its_directory() {
    let engine = FfmpegEngine::new().unwrap();
    assert!(matches!(
        engine.write_file("../escape.wav", b"x"),
        Err(ResoundError::InvalidEngineCommand(_))
    ));
    assert!(engine.read_file("").is_err());
}

// ── Converter ──────────────────────────────────────────────────────

#[tokio::test]
async fn converter_decodes_wav_input() {
    let wav = encode_wav(&tone(RATE, 0.25, 2)).unwrap();
    let source = MediaSource::from_bytes("tone.wav", wav);
    let converter = Converter::with_ffmpeg(ConvertOptions::default()).unwrap();

    let audio = converter.convert(&source, AudioFormat::Wav).await.unwrap();

    assert_eq!(audio.file_name(), "tone.wav");
    assert_eq!(header_rate(audio.bytes()), RATE);
}

#[tokio::test]
async fn converter_writes_hi_res_input_as_mp3() {
    if !LameCodec::is_available() {
        return;
    }

    let wav = encode_wav(&tone(96_000, 0.25, 2)).unwrap();
    let source = MediaSource::from_bytes("studio.wav", wav);
    let converter = Converter::with_ffmpeg(ConvertOptions::default()).unwrap();

    let audio = converter.convert(&source, AudioFormat::Mp3).await.unwrap();

    assert_eq!(audio.file_name(), "studio.mp3");
    let decoded = FfmpegDecoder::new().unwrap().decode(audio.bytes()).unwrap();
    assert_eq!(decoded.sample_rate(), 48_000);
}

#[tokio::test]
async fn converter_extracts_audio_from_video() {
    let path = sample_video_path();
    if !Path::new(path).exists() || !LameCodec::is_available() {
        return;
    }

    let source = MediaSource::open(path).unwrap();
    let converter = Converter::with_ffmpeg(ConvertOptions::default()).unwrap();

    let audio = converter.convert(&source, AudioFormat::Mp3).await.unwrap();

    assert_eq!(audio.file_name(), "sample_video.mp3");
    assert!(!audio.is_empty());
}
