//! MP3 block orchestration tests, run against a recording codec.

mod common;

use resound::{MP3_BLOCK_FRAMES, PcmAudio, ResoundError, encode_mp3, quantize};

use common::RecordingCodec;

#[test]
fn mono_2304_frames_make_two_blocks_and_one_flush() {
    let codec = RecordingCodec::default();
    let audio = PcmAudio::mono(44_100, vec![0.25; 2304]).unwrap();

    let mp3 = encode_mp3(&audio, &codec, 160).unwrap();

    let log = codec.log.lock().unwrap();
    assert_eq!(log.opened, [(1, 44_100, 160)]);
    assert_eq!(log.blocks, [(MP3_BLOCK_FRAMES, None), (MP3_BLOCK_FRAMES, None)]);
    assert_eq!(log.flushed, 1);
    // The first block emitted nothing; only non-empty chunks are kept.
    assert_eq!(mp3, [1, 1, b'E', b'N', b'D']);
}

#[test]
fn stereo_feeds_both_channels_with_a_short_last_block() {
    let codec = RecordingCodec::default();
    let audio = PcmAudio::new(48_000, vec![vec![0.5; 1500], vec![-0.5; 1500]]).unwrap();

    encode_mp3(&audio, &codec, 128).unwrap();

    let log = codec.log.lock().unwrap();
    assert_eq!(log.opened, [(2, 48_000, 128)]);
    assert_eq!(log.blocks, [(1152, Some(1152)), (348, Some(348))]);
}

#[test]
fn blocks_carry_quantized_slices_of_each_channel() {
    const FRAMES: usize = 1300;
    let ramp = |index: usize| -1.0 + 2.0 * index as f32 / (FRAMES - 1) as f32;
    let left: Vec<f32> = (0..FRAMES).map(ramp).collect();
    let right: Vec<f32> = (0..FRAMES).map(|index| -ramp(index)).collect();
    let audio = PcmAudio::new(44_100, vec![left.clone(), right.clone()]).unwrap();
    let codec = RecordingCodec::default();

    encode_mp3(&audio, &codec, 160).unwrap();

    let log = codec.log.lock().unwrap();
    assert_eq!(log.samples.len(), 2);
    for (index, (block_left, block_right)) in log.samples.iter().enumerate() {
        let start = index * MP3_BLOCK_FRAMES;
        let end = (start + MP3_BLOCK_FRAMES).min(FRAMES);
        let expected_left: Vec<i16> = left[start..end].iter().copied().map(quantize).collect();
        let expected_right: Vec<i16> = right[start..end].iter().copied().map(quantize).collect();
        assert_eq!(*block_left, expected_left, "left channel, block {index}");
        assert_eq!(
            block_right.as_deref(),
            Some(expected_right.as_slice()),
            "right channel, block {index}"
        );
    }

    let (first_left, first_right) = &log.samples[0];
    let (last_left, last_right) = &log.samples[1];
    assert_eq!(first_left[0], -32_768);
    assert_eq!(first_right.as_ref().unwrap()[0], 32_767);
    assert_eq!(last_left.last(), Some(&32_767));
    assert_eq!(last_right.as_ref().unwrap().last(), Some(&-32_768));
    assert_eq!(last_left.len(), FRAMES - MP3_BLOCK_FRAMES);
}

#[test]
fn channels_beyond_two_are_dropped() {
    let codec = RecordingCodec::default();
    let audio = PcmAudio::new(32_000, vec![vec![0.0; 10]; 6]).unwrap();

    encode_mp3(&audio, &codec, 160).unwrap();

    let log = codec.log.lock().unwrap();
    assert_eq!(log.opened, [(2, 32_000, 160)]);
    assert_eq!(log.blocks, [(10, Some(10))]);
}

#[test]
fn empty_audio_only_flushes() {
    let codec = RecordingCodec::default();
    let audio = PcmAudio::mono(44_100, Vec::new()).unwrap();

    let mp3 = encode_mp3(&audio, &codec, 160).unwrap();

    let log = codec.log.lock().unwrap();
    assert!(log.blocks.is_empty());
    assert_eq!(log.flushed, 1);
    assert_eq!(mp3, b"END");
}

#[test]
fn open_failure_is_encoder_unavailable() {
    let codec = RecordingCodec {
        fail_open: true,
        ..RecordingCodec::default()
    };
    let audio = PcmAudio::mono(44_100, vec![0.0; 4]).unwrap();

    let result = encode_mp3(&audio, &codec, 160);
    assert!(matches!(result, Err(ResoundError::EncoderUnavailable(_))));
}

#[test]
fn unusable_sample_rate_keeps_its_error() {
    let codec = RecordingCodec {
        max_sample_rate: Some(48_000),
        ..RecordingCodec::default()
    };
    let audio = PcmAudio::mono(96_000, vec![0.0; 4]).unwrap();

    let result = encode_mp3(&audio, &codec, 160);
    assert!(matches!(result, Err(ResoundError::ShapeError(message)) if message.contains("96000")));
}
