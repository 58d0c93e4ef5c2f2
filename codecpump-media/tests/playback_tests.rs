//! Integration tests for the playback sink

mod common;

use codecpump_core::format::MIME_AUDIO_AAC;
use codecpump_core::*;
use codecpump_media::*;
use common::*;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio_test::assert_ok;

fn sink(
    endpoints: Arc<dyn EndpointFactory>,
    outputs: FakeOutputFactory,
) -> (PlaybackSink, Arc<FakeOutputFactory>) {
    let outputs = Arc::new(outputs);
    let sink = PlaybackSink::new(
        CodecFormat::AacLc,
        endpoints,
        outputs.clone(),
        PlaybackConfig::default(),
        fast_config(),
        Arc::new(TracingObserver),
    );
    (sink, outputs)
}

fn position(calls: &[String], call: &str) -> Option<usize> {
    calls.iter().position(|c| c == call)
}

// ============================================================================
// DEVICE SETUP
// ============================================================================

#[test]
fn test_prepare_opens_playing_device() {
    let (sink, outputs) = sink(Arc::new(LoopbackFactory::new()), FakeOutputFactory::new(1024));
    assert_ok!(sink.prepare(16000, 1));

    assert_eq!(outputs.opens(), vec![(16000, 1, 4096)]);
    assert_eq!(outputs.calls(), vec!["1:play"]);
    assert_eq!(sink.output_params(), Some((16000, 1)));
    assert_eq!(sink.decoder_state(), CodecState::Prepared);
    assert!(sink.is_enabled());
}

#[test]
fn test_stereo_16k_doubles_buffer() {
    let (sink, outputs) = sink(Arc::new(LoopbackFactory::new()), FakeOutputFactory::new(1024));
    assert_ok!(sink.prepare(16000, 2));
    assert_eq!(outputs.opens(), vec![(16000, 2, 8192)]);
}

#[test]
fn test_device_minimum_wins() {
    let (sink, outputs) = sink(Arc::new(LoopbackFactory::new()), FakeOutputFactory::new(12000));
    assert_ok!(sink.prepare(48000, 2));
    assert_eq!(outputs.opens(), vec![(48000, 2, 12000)]);
}

#[test]
fn test_disabled_sink_opens_without_playing() {
    let outputs = Arc::new(FakeOutputFactory::new(1024));
    let sink = PlaybackSink::new(
        CodecFormat::AacLc,
        Arc::new(LoopbackFactory::new()),
        outputs.clone(),
        PlaybackConfig::default().start_enabled(false),
        fast_config(),
        Arc::new(TracingObserver),
    );
    assert_ok!(sink.prepare(16000, 1));
    assert!(!sink.is_enabled());
    assert!(outputs.calls().is_empty());
}

// ============================================================================
// DECODE AND FORMAT CHANGES
// ============================================================================

#[test]
fn test_decoded_audio_is_written() {
    let (sink, outputs) = sink(Arc::new(LoopbackFactory::new()), FakeOutputFactory::new(1024));
    assert_ok!(sink.prepare(16000, 1));

    sink.decode(&[0x10; 256], 256, 16000, 1, 0);

    assert!(wait_until(WAIT, || sink.bytes_written() == 256));
    assert!(outputs.calls().contains(&"1:write".to_string()));
}

#[test]
fn test_output_format_change_rebuilds_device_before_writing() {
    let announced = MediaFormat::audio(MIME_AUDIO_AAC, 44100, 2);
    let (sink, outputs) = sink(AnnouncingFactory::new(announced), FakeOutputFactory::new(1024));
    assert_ok!(sink.prepare(16000, 1));

    sink.decode(&[0x20; 128], 128, 16000, 1, 0);

    assert!(wait_until(WAIT, || sink.bytes_written() == 128));
    assert_eq!(outputs.opens(), vec![(16000, 1, 4096), (44100, 2, 4096)]);
    assert_eq!(sink.output_params(), Some((44100, 2)));
    assert_eq!(sink.output_rebuilds(), 1);

    let calls = outputs.calls();
    assert_eq!(position(&calls, "1:write"), None);
    let released = position(&calls, "1:release").unwrap();
    let written = position(&calls, "2:write").unwrap();
    assert!(released < written);
    assert_eq!(
        calls[..released + 1],
        ["1:play", "1:pause", "1:flush", "1:stop", "1:release"]
    );
}

#[test]
fn test_declared_format_change_rebuilds_device() {
    let (sink, outputs) = sink(Arc::new(LoopbackFactory::new()), FakeOutputFactory::new(1024));
    assert_ok!(sink.prepare(16000, 1));

    sink.decode(&[0x30; 64], 64, 44100, 2, 0);

    assert!(wait_until(WAIT, || sink.bytes_written() == 64));
    assert_eq!(sink.output_params(), Some((44100, 2)));
    assert_eq!(outputs.opens().len(), 2);
    assert_eq!(position(&outputs.calls(), "1:write"), None);
    assert_eq!(sink.decoder_state(), CodecState::Prepared);
}

// ============================================================================
// MUTE AND TEARDOWN
// ============================================================================

#[test]
fn test_mute_pauses_and_skips_writes() {
    let (sink, outputs) = sink(Arc::new(LoopbackFactory::new()), FakeOutputFactory::new(1024));
    assert_ok!(sink.prepare(16000, 1));

    sink.set_enabled(false);
    assert!(!sink.is_enabled());
    assert_eq!(outputs.calls(), vec!["1:play", "1:pause", "1:flush"]);

    sink.decode(&[0x40; 64], 64, 16000, 1, 0);
    thread::sleep(Duration::from_millis(50));
    assert_eq!(sink.bytes_written(), 0);

    sink.set_enabled(true);
    assert_eq!(outputs.calls().last().map(String::as_str), Some("1:play"));
    sink.decode(&[0x41; 64], 64, 16000, 1, 1);
    assert!(wait_until(WAIT, || sink.bytes_written() == 64));
}

#[test]
fn test_stop_swallows_device_failures() {
    let mut outputs = FakeOutputFactory::new(1024);
    outputs.fail_teardown = true;
    let (sink, outputs) = sink(Arc::new(LoopbackFactory::new()), outputs);
    assert_ok!(sink.prepare(16000, 1));

    sink.stop();

    assert_eq!(
        outputs.calls(),
        vec!["1:play", "1:pause", "1:flush", "1:stop", "1:release"]
    );
    assert_eq!(sink.output_params(), None);
    assert!(wait_until(WAIT, || sink.decoder_state() == CodecState::Release));
}

#[test]
fn test_start_resumes_stopped_decoder() {
    let (sink, outputs) = sink(Arc::new(LoopbackFactory::new()), FakeOutputFactory::new(1024));
    assert_ok!(sink.prepare(16000, 1));
    assert_ok!(sink.start());
    assert_eq!(sink.decoder_state(), CodecState::Prepared);
    assert_eq!(outputs.calls(), vec!["1:play", "1:play"]);
}
