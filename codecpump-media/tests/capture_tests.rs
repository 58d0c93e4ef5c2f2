//! Integration tests for the audio capture loop

mod common;

use codecpump_core::*;
use codecpump_media::*;
use common::*;
use parking_lot::Mutex;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

fn pcm_capture(input: FakeInputFactory) -> (CaptureLoop, Arc<FakeInputFactory>) {
    let input = Arc::new(input);
    let config = CaptureConfig::default().elevate_priority(false);
    (CaptureLoop::pcm(input.clone(), config), input)
}

fn encoded_capture(input: FakeInputFactory) -> (CaptureLoop, Arc<FakeInputFactory>) {
    let input = Arc::new(input);
    let capture = CaptureLoop::encoded(
        input.clone(),
        CodecFormat::AacLc,
        Arc::new(LoopbackFactory::new()),
        CaptureConfig::default().elevate_priority(false),
        fast_config(),
        Arc::new(TracingObserver),
    );
    (capture, input)
}

#[derive(Default)]
struct MemorySink {
    bytes: Arc<Mutex<Vec<u8>>>,
    closed: Arc<Mutex<bool>>,
}

impl DebugSink for MemorySink {
    fn write(&mut self, chunk: &[u8]) -> MediaResult<()> {
        self.bytes.lock().extend_from_slice(chunk);
        Ok(())
    }

    fn close(&mut self) {
        *self.closed.lock() = true;
    }
}

// ============================================================================
// SESSION GUARDS
// ============================================================================

#[test]
fn test_second_start_is_rejected() {
    let (capture, input) = pcm_capture(FakeInputFactory::new(1024, 512));
    let listener = Arc::new(RecordCollector::default());

    assert_ok!(capture.start(16000, 1, Some(listener.clone())));
    let error = assert_err!(capture.start(16000, 1, Some(listener.clone())));
    assert!(matches!(error, MediaError::AlreadyStarted));

    assert_eq!(input.opens().len(), 1);
    assert!(capture.is_recording());
    assert_ok!(capture.stop());
}

#[test]
fn test_stop_without_session_is_rejected() {
    let (capture, _) = pcm_capture(FakeInputFactory::new(1024, 512));
    let error = assert_err!(capture.stop());
    assert!(matches!(error, MediaError::CaptureNotActive));

    assert_ok!(capture.start(16000, 1, None));
    assert_ok!(capture.stop());
    assert_err!(capture.stop());
    assert!(!capture.is_recording());
}

#[test]
fn test_restart_after_stop() {
    let (capture, input) = pcm_capture(FakeInputFactory::new(1024, 512));
    assert_ok!(capture.start(16000, 1, None));
    assert_ok!(capture.stop());
    assert_ok!(capture.start(16000, 1, None));
    assert_ok!(capture.stop());
    assert_eq!(input.opens().len(), 2);
}

// ============================================================================
// DEVICE BUFFER SIZE
// ============================================================================

#[test]
fn test_buffer_size_is_at_least_2048() {
    let (capture, input) = pcm_capture(FakeInputFactory::new(1024, 512));
    let listener = Arc::new(RecordCollector::default());
    assert_ok!(capture.start(16000, 1, Some(listener.clone())));

    assert!(wait_until(WAIT, || listener.chunks.lock().len() >= 2));
    assert_ok!(capture.stop());

    assert_eq!(input.opens(), vec![2048]);
    let chunks = listener.chunks.lock();
    assert_eq!(chunks[0].len(), 2048);
    // consecutive fills continue the device's byte ramp
    assert_eq!(chunks[1][0], chunks[0][2047].wrapping_add(1));
}

#[test]
fn test_device_minimum_raises_buffer_size() {
    let (capture, input) = pcm_capture(FakeInputFactory::new(4096, 1024));
    assert_ok!(capture.start(44100, 2, None));
    assert_ok!(capture.stop());
    assert_eq!(input.opens(), vec![4096]);
}

#[test]
fn test_rejected_size_retries_with_minimum() {
    let mut factory = FakeInputFactory::new(1024, 512);
    factory.rejected_sizes = vec![2048];
    let (capture, input) = pcm_capture(factory);
    let listener = Arc::new(RecordCollector::default());

    assert_ok!(capture.start(16000, 1, Some(listener.clone())));
    assert!(wait_until(WAIT, || !listener.chunks.lock().is_empty()));
    assert_ok!(capture.stop());

    assert_eq!(input.opens(), vec![2048, 1024]);
    assert_eq!(listener.chunks.lock()[0].len(), 1024);
}

#[test]
fn test_persistent_device_failure_does_not_start() {
    let mut factory = FakeInputFactory::new(1024, 512);
    factory.rejected_sizes = vec![2048, 1024];
    let (capture, input) = pcm_capture(factory);

    let error = assert_err!(capture.start(16000, 1, None));
    assert!(matches!(error, MediaError::DeviceUnavailable { .. }));
    assert!(!capture.is_recording());
    assert_eq!(input.opens(), vec![2048, 1024]);
}

// ============================================================================
// READS
// ============================================================================

#[test]
fn test_failed_reads_are_counted() {
    let mut factory = FakeInputFactory::new(1024, 512);
    factory.script = vec![0, -3];
    let (capture, _) = pcm_capture(factory);
    let listener = Arc::new(RecordCollector::default());

    assert_ok!(capture.start(16000, 1, Some(listener.clone())));
    assert!(wait_until(WAIT, || !listener.chunks.lock().is_empty()));
    assert_ok!(capture.stop());

    let stats = capture.stats();
    assert!(stats.failed_reads >= 2);
    assert!(stats.buffers_delivered >= 1);
    assert_eq!(listener.chunks.lock()[0].len(), 2048);
}

#[test]
fn test_partial_buffer_is_delivered() {
    let mut factory = FakeInputFactory::new(1024, 512);
    factory.script = vec![1, -3];
    let (capture, _) = pcm_capture(factory);
    let listener = Arc::new(RecordCollector::default());

    assert_ok!(capture.start(16000, 1, Some(listener.clone())));
    assert!(wait_until(WAIT, || !listener.chunks.lock().is_empty()));
    assert_ok!(capture.stop());

    assert_eq!(listener.chunks.lock()[0].len(), 512);
    let stats = capture.stats();
    assert!(stats.short_buffers >= 1);
    assert!(stats.failed_reads >= 1);
}

#[test]
fn test_raw_capture_writes_debug_sink() {
    let (capture, _) = pcm_capture(FakeInputFactory::new(1024, 512));
    let sink = MemorySink::default();
    let bytes = sink.bytes.clone();
    let closed = sink.closed.clone();
    capture.set_debug_sink(Some(Box::new(sink)));
    let listener = Arc::new(RecordCollector::default());

    assert_ok!(capture.start(16000, 1, Some(listener.clone())));
    assert!(wait_until(WAIT, || !listener.chunks.lock().is_empty()));
    assert_ok!(capture.stop());

    assert!(bytes.lock().len() >= 2048);
    assert!(*closed.lock());
}

// ============================================================================
// ENCODED CAPTURE
// ============================================================================

#[test]
fn test_encoded_capture_emits_adts_and_turns_off() {
    let (capture, input) = encoded_capture(FakeInputFactory::new(1024, 512));
    let listener = Arc::new(RecordCollector::default());

    assert_ok!(capture.start(16000, 1, Some(listener.clone())));
    assert_eq!(capture.encoder_state(), Some(CodecState::Prepared));
    assert!(wait_until(WAIT, || !listener.chunks.lock().is_empty()));
    assert_ok!(capture.stop());

    {
        let chunks = listener.chunks.lock();
        assert_eq!(chunks[0].len(), 2048 + ADTS_HEADER_LEN);
        assert_eq!(&chunks[0][..2], &[0xFF, 0xF9]);
    }

    assert!(wait_until(WAIT, || {
        capture.encoder_state() == Some(CodecState::Release)
    }));
    assert_eq!(listener.turn_offs.load(Ordering::SeqCst), 1);

    let log = input.log.lock().clone();
    assert_eq!(log, vec!["start", "stop", "release"]);
}

#[test]
fn test_encoder_failure_releases_device() {
    let (capture, input) = encoded_capture(FakeInputFactory::new(1024, 512));

    let error = assert_err!(capture.start(12345, 1, None));
    assert!(matches!(
        error,
        MediaError::Codec {
            source: CodecError::UnsupportedFormat { .. }
        }
    ));
    assert!(!capture.is_recording());
    assert_eq!(input.log.lock().clone(), vec!["start", "stop", "release"]);
}
