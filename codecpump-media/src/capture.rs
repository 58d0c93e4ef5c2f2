//! Audio capture loop
//!
//! A [`CaptureLoop`] owns one audio-input device per recording session. Its
//! capture thread fills a buffer from the device and hands it either to an
//! [`AacEncoder`] or, for raw PCM sessions, straight to the
//! [`RecordListener`].

use crate::config::{CaptureConfig, PipelineConfig};
use crate::device::{open_with_fallback, AudioInputDevice, AudioInputFactory};
use crate::encoder::{AacEncoder, EncodeListener};
use crate::error::{MediaError, MediaResult};
use crate::priority;
use codecpump_core::{CodecFormat, CodecState, EndpointFactory, StateObserver};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Receives captured audio
pub trait RecordListener: Send + Sync {
    /// Encoded access unit, or raw PCM for unencoded sessions
    fn on_speaking(&self, chunk: &[u8]);

    /// Recording finished and the encoder drained
    fn on_turn_off(&self);
}

/// Boundary for dumping captured audio while debugging
pub trait DebugSink: Send {
    /// Append a chunk
    fn write(&mut self, chunk: &[u8]) -> MediaResult<()>;

    /// Finish the dump
    fn close(&mut self);
}

type SharedSink = Arc<Mutex<Option<Box<dyn DebugSink>>>>;

fn write_debug(sink: &SharedSink, chunk: &[u8]) {
    if let Some(sink) = sink.lock().as_mut() {
        if let Err(error) = sink.write(chunk) {
            debug!(%error, "Debug sink write failed");
        }
    }
}

fn close_debug(sink: &SharedSink) {
    if let Some(mut sink) = sink.lock().take() {
        sink.close();
    }
}

/// Capture statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureStats {
    /// Buffers handed to the encoder or listener
    pub buffers_delivered: u64,
    /// Delivered buffers that were only partially filled
    pub short_buffers: u64,
    /// Device reads that returned zero or an error code
    pub failed_reads: u64,
    /// PCM bytes captured
    pub bytes_captured: u64,
}

#[derive(Debug, Default)]
struct Counters {
    buffers_delivered: AtomicU64,
    short_buffers: AtomicU64,
    failed_reads: AtomicU64,
    bytes_captured: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> CaptureStats {
        CaptureStats {
            buffers_delivered: self.buffers_delivered.load(Ordering::Relaxed),
            short_buffers: self.short_buffers.load(Ordering::Relaxed),
            failed_reads: self.failed_reads.load(Ordering::Relaxed),
            bytes_captured: self.bytes_captured.load(Ordering::Relaxed),
        }
    }
}

/// Forwards encoder output to the record listener and debug sink
struct EncodeRelay {
    listener: Option<Arc<dyn RecordListener>>,
    sink: SharedSink,
}

impl EncodeListener for EncodeRelay {
    fn on_encode(&self, chunk: &[u8]) {
        if let Some(listener) = &self.listener {
            listener.on_speaking(chunk);
        }
        write_debug(&self.sink, chunk);
    }

    fn on_stop(&self) {
        if let Some(listener) = &self.listener {
            listener.on_turn_off();
        }
        close_debug(&self.sink);
    }
}

/// Where captured buffers go
enum Target {
    Encoder(Arc<AacEncoder>),
    Raw(Option<Arc<dyn RecordListener>>),
}

struct EncoderSetup {
    format: CodecFormat,
    endpoints: Arc<dyn EndpointFactory>,
    pipeline: PipelineConfig,
    observer: Arc<dyn StateObserver>,
}

struct Session {
    running: Arc<AtomicBool>,
    thread: JoinHandle<Box<dyn AudioInputDevice>>,
    encoder: Option<Arc<AacEncoder>>,
}

/// Audio-input owner feeding an encoder or a raw listener
pub struct CaptureLoop {
    input: Arc<dyn AudioInputFactory>,
    encoding: Option<EncoderSetup>,
    config: CaptureConfig,
    sink: SharedSink,
    session: Mutex<Option<Session>>,
    // kept after stop so end of stream can drain
    encoder: Mutex<Option<Arc<AacEncoder>>>,
    counters: Arc<Counters>,
}

impl CaptureLoop {
    /// Capture raw PCM and deliver it directly to the listener
    pub fn pcm(input: Arc<dyn AudioInputFactory>, config: CaptureConfig) -> Self {
        Self {
            input,
            encoding: None,
            config,
            sink: Arc::new(Mutex::new(None)),
            session: Mutex::new(None),
            encoder: Mutex::new(None),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Capture and encode to ADTS-framed AAC
    pub fn encoded(
        input: Arc<dyn AudioInputFactory>,
        format: CodecFormat,
        endpoints: Arc<dyn EndpointFactory>,
        config: CaptureConfig,
        pipeline: PipelineConfig,
        observer: Arc<dyn StateObserver>,
    ) -> Self {
        let mut capture = Self::pcm(input, config);
        capture.encoding = Some(EncoderSetup {
            format,
            endpoints,
            pipeline,
            observer,
        });
        capture
    }

    /// Dump captured (or encoded) audio into `sink` for the next session
    pub fn set_debug_sink(&self, sink: Option<Box<dyn DebugSink>>) {
        *self.sink.lock() = sink;
    }

    /// Open the device and start the capture thread.
    ///
    /// Fails with [`MediaError::AlreadyStarted`] while a session is running.
    pub fn start(
        &self,
        sample_rate: u32,
        channel_count: u8,
        listener: Option<Arc<dyn RecordListener>>,
    ) -> MediaResult<()> {
        let mut session = self.session.lock();
        if session.is_some() {
            warn!("Capture start ignored, already recording");
            return Err(MediaError::AlreadyStarted);
        }

        let minimum = self.input.min_buffer_size(sample_rate, channel_count)?;
        let (mut device, buffer_bytes) = open_with_fallback(
            "audio input",
            self.config.min_buffer_bytes,
            minimum,
            |size| self.input.open(sample_rate, channel_count, size),
        )?;
        if let Err(error) = device.start_recording() {
            let _ = device.release();
            return Err(error);
        }
        info!(sample_rate, channel_count, buffer_bytes, "Audio input recording");

        let target = match self.start_encoder(sample_rate, channel_count, listener.clone()) {
            Ok(Some(encoder)) => Target::Encoder(encoder),
            Ok(None) => Target::Raw(listener),
            Err(error) => {
                teardown_device(device);
                return Err(error);
            }
        };
        let encoder = match &target {
            Target::Encoder(encoder) => Some(encoder.clone()),
            Target::Raw(_) => None,
        };

        let running = Arc::new(AtomicBool::new(true));
        let worker = Worker {
            device,
            buffer: vec![0; buffer_bytes],
            running: running.clone(),
            target,
            sink: self.sink.clone(),
            counters: self.counters.clone(),
            bytes_per_second: u64::from(sample_rate) * u64::from(channel_count) * 2,
            elevate: self.config.elevate_priority,
            backoff: Duration::from_millis(self.config.read_error_backoff_ms),
        };
        let thread = thread::Builder::new()
            .name("audio-capture".to_string())
            .spawn(move || worker.run())
            .map_err(|e| MediaError::ThreadSpawn {
                name: "audio-capture".to_string(),
                reason: e.to_string(),
            })?;

        *session = Some(Session {
            running,
            thread,
            encoder,
        });
        Ok(())
    }

    fn start_encoder(
        &self,
        sample_rate: u32,
        channel_count: u8,
        listener: Option<Arc<dyn RecordListener>>,
    ) -> MediaResult<Option<Arc<AacEncoder>>> {
        let Some(setup) = &self.encoding else {
            return Ok(None);
        };
        let encoder = Arc::new(AacEncoder::new(
            setup.format,
            setup.endpoints.clone(),
            setup.pipeline.clone(),
            setup.observer.clone(),
        ));
        let relay = Arc::new(EncodeRelay {
            listener,
            sink: self.sink.clone(),
        });
        encoder.prepare(sample_rate, channel_count, self.config.bit_rate, relay)?;
        *self.encoder.lock() = Some(encoder.clone());
        Ok(Some(encoder))
    }

    /// End the session: stop the capture thread, request end of stream from
    /// the encoder, then stop and release the device.
    ///
    /// Fails with [`MediaError::CaptureNotActive`] when not recording.
    pub fn stop(&self) -> MediaResult<()> {
        let Some(session) = self.session.lock().take() else {
            return Err(MediaError::CaptureNotActive);
        };
        session.running.store(false, Ordering::Release);
        let device = session.thread.join().map_err(|_| MediaError::Device {
            message: "capture thread panicked".to_string(),
        });

        match session.encoder {
            Some(encoder) => encoder.set_eos(),
            None => close_debug(&self.sink),
        }
        if let Ok(device) = device {
            teardown_device(device);
        }
        info!("Audio input stopped");
        Ok(())
    }

    /// Whether a session is running
    pub fn is_recording(&self) -> bool {
        self.session.lock().is_some()
    }

    /// Lifecycle state of the most recent session's encoder
    pub fn encoder_state(&self) -> Option<CodecState> {
        self.encoder.lock().as_ref().map(|encoder| encoder.state())
    }

    /// Capture statistics since construction
    pub fn stats(&self) -> CaptureStats {
        self.counters.snapshot()
    }
}

impl Drop for CaptureLoop {
    fn drop(&mut self) {
        if self.is_recording() {
            let _ = self.stop();
        }
    }
}

fn teardown_device(mut device: Box<dyn AudioInputDevice>) {
    if let Err(error) = device.stop() {
        debug!(%error, "Audio input stop failed");
    }
    if let Err(error) = device.release() {
        debug!(%error, "Audio input release failed");
    }
}

/// State owned by the capture thread for one session
struct Worker {
    device: Box<dyn AudioInputDevice>,
    buffer: Vec<u8>,
    running: Arc<AtomicBool>,
    target: Target,
    sink: SharedSink,
    counters: Arc<Counters>,
    bytes_per_second: u64,
    elevate: bool,
    backoff: Duration,
}

impl Worker {
    fn run(mut self) -> Box<dyn AudioInputDevice> {
        if self.elevate {
            priority::elevate_current_thread();
        }
        debug!(buffer_bytes = self.buffer.len(), "Capture loop started");
        while self.running.load(Ordering::Acquire) {
            let filled = self.fill();
            if filled == 0 {
                if self.running.load(Ordering::Acquire) {
                    thread::sleep(self.backoff);
                }
                continue;
            }
            self.deliver(filled);
        }
        debug!("Capture loop finished");
        self.device
    }

    /// Read until the buffer is full, a read fails or the session stops
    fn fill(&mut self) -> usize {
        let capacity = self.buffer.len();
        let mut offset = 0;
        while offset < capacity && self.running.load(Ordering::Acquire) {
            let read = self.device.read(&mut self.buffer[offset..]);
            if read <= 0 {
                self.counters.failed_reads.fetch_add(1, Ordering::Relaxed);
                warn!(read, offset, capacity, "Audio input read returned no data");
                break;
            }
            offset += (read as usize).min(capacity - offset);
        }
        offset
    }

    fn deliver(&mut self, filled: usize) {
        let captured = self.counters.bytes_captured.fetch_add(filled as u64, Ordering::Relaxed);
        self.counters.buffers_delivered.fetch_add(1, Ordering::Relaxed);
        if filled < self.buffer.len() {
            self.counters.short_buffers.fetch_add(1, Ordering::Relaxed);
        }
        let chunk = &self.buffer[..filled];
        match &self.target {
            Target::Encoder(encoder) => {
                let presentation_time_us = if self.bytes_per_second > 0 {
                    (captured * 1_000_000 / self.bytes_per_second) as i64
                } else {
                    0
                };
                encoder.encode(chunk, filled, presentation_time_us);
            }
            Target::Raw(listener) => {
                if let Some(listener) = listener {
                    listener.on_speaking(chunk);
                }
                write_debug(&self.sink, chunk);
            }
        }
    }
}
