//! Audio playback sink
//!
//! [`PlaybackSink`] decodes an AAC stream with its own [`AudioDecoder`] and
//! writes the PCM to an audio-output device. When the decoder reports a
//! sample rate or channel count that differs from the open device, the
//! device is torn down and reopened before the next chunk is written.

use crate::config::{PipelineConfig, PlaybackConfig};
use crate::decoder::{AudioDecoder, DecodeListener};
use crate::device::{open_with_fallback, AudioOutputDevice, AudioOutputFactory};
use crate::error::MediaResult;
use codecpump_core::{
    CodecFormat, CodecResult, CodecState, EndpointFactory, MediaFormat, StateObserver,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Output side of the sink; receives decoder callbacks
struct SinkOutput {
    factory: Arc<dyn AudioOutputFactory>,
    config: PlaybackConfig,
    device: Mutex<Option<Box<dyn AudioOutputDevice>>>,
    enabled: AtomicBool,
    written: AtomicU64,
    rebuilds: AtomicU64,
}

impl SinkOutput {
    /// Open a device for `(sample_rate, channel_count)`, replacing the
    /// current one
    fn open(&self, sample_rate: u32, channel_count: u8) -> MediaResult<()> {
        let mut slot = self.device.lock();
        if let Some(previous) = slot.take() {
            teardown(previous);
        }
        let minimum = self.factory.min_buffer_size(sample_rate, channel_count)?;
        let (mut device, buffer_bytes) = open_with_fallback(
            "audio output",
            self.config.preferred_buffer_bytes(sample_rate, channel_count),
            minimum,
            |size| self.factory.open(sample_rate, channel_count, size),
        )?;
        if self.enabled.load(Ordering::Acquire) {
            if let Err(error) = device.play() {
                debug!(%error, "Audio output play failed");
            }
        }
        info!(sample_rate, channel_count, buffer_bytes, "Audio output opened");
        *slot = Some(device);
        Ok(())
    }

    fn params(&self) -> Option<(u32, u8)> {
        self.device
            .lock()
            .as_ref()
            .map(|device| (device.sample_rate(), device.channel_count()))
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
        let mut slot = self.device.lock();
        let Some(device) = slot.as_mut() else {
            return;
        };
        let result = if enabled {
            device.play()
        } else {
            device.pause().and_then(|_| device.flush())
        };
        if let Err(error) = result {
            debug!(enabled, %error, "Audio output mute toggle failed");
        }
    }

    fn close(&self) {
        if let Some(device) = self.device.lock().take() {
            teardown(device);
        }
    }
}

impl DecodeListener for SinkOutput {
    fn on_decode(&self, chunk: &[u8]) {
        if !self.enabled.load(Ordering::Acquire) {
            return;
        }
        if let Some(device) = self.device.lock().as_mut() {
            match device.write(chunk) {
                Ok(written) => {
                    self.written.fetch_add(written as u64, Ordering::Relaxed);
                }
                Err(error) => debug!(%error, "Audio output write failed"),
            }
        }
    }

    fn on_format_changed(&self, format: &MediaFormat) {
        let Some((sample_rate, channel_count)) = format.audio_params() else {
            return;
        };
        let current = self.params();
        if current == Some((sample_rate, channel_count)) {
            return;
        }
        info!(
            ?current,
            sample_rate, channel_count, "Audio format changed, rebuilding output"
        );
        self.rebuilds.fetch_add(1, Ordering::Relaxed);
        if let Err(error) = self.open(sample_rate, channel_count) {
            warn!(%error, "Audio output rebuild failed");
        }
    }
}

/// Best-effort pause, flush, stop and release
fn teardown(mut device: Box<dyn AudioOutputDevice>) {
    best_effort("pause", device.pause());
    best_effort("flush", device.flush());
    best_effort("stop", device.stop());
    best_effort("release", device.release());
}

fn best_effort(step: &str, result: MediaResult<()>) {
    if let Err(error) = result {
        debug!(step, %error, "Audio output teardown step failed");
    }
}

/// AAC decoder plus the output device it plays through
pub struct PlaybackSink {
    decoder: AudioDecoder,
    output: Arc<SinkOutput>,
}

impl PlaybackSink {
    /// Create a sink for an AAC `format`
    pub fn new(
        format: CodecFormat,
        endpoints: Arc<dyn EndpointFactory>,
        outputs: Arc<dyn AudioOutputFactory>,
        config: PlaybackConfig,
        pipeline: PipelineConfig,
        observer: Arc<dyn StateObserver>,
    ) -> Self {
        let enabled = config.start_enabled;
        Self {
            decoder: AudioDecoder::new(format, endpoints, pipeline, observer),
            output: Arc::new(SinkOutput {
                factory: outputs,
                config,
                device: Mutex::new(None),
                enabled: AtomicBool::new(enabled),
                written: AtomicU64::new(0),
                rebuilds: AtomicU64::new(0),
            }),
        }
    }

    /// Open the output device and prepare the decoder.
    ///
    /// The device starts playing immediately when the sink is enabled.
    pub fn prepare(&self, sample_rate: u32, channel_count: u8) -> MediaResult<()> {
        self.output.open(sample_rate, channel_count)?;
        self.decoder
            .prepare(sample_rate, channel_count, self.output.clone())?;
        Ok(())
    }

    /// Resume playback and the decoder after `stop`.
    ///
    /// A decoder that is already running is left as it is.
    pub fn start(&self) -> CodecResult<()> {
        if self.output.enabled.load(Ordering::Acquire) {
            if let Some(device) = self.output.device.lock().as_mut() {
                if let Err(error) = device.play() {
                    debug!(%error, "Audio output play failed");
                }
            }
        }
        match self.decoder.state() {
            CodecState::Prepared => Ok(()),
            _ => self.decoder.start(),
        }
    }

    /// Request end of stream from the decoder and tear the device down.
    ///
    /// Device failures are swallowed.
    pub fn stop(&self) {
        self.decoder.set_eos();
        self.output.close();
        info!("Audio output stopped");
    }

    /// Mute (pause and flush, keeping the device) or resume output
    pub fn set_enabled(&self, enabled: bool) {
        self.output.set_enabled(enabled);
    }

    /// Whether output is audible
    pub fn is_enabled(&self) -> bool {
        self.output.enabled.load(Ordering::Acquire)
    }

    /// Submit one AAC access unit with its declared stream parameters
    pub fn decode(
        &self,
        content: &[u8],
        length: usize,
        sample_rate: u32,
        channel_count: u8,
        presentation_time_us: i64,
    ) {
        self.decoder
            .decode(content, length, sample_rate, channel_count, presentation_time_us);
    }

    /// Decoder lifecycle state
    pub fn decoder_state(&self) -> CodecState {
        self.decoder.state()
    }

    /// `(sample_rate, channel_count)` of the open device
    pub fn output_params(&self) -> Option<(u32, u8)> {
        self.output.params()
    }

    /// PCM bytes accepted by the device
    pub fn bytes_written(&self) -> u64 {
        self.output.written.load(Ordering::Relaxed)
    }

    /// Device rebuilds caused by format changes
    pub fn output_rebuilds(&self) -> u64 {
        self.output.rebuilds.load(Ordering::Relaxed)
    }
}
