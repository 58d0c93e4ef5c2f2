//! Audio and video decode pipelines
//!
//! Audio output is copied out of the endpoint and handed to a
//! [`DecodeListener`]; video output is released straight to the bound render
//! target. Both report format changes to their listener.

use crate::config::PipelineConfig;
use crate::encoder::payload;
use crate::pipeline::{CodecKind, Pipeline};
use bytes::Bytes;
use codecpump_core::adts;
use codecpump_core::{
    BufferInfo, CodecEndpoint, CodecError, CodecFormat, CodecResult, CodecState, Direction,
    EndpointFactory, MediaFormat, PendingBuffer, RenderSurface, StateObserver,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Receives decoder output
pub trait DecodeListener: Send + Sync {
    /// Decoded PCM chunk (audio only)
    fn on_decode(&self, chunk: &[u8]);

    /// Stream parameters changed; delivered before any output in the new format
    fn on_format_changed(&self, format: &MediaFormat);
}

/// Decoder output delivered after each tick
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeEvent {
    /// Decoded chunk
    Decoded(Bytes),
    /// New stream format
    FormatChanged(MediaFormat),
}

fn dispatch_decode(listener: &dyn DecodeListener, event: DecodeEvent) {
    match event {
        DecodeEvent::Decoded(chunk) => listener.on_decode(&chunk),
        DecodeEvent::FormatChanged(format) => listener.on_format_changed(&format),
    }
}

/// Caller-declared `(sample_rate, channel_count)` of submitted audio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioParams {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Channel count
    pub channel_count: u8,
}

// ============================================================================
// AUDIO
// ============================================================================

/// Audio decoder capabilities for the shared drive loop
pub struct AudioKind {
    format: CodecFormat,
    params: AudioParams,
    listener: Option<Arc<dyn DecodeListener>>,
}

impl CodecKind for AudioKind {
    type Input = (PendingBuffer, AudioParams);
    type Event = DecodeEvent;
    type Listener = dyn DecodeListener;

    fn label(&self) -> &'static str {
        "audio-decoder"
    }

    fn pending(input: &Self::Input) -> &PendingBuffer {
        &input.0
    }

    fn init_format(&mut self) -> CodecResult<MediaFormat> {
        let AudioParams {
            sample_rate,
            channel_count,
        } = self.params;
        let profile = self.format.aac_profile().ok_or_else(|| {
            CodecError::unsupported(format!("{} is not an AAC format", self.format))
        })?;
        let csd0 = adts::audio_specific_config(profile, sample_rate, channel_count)?;
        Ok(
            MediaFormat::audio(self.format.mime_type(), sample_rate, channel_count)
                .with_aac_profile(profile)
                .with_csd0(Bytes::copy_from_slice(&csd0)),
        )
    }

    fn init_endpoint(
        &mut self,
        factory: &dyn EndpointFactory,
        format: &MediaFormat,
    ) -> CodecResult<Box<dyn CodecEndpoint>> {
        factory.create(Direction::Decoder, format, None)
    }

    fn drain_output(
        &mut self,
        endpoint: &mut dyn CodecEndpoint,
        index: usize,
        info: &BufferInfo,
        events: &mut Vec<DecodeEvent>,
    ) -> CodecResult<()> {
        let chunk = if info.size > 0 {
            endpoint
                .output_buffer(index)
                .and_then(|buffer| payload(buffer, info))
                .map(|data| Some(Bytes::copy_from_slice(data)))
        } else {
            Ok(None)
        };
        endpoint.release_output(index, false)?;
        if let Some(chunk) = chunk? {
            events.push(DecodeEvent::Decoded(chunk));
        }
        Ok(())
    }

    fn format_changed(&mut self, format: MediaFormat, events: &mut Vec<DecodeEvent>) {
        events.push(DecodeEvent::FormatChanged(format));
    }

    fn reconfigure_for(
        &mut self,
        (_, declared): &Self::Input,
        events: &mut Vec<DecodeEvent>,
    ) -> bool {
        let declared = *declared;
        if declared == self.params {
            return false;
        }
        info!(
            from_rate = self.params.sample_rate,
            from_channels = self.params.channel_count,
            to_rate = declared.sample_rate,
            to_channels = declared.channel_count,
            "Declared audio parameters changed"
        );
        self.params = declared;
        events.push(DecodeEvent::FormatChanged(MediaFormat::audio(
            self.format.mime_type(),
            declared.sample_rate,
            declared.channel_count,
        )));
        true
    }

    fn listener(&self) -> Option<Arc<Self::Listener>> {
        self.listener.clone()
    }

    fn dispatch(listener: &Self::Listener, event: DecodeEvent) {
        dispatch_decode(listener, event);
    }
}

/// Decoder for an AAC elementary stream
pub struct AudioDecoder {
    pipeline: Pipeline<AudioKind>,
}

impl AudioDecoder {
    /// Create an unprepared decoder for an AAC `format`
    pub fn new(
        format: CodecFormat,
        factory: Arc<dyn EndpointFactory>,
        config: PipelineConfig,
        observer: Arc<dyn StateObserver>,
    ) -> Self {
        let kind = AudioKind {
            format,
            params: AudioParams {
                sample_rate: 0,
                channel_count: 0,
            },
            listener: None,
        };
        Self {
            pipeline: Pipeline::new(kind, factory, config, observer),
        }
    }

    /// Configure with CSD-0 derived from profile, rate and channels, open and
    /// start the decoder
    pub fn prepare(
        &self,
        sample_rate: u32,
        channel_count: u8,
        listener: Arc<dyn DecodeListener>,
    ) -> CodecResult<()> {
        self.pipeline.prepare(|kind| {
            kind.params = AudioParams {
                sample_rate,
                channel_count,
            };
            kind.listener = Some(listener);
        })
    }

    /// Submit one access unit with the stream parameters the caller believes
    /// it has.
    ///
    /// Declared parameters travel with the access unit. When they differ
    /// from the configured ones the listener gets a format-changed
    /// notification and the endpoint is rebuilt before this unit is queued.
    pub fn decode(
        &self,
        content: &[u8],
        length: usize,
        sample_rate: u32,
        channel_count: u8,
        presentation_time_us: i64,
    ) {
        self.pipeline.submit((
            PendingBuffer::copy_from(content, length, presentation_time_us),
            AudioParams {
                sample_rate,
                channel_count,
            },
        ));
    }

    /// Request end of stream
    pub fn set_eos(&self) {
        self.pipeline.set_eos();
    }

    /// Restart after `stop`
    pub fn start(&self) -> CodecResult<()> {
        self.pipeline.start()
    }

    /// Stop the endpoint
    pub fn stop(&self) -> CodecResult<()> {
        self.pipeline.stop()
    }

    /// Release a stopped decoder
    pub fn release(&self) -> CodecResult<()> {
        self.pipeline.release()
    }

    /// Current lifecycle state
    pub fn state(&self) -> CodecState {
        self.pipeline.state()
    }

    /// Configured stream parameters
    pub fn params(&self) -> AudioParams {
        self.pipeline.with_kind(|kind| kind.params)
    }

    /// Current endpoint format
    pub fn format(&self) -> Option<MediaFormat> {
        self.pipeline.format()
    }

    /// Access units overwritten before the drive loop consumed them
    pub fn dropped_inputs(&self) -> u64 {
        self.pipeline.dropped_inputs()
    }
}

// ============================================================================
// VIDEO
// ============================================================================

/// Video decoder capabilities for the shared drive loop
pub struct VideoKind {
    format: CodecFormat,
    csd0: Bytes,
    width: u32,
    height: u32,
    surface: Option<Arc<dyn RenderSurface>>,
    listener: Option<Arc<dyn DecodeListener>>,
}

impl CodecKind for VideoKind {
    type Input = PendingBuffer;
    type Event = DecodeEvent;
    type Listener = dyn DecodeListener;

    fn label(&self) -> &'static str {
        "video-decoder"
    }

    fn pending(input: &PendingBuffer) -> &PendingBuffer {
        input
    }

    fn init_format(&mut self) -> CodecResult<MediaFormat> {
        if self.csd0.is_empty() {
            return Err(CodecError::MissingCodecSpecificData {
                codec: self.format.to_string(),
            });
        }
        Ok(
            MediaFormat::video(self.format.mime_type(), self.width, self.height)
                .with_csd0(self.csd0.clone()),
        )
    }

    fn init_endpoint(
        &mut self,
        factory: &dyn EndpointFactory,
        format: &MediaFormat,
    ) -> CodecResult<Box<dyn CodecEndpoint>> {
        factory.create(Direction::Decoder, format, self.surface.clone())
    }

    fn drain_output(
        &mut self,
        endpoint: &mut dyn CodecEndpoint,
        index: usize,
        info: &BufferInfo,
        _events: &mut Vec<DecodeEvent>,
    ) -> CodecResult<()> {
        endpoint.release_output(index, info.size > 0)
    }

    fn format_changed(&mut self, format: MediaFormat, events: &mut Vec<DecodeEvent>) {
        if let (Some(width), Some(height)) = (format.width, format.height) {
            self.width = width;
            self.height = height;
        }
        events.push(DecodeEvent::FormatChanged(format));
    }

    fn released(&mut self) {
        if let Some(surface) = self.surface.take() {
            debug!(surface = surface.id(), "Releasing render target");
            surface.release();
        }
    }

    fn listener(&self) -> Option<Arc<Self::Listener>> {
        self.listener.clone()
    }

    fn dispatch(listener: &Self::Listener, event: DecodeEvent) {
        dispatch_decode(listener, event);
    }
}

/// Decoder for an H.264 elementary stream rendering into a [`RenderSurface`]
pub struct VideoDecoder {
    pipeline: Pipeline<VideoKind>,
}

impl VideoDecoder {
    /// Create an unprepared decoder
    pub fn new(
        format: CodecFormat,
        factory: Arc<dyn EndpointFactory>,
        config: PipelineConfig,
        observer: Arc<dyn StateObserver>,
    ) -> Self {
        let kind = VideoKind {
            format,
            csd0: Bytes::new(),
            width: 0,
            height: 0,
            surface: None,
            listener: None,
        };
        Self {
            pipeline: Pipeline::new(kind, factory, config, observer),
        }
    }

    /// Bind the render target used by the next `prepare`
    pub fn set_render_target(&self, surface: Option<Arc<dyn RenderSurface>>) {
        self.pipeline.update_kind(|kind| kind.surface = surface);
    }

    /// Attach a listener for format changes
    pub fn set_listener(&self, listener: Option<Arc<dyn DecodeListener>>) {
        self.pipeline.update_kind(|kind| kind.listener = listener);
    }

    /// Configure with SPS/PPS `csd0` and frame size, open and start the
    /// decoder. An empty `csd0` leaves it `Failed`.
    pub fn prepare(&self, csd0: &[u8], width: u32, height: u32) -> CodecResult<()> {
        let csd0 = Bytes::copy_from_slice(csd0);
        self.pipeline.prepare(|kind| {
            kind.csd0 = csd0;
            kind.width = width;
            kind.height = height;
        })
    }

    /// Swap the render target of a running decoder.
    ///
    /// Legal only while `Prepared`. Endpoints that cannot retarget in place
    /// are rebuilt around the new target, and the old target is released.
    pub fn switch_surface(&self, surface: Arc<dyn RenderSurface>) -> CodecResult<()> {
        self.pipeline.retarget(surface, |kind, surface, release_previous| {
            if let Some(previous) = kind.surface.replace(surface) {
                if release_previous {
                    previous.release();
                }
            }
        })
    }

    /// Submit one NAL unit (or access unit), replacing any not yet consumed
    pub fn decode(&self, content: &[u8], length: usize, presentation_time_us: i64) {
        self.pipeline
            .submit(PendingBuffer::copy_from(content, length, presentation_time_us));
    }

    /// Request end of stream
    pub fn set_eos(&self) {
        self.pipeline.set_eos();
    }

    /// Restart after `stop`
    pub fn start(&self) -> CodecResult<()> {
        self.pipeline.start()
    }

    /// Stop the endpoint
    pub fn stop(&self) -> CodecResult<()> {
        self.pipeline.stop()
    }

    /// Release a stopped decoder together with its render target
    pub fn release(&self) -> CodecResult<()> {
        self.pipeline.release()
    }

    /// Current lifecycle state
    pub fn state(&self) -> CodecState {
        self.pipeline.state()
    }

    /// Currently bound render target
    pub fn surface(&self) -> Option<Arc<dyn RenderSurface>> {
        self.pipeline.with_kind(|kind| kind.surface.clone())
    }

    /// Current frame size
    pub fn dimensions(&self) -> (u32, u32) {
        self.pipeline.with_kind(|kind| (kind.width, kind.height))
    }

    /// Current endpoint format
    pub fn format(&self) -> Option<MediaFormat> {
        self.pipeline.format()
    }
}
