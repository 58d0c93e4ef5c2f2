//! AAC encode pipeline
//!
//! PCM buffers go in through the mailbox; every encoded access unit larger
//! than the noise threshold comes out prefixed with an ADTS header.

use crate::config::PipelineConfig;
use crate::pipeline::{CodecKind, Pipeline};
use bytes::{Bytes, BytesMut};
use codecpump_core::adts::{self, AdtsHeader};
use codecpump_core::{
    BufferInfo, CodecEndpoint, CodecError, CodecFormat, CodecResult, CodecState, Direction,
    EndpointFactory, MediaFormat, PendingBuffer, StateObserver,
};
use std::sync::Arc;
use tracing::trace;

/// Receives ADTS-framed AAC from an [`AacEncoder`]
pub trait EncodeListener: Send + Sync {
    /// One access unit, header included
    fn on_encode(&self, chunk: &[u8]);

    /// End of stream drained; the encoder is being released
    fn on_stop(&self);
}

/// Encoder output delivered after each tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeEvent {
    /// Framed access unit
    Encoded(Bytes),
    /// End of stream reached
    Stopped,
}

/// Encoder capabilities for the shared drive loop
pub struct AacKind {
    format: CodecFormat,
    sample_rate: u32,
    channel_count: u8,
    bit_rate: u32,
    frequency_index: u8,
    min_payload: usize,
    listener: Option<Arc<dyn EncodeListener>>,
}

impl AacKind {
    fn new(format: CodecFormat, min_payload: usize) -> Self {
        Self {
            format,
            sample_rate: 0,
            channel_count: 0,
            bit_rate: 0,
            frequency_index: 0,
            min_payload,
            listener: None,
        }
    }

    fn profile(&self) -> CodecResult<u8> {
        self.format
            .aac_profile()
            .ok_or_else(|| CodecError::unsupported(format!("{} is not an AAC format", self.format)))
    }
}

impl CodecKind for AacKind {
    type Input = PendingBuffer;
    type Event = EncodeEvent;
    type Listener = dyn EncodeListener;

    fn label(&self) -> &'static str {
        "aac-encoder"
    }

    fn pending(input: &PendingBuffer) -> &PendingBuffer {
        input
    }

    fn init_format(&mut self) -> CodecResult<MediaFormat> {
        let profile = self.profile()?;
        self.frequency_index = adts::frequency_index(self.sample_rate)?;
        adts::channel_configuration(self.channel_count)?;
        Ok(
            MediaFormat::audio(self.format.mime_type(), self.sample_rate, self.channel_count)
                .with_aac_profile(profile)
                .with_bit_rate(self.bit_rate),
        )
    }

    fn init_endpoint(
        &mut self,
        factory: &dyn EndpointFactory,
        format: &MediaFormat,
    ) -> CodecResult<Box<dyn CodecEndpoint>> {
        factory.create(Direction::Encoder, format, None)
    }

    fn drain_output(
        &mut self,
        endpoint: &mut dyn CodecEndpoint,
        index: usize,
        info: &BufferInfo,
        events: &mut Vec<EncodeEvent>,
    ) -> CodecResult<()> {
        let framed = if info.size > self.min_payload {
            endpoint
                .output_buffer(index)
                .and_then(|buffer| payload(buffer, info))
                .and_then(|data| self.frame(data))
                .map(Some)
        } else {
            if info.size > 0 {
                trace!(size = info.size, "Encoded chunk below noise threshold dropped");
            }
            Ok(None)
        };
        endpoint.release_output(index, false)?;
        if let Some(chunk) = framed? {
            events.push(EncodeEvent::Encoded(chunk));
        }
        Ok(())
    }

    fn end_of_stream(&mut self, events: &mut Vec<EncodeEvent>) {
        events.push(EncodeEvent::Stopped);
    }

    fn listener(&self) -> Option<Arc<Self::Listener>> {
        self.listener.clone()
    }

    fn dispatch(listener: &Self::Listener, event: EncodeEvent) {
        match event {
            EncodeEvent::Encoded(chunk) => listener.on_encode(&chunk),
            EncodeEvent::Stopped => listener.on_stop(),
        }
    }
}

impl AacKind {
    fn frame(&self, payload: &[u8]) -> CodecResult<Bytes> {
        let header = AdtsHeader::for_payload(
            self.profile()?,
            self.frequency_index,
            self.channel_count,
            payload.len(),
        )?;
        let mut chunk = BytesMut::with_capacity(header.frame_length());
        chunk.extend_from_slice(&header.to_bytes());
        chunk.extend_from_slice(payload);
        Ok(chunk.freeze())
    }
}

pub(crate) fn payload<'a>(buffer: &'a [u8], info: &BufferInfo) -> CodecResult<&'a [u8]> {
    buffer
        .get(info.offset..info.offset + info.size)
        .ok_or_else(|| CodecError::InvalidData {
            reason: format!(
                "output range {}..{} outside buffer of {} bytes",
                info.offset,
                info.offset + info.size,
                buffer.len()
            ),
        })
}

/// AAC encoder producing ADTS-framed access units
pub struct AacEncoder {
    pipeline: Pipeline<AacKind>,
}

impl AacEncoder {
    /// Create an unprepared encoder for an AAC `format`
    pub fn new(
        format: CodecFormat,
        factory: Arc<dyn EndpointFactory>,
        config: PipelineConfig,
        observer: Arc<dyn StateObserver>,
    ) -> Self {
        let kind = AacKind::new(format, config.min_encoded_payload);
        Self {
            pipeline: Pipeline::new(kind, factory, config, observer),
        }
    }

    /// Configure, open and start the encoder.
    ///
    /// Unsupported sample rates or channel counts leave it `Failed`.
    pub fn prepare(
        &self,
        sample_rate: u32,
        channel_count: u8,
        bit_rate: u32,
        listener: Arc<dyn EncodeListener>,
    ) -> CodecResult<()> {
        self.pipeline.prepare(|kind| {
            kind.sample_rate = sample_rate;
            kind.channel_count = channel_count;
            kind.bit_rate = bit_rate;
            kind.listener = Some(listener);
        })
    }

    /// Submit the first `length` bytes of `content`, replacing any buffer not
    /// yet consumed
    pub fn encode(&self, content: &[u8], length: usize, presentation_time_us: i64) {
        self.pipeline
            .submit(PendingBuffer::copy_from(content, length, presentation_time_us));
    }

    /// Request end of stream
    pub fn set_eos(&self) {
        self.pipeline.set_eos();
    }

    /// Whether end of stream was requested
    pub fn is_eos(&self) -> bool {
        self.pipeline.is_eos()
    }

    /// Restart after `stop`
    pub fn start(&self) -> CodecResult<()> {
        self.pipeline.start()
    }

    /// Stop the endpoint
    pub fn stop(&self) -> CodecResult<()> {
        self.pipeline.stop()
    }

    /// Release a stopped encoder
    pub fn release(&self) -> CodecResult<()> {
        self.pipeline.release()
    }

    /// Current lifecycle state
    pub fn state(&self) -> CodecState {
        self.pipeline.state()
    }

    /// Negotiated endpoint format
    pub fn format(&self) -> Option<MediaFormat> {
        self.pipeline.format()
    }

    /// PCM buffers overwritten before the drive loop consumed them
    pub fn dropped_inputs(&self) -> u64 {
        self.pipeline.dropped_inputs()
    }

    /// `(profile, frequency index, channel count)` written into each header
    pub fn header_fields(&self) -> Option<(u8, u8, u8)> {
        self.pipeline.with_kind(|kind| {
            let profile = kind.format.aac_profile()?;
            (kind.channel_count > 0).then_some((profile, kind.frequency_index, kind.channel_count))
        })
    }
}
