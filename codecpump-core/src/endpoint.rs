//! Hardware codec endpoint contract
//!
//! An endpoint is an asynchronous dual-queue codec: input buffers are
//! dequeued by index, filled and queued back; output buffers (or format and
//! retry signals) are dequeued with a bounded timeout, read and released.
//! Pipelines treat any implementation as interchangeable.

use crate::error::{CodecError, CodecResult};
use crate::format::MediaFormat;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Per-buffer flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct BufferFlags(u32);

impl BufferFlags {
    /// No flags
    pub const NONE: BufferFlags = BufferFlags(0);
    /// Sync sample / key frame
    pub const KEY_FRAME: BufferFlags = BufferFlags(1);
    /// Buffer carries initialization data
    pub const CODEC_CONFIG: BufferFlags = BufferFlags(2);
    /// Last buffer of the stream
    pub const END_OF_STREAM: BufferFlags = BufferFlags(4);

    /// Raw bit value
    pub fn bits(&self) -> u32 {
        self.0
    }

    /// Whether all bits of `other` are set
    pub fn contains(&self, other: BufferFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for BufferFlags {
    type Output = BufferFlags;

    fn bitor(self, rhs: BufferFlags) -> BufferFlags {
        BufferFlags(self.0 | rhs.0)
    }
}

/// Whether the endpoint encodes or decodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Raw samples in, compressed units out
    Encoder,
    /// Compressed units in, raw samples or rendered frames out
    Decoder,
}

/// Result of an input dequeue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSlot {
    /// Input buffer index ready to be filled
    Ready(usize),
    /// No buffer free within the timeout
    TryAgain,
}

/// Metadata of a produced output buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferInfo {
    /// Start of valid data
    pub offset: usize,
    /// Valid byte count
    pub size: usize,
    /// Presentation timestamp in microseconds
    pub presentation_time_us: i64,
    /// Buffer flags
    pub flags: BufferFlags,
}

impl BufferInfo {
    /// Whether this buffer ends the stream
    pub fn is_end_of_stream(&self) -> bool {
        self.flags.contains(BufferFlags::END_OF_STREAM)
    }
}

/// Result of an output dequeue
#[derive(Debug, Clone, PartialEq)]
pub enum OutputEvent {
    /// Output buffer ready
    Buffer {
        /// Buffer index to read and release
        index: usize,
        /// Buffer metadata
        info: BufferInfo,
    },
    /// Output format changed; following buffers use the new format
    FormatChanged(MediaFormat),
    /// Output buffer set was replaced
    BuffersChanged,
    /// Nothing produced within the timeout
    TryAgain,
}

/// Opaque handle to a video presentation target
pub trait RenderSurface: Send + Sync + fmt::Debug {
    /// Stable identifier
    fn id(&self) -> u64;

    /// Free the target once no endpoint renders into it
    fn release(&self) {}
}

/// Asynchronous dual-queue hardware codec
pub trait CodecEndpoint: Send {
    /// Activate a configured endpoint
    fn start(&mut self) -> CodecResult<()>;

    /// Deactivate; the endpoint may be started again
    fn stop(&mut self) -> CodecResult<()>;

    /// Free all resources
    fn release(&mut self) -> CodecResult<()>;

    /// Wait up to `timeout` for a free input buffer
    fn dequeue_input(&mut self, timeout: Duration) -> CodecResult<InputSlot>;

    /// Capacity in bytes of input buffer `index`
    fn input_capacity(&self, index: usize) -> CodecResult<usize>;

    /// Fill input buffer `index` and hand it to the codec
    fn queue_input(
        &mut self,
        index: usize,
        data: &[u8],
        presentation_time_us: i64,
        flags: BufferFlags,
    ) -> CodecResult<()>;

    /// Wait up to `timeout` for output
    fn dequeue_output(&mut self, timeout: Duration) -> CodecResult<OutputEvent>;

    /// Contents of output buffer `index`
    fn output_buffer(&self, index: usize) -> CodecResult<&[u8]>;

    /// Return output buffer `index`, rendering it to the bound target if `render`
    fn release_output(&mut self, index: usize, render: bool) -> CodecResult<()>;

    /// Current output format, if known
    fn output_format(&self) -> Option<MediaFormat>;

    /// Swap the render target without reconfiguration.
    ///
    /// Endpoints that cannot do this keep the default, which reports
    /// [`CodecError::RetargetUnsupported`].
    fn set_output_surface(&mut self, surface: Arc<dyn RenderSurface>) -> CodecResult<()> {
        let _ = surface;
        Err(CodecError::RetargetUnsupported)
    }
}

/// Creates configured endpoints
pub trait EndpointFactory: Send + Sync {
    /// Open and configure an endpoint for `format`, bound to `surface` when given
    fn create(
        &self,
        direction: Direction,
        format: &MediaFormat,
        surface: Option<Arc<dyn RenderSurface>>,
    ) -> CodecResult<Box<dyn CodecEndpoint>>;
}

#[derive(Debug)]
struct QueuedInput {
    data: Vec<u8>,
    presentation_time_us: i64,
    flags: BufferFlags,
}

/// Software endpoint that emits every queued input buffer unchanged.
///
/// End-of-stream input produces an empty end-of-stream output buffer.
#[derive(Debug)]
pub struct LoopbackEndpoint {
    format: MediaFormat,
    surface: Option<Arc<dyn RenderSurface>>,
    input_capacity: usize,
    input_slots: usize,
    announce_format: bool,
    retarget: bool,
    started: bool,
    released: bool,
    next_input: usize,
    next_output: usize,
    queued: VecDeque<QueuedInput>,
    outputs: HashMap<usize, Vec<u8>>,
    rendered: usize,
}

impl LoopbackEndpoint {
    /// Create an endpoint configured for `format`
    pub fn new(format: MediaFormat, surface: Option<Arc<dyn RenderSurface>>) -> Self {
        Self {
            format,
            surface,
            input_capacity: 64 * 1024,
            input_slots: 4,
            announce_format: false,
            retarget: false,
            started: false,
            released: false,
            next_input: 0,
            next_output: 0,
            queued: VecDeque::new(),
            outputs: HashMap::new(),
            rendered: 0,
        }
    }

    /// Report `format` as the output format, announcing it with a
    /// format-changed event before the first output buffer
    pub fn announcing(mut self, format: MediaFormat) -> Self {
        self.format = format;
        self.announce_format = true;
        self
    }

    /// Number of buffers released with `render = true`
    pub fn rendered(&self) -> usize {
        self.rendered
    }

    fn ensure_running(&self) -> CodecResult<()> {
        if self.released {
            Err(CodecError::NoInstance)
        } else if !self.started {
            Err(CodecError::NotConfigured)
        } else {
            Ok(())
        }
    }
}

impl CodecEndpoint for LoopbackEndpoint {
    fn start(&mut self) -> CodecResult<()> {
        if self.released {
            return Err(CodecError::NoInstance);
        }
        self.started = true;
        Ok(())
    }

    fn stop(&mut self) -> CodecResult<()> {
        if self.released {
            return Err(CodecError::NoInstance);
        }
        self.started = false;
        self.queued.clear();
        Ok(())
    }

    fn release(&mut self) -> CodecResult<()> {
        self.released = true;
        self.started = false;
        self.queued.clear();
        self.outputs.clear();
        Ok(())
    }

    fn dequeue_input(&mut self, _timeout: Duration) -> CodecResult<InputSlot> {
        self.ensure_running()?;
        if self.queued.len() >= self.input_slots {
            return Ok(InputSlot::TryAgain);
        }
        let index = self.next_input;
        self.next_input = self.next_input.wrapping_add(1);
        Ok(InputSlot::Ready(index))
    }

    fn input_capacity(&self, _index: usize) -> CodecResult<usize> {
        Ok(self.input_capacity)
    }

    fn queue_input(
        &mut self,
        _index: usize,
        data: &[u8],
        presentation_time_us: i64,
        flags: BufferFlags,
    ) -> CodecResult<()> {
        self.ensure_running()?;
        if data.len() > self.input_capacity {
            return Err(CodecError::InvalidData {
                reason: format!(
                    "{} bytes exceed input capacity {}",
                    data.len(),
                    self.input_capacity
                ),
            });
        }
        self.queued.push_back(QueuedInput {
            data: data.to_vec(),
            presentation_time_us,
            flags,
        });
        Ok(())
    }

    fn dequeue_output(&mut self, _timeout: Duration) -> CodecResult<OutputEvent> {
        self.ensure_running()?;
        if self.announce_format {
            self.announce_format = false;
            return Ok(OutputEvent::FormatChanged(self.format.clone()));
        }
        let Some(input) = self.queued.pop_front() else {
            return Ok(OutputEvent::TryAgain);
        };
        let index = self.next_output;
        self.next_output = self.next_output.wrapping_add(1);
        let info = BufferInfo {
            offset: 0,
            size: input.data.len(),
            presentation_time_us: input.presentation_time_us,
            flags: input.flags,
        };
        self.outputs.insert(index, input.data);
        Ok(OutputEvent::Buffer { index, info })
    }

    fn output_buffer(&self, index: usize) -> CodecResult<&[u8]> {
        self.outputs
            .get(&index)
            .map(Vec::as_slice)
            .ok_or_else(|| CodecError::InvalidData {
                reason: format!("unknown output buffer {index}"),
            })
    }

    fn release_output(&mut self, index: usize, render: bool) -> CodecResult<()> {
        if self.outputs.remove(&index).is_none() {
            return Err(CodecError::InvalidData {
                reason: format!("unknown output buffer {index}"),
            });
        }
        if render && self.surface.is_some() {
            self.rendered += 1;
        }
        Ok(())
    }

    fn output_format(&self) -> Option<MediaFormat> {
        Some(self.format.clone())
    }

    fn set_output_surface(&mut self, surface: Arc<dyn RenderSurface>) -> CodecResult<()> {
        if !self.retarget {
            return Err(CodecError::RetargetUnsupported);
        }
        debug!(surface = surface.id(), "Loopback endpoint retargeted");
        self.surface = Some(surface);
        Ok(())
    }
}

/// Factory for [`LoopbackEndpoint`]s
#[derive(Debug)]
pub struct LoopbackFactory {
    input_capacity: usize,
    announce_format: bool,
    retarget: bool,
    created: AtomicUsize,
}

impl LoopbackFactory {
    /// Create a factory with default settings
    pub fn new() -> Self {
        Self {
            input_capacity: 64 * 1024,
            announce_format: false,
            retarget: false,
            created: AtomicUsize::new(0),
        }
    }

    /// Input buffer capacity of created endpoints
    pub fn input_capacity(mut self, bytes: usize) -> Self {
        self.input_capacity = bytes;
        self
    }

    /// Emit a format-changed event before the first output buffer
    pub fn announce_format(mut self, announce: bool) -> Self {
        self.announce_format = announce;
        self
    }

    /// Allow in-place render target swaps
    pub fn retarget(mut self, supported: bool) -> Self {
        self.retarget = supported;
        self
    }

    /// Endpoints created so far
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl Default for LoopbackFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl EndpointFactory for LoopbackFactory {
    fn create(
        &self,
        direction: Direction,
        format: &MediaFormat,
        surface: Option<Arc<dyn RenderSurface>>,
    ) -> CodecResult<Box<dyn CodecEndpoint>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        debug!(?direction, mime = %format.mime, "Creating loopback endpoint");
        let mut endpoint = LoopbackEndpoint::new(format.clone(), surface);
        endpoint.input_capacity = self.input_capacity;
        endpoint.announce_format = self.announce_format;
        endpoint.retarget = self.retarget;
        Ok(Box::new(endpoint))
    }
}
