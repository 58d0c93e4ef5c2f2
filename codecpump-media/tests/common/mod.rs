//! Shared fakes for the media integration tests

#![allow(dead_code)]

use codecpump_core::*;
use codecpump_media::*;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Poll `condition` until it holds or `timeout` elapses
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

pub const WAIT: Duration = Duration::from_secs(3);

pub fn fast_config() -> PipelineConfig {
    PipelineConfig::default()
        .dequeue_timeout(Duration::from_millis(1))
        .idle_backoff(Duration::from_millis(1))
}

// ============================================================================
// OBSERVERS AND LISTENERS
// ============================================================================

#[derive(Default)]
pub struct Recorder {
    events: Mutex<Vec<StateEvent>>,
}

impl Recorder {
    pub fn transitions(&self) -> Vec<(CodecState, CodecState)> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                StateEvent::Transition { from, to, .. } => Some((*from, *to)),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, event_type: &str) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|event| event.event_type() == event_type)
            .count()
    }
}

impl StateObserver for Recorder {
    fn on_event(&self, event: &StateEvent) {
        self.events.lock().push(event.clone());
    }
}

#[derive(Default)]
pub struct EncodeCollector {
    pub chunks: Mutex<Vec<Vec<u8>>>,
    pub stops: AtomicUsize,
}

impl EncodeListener for EncodeCollector {
    fn on_encode(&self, chunk: &[u8]) {
        self.chunks.lock().push(chunk.to_vec());
    }

    fn on_stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct DecodeCollector {
    pub chunks: Mutex<Vec<Vec<u8>>>,
    pub formats: Mutex<Vec<MediaFormat>>,
}

impl DecodeListener for DecodeCollector {
    fn on_decode(&self, chunk: &[u8]) {
        self.chunks.lock().push(chunk.to_vec());
    }

    fn on_format_changed(&self, format: &MediaFormat) {
        self.formats.lock().push(format.clone());
    }
}

#[derive(Default)]
pub struct RecordCollector {
    pub chunks: Mutex<Vec<Vec<u8>>>,
    pub turn_offs: AtomicUsize,
}

impl RecordListener for RecordCollector {
    fn on_speaking(&self, chunk: &[u8]) {
        self.chunks.lock().push(chunk.to_vec());
    }

    fn on_turn_off(&self) {
        self.turn_offs.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// ENDPOINTS AND SURFACES
// ============================================================================

#[derive(Debug)]
pub struct FakeSurface {
    id: u64,
    released: AtomicBool,
}

impl FakeSurface {
    pub fn new(id: u64) -> Arc<Self> {
        Arc::new(Self {
            id,
            released: AtomicBool::new(false),
        })
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

impl RenderSurface for FakeSurface {
    fn id(&self) -> u64 {
        self.id
    }

    fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

/// Endpoint factory that always fails
pub struct FailingFactory;

impl EndpointFactory for FailingFactory {
    fn create(
        &self,
        _direction: Direction,
        format: &MediaFormat,
        _surface: Option<Arc<dyn RenderSurface>>,
    ) -> CodecResult<Box<dyn CodecEndpoint>> {
        Err(CodecError::EndpointCreation {
            codec: format.mime.clone(),
            reason: "no hardware codec".to_string(),
        })
    }
}

/// Loopback endpoints that announce a fixed output format first
pub struct AnnouncingFactory {
    pub announced: MediaFormat,
    pub created: AtomicUsize,
}

impl AnnouncingFactory {
    pub fn new(announced: MediaFormat) -> Arc<Self> {
        Arc::new(Self {
            announced,
            created: AtomicUsize::new(0),
        })
    }
}

impl EndpointFactory for AnnouncingFactory {
    fn create(
        &self,
        _direction: Direction,
        format: &MediaFormat,
        surface: Option<Arc<dyn RenderSurface>>,
    ) -> CodecResult<Box<dyn CodecEndpoint>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(
            LoopbackEndpoint::new(format.clone(), surface).announcing(self.announced.clone()),
        ))
    }
}

/// Loopback endpoint whose `stop` always fails
pub struct StopFailingEndpoint {
    inner: LoopbackEndpoint,
    released: Arc<AtomicBool>,
}

impl CodecEndpoint for StopFailingEndpoint {
    fn start(&mut self) -> CodecResult<()> {
        self.inner.start()
    }

    fn stop(&mut self) -> CodecResult<()> {
        Err(CodecError::Hardware {
            reason: "stop rejected".to_string(),
        })
    }

    fn release(&mut self) -> CodecResult<()> {
        self.released.store(true, Ordering::SeqCst);
        self.inner.release()
    }

    fn dequeue_input(&mut self, timeout: Duration) -> CodecResult<InputSlot> {
        self.inner.dequeue_input(timeout)
    }

    fn input_capacity(&self, index: usize) -> CodecResult<usize> {
        self.inner.input_capacity(index)
    }

    fn queue_input(
        &mut self,
        index: usize,
        data: &[u8],
        presentation_time_us: i64,
        flags: BufferFlags,
    ) -> CodecResult<()> {
        self.inner
            .queue_input(index, data, presentation_time_us, flags)
    }

    fn dequeue_output(&mut self, timeout: Duration) -> CodecResult<OutputEvent> {
        self.inner.dequeue_output(timeout)
    }

    fn output_buffer(&self, index: usize) -> CodecResult<&[u8]> {
        self.inner.output_buffer(index)
    }

    fn release_output(&mut self, index: usize, render: bool) -> CodecResult<()> {
        self.inner.release_output(index, render)
    }

    fn output_format(&self) -> Option<MediaFormat> {
        self.inner.output_format()
    }
}

/// Hands out [`StopFailingEndpoint`]s sharing one release flag
#[derive(Default)]
pub struct StopFailingFactory {
    pub released: Arc<AtomicBool>,
}

impl StopFailingFactory {
    pub fn was_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

impl EndpointFactory for StopFailingFactory {
    fn create(
        &self,
        _direction: Direction,
        format: &MediaFormat,
        surface: Option<Arc<dyn RenderSurface>>,
    ) -> CodecResult<Box<dyn CodecEndpoint>> {
        Ok(Box::new(StopFailingEndpoint {
            inner: LoopbackEndpoint::new(format.clone(), surface),
            released: self.released.clone(),
        }))
    }
}

/// Loopback endpoint logging `(sample_rate, channel_count, first byte)` for
/// every non-empty input it accepts
pub struct RecordingEndpoint {
    inner: LoopbackEndpoint,
    params: (u32, u8),
    log: Arc<Mutex<Vec<(u32, u8, u8)>>>,
}

impl CodecEndpoint for RecordingEndpoint {
    fn start(&mut self) -> CodecResult<()> {
        self.inner.start()
    }

    fn stop(&mut self) -> CodecResult<()> {
        self.inner.stop()
    }

    fn release(&mut self) -> CodecResult<()> {
        self.inner.release()
    }

    fn dequeue_input(&mut self, timeout: Duration) -> CodecResult<InputSlot> {
        self.inner.dequeue_input(timeout)
    }

    fn input_capacity(&self, index: usize) -> CodecResult<usize> {
        self.inner.input_capacity(index)
    }

    fn queue_input(
        &mut self,
        index: usize,
        data: &[u8],
        presentation_time_us: i64,
        flags: BufferFlags,
    ) -> CodecResult<()> {
        if let Some(&first) = data.first() {
            let (sample_rate, channel_count) = self.params;
            self.log.lock().push((sample_rate, channel_count, first));
        }
        self.inner
            .queue_input(index, data, presentation_time_us, flags)
    }

    fn dequeue_output(&mut self, timeout: Duration) -> CodecResult<OutputEvent> {
        self.inner.dequeue_output(timeout)
    }

    fn output_buffer(&self, index: usize) -> CodecResult<&[u8]> {
        self.inner.output_buffer(index)
    }

    fn release_output(&mut self, index: usize, render: bool) -> CodecResult<()> {
        self.inner.release_output(index, render)
    }

    fn output_format(&self) -> Option<MediaFormat> {
        self.inner.output_format()
    }
}

/// Hands out [`RecordingEndpoint`]s sharing one input log
#[derive(Default)]
pub struct RecordingFactory {
    pub log: Arc<Mutex<Vec<(u32, u8, u8)>>>,
    pub created: AtomicUsize,
}

impl RecordingFactory {
    pub fn inputs(&self) -> Vec<(u32, u8, u8)> {
        self.log.lock().clone()
    }
}

impl EndpointFactory for RecordingFactory {
    fn create(
        &self,
        _direction: Direction,
        format: &MediaFormat,
        surface: Option<Arc<dyn RenderSurface>>,
    ) -> CodecResult<Box<dyn CodecEndpoint>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(RecordingEndpoint {
            inner: LoopbackEndpoint::new(format.clone(), surface),
            params: format.audio_params().unwrap_or_default(),
            log: self.log.clone(),
        }))
    }
}

// ============================================================================
// AUDIO DEVICES
// ============================================================================

/// Input device producing a byte ramp, `chunk` bytes per read
pub struct FakeInput {
    chunk: usize,
    next: u8,
    // scripted results returned before regular reads
    script: VecDeque<isize>,
    pub log: Arc<Mutex<Vec<String>>>,
}

impl AudioInputDevice for FakeInput {
    fn start_recording(&mut self) -> MediaResult<()> {
        self.log.lock().push("start".to_string());
        Ok(())
    }

    fn read(&mut self, buffer: &mut [u8]) -> isize {
        thread::sleep(Duration::from_millis(1));
        if let Some(result) = self.script.pop_front() {
            if result <= 0 {
                return result;
            }
        }
        let count = self.chunk.min(buffer.len());
        for byte in &mut buffer[..count] {
            *byte = self.next;
            self.next = self.next.wrapping_add(1);
        }
        count as isize
    }

    fn stop(&mut self) -> MediaResult<()> {
        self.log.lock().push("stop".to_string());
        Ok(())
    }

    fn release(&mut self) -> MediaResult<()> {
        self.log.lock().push("release".to_string());
        Ok(())
    }
}

pub struct FakeInputFactory {
    pub minimum: usize,
    pub chunk: usize,
    pub rejected_sizes: Vec<usize>,
    pub script: Vec<isize>,
    pub opened: Mutex<Vec<usize>>,
    pub log: Arc<Mutex<Vec<String>>>,
}

impl FakeInputFactory {
    pub fn new(minimum: usize, chunk: usize) -> Self {
        Self {
            minimum,
            chunk,
            rejected_sizes: Vec::new(),
            script: Vec::new(),
            opened: Mutex::new(Vec::new()),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn opens(&self) -> Vec<usize> {
        self.opened.lock().clone()
    }
}

impl AudioInputFactory for FakeInputFactory {
    fn min_buffer_size(&self, _sample_rate: u32, _channel_count: u8) -> MediaResult<usize> {
        Ok(self.minimum)
    }

    fn open(
        &self,
        _sample_rate: u32,
        _channel_count: u8,
        buffer_bytes: usize,
    ) -> MediaResult<Box<dyn AudioInputDevice>> {
        self.opened.lock().push(buffer_bytes);
        if self.rejected_sizes.contains(&buffer_bytes) {
            return Err(MediaError::InvalidConfiguration {
                message: format!("buffer size {buffer_bytes} rejected"),
            });
        }
        Ok(Box::new(FakeInput {
            chunk: self.chunk,
            next: 0,
            script: self.script.iter().copied().collect(),
            log: self.log.clone(),
        }))
    }
}

/// Output device recording every call as `"<id>:<call>"`
pub struct FakeOutput {
    id: usize,
    sample_rate: u32,
    channel_count: u8,
    fail_teardown: bool,
    log: Arc<Mutex<Vec<String>>>,
}

impl FakeOutput {
    fn record(&self, call: &str) {
        self.log.lock().push(format!("{}:{call}", self.id));
    }

    fn teardown_result(&self) -> MediaResult<()> {
        if self.fail_teardown {
            Err(MediaError::device("device gone"))
        } else {
            Ok(())
        }
    }
}

impl AudioOutputDevice for FakeOutput {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channel_count(&self) -> u8 {
        self.channel_count
    }

    fn write(&mut self, data: &[u8]) -> MediaResult<usize> {
        self.record("write");
        Ok(data.len())
    }

    fn play(&mut self) -> MediaResult<()> {
        self.record("play");
        Ok(())
    }

    fn pause(&mut self) -> MediaResult<()> {
        self.record("pause");
        self.teardown_result()
    }

    fn flush(&mut self) -> MediaResult<()> {
        self.record("flush");
        self.teardown_result()
    }

    fn stop(&mut self) -> MediaResult<()> {
        self.record("stop");
        self.teardown_result()
    }

    fn release(&mut self) -> MediaResult<()> {
        self.record("release");
        self.teardown_result()
    }
}

pub struct FakeOutputFactory {
    pub minimum: usize,
    pub fail_teardown: bool,
    pub opened: Mutex<Vec<(u32, u8, usize)>>,
    pub log: Arc<Mutex<Vec<String>>>,
}

impl FakeOutputFactory {
    pub fn new(minimum: usize) -> Self {
        Self {
            minimum,
            fail_teardown: false,
            opened: Mutex::new(Vec::new()),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn opens(&self) -> Vec<(u32, u8, usize)> {
        self.opened.lock().clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.log.lock().clone()
    }
}

impl AudioOutputFactory for FakeOutputFactory {
    fn min_buffer_size(&self, _sample_rate: u32, _channel_count: u8) -> MediaResult<usize> {
        Ok(self.minimum)
    }

    fn open(
        &self,
        sample_rate: u32,
        channel_count: u8,
        buffer_bytes: usize,
    ) -> MediaResult<Box<dyn AudioOutputDevice>> {
        let mut opened = self.opened.lock();
        opened.push((sample_rate, channel_count, buffer_bytes));
        Ok(Box::new(FakeOutput {
            id: opened.len(),
            sample_rate,
            channel_count,
            fail_teardown: self.fail_teardown,
            log: self.log.clone(),
        }))
    }
}
