//! Shared fakes for the player integration tests

#![allow(dead_code)]

use codecpump::*;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
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

/// SPS, PPS, then the start of an IDR slice
pub const STREAM_HEADER: [u8; 22] = [
    0x00, 0x00, 0x00, 0x01, 0x67, 0x42, 0x00, 0x1F, 0x00, 0x00, 0x00, 0x01, 0x68, 0xCE, 0x3C, 0x80,
    0x00, 0x00, 0x00, 0x01, 0x65, 0x88,
];

pub fn fast_config() -> PumpConfig {
    PumpConfig::default().pipeline(
        PipelineConfig::default()
            .dequeue_timeout(Duration::from_millis(1))
            .idle_backoff(Duration::from_millis(1)),
    )
}

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

/// Output device that accepts everything
struct SilentOutput {
    sample_rate: u32,
    channel_count: u8,
    written: Arc<AtomicU64>,
    released: Arc<AtomicBool>,
}

impl AudioOutputDevice for SilentOutput {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channel_count(&self) -> u8 {
        self.channel_count
    }

    fn write(&mut self, data: &[u8]) -> MediaResult<usize> {
        self.written.fetch_add(data.len() as u64, Ordering::SeqCst);
        Ok(data.len())
    }

    fn play(&mut self) -> MediaResult<()> {
        Ok(())
    }

    fn pause(&mut self) -> MediaResult<()> {
        Ok(())
    }

    fn flush(&mut self) -> MediaResult<()> {
        Ok(())
    }

    fn stop(&mut self) -> MediaResult<()> {
        Ok(())
    }

    fn release(&mut self) -> MediaResult<()> {
        self.released.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct SilentOutputFactory {
    pub opened: Mutex<Vec<(u32, u8)>>,
    pub written: Arc<AtomicU64>,
    pub released: Arc<AtomicBool>,
}

impl SilentOutputFactory {
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::SeqCst)
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

impl AudioOutputFactory for SilentOutputFactory {
    fn min_buffer_size(&self, _sample_rate: u32, _channel_count: u8) -> MediaResult<usize> {
        Ok(1024)
    }

    fn open(
        &self,
        sample_rate: u32,
        channel_count: u8,
        _buffer_bytes: usize,
    ) -> MediaResult<Box<dyn AudioOutputDevice>> {
        self.opened.lock().push((sample_rate, channel_count));
        Ok(Box::new(SilentOutput {
            sample_rate,
            channel_count,
            written: self.written.clone(),
            released: self.released.clone(),
        }))
    }
}

pub fn player(endpoints: LoopbackFactory) -> (StreamPlayer, Arc<SilentOutputFactory>) {
    let outputs = Arc::new(SilentOutputFactory::default());
    let player = StreamPlayer::new(fast_config(), Arc::new(endpoints), outputs.clone());
    (player, outputs)
}
