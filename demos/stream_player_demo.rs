//! Stream player walkthrough
//!
//! Runs a player against the software loopback endpoint and an output
//! device that only counts bytes:
//! - prepare video from an Annex-B stream header
//! - prepare the speaker and feed AAC access units
//! - switch the render target while decoding
//! - stop, and print the recorded lifecycle

use codecpump::{
    AudioOutputDevice, AudioOutputFactory, LoopbackFactory, MediaResult, PumpConfig,
    RenderOptions, RenderSurface, StreamPlayer,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug)]
struct Window(u64);

impl RenderSurface for Window {
    fn id(&self) -> u64 {
        self.0
    }
}

struct CountingOutput {
    sample_rate: u32,
    channel_count: u8,
    written: Arc<AtomicU64>,
}

impl AudioOutputDevice for CountingOutput {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channel_count(&self) -> u8 {
        self.channel_count
    }

    fn write(&mut self, data: &[u8]) -> MediaResult<usize> {
        self.written.fetch_add(data.len() as u64, Ordering::Relaxed);
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
        Ok(())
    }
}

#[derive(Default)]
struct CountingOutputs {
    written: Arc<AtomicU64>,
}

impl AudioOutputFactory for CountingOutputs {
    fn min_buffer_size(&self, _sample_rate: u32, _channel_count: u8) -> MediaResult<usize> {
        Ok(2048)
    }

    fn open(
        &self,
        sample_rate: u32,
        channel_count: u8,
        _buffer_bytes: usize,
    ) -> MediaResult<Box<dyn AudioOutputDevice>> {
        Ok(Box::new(CountingOutput {
            sample_rate,
            channel_count,
            written: self.written.clone(),
        }))
    }
}

const STREAM_HEADER: [u8; 16] = [
    0x00, 0x00, 0x00, 0x01, 0x67, 0x42, 0x00, 0x1F, 0x00, 0x00, 0x00, 0x01, 0x68, 0xCE, 0x3C, 0x80,
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🎬 codecpump stream player demo");
    println!("================================");

    let outputs = Arc::new(CountingOutputs::default());
    let written = outputs.written.clone();
    let config = PumpConfig::default().debug_logging(true);
    let player = StreamPlayer::new(config, Arc::new(LoopbackFactory::new()), outputs);
    let mut events = player.events();
    println!("📋 Session {}", player.session_id());

    player.set_render_options(Some(RenderOptions::with_size(
        Some(Arc::new(Window(1))),
        1920,
        1080,
    )));
    player.prepare_video_from_stream(&STREAM_HEADER)?;
    player.prepare_speaker(44100, 2)?;
    println!(
        "✅ Video {:?} at {:?}, speaker {:?}",
        player.video_state(),
        player.video_dimensions(),
        player.speaker_state()
    );

    for frame in 0..20i64 {
        player.decode_video(&[0x00, 0x00, 0x00, 0x01, 0x65, frame as u8], 6, frame * 33_333);
        player.decode_audio(&[frame as u8; 512], 512, 44100, 2, frame * 23_220);
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    player.switch_target(Arc::new(Window(2)))?;
    println!("🔀 Render target switched, video {:?}", player.video_state());

    player.stop();
    tokio::time::sleep(Duration::from_millis(50)).await;
    println!("🔊 {} PCM bytes played", written.load(Ordering::Relaxed));

    while let Ok(Some(event)) = events.try_next() {
        println!("📡 {}: {:?}", event.event_type(), event);
    }

    #[cfg(feature = "diagnostics")]
    println!("🗂️  {}", player.transitions().to_json()?);

    Ok(())
}
