//! Video plus speaker coordinator for one incoming stream

use crate::config::PumpConfig;
use crate::error::{PumpError, PumpResult};
use crate::event::{BroadcastObserver, EventStream, PlayerEvent};
use codecpump_core::{
    h264, CodecFormat, CodecState, EndpointFactory, ObserverSet, RenderSurface, StateObserver,
};
use codecpump_media::{
    AudioOutputFactory, PlaybackSink, RenderOptions, VideoDecoder, DEFAULT_HEIGHT, DEFAULT_WIDTH,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};
use uuid::Uuid;

#[cfg(feature = "diagnostics")]
use codecpump_diagnostics::{DebugLogger, TransitionRecorder};

/// Decodes the H.264 and AAC halves of a stream into a render target and
/// an audio output device.
///
/// # Example
/// ```rust,no_run
/// use codecpump::{LoopbackFactory, PumpConfig, StreamPlayer};
/// # use codecpump::AudioOutputFactory;
/// # use std::sync::Arc;
///
/// # fn example(outputs: Arc<dyn AudioOutputFactory>, header: &[u8]) -> codecpump::PumpResult<()> {
/// let player = StreamPlayer::new(PumpConfig::default(), Arc::new(LoopbackFactory::new()), outputs);
/// player.prepare_video_from_stream(header)?;
/// player.prepare_speaker(16000, 1)?;
/// # Ok(())
/// # }
/// ```
pub struct StreamPlayer {
    session_id: Uuid,
    video: VideoDecoder,
    speaker: PlaybackSink,
    video_format: CodecFormat,
    audio_format: CodecFormat,
    render_options: Mutex<Option<RenderOptions>>,
    events: broadcast::Sender<PlayerEvent>,
    #[cfg(feature = "diagnostics")]
    recorder: Arc<TransitionRecorder>,
}

impl StreamPlayer {
    /// Create a player whose pipelines open endpoints from `endpoints` and
    /// play audio through devices from `outputs`
    pub fn new(
        config: PumpConfig,
        endpoints: Arc<dyn EndpointFactory>,
        outputs: Arc<dyn AudioOutputFactory>,
    ) -> Self {
        #[cfg(feature = "diagnostics")]
        {
            if config.debug_logging {
                if let Err(error) = DebugLogger::init_logging() {
                    tracing::warn!(%error, "Log subscriber not installed");
                }
            }
        }

        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let observers = ObserverSet::with_tracing();
        observers.add(Arc::new(BroadcastObserver::new(events.clone())));

        #[cfg(feature = "diagnostics")]
        let recorder = {
            let recorder = Arc::new(TransitionRecorder::new());
            observers.add(recorder.clone());
            recorder
        };

        let observer: Arc<dyn StateObserver> = Arc::new(observers);
        let session_id = Uuid::new_v4();
        info!(%session_id, video = ?config.video_format, audio = ?config.audio_format, "Stream player created");

        Self {
            session_id,
            video: VideoDecoder::new(
                config.video_format,
                endpoints.clone(),
                config.pipeline.clone(),
                observer.clone(),
            ),
            speaker: PlaybackSink::new(
                config.audio_format,
                endpoints,
                outputs,
                config.playback,
                config.pipeline,
                observer,
            ),
            video_format: config.video_format,
            audio_format: config.audio_format,
            render_options: Mutex::new(None),
            events,
            #[cfg(feature = "diagnostics")]
            recorder,
        }
    }

    /// Identifier of this player instance
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    // ========================================================================
    // RENDERING
    // ========================================================================

    /// Replace the render options. A target in the new options is bound to
    /// the video decoder for its next prepare.
    pub fn set_render_options(&self, options: Option<RenderOptions>) {
        if let Some(target) = options.as_ref().and_then(|options| options.target()) {
            self.video.set_render_target(Some(target.clone()));
        }
        *self.render_options.lock() = options;
    }

    /// Current render options
    pub fn render_options(&self) -> Option<RenderOptions> {
        self.render_options.lock().clone()
    }

    /// Move video output to `surface`.
    ///
    /// The render options are replaced with a copy pointing at `surface`. A
    /// running decoder is retargeted; otherwise the surface is used by the
    /// next prepare.
    pub fn switch_target(&self, surface: Arc<dyn RenderSurface>) -> PumpResult<()> {
        {
            let mut options = self.render_options.lock();
            let Some(current) = options.as_ref() else {
                info!("No render options to switch");
                return Err(PumpError::NoRenderOptions);
            };
            *options = Some(current.with_target(surface.clone()));
        }

        if self.video.state() == CodecState::Prepared {
            self.video.switch_surface(surface.clone())?;
        } else {
            self.video.set_render_target(Some(surface.clone()));
        }
        let _ = self.events.send(PlayerEvent::TargetSwitched {
            surface_id: surface.id(),
        });
        Ok(())
    }

    // ========================================================================
    // PREPARATION
    // ========================================================================

    /// Prepare the video decoder with SPS/PPS `csd0`, sized by the render
    /// options or 1280x720 without them
    pub fn prepare_video(&self, csd0: &[u8]) -> PumpResult<()> {
        let (width, height) = self
            .render_options
            .lock()
            .as_ref()
            .map_or((DEFAULT_WIDTH, DEFAULT_HEIGHT), |options| {
                (options.width(), options.height())
            });
        self.video.prepare(csd0, width, height)?;
        Ok(())
    }

    /// Prepare the video decoder from the first bytes of an Annex-B stream
    pub fn prepare_video_from_stream(&self, header: &[u8]) -> PumpResult<()> {
        let csd0 = h264::parameter_sets(header).ok_or_else(|| PumpError::InvalidStream {
            reason: "stream does not start with SPS and PPS".to_string(),
        })?;
        self.prepare_video(csd0)
    }

    /// Open the audio output and prepare the speaker's decoder
    pub fn prepare_speaker(&self, sample_rate: u32, channel_count: u8) -> PumpResult<()> {
        self.speaker.prepare(sample_rate, channel_count)?;
        Ok(())
    }

    /// Whether a stream announcing these formats needs a different player
    pub fn formats_differ(&self, video_format: CodecFormat, audio_format: CodecFormat) -> bool {
        self.video_format != video_format || self.audio_format != audio_format
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    /// Resume both pipelines after `stop`.
    ///
    /// Pipelines already running are left alone. Both are attempted; the
    /// video error wins when both fail.
    pub fn start(&self) -> PumpResult<()> {
        let video = match self.video.state() {
            CodecState::Prepared => {
                debug!("Video decoder already running");
                Ok(())
            }
            _ => self.video.start(),
        };
        let speaker = self.speaker.start();
        video.and(speaker)?;
        Ok(())
    }

    /// Drain the video decoder to end of stream and stop the speaker
    pub fn stop(&self) {
        self.video.set_eos();
        self.speaker.stop();
        let _ = self.events.send(PlayerEvent::Stopped);
        info!(session_id = %self.session_id, "Stream player stopped");
    }

    /// Mute or unmute the speaker
    pub fn set_speaker_enabled(&self, enabled: bool) {
        self.speaker.set_enabled(enabled);
        let _ = self.events.send(PlayerEvent::SpeakerToggled { enabled });
    }

    /// Whether the speaker is audible
    pub fn speaker_enabled(&self) -> bool {
        self.speaker.is_enabled()
    }

    // ========================================================================
    // DATA
    // ========================================================================

    /// Submit one H.264 access unit
    pub fn decode_video(&self, content: &[u8], length: usize, presentation_time_us: i64) {
        self.video.decode(content, length, presentation_time_us);
    }

    /// Submit one AAC access unit with its declared stream parameters
    pub fn decode_audio(
        &self,
        content: &[u8],
        length: usize,
        sample_rate: u32,
        channel_count: u8,
        presentation_time_us: i64,
    ) {
        self.speaker
            .decode(content, length, sample_rate, channel_count, presentation_time_us);
    }

    // ========================================================================
    // STATE
    // ========================================================================

    /// Video decoder lifecycle state
    pub fn video_state(&self) -> CodecState {
        self.video.state()
    }

    /// Speaker decoder lifecycle state
    pub fn speaker_state(&self) -> CodecState {
        self.speaker.decoder_state()
    }

    /// Current video frame size
    pub fn video_dimensions(&self) -> (u32, u32) {
        self.video.dimensions()
    }

    /// `(sample_rate, channel_count)` of the open audio output
    pub fn speaker_params(&self) -> Option<(u32, u8)> {
        self.speaker.output_params()
    }

    /// Subscribe to player events emitted from now on
    pub fn events(&self) -> EventStream {
        EventStream::new(self.events.subscribe())
    }

    /// Recorded lifecycle history of both pipelines
    #[cfg(feature = "diagnostics")]
    pub fn transitions(&self) -> &TransitionRecorder {
        &self.recorder
    }
}

impl std::fmt::Debug for StreamPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamPlayer")
            .field("session_id", &self.session_id)
            .field("video_state", &self.video.state())
            .field("speaker_state", &self.speaker.decoder_state())
            .field("speaker_enabled", &self.speaker.is_enabled())
            .finish()
    }
}
