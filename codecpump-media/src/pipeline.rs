//! Generic codec drive loop
//!
//! A [`Pipeline`] owns one hardware endpoint, one [`StateMachine`] and one
//! input [`Mailbox`]. Producers submit buffers without ever touching the
//! lifecycle lock; a dedicated drive thread moves the pending buffer into the
//! endpoint and drains its output once per tick. What a pipeline encodes or
//! decodes, and what it does with output buffers, is supplied by a
//! [`CodecKind`].
//!
//! Listener callbacks are collected during a tick and dispatched after the
//! lifecycle lock is released, in the order they were produced, so a
//! listener may call back into its pipeline.

use crate::config::PipelineConfig;
use codecpump_core::{
    BufferFlags, BufferInfo, CodecEndpoint, CodecError, CodecResult, CodecState, EndpointFactory,
    InputSlot, Mailbox, MediaFormat, Operation, OutputEvent, PendingBuffer, RenderSurface,
    StateMachine, StateObserver,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Per-codec capabilities plugged into the shared drive loop
pub trait CodecKind: Send + 'static {
    /// Item accepted by [`Pipeline::submit`]
    type Input: Send + 'static;
    /// Notification produced by a tick
    type Event: Send + 'static;
    /// Receiver of notifications
    type Listener: ?Sized + Send + Sync + 'static;

    /// Label used in state events and logs
    fn label(&self) -> &'static str;

    /// Bytes and timestamp carried by a submitted item
    fn pending(input: &Self::Input) -> &PendingBuffer;

    /// Build the endpoint format from the configured parameters
    fn init_format(&mut self) -> CodecResult<MediaFormat>;

    /// Open an endpoint for `format`
    fn init_endpoint(
        &mut self,
        factory: &dyn EndpointFactory,
        format: &MediaFormat,
    ) -> CodecResult<Box<dyn CodecEndpoint>>;

    /// Consume output buffer `index`; must return it to the endpoint
    fn drain_output(
        &mut self,
        endpoint: &mut dyn CodecEndpoint,
        index: usize,
        info: &BufferInfo,
        events: &mut Vec<Self::Event>,
    ) -> CodecResult<()>;

    /// Endpoint reported a new output format
    fn format_changed(&mut self, format: MediaFormat, events: &mut Vec<Self::Event>) {
        let _ = (format, events);
    }

    /// End-of-stream marker seen on the output side
    fn end_of_stream(&mut self, events: &mut Vec<Self::Event>) {
        let _ = events;
    }

    /// Inspect the item about to be queued; `true` rebuilds the endpoint
    /// before it is fed
    fn reconfigure_for(&mut self, input: &Self::Input, events: &mut Vec<Self::Event>) -> bool {
        let _ = (input, events);
        false
    }

    /// The endpoint reached `Release`
    fn released(&mut self) {}

    /// Current listener, if any
    fn listener(&self) -> Option<Arc<Self::Listener>>;

    /// Deliver one event
    fn dispatch(listener: &Self::Listener, event: Self::Event);
}

struct Core<K: CodecKind> {
    machine: StateMachine,
    endpoint: Option<Box<dyn CodecEndpoint>>,
    kind: K,
    format: Option<MediaFormat>,
    staged: Option<K::Input>,
    eos_queued: bool,
    driving: bool,
}

struct Shared<K: CodecKind> {
    core: Mutex<Core<K>>,
    input: Mailbox<K::Input>,
    superseded: AtomicU64,
    eos: AtomicBool,
    factory: Arc<dyn EndpointFactory>,
    config: PipelineConfig,
}

/// One encoder or decoder instance and its drive thread
pub struct Pipeline<K: CodecKind> {
    shared: Arc<Shared<K>>,
}

impl<K: CodecKind> Pipeline<K> {
    /// Create an unprepared pipeline
    pub fn new(
        kind: K,
        factory: Arc<dyn EndpointFactory>,
        config: PipelineConfig,
        observer: Arc<dyn StateObserver>,
    ) -> Self {
        let machine = StateMachine::new(kind.label(), observer);
        Self {
            shared: Arc::new(Shared {
                core: Mutex::new(Core {
                    machine,
                    endpoint: None,
                    kind,
                    format: None,
                    staged: None,
                    eos_queued: false,
                    driving: false,
                }),
                input: Mailbox::new(),
                superseded: AtomicU64::new(0),
                eos: AtomicBool::new(false),
                factory,
                config,
            }),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> CodecState {
        self.shared.core.lock().machine.state()
    }

    /// Format the endpoint was configured with, or last reported
    pub fn format(&self) -> Option<MediaFormat> {
        self.shared.core.lock().format.clone()
    }

    /// Read the codec-kind parameters
    pub fn with_kind<R>(&self, f: impl FnOnce(&K) -> R) -> R {
        f(&self.shared.core.lock().kind)
    }

    /// Change codec-kind parameters without touching the endpoint
    pub fn update_kind<R>(&self, f: impl FnOnce(&mut K) -> R) -> R {
        f(&mut self.shared.core.lock().kind)
    }

    /// Hand an item to the drive loop, replacing any unconsumed one
    pub fn submit(&self, input: K::Input) {
        if self.shared.input.submit(input) {
            trace!(
                dropped = self.shared.input.overwritten(),
                "Pending input overwritten before the drive loop consumed it"
            );
        }
    }

    /// Items overwritten before the endpoint accepted them
    pub fn dropped_inputs(&self) -> u64 {
        self.shared.input.overwritten() + self.shared.superseded.load(Ordering::Relaxed)
    }

    /// Request end of stream; the drive loop queues an end marker
    pub fn set_eos(&self) {
        self.shared.eos.store(true, Ordering::Release);
        debug!("End of stream requested");
    }

    /// Whether end of stream was requested since the last prepare
    pub fn is_eos(&self) -> bool {
        self.shared.eos.load(Ordering::Acquire)
    }

    /// Apply `configure` to the codec kind, open a fresh endpoint and start
    /// the drive loop.
    ///
    /// A live endpoint is stopped and released first. Configuration or
    /// endpoint-creation failures leave the pipeline `Failed`.
    pub fn prepare(&self, configure: impl FnOnce(&mut K)) -> CodecResult<()> {
        let mut core = self.shared.core.lock();
        if core.machine.state() == CodecState::Release {
            return Err(core.machine.reject(Operation::Prepare));
        }
        retire(&mut *core);
        configure(&mut core.kind);
        self.shared.input.clear();
        core.staged = None;
        self.shared.eos.store(false, Ordering::Release);
        core.eos_queued = false;

        if core.machine.state() == CodecState::Release {
            core.machine.begin_rebuild()?;
        } else {
            core.machine.begin_prepare()?;
        }
        open_endpoint(&self.shared, &mut *core, Operation::Prepare)?;
        ensure_driving(&self.shared, &mut *core)?;
        info!(
            codec = core.machine.codec(),
            mime = core.format.as_ref().map(|f| f.mime.as_str()).unwrap_or_default(),
            "Codec prepared"
        );
        Ok(())
    }

    /// Activate the endpoint; legal from `Preparing` or `Stop`
    pub fn start(&self) -> CodecResult<()> {
        let mut core = self.shared.core.lock();
        {
            let Core {
                machine, endpoint, ..
            } = &mut *core;
            machine.start(endpoint.as_mut())?;
        }
        ensure_driving(&self.shared, &mut *core)
    }

    /// Deactivate the endpoint; legal only from `Prepared`
    pub fn stop(&self) -> CodecResult<()> {
        let mut core = self.shared.core.lock();
        let Core {
            machine, endpoint, ..
        } = &mut *core;
        machine.stop(endpoint.as_mut())
    }

    /// Free the endpoint; legal only from `Stop`. The pipeline is not
    /// reusable afterwards.
    pub fn release(&self) -> CodecResult<()> {
        let mut core = self.shared.core.lock();
        if core.machine.state() != CodecState::Stop {
            return Err(core.machine.reject(Operation::Release));
        }
        release_endpoint(&mut *core)
    }

    /// Swap the render target of a running pipeline.
    ///
    /// Tries an in-place retarget first; endpoints that cannot do that are
    /// stopped, released and rebuilt around the new target. `bind` records
    /// the target in the codec kind and reports whether the previous one
    /// should be released.
    pub(crate) fn retarget(
        &self,
        surface: Arc<dyn RenderSurface>,
        bind: impl FnOnce(&mut K, Arc<dyn RenderSurface>, bool),
    ) -> CodecResult<()> {
        let mut core = self.shared.core.lock();
        if core.machine.state() != CodecState::Prepared {
            return Err(core.machine.reject(Operation::SwitchSurface));
        }
        let in_place = match core.endpoint.as_mut() {
            Some(endpoint) => endpoint.set_output_surface(surface.clone()),
            None => Err(CodecError::NoInstance),
        };
        match in_place {
            Ok(()) => {
                bind(&mut core.kind, surface, false);
                info!(codec = core.machine.codec(), "Render target swapped in place");
                Ok(())
            }
            Err(reason) => {
                debug!(
                    codec = core.machine.codec(),
                    %reason,
                    "In-place retarget unavailable, rebuilding endpoint"
                );
                rebuild(&self.shared, &mut *core, |kind| bind(kind, surface, true))?;
                info!(codec = core.machine.codec(), "Render target swapped by rebuild");
                Ok(())
            }
        }
    }
}

impl<K: CodecKind> Drop for Pipeline<K> {
    fn drop(&mut self) {
        let mut core = self.shared.core.lock();
        let Core {
            machine,
            endpoint,
            kind,
            ..
        } = &mut *core;
        if shut_down(machine, endpoint) {
            kind.released();
        }
    }
}

/// Take down the current endpoint before a re-prepare
fn retire<K: CodecKind>(core: &mut Core<K>) {
    let Core {
        machine, endpoint, ..
    } = core;
    shut_down(machine, endpoint);
}

/// Stop and release `endpoint` through the state machine, best effort.
///
/// An endpoint left behind by a failed stop is released directly so the
/// hardware handle is never dropped unreleased. Returns whether an endpoint
/// was taken down.
fn shut_down(machine: &mut StateMachine, endpoint: &mut Option<Box<dyn CodecEndpoint>>) -> bool {
    if machine.state() == CodecState::Prepared {
        let _ = machine.stop(endpoint.as_mut());
    }
    let mut released = false;
    if machine.state() == CodecState::Stop {
        released = true;
        let _ = machine.release(endpoint.as_mut());
    }
    let Some(mut stale) = endpoint.take() else {
        return false;
    };
    if !released {
        if let Err(error) = stale.release() {
            warn!(codec = machine.codec(), %error, "Endpoint release after failed teardown");
        }
    }
    true
}

fn release_endpoint<K: CodecKind>(core: &mut Core<K>) -> CodecResult<()> {
    let Core {
        machine,
        endpoint,
        kind,
        ..
    } = core;
    let result = machine.release(endpoint.as_mut());
    *endpoint = None;
    kind.released();
    result
}

fn open_endpoint<K: CodecKind>(
    shared: &Shared<K>,
    core: &mut Core<K>,
    operation: Operation,
) -> CodecResult<()> {
    let format = match core.kind.init_format() {
        Ok(format) => format,
        Err(error) => {
            core.machine.fail(operation, &error);
            return Err(error);
        }
    };
    let endpoint = match core.kind.init_endpoint(shared.factory.as_ref(), &format) {
        Ok(endpoint) => endpoint,
        Err(error) => {
            core.machine.fail(operation, &error);
            return Err(error);
        }
    };
    core.format = Some(format);
    core.endpoint = Some(endpoint);
    let Core {
        machine, endpoint, ..
    } = core;
    machine.start(endpoint.as_mut())
}

/// Full `Stop -> Release -> Preparing -> Prepared` cycle under the lock
fn rebuild<K: CodecKind>(
    shared: &Shared<K>,
    core: &mut Core<K>,
    update: impl FnOnce(&mut K),
) -> CodecResult<()> {
    retire(core);
    update(&mut core.kind);
    if core.machine.state() == CodecState::Release {
        core.machine.begin_rebuild()?;
    } else {
        core.machine.begin_prepare()?;
    }
    core.eos_queued = false;
    open_endpoint(shared, core, Operation::Rebuild)
}

fn ensure_driving<K: CodecKind>(shared: &Arc<Shared<K>>, core: &mut Core<K>) -> CodecResult<()> {
    if core.driving || !core.machine.state().is_active() {
        return Ok(());
    }
    let worker = Arc::clone(shared);
    thread::Builder::new()
        .name(format!("{}-drive", core.machine.codec()))
        .spawn(move || drive(worker))
        .map_err(|e| CodecError::Hardware {
            reason: format!("failed to spawn drive thread: {e}"),
        })?;
    core.driving = true;
    Ok(())
}

fn drive<K: CodecKind>(shared: Arc<Shared<K>>) {
    let idle = shared.config.idle_backoff_duration();
    debug!("Drive loop started");
    loop {
        let mut events = Vec::new();
        let (listener, busy) = {
            let mut core = shared.core.lock();
            if !core.machine.state().is_active() {
                core.driving = false;
                debug!(
                    codec = core.machine.codec(),
                    state = %core.machine.state(),
                    "Drive loop finished"
                );
                break;
            }
            let busy = tick(&shared, &mut *core, &mut events);
            (core.kind.listener(), busy)
        };

        if let Some(listener) = listener {
            for event in events {
                K::dispatch(&listener, event);
            }
        }
        if !busy {
            thread::sleep(idle);
        }
    }
}

/// One pump iteration. Returns whether any data moved.
fn tick<K: CodecKind>(shared: &Shared<K>, core: &mut Core<K>, events: &mut Vec<K::Event>) -> bool {
    // An item waiting on a full endpoint yields to a newer submission
    if let Some(newer) = shared.input.take() {
        if core.staged.replace(newer).is_some() {
            shared.superseded.fetch_add(1, Ordering::Relaxed);
            trace!("Staged input superseded before the endpoint accepted it");
        }
    }
    let reconfigure = match core.staged.as_ref() {
        Some(input) if !core.eos_queued && !shared.eos.load(Ordering::Acquire) => {
            core.kind.reconfigure_for(input, events)
        }
        _ => false,
    };
    if reconfigure {
        if let Err(error) = rebuild(shared, core, |_| {}) {
            warn!(codec = core.machine.codec(), %error, "Endpoint rebuild failed");
            return true;
        }
    }

    let timeout = shared.config.dequeue_timeout_duration();
    let Core {
        machine,
        endpoint,
        kind,
        format,
        staged,
        eos_queued,
        ..
    } = core;
    let Some(active) = endpoint.as_mut() else {
        return false;
    };

    let mut busy = match feed_input::<K>(&mut **active, shared, staged, eos_queued, timeout) {
        Ok(moved) => moved,
        Err(error) => {
            debug!(codec = machine.codec(), %error, "Input queue error ignored for this tick");
            false
        }
    };

    for _ in 0..shared.config.max_outputs_per_tick {
        match active.dequeue_output(timeout) {
            Ok(OutputEvent::Buffer { index, info }) => {
                busy = true;
                if let Err(error) = kind.drain_output(&mut **active, index, &info, events) {
                    debug!(codec = machine.codec(), %error, "Output buffer dropped");
                }
                if info.is_end_of_stream() {
                    debug!(codec = machine.codec(), "End of stream reached");
                    kind.end_of_stream(events);
                    shut_down(machine, endpoint);
                    kind.released();
                    return true;
                }
            }
            Ok(OutputEvent::FormatChanged(changed)) => {
                busy = true;
                debug!(codec = machine.codec(), ?changed, "Output format changed");
                *format = Some(changed.clone());
                kind.format_changed(changed, events);
            }
            Ok(OutputEvent::BuffersChanged) => {}
            Ok(OutputEvent::TryAgain) => break,
            Err(error) => {
                debug!(codec = machine.codec(), %error, "Output queue error ignored for this tick");
                break;
            }
        }
    }
    busy
}

fn feed_input<K: CodecKind>(
    endpoint: &mut dyn CodecEndpoint,
    shared: &Shared<K>,
    staged: &mut Option<K::Input>,
    eos_queued: &mut bool,
    timeout: Duration,
) -> CodecResult<bool> {
    if *eos_queued {
        return Ok(false);
    }
    let end_requested = shared.eos.load(Ordering::Acquire);
    if !end_requested && staged.is_none() {
        return Ok(false);
    }
    let index = match endpoint.dequeue_input(timeout)? {
        InputSlot::Ready(index) => index,
        InputSlot::TryAgain => return Ok(false),
    };

    if end_requested {
        shared.input.clear();
        *staged = None;
        endpoint.queue_input(index, &[], 0, BufferFlags::END_OF_STREAM)?;
        *eos_queued = true;
        return Ok(true);
    }

    let Some(input) = staged.take() else {
        endpoint.queue_input(index, &[], 0, BufferFlags::NONE)?;
        return Ok(false);
    };
    let buffer = K::pending(&input);
    let capacity = endpoint.input_capacity(index)?;
    let length = buffer.len().min(capacity);
    if length < buffer.len() {
        trace!(
            truncated = buffer.len() - length,
            "Input larger than endpoint buffer"
        );
    }
    endpoint.queue_input(
        index,
        &buffer.data()[..length],
        buffer.presentation_time_us(),
        BufferFlags::NONE,
    )?;
    Ok(true)
}
