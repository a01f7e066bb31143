//! Loopback call transport
//!
//! In-process [`TransportSink`] that plays the role of the network call
//! engine without a network. Joins complete on a separate thread after a
//! configurable latency, pushed frames are recorded instead of encoded, and
//! remote participants are simulated by injecting events from any thread.
//!
//! Sends can be stalled to model a congested uplink: a stalled
//! `push_frame` blocks the caller until sends resume or the link leaves
//! the joined phase.

use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

use crate::call::events::EventSink;
use crate::config::types::{ClientRole, RemoteRenderMode};
use crate::error::{PipelineError, Result};
use crate::render::frame::CompositedFrame;
use crate::render::surface::SurfaceHandle;
use crate::transport::{
    ChannelRef, LeaveReason, ParticipantId, TransportEvent, TransportSettings, TransportSink,
};

/// Join was refused because the link is already joining or joined
const ERR_JOIN_REJECTED: i32 = -17;
/// Operation requires `configure` first
const ERR_NOT_INITIALIZED: i32 = -7;
/// Engine instance has been destroyed
const ERR_DESTROYED: i32 = -3;
/// Remote view requested while not in a channel
const ERR_NOT_IN_CHANNEL: i32 = -113;

/// Sequences kept for inspection
const SEQUENCE_HISTORY: usize = 4096;

/// Channel membership of the loopback link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkPhase {
    /// Not in a channel
    Idle,
    /// Join requested, not yet confirmed
    Joining,
    /// In a channel
    Joined,
}

/// Loopback transport statistics
#[derive(Debug, Clone, Default)]
pub struct LoopbackStats {
    /// Frames accepted for transmission
    pub frames_sent: u64,
    /// Frames ignored because the link was not joined
    pub frames_ignored: u64,
    /// Sequence numbers of sent frames, oldest first
    pub sent_sequences: VecDeque<u64>,
    /// Remote views currently bound
    pub remote_views: usize,
    /// Completed joins
    pub joins: u64,
}

struct LinkState {
    phase: LinkPhase,
    settings: Option<TransportSettings>,
    external_source: bool,
    role: Option<ClientRole>,
    channel: Option<ChannelRef>,
    join_generation: u64,
    stalled: bool,
    destroyed: bool,
    remote_views: HashMap<ParticipantId, SurfaceHandle>,
    last_frame: Option<CompositedFrame>,
    stats: LoopbackStats,
}

struct Shared {
    state: Mutex<LinkState>,
    send_ready: Condvar,
    sink: Mutex<Option<EventSink<TransportEvent>>>,
    join_latency: Duration,
    send_delay: Mutex<Duration>,
}

impl Shared {
    fn emit(&self, event: TransportEvent) -> bool {
        match self.sink.lock().as_ref() {
            Some(sink) => sink.emit(event),
            None => {
                trace!(?event, "No event sink registered, event dropped");
                false
            }
        }
    }
}

/// In-process stand-in for the network call engine
pub struct LoopbackTransport {
    shared: Arc<Shared>,
}

impl LoopbackTransport {
    /// Create a loopback transport whose joins complete after `join_latency`
    pub fn new(join_latency: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(LinkState {
                    phase: LinkPhase::Idle,
                    settings: None,
                    external_source: false,
                    role: None,
                    channel: None,
                    join_generation: 0,
                    stalled: false,
                    destroyed: false,
                    remote_views: HashMap::new(),
                    last_frame: None,
                    stats: LoopbackStats::default(),
                }),
                send_ready: Condvar::new(),
                sink: Mutex::new(None),
                join_latency,
                send_delay: Mutex::new(Duration::ZERO),
            }),
        }
    }

    /// Raise an event on the calling thread
    pub fn inject(&self, event: TransportEvent) -> bool {
        self.shared.emit(event)
    }

    /// Raise an event from a fresh delivery thread
    pub fn inject_from_thread(&self, event: TransportEvent) -> Result<thread::JoinHandle<bool>> {
        let shared = Arc::clone(&self.shared);
        thread::Builder::new()
            .name("transport-events".to_string())
            .spawn(move || shared.emit(event))
            .map_err(|e| PipelineError::ThreadSpawn(e.to_string()))
    }

    /// Simulate a remote participant's first decoded frame
    pub fn remote_joined(&self, participant: ParticipantId, width: u32, height: u32) -> bool {
        self.inject(TransportEvent::RemoteFrameFirstDecoded {
            participant,
            width,
            height,
        })
    }

    /// Simulate a remote participant going offline
    pub fn remote_left(&self, participant: ParticipantId, reason: LeaveReason) -> bool {
        self.inject(TransportEvent::ParticipantLeft {
            participant,
            reason,
        })
    }

    /// Block senders until [`resume_sends`](Self::resume_sends)
    pub fn stall_sends(&self) {
        self.shared.state.lock().stalled = true;
        debug!("Loopback sends stalled");
    }

    /// Release stalled senders
    pub fn resume_sends(&self) {
        self.shared.state.lock().stalled = false;
        self.shared.send_ready.notify_all();
        debug!("Loopback sends resumed");
    }

    /// Add a fixed delay to every accepted send
    pub fn set_send_delay(&self, delay: Duration) {
        *self.shared.send_delay.lock() = delay;
    }

    /// Current channel membership
    pub fn phase(&self) -> LinkPhase {
        self.shared.state.lock().phase
    }

    /// Role set before the last join
    pub fn client_role(&self) -> Option<ClientRole> {
        self.shared.state.lock().role
    }

    /// Settings applied by `configure`
    pub fn settings(&self) -> Option<TransportSettings> {
        self.shared.state.lock().settings.clone()
    }

    /// Whether outgoing video uses pushed frames
    pub fn external_source_enabled(&self) -> bool {
        self.shared.state.lock().external_source
    }

    /// Check if `destroy` has been called
    pub fn is_destroyed(&self) -> bool {
        self.shared.state.lock().destroyed
    }

    /// Surface bound to a remote participant, if any
    pub fn remote_view(&self, participant: ParticipantId) -> Option<SurfaceHandle> {
        self.shared
            .state
            .lock()
            .remote_views
            .get(&participant)
            .copied()
    }

    /// Take the most recently sent frame
    pub fn take_last_frame(&self) -> Option<CompositedFrame> {
        self.shared.state.lock().last_frame.take()
    }

    /// Get transport statistics
    pub fn stats(&self) -> LoopbackStats {
        let state = self.shared.state.lock();
        let mut stats = state.stats.clone();
        stats.remote_views = state.remote_views.len();
        stats
    }
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new(Duration::from_millis(50))
    }
}

impl TransportSink for LoopbackTransport {
    fn set_event_sink(&self, sink: EventSink<TransportEvent>) {
        *self.shared.sink.lock() = Some(sink);
    }

    fn configure(&self, settings: &TransportSettings) -> Result<()> {
        let mut state = self.shared.state.lock();
        if state.destroyed {
            return Err(PipelineError::TransportError(ERR_DESTROYED));
        }
        info!(
            width = settings.encoder.width,
            height = settings.encoder.height,
            fps = settings.encoder.frame_rate,
            profile = ?settings.channel_profile,
            "Loopback transport configured"
        );
        state.settings = Some(settings.clone());
        Ok(())
    }

    fn enable_external_video_source(&self) -> Result<()> {
        let mut state = self.shared.state.lock();
        if state.destroyed {
            return Err(PipelineError::TransportError(ERR_DESTROYED));
        }
        if state.settings.is_none() {
            return Err(PipelineError::TransportError(ERR_NOT_INITIALIZED));
        }
        state.external_source = true;
        Ok(())
    }

    fn push_frame(&self, frame: CompositedFrame) {
        let mut state = self.shared.state.lock();
        while state.stalled && state.phase == LinkPhase::Joined && !state.destroyed {
            self.shared.send_ready.wait(&mut state);
        }

        if state.phase != LinkPhase::Joined || !state.external_source || state.destroyed {
            state.stats.frames_ignored += 1;
            return;
        }
        drop(state);

        let delay = *self.shared.send_delay.lock();
        if !delay.is_zero() {
            thread::sleep(delay);
        }

        let mut state = self.shared.state.lock();
        state.stats.frames_sent += 1;
        if state.stats.sent_sequences.len() == SEQUENCE_HISTORY {
            state.stats.sent_sequences.pop_front();
        }
        state.stats.sent_sequences.push_back(frame.sequence);
        state.last_frame = Some(frame);
    }

    fn set_client_role(&self, role: ClientRole) -> Result<()> {
        let mut state = self.shared.state.lock();
        if state.destroyed {
            return Err(PipelineError::TransportError(ERR_DESTROYED));
        }
        state.role = Some(role);
        Ok(())
    }

    fn join(&self, channel: &ChannelRef) -> Result<()> {
        let generation = {
            let mut state = self.shared.state.lock();
            if state.destroyed {
                return Err(PipelineError::TransportError(ERR_DESTROYED));
            }
            if state.settings.is_none() {
                return Err(PipelineError::TransportError(ERR_NOT_INITIALIZED));
            }
            if state.phase != LinkPhase::Idle {
                return Err(PipelineError::TransportError(ERR_JOIN_REJECTED));
            }
            state.phase = LinkPhase::Joining;
            state.channel = Some(channel.clone());
            state.join_generation += 1;
            state.join_generation
        };

        info!(channel = %channel, "Joining channel");

        let shared = Arc::clone(&self.shared);
        let requested = Instant::now();
        thread::Builder::new()
            .name("transport-join".to_string())
            .spawn(move || {
                thread::sleep(shared.join_latency);
                {
                    let mut state = shared.state.lock();
                    if state.phase != LinkPhase::Joining || state.join_generation != generation {
                        debug!("Join superseded before completion");
                        return;
                    }
                    state.phase = LinkPhase::Joined;
                    state.stats.joins += 1;
                }
                shared.emit(TransportEvent::Joined {
                    elapsed: requested.elapsed(),
                });
            })
            .map_err(|e| {
                self.shared.state.lock().phase = LinkPhase::Idle;
                PipelineError::ThreadSpawn(e.to_string())
            })?;

        Ok(())
    }

    fn leave(&self) {
        let mut state = self.shared.state.lock();
        if state.phase == LinkPhase::Idle {
            return;
        }
        info!(channel = ?state.channel.as_ref().map(ChannelRef::name), "Leaving channel");
        state.phase = LinkPhase::Idle;
        state.channel = None;
        state.remote_views.clear();
        drop(state);

        self.shared.send_ready.notify_all();
    }

    fn create_remote_view(
        &self,
        participant: ParticipantId,
        mode: RemoteRenderMode,
    ) -> Result<SurfaceHandle> {
        let mut state = self.shared.state.lock();
        if state.phase != LinkPhase::Joined {
            return Err(PipelineError::TransportError(ERR_NOT_IN_CHANNEL));
        }
        let handle = *state
            .remote_views
            .entry(participant)
            .or_insert_with(SurfaceHandle::allocate);
        debug!(%participant, surface = %handle, ?mode, "Remote view bound");
        Ok(handle)
    }

    fn release_remote_view(&self, participant: ParticipantId) {
        if self
            .shared
            .state
            .lock()
            .remote_views
            .remove(&participant)
            .is_none()
        {
            debug!(%participant, "Remote view already released");
        }
    }

    fn destroy(&self) {
        let mut state = self.shared.state.lock();
        if state.destroyed {
            return;
        }
        state.destroyed = true;
        state.phase = LinkPhase::Idle;
        state.channel = None;
        state.external_source = false;
        state.remote_views.clear();
        drop(state);

        self.shared.send_ready.notify_all();
        self.shared.sink.lock().take();
        info!("Loopback transport destroyed");
    }
}
