//! Call Session Controller
//!
//! Owns the call lifecycle and sequences the pipeline components:
//!
//! ```text
//! start():    FrameSource.open ─> Renderer.create_surfaces ─> Renderer.start
//!             ─> transport.configure ─> transport.enable_external_video_source
//! teardown(): transport.leave ─> Renderer.stop ─> Renderer.destroy_surfaces
//!             ─> FrameSource.close ─> effect.release ─> transport.destroy
//! ```
//!
//! Every method runs on the control context, as does [`handle_control`],
//! which applies transport and effect events queued from foreign threads.
//! Call state and the view registry are never touched anywhere else.
//!
//! [`handle_control`]: CallSessionController::handle_control

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::call::events::{control_channel, ControlMessage, ControlReceiver, EventSink};
use crate::call::registry::{ParticipantViewRegistry, ViewLayout, ViewSlot};
use crate::call::state::{CallOperation, CallState};
use crate::capture::source::FrameSource;
use crate::config::Config;
use crate::effect::{EffectEvent, EffectProcessor, EffectRef};
use crate::error::{PipelineError, Result};
use crate::render::renderer::{Renderer, RendererStats};
use crate::render::surface::{GraphicsBackend, SurfaceHandle};
use crate::transport::{LeaveReason, ParticipantId, TransportEvent, TransportSink};
use crate::utils::metrics::{metric_names, MetricsCollector};

/// Collaborators the controller drives
pub struct PipelineParts {
    /// Camera frame source
    pub source: Box<dyn FrameSource>,
    /// AR effect engine
    pub effect: Arc<dyn EffectProcessor>,
    /// Shared-context surface factory
    pub backend: Box<dyn GraphicsBackend>,
    /// Network call engine
    pub transport: Arc<dyn TransportSink>,
}

/// Notifications for the UI layer
#[derive(Debug, Clone, PartialEq)]
pub enum SessionNotification {
    /// Call state changed
    StateChanged {
        /// Previous state
        from: CallState,
        /// New state
        to: CallState,
    },
    /// View slots changed; the display rebuilds from the full snapshot
    ViewsChanged {
        /// Ordered slots, local first
        slots: Vec<ViewSlot>,
        /// Layout hint for the slot count
        layout: ViewLayout,
    },
    /// Non-fatal problem the user may want to see
    Warning(PipelineError),
    /// Face entered or left the tracked area
    FaceVisibility(bool),
    /// An effect became active
    EffectActive(EffectRef),
}

/// Pipeline statistics
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineStats {
    /// Current call state
    pub state: CallState,
    /// Frames delivered by the frame source
    pub frames_delivered: u64,
    /// Render loop counters
    pub renderer: RendererStats,
    /// View slots including the local one
    pub view_slots: usize,
}

/// Finite-state controller over the call lifecycle
pub struct CallSessionController {
    session_id: Uuid,
    config: Config,
    state: CallState,
    source: Box<dyn FrameSource>,
    effect: Arc<dyn EffectProcessor>,
    backend: Box<dyn GraphicsBackend>,
    transport: Arc<dyn TransportSink>,
    renderer: Renderer,
    registry: ParticipantViewRegistry,
    control_rx: ControlReceiver,
    subscribers: Vec<Sender<SessionNotification>>,
    metrics: Arc<MetricsCollector>,
    pipeline_ready: bool,
    join_pending: bool,
    torn_down: bool,
    active_effect: Option<EffectRef>,
    face_visible: bool,
}

impl CallSessionController {
    /// Wire the collaborators together and start effect initialization
    pub fn new(config: Config, parts: PipelineParts) -> Result<Self> {
        let (control_tx, control_rx) = control_channel();
        let metrics = Arc::new(MetricsCollector::new());

        parts
            .transport
            .set_event_sink(EventSink::transport(control_tx.clone()));
        parts.effect.initialize(EventSink::effect(control_tx))?;

        let renderer = Renderer::new(
            config.render.clone(),
            Arc::clone(&parts.effect),
            Arc::clone(&metrics),
            config.logging.stats_interval_frames,
        );
        let registry = ParticipantViewRegistry::new(config.participants.max_views);
        let session_id = Uuid::new_v4();

        info!(
            %session_id,
            channel = %config.transport.channel,
            max_views = registry.max_views(),
            backend = parts.backend.name(),
            "Call session controller created"
        );

        Ok(Self {
            session_id,
            config,
            state: CallState::Idle,
            source: parts.source,
            effect: parts.effect,
            backend: parts.backend,
            transport: parts.transport,
            renderer,
            registry,
            control_rx,
            subscribers: Vec::new(),
            metrics,
            pipeline_ready: false,
            join_pending: false,
            torn_down: false,
            active_effect: None,
            face_visible: false,
        })
    }

    /// Open the pipeline: camera, graphics context, render loop, and
    /// external video source.
    ///
    /// Legal only from Idle. From Idle with the pipeline still open after
    /// `end_call`, re-enters Initializing without reacquiring anything. Any
    /// acquisition failure releases what was acquired, returns to Idle, and
    /// reports `StartupFailed`.
    pub fn start(&mut self) -> Result<()> {
        self.ensure_not_torn_down()?;
        self.ensure_permitted(CallOperation::Start)?;

        self.transition(CallState::Initializing);
        if self.pipeline_ready {
            debug!("Pipeline already open");
            return Ok(());
        }

        match self.acquire_pipeline() {
            Ok(local) => {
                self.registry.attach_local(local);
                self.pipeline_ready = true;
                self.metrics
                    .increment_counter(metric_names::PIPELINE_STARTS, 1);
                info!(local_view = %local, "Pipeline started");
                self.publish_views();
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Pipeline start failed, rolling back");
                self.release_pipeline();
                self.metrics
                    .increment_counter(metric_names::STARTUP_FAILURES, 1);
                self.transition(CallState::Idle);
                Err(PipelineError::startup_failed(e))
            }
        }
    }

    /// Join the configured channel. Completion arrives as a `Joined` event.
    pub fn join_call(&mut self) -> Result<()> {
        self.ensure_not_torn_down()?;
        self.ensure_permitted(CallOperation::JoinCall)?;
        if self.join_pending {
            return Err(self.invalid(CallOperation::JoinCall));
        }

        let channel = self.config.channel();
        self.transport
            .set_client_role(self.config.transport.client_role)?;
        self.transport.join(&channel)?;
        self.join_pending = true;

        // Only a join the transport accepted may leave Idle
        if self.state == CallState::Idle {
            self.transition(CallState::Initializing);
        }

        info!(channel = %channel, role = ?self.config.transport.client_role, "Join requested");
        Ok(())
    }

    /// Leave the call. The pipeline stays open and the local view remains.
    pub fn end_call(&mut self) -> Result<()> {
        self.ensure_permitted(CallOperation::EndCall)?;

        self.transition(CallState::Terminating);
        self.renderer.set_export_enabled(false);
        self.transport.leave();
        self.join_pending = false;

        let released = self.registry.reset_to_local();
        for (participant, _) in &released {
            self.transport.release_remote_view(*participant);
        }
        if !released.is_empty() {
            debug!(released = released.len(), "Remote views released");
        }
        self.publish_views();

        self.transition(CallState::Idle);
        info!("Call ended");
        Ok(())
    }

    /// Release every resource in reverse acquisition order. Idempotent and
    /// safe after a partially failed start.
    pub fn teardown(&mut self) {
        if self.torn_down {
            debug!("Teardown already complete");
            return;
        }

        if matches!(self.state, CallState::Initializing | CallState::Active) {
            self.transition(CallState::Terminating);
        }

        self.renderer.set_export_enabled(false);
        self.transport.leave();
        for (participant, _) in self.registry.clear() {
            self.transport.release_remote_view(participant);
        }

        self.release_pipeline();
        self.effect.release();
        self.transport.destroy();

        self.pipeline_ready = false;
        self.join_pending = false;
        self.torn_down = true;

        self.publish_views();
        self.transition(CallState::Idle);
        info!("Pipeline torn down");
    }

    /// Suspend the render loop while the pipeline is open
    pub fn pause_rendering(&mut self) -> Result<()> {
        self.ensure_permitted(CallOperation::PauseRendering)?;
        self.renderer.pause();
        Ok(())
    }

    /// Resume the render loop
    pub fn resume_rendering(&mut self) -> Result<()> {
        self.ensure_permitted(CallOperation::PauseRendering)?;
        self.renderer.resume();
        Ok(())
    }

    /// Apply every queued event without waiting. Returns how many were applied.
    pub fn dispatch_pending(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(message) = self.control_rx.try_recv() {
            self.handle_control(message);
            applied += 1;
        }
        applied
    }

    /// Wait for the next queued event.
    ///
    /// Returns `None` once every event source has gone away.
    pub async fn next_control(&mut self) -> Option<ControlMessage> {
        self.control_rx.recv().await
    }

    /// Apply one queued event
    pub fn handle_control(&mut self, message: ControlMessage) {
        match message {
            ControlMessage::Transport(event) => self.on_transport_event(event),
            ControlMessage::Effect(event) => self.on_effect_event(event),
        }
    }

    /// Receive UI notifications
    pub fn subscribe(&mut self) -> Receiver<SessionNotification> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// Identifier used to correlate this session's logs
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Current call state
    pub fn state(&self) -> CallState {
        self.state
    }

    /// Ordered view slots, local first
    pub fn current_view_snapshot(&self) -> Vec<ViewSlot> {
        self.registry.snapshot()
    }

    /// Layout hint for the current view slots
    pub fn view_layout(&self) -> ViewLayout {
        self.registry.layout()
    }

    /// Local preview surface, while the pipeline is open
    pub fn local_view(&self) -> Option<SurfaceHandle> {
        self.renderer.display_handle()
    }

    /// Check if the pipeline is open
    pub fn is_pipeline_ready(&self) -> bool {
        self.pipeline_ready
    }

    /// Effect last reported active by the engine
    pub fn active_effect(&self) -> Option<&EffectRef> {
        self.active_effect.as_ref()
    }

    /// Whether a face is currently tracked
    pub fn face_visible(&self) -> bool {
        self.face_visible
    }

    /// Shared metrics collector
    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    /// Get pipeline statistics
    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            state: self.state,
            frames_delivered: self.source.frames_delivered(),
            renderer: self.renderer.stats(),
            view_slots: self.registry.len(),
        }
    }

    fn acquire_pipeline(&mut self) -> Result<SurfaceHandle> {
        let effect = Arc::clone(&self.effect);
        let metrics = Arc::clone(&self.metrics);
        self.source.open(Box::new(move |frame| {
            let dropped = effect.submit_frame(frame).dropped();
            metrics.increment_counter(metric_names::FRAMES_SUBMITTED, 1);
            if dropped > 0 {
                metrics.increment_counter(metric_names::FRAMES_DROPPED, dropped);
            }
        }))?;

        let local = self.renderer.create_surfaces(self.backend.as_ref())?;
        self.renderer.start(Arc::clone(&self.transport))?;

        self.transport
            .configure(&self.config.transport_settings())?;
        self.transport.enable_external_video_source()?;

        Ok(local)
    }

    fn release_pipeline(&mut self) {
        self.renderer.stop();
        self.renderer.destroy_surfaces();
        self.source.close();
    }

    fn on_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Joined { elapsed } => {
                if self.state != CallState::Initializing || !self.join_pending {
                    debug!(state = %self.state, "Ignoring join completion");
                    return;
                }
                self.join_pending = false;
                self.metrics.record_histogram(
                    metric_names::JOIN_LATENCY_MS,
                    elapsed.as_secs_f64() * 1000.0,
                );
                info!(elapsed_ms = elapsed.as_millis() as u64, "Joined channel");
                self.transition(CallState::Active);
                self.renderer.set_export_enabled(true);
            }
            TransportEvent::RemoteFrameFirstDecoded {
                participant,
                width,
                height,
            } => self.on_remote_joined(participant, width, height),
            TransportEvent::ParticipantLeft {
                participant,
                reason,
            } => self.on_remote_left(participant, reason),
            TransportEvent::Warning(code) => {
                warn!(code, "Transport warning");
                self.report_transport_problem(code);
            }
            TransportEvent::Error(code) => {
                error!(code, "Transport error");
                self.report_transport_problem(code);
            }
        }
    }

    fn on_remote_joined(&mut self, participant: ParticipantId, width: u32, height: u32) {
        if !self.state.admits_participants() {
            debug!(%participant, state = %self.state, "Remote video outside an active call");
            return;
        }
        if self.registry.contains(participant) {
            return;
        }
        if self.registry.is_full() {
            warn!(%participant, "No free view slot for participant");
            self.metrics
                .increment_counter(metric_names::CAPACITY_REJECTIONS, 1);
            self.notify(SessionNotification::Warning(
                PipelineError::CapacityExceeded(self.registry.max_remotes()),
            ));
            return;
        }

        let surface = match self
            .transport
            .create_remote_view(participant, self.config.transport.remote_render_mode)
        {
            Ok(surface) => surface,
            Err(e) => {
                warn!(%participant, error = %e, "Remote view creation failed");
                self.notify(SessionNotification::Warning(e));
                return;
            }
        };

        if let Err(e) = self.registry.insert(participant, surface) {
            self.transport.release_remote_view(participant);
            self.notify(SessionNotification::Warning(e));
            return;
        }

        info!(%participant, width, height, surface = %surface, "Participant video added");
        self.publish_views();
    }

    fn on_remote_left(&mut self, participant: ParticipantId, reason: LeaveReason) {
        if self.state != CallState::Active {
            debug!(%participant, state = %self.state, "Participant left outside an active call");
            return;
        }
        match self.registry.remove(participant) {
            Some(_) => {
                self.transport.release_remote_view(participant);
                info!(%participant, %reason, "Participant video removed");
                self.publish_views();
            }
            None => debug!(%participant, %reason, "Participant without a view slot left"),
        }
    }

    fn report_transport_problem(&mut self, code: i32) {
        self.metrics
            .increment_counter(metric_names::TRANSPORT_WARNINGS, 1);
        self.notify(SessionNotification::Warning(PipelineError::TransportError(
            code,
        )));
    }

    fn on_effect_event(&mut self, event: EffectEvent) {
        match event {
            EffectEvent::Initialized => {
                let initial = self.config.effect.initial.clone();
                info!(effect = %initial, "Effect engine ready, loading initial effect");
                self.effect.switch_effect(initial);
            }
            EffectEvent::EffectSwitched(effect) => {
                debug!(effect = %effect, "Effect active");
                self.active_effect = Some(effect.clone());
                self.notify(SessionNotification::EffectActive(effect));
            }
            EffectEvent::Error { kind, message } => {
                warn!(kind = %kind, message = %message, "Effect engine error");
                self.metrics.increment_counter(metric_names::EFFECT_ERRORS, 1);
                self.notify(SessionNotification::Warning(
                    PipelineError::EffectEngineError { kind, message },
                ));
            }
            EffectEvent::FaceVisibilityChanged(visible) => {
                if self.face_visible != visible {
                    self.face_visible = visible;
                    debug!(visible, "Face visibility changed");
                    self.notify(SessionNotification::FaceVisibility(visible));
                }
            }
        }
    }

    fn transition(&mut self, to: CallState) {
        let from = self.state;
        if from == to {
            return;
        }
        self.state = to;
        info!(session_id = %self.session_id, %from, %to, "Call state changed");
        self.notify(SessionNotification::StateChanged { from, to });
    }

    fn publish_views(&mut self) {
        let slots = self.registry.snapshot();
        let layout = ViewLayout::for_count(slots.len());
        self.metrics
            .set_gauge(metric_names::VIEW_SLOTS, slots.len() as f64);
        self.notify(SessionNotification::ViewsChanged { slots, layout });
    }

    fn notify(&mut self, notification: SessionNotification) {
        self.subscribers
            .retain(|tx| tx.send(notification.clone()).is_ok());
    }

    fn ensure_permitted(&self, operation: CallOperation) -> Result<()> {
        if self.state.permits(operation, self.pipeline_ready) {
            Ok(())
        } else {
            Err(self.invalid(operation))
        }
    }

    fn ensure_not_torn_down(&self) -> Result<()> {
        if self.torn_down {
            Err(PipelineError::TornDown)
        } else {
            Ok(())
        }
    }

    fn invalid(&self, operation: CallOperation) -> PipelineError {
        PipelineError::InvalidStateTransition {
            state: self.state,
            operation,
        }
    }
}

impl Drop for CallSessionController {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::device::SyntheticCamera;
    use crate::capture::source::CameraSource;
    use crate::config::types::ClientRole;
    use crate::effect::OverlayEngine;
    use crate::render::surface::CpuBackend;
    use crate::transport::{LinkPhase, LoopbackTransport};
    use std::time::{Duration, Instant};

    fn test_config() -> Config {
        let mut config = Config::default_config();
        config.capture.width = 16;
        config.capture.height = 16;
        config.capture.fps = 120;
        config.render.target_fps = 120;
        config.render.display_width = 16;
        config.render.display_height = 16;
        config.render.export_width = 16;
        config.render.export_height = 16;
        config.effect.init_delay_ms = 1;
        config
    }

    fn controller_with(
        config: Config,
        camera: SyntheticCamera,
    ) -> (CallSessionController, Arc<LoopbackTransport>) {
        let transport = Arc::new(LoopbackTransport::new(Duration::from_millis(5)));
        let parts = PipelineParts {
            source: Box::new(CameraSource::new(camera)),
            effect: Arc::new(OverlayEngine::new(Duration::from_millis(
                config.effect.init_delay_ms,
            ))),
            backend: Box::new(CpuBackend::new()),
            transport: transport.clone(),
        };
        (CallSessionController::new(config, parts).unwrap(), transport)
    }

    fn controller() -> (CallSessionController, Arc<LoopbackTransport>) {
        let config = test_config();
        let camera = SyntheticCamera::new(&config.capture);
        controller_with(config, camera)
    }

    fn pump_until(
        controller: &mut CallSessionController,
        mut condition: impl FnMut(&CallSessionController) -> bool,
    ) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition(controller) {
            assert!(Instant::now() < deadline, "condition not reached in time");
            controller.dispatch_pending();
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    fn active_controller() -> (CallSessionController, Arc<LoopbackTransport>) {
        let (mut controller, transport) = controller();
        controller.start().unwrap();
        controller.join_call().unwrap();
        pump_until(&mut controller, |c| c.state() == CallState::Active);
        (controller, transport)
    }

    #[test]
    fn test_start_attaches_local_view() {
        let (mut controller, transport) = controller();
        controller.start().unwrap();

        assert_eq!(controller.state(), CallState::Initializing);
        let snapshot = controller.current_view_snapshot();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot[0].is_local());
        assert!(transport.external_source_enabled());
        assert!(transport.settings().is_some());
    }

    #[test]
    fn test_start_failure_rolls_back() {
        let config = test_config();
        let camera = SyntheticCamera::unavailable(&config.capture);
        let (mut controller, transport) = controller_with(config, camera);

        let err = controller.start().unwrap_err();
        assert!(matches!(err, PipelineError::StartupFailed(_)));
        assert!(matches!(
            err.root_cause(),
            PipelineError::DeviceUnavailable(_)
        ));
        assert_eq!(controller.state(), CallState::Idle);
        assert!(!controller.is_pipeline_ready());
        assert!(controller.current_view_snapshot().is_empty());
        assert!(!transport.external_source_enabled());
    }

    #[test]
    fn test_context_failure_rolls_back_camera() {
        let mut config = test_config();
        config.render.color_bits = [5, 6, 5, 0];
        let camera = SyntheticCamera::new(&config.capture);
        let (mut controller, _transport) = controller_with(config, camera);

        let err = controller.start().unwrap_err();
        assert!(matches!(
            err.root_cause(),
            PipelineError::ContextCreationFailed(_)
        ));
        assert_eq!(controller.stats().renderer.cycles, 0);
        assert_eq!(controller.local_view(), None);
        assert_eq!(controller.state(), CallState::Idle);
    }

    #[test]
    fn test_join_sets_broadcaster_role_and_activates() {
        let (controller, transport) = active_controller();
        assert_eq!(transport.client_role(), Some(ClientRole::Broadcaster));
        assert_eq!(transport.phase(), LinkPhase::Joined);
        assert_eq!(controller.state(), CallState::Active);
    }

    #[test]
    fn test_join_from_idle_requires_pipeline() {
        let (mut controller, _transport) = controller();
        assert_eq!(
            controller.join_call(),
            Err(PipelineError::InvalidStateTransition {
                state: CallState::Idle,
                operation: CallOperation::JoinCall,
            })
        );
    }

    #[test]
    fn test_double_join_rejected_while_pending() {
        let (mut controller, _transport) = controller();
        controller.start().unwrap();
        controller.join_call().unwrap();
        assert!(matches!(
            controller.join_call(),
            Err(PipelineError::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn test_failed_join_leaves_state_unchanged() {
        let (mut controller, transport) = controller();
        controller.start().unwrap();
        controller.end_call().unwrap();
        assert_eq!(controller.state(), CallState::Idle);

        transport.destroy();
        assert!(matches!(
            controller.join_call(),
            Err(PipelineError::TransportError(_))
        ));
        assert_eq!(controller.state(), CallState::Idle);
        assert!(controller.is_pipeline_ready());

        // Not stuck: a second attempt is evaluated from Idle again
        assert!(matches!(
            controller.join_call(),
            Err(PipelineError::TransportError(_))
        ));
        assert_eq!(controller.state(), CallState::Idle);
        controller.teardown();
    }

    #[test]
    fn test_end_call_keeps_pipeline_open() {
        let (mut controller, transport) = active_controller();
        transport.remote_joined(ParticipantId(3), 480, 480);
        pump_until(&mut controller, |c| c.current_view_snapshot().len() == 2);

        controller.end_call().unwrap();
        assert_eq!(controller.state(), CallState::Idle);
        assert!(controller.is_pipeline_ready());
        assert_eq!(controller.current_view_snapshot().len(), 1);
        assert_eq!(transport.phase(), LinkPhase::Idle);

        // Idle with an open pipeline may join again directly
        controller.join_call().unwrap();
        pump_until(&mut controller, |c| c.state() == CallState::Active);
    }

    #[test]
    fn test_end_call_from_initializing() {
        let (mut controller, _transport) = controller();
        controller.start().unwrap();
        controller.end_call().unwrap();
        assert_eq!(controller.state(), CallState::Idle);
        assert_eq!(controller.current_view_snapshot().len(), 1);
    }

    #[test]
    fn test_frames_before_engine_ready_counted_as_dropped() {
        let mut config = test_config();
        config.effect.init_delay_ms = 500;
        let camera = SyntheticCamera::new(&config.capture);
        let (mut controller, _transport) = controller_with(config, camera);
        controller.start().unwrap();

        let metrics = Arc::clone(controller.metrics());
        pump_until(&mut controller, |_| {
            metrics.get_counter(metric_names::FRAMES_SUBMITTED).unwrap_or(0) >= 2
        });
        assert!(metrics.get_counter(metric_names::FRAMES_DROPPED).unwrap_or(0) >= 2);
        controller.teardown();
    }

    #[test]
    fn test_initial_effect_applied_after_initialization() {
        let (mut controller, _transport) = active_controller();
        pump_until(&mut controller, |c| c.active_effect().is_some());
        assert_eq!(
            controller.active_effect(),
            Some(&EffectRef::new("mask", "aviators"))
        );
    }

    #[test]
    fn test_transport_error_is_warning() {
        let (mut controller, transport) = active_controller();
        let notifications = controller.subscribe();
        transport.inject(TransportEvent::Error(110));
        controller.dispatch_pending();

        assert_eq!(controller.state(), CallState::Active);
        assert!(notifications
            .try_iter()
            .any(|n| n == SessionNotification::Warning(PipelineError::TransportError(110))));
    }

    #[test]
    fn test_notifications_report_transitions() {
        let (mut controller, _transport) = controller();
        let notifications = controller.subscribe();
        controller.start().unwrap();
        controller.teardown();

        let states: Vec<_> = notifications
            .try_iter()
            .filter_map(|n| match n {
                SessionNotification::StateChanged { to, .. } => Some(to),
                _ => None,
            })
            .collect();
        assert_eq!(states, vec![CallState::Initializing, CallState::Terminating, CallState::Idle]);
    }

    #[test]
    fn test_start_after_teardown_rejected() {
        let (mut controller, transport) = controller();
        controller.start().unwrap();
        controller.teardown();

        assert_eq!(controller.start(), Err(PipelineError::TornDown));
        assert!(transport.is_destroyed());
    }

    #[test]
    fn test_pause_requires_open_pipeline() {
        let (mut controller, _transport) = controller();
        assert!(controller.pause_rendering().is_err());

        controller.start().unwrap();
        controller.pause_rendering().unwrap();
        assert!(controller.stats().renderer.paused);
        controller.resume_rendering().unwrap();
        assert!(!controller.stats().renderer.paused);
    }
}
