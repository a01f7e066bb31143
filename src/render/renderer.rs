//! Render Loop and Export Pump
//!
//! The renderer owns two dedicated threads once started:
//!
//! ```text
//!  render-loop thread (fixed cadence)                 frame-export thread
//!  ──────────────────────────────────                 ───────────────────
//!  draw_composite(display); present                    take_timeout()
//!  if exporting:                                           │
//!     copy display → export (or redraw)                    ▼
//!     read back → CompositedFrame ──offer──> LatestSlot ──> TransportSink::push_frame
//! ```
//!
//! The render thread never waits for a capture frame (the effect engine
//! draws whatever it processed last) and never waits for the transport: the
//! export slot holds at most one frame and a newer frame replaces an unsent
//! one. A stalled transport only stalls the export thread.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

use crate::config::types::RenderConfig;
use crate::effect::EffectProcessor;
use crate::error::{PipelineError, Result};
use crate::handoff::{HandoffStats, LatestSlot};
use crate::render::frame::CompositedFrame;
use crate::render::surface::{GraphicsBackend, SurfaceConfig, SurfaceHandle, SurfacePair};
use crate::transport::TransportSink;
use crate::utils::metrics::{metric_names, MetricsCollector};

/// How long the export thread waits before rechecking for shutdown
const EXPORT_POLL: Duration = Duration::from_millis(50);

/// Render loop statistics
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RendererStats {
    /// Completed render cycles
    pub cycles: u64,
    /// Duration of the last cycle in microseconds
    pub last_cycle_us: u64,
    /// Longest cycle in microseconds
    pub max_cycle_us: u64,
    /// Frames pushed to the transport
    pub exports_sent: u64,
    /// Frames taken from the hand-off after export was disabled
    pub exports_discarded: u64,
    /// Export hand-off counters
    pub handoff: HandoffStats,
    /// Render loop is paused
    pub paused: bool,
}

struct RenderShared {
    surfaces: Mutex<Option<SurfacePair>>,
    export_slot: LatestSlot<CompositedFrame>,
    running: AtomicBool,
    paused: AtomicBool,
    export_enabled: AtomicBool,
    cycles: AtomicU64,
    last_cycle_us: AtomicU64,
    max_cycle_us: AtomicU64,
    exports_sent: AtomicU64,
    exports_discarded: AtomicU64,
    metrics: Arc<MetricsCollector>,
    stats_interval: u64,
}

struct RenderThreads {
    render: JoinHandle<()>,
    export: JoinHandle<()>,
}

/// Continuous render loop driving the effect engine into a shared-context
/// surface pair
pub struct Renderer {
    config: RenderConfig,
    effect: Arc<dyn EffectProcessor>,
    shared: Arc<RenderShared>,
    threads: Option<RenderThreads>,
    display_handle: Option<SurfaceHandle>,
}

impl Renderer {
    /// Create a renderer; no surfaces or threads exist yet
    pub fn new(
        config: RenderConfig,
        effect: Arc<dyn EffectProcessor>,
        metrics: Arc<MetricsCollector>,
        stats_interval: u64,
    ) -> Self {
        Self {
            config,
            effect,
            shared: Arc::new(RenderShared {
                surfaces: Mutex::new(None),
                export_slot: LatestSlot::new(),
                running: AtomicBool::new(false),
                paused: AtomicBool::new(false),
                export_enabled: AtomicBool::new(false),
                cycles: AtomicU64::new(0),
                last_cycle_us: AtomicU64::new(0),
                max_cycle_us: AtomicU64::new(0),
                exports_sent: AtomicU64::new(0),
                exports_discarded: AtomicU64::new(0),
                metrics,
                stats_interval: stats_interval.max(1),
            }),
            threads: None,
            display_handle: None,
        }
    }

    /// Create the shared context with its display and export surfaces.
    ///
    /// Returns the display surface handle, which is the local view. Calling
    /// again while surfaces exist returns the existing handle.
    pub fn create_surfaces(&mut self, backend: &dyn GraphicsBackend) -> Result<SurfaceHandle> {
        if let Some(handle) = self.display_handle {
            debug!(surface = %handle, "Surfaces already created");
            return Ok(handle);
        }

        let pair = backend.create_context(&SurfaceConfig::from(&self.config))?;
        let handle = pair.display.handle();
        if !pair.sizes_match() {
            debug!(
                display = %format!("{}x{}", pair.display.width(), pair.display.height()),
                export = %format!("{}x{}", pair.export.width(), pair.export.height()),
                "Export size differs from display, composites are drawn twice"
            );
        }

        *self.shared.surfaces.lock() = Some(pair);
        self.display_handle = Some(handle);
        Ok(handle)
    }

    /// Start the render loop and the export thread
    pub fn start(&mut self, transport: Arc<dyn TransportSink>) -> Result<()> {
        if self.threads.is_some() {
            return Ok(());
        }
        if self.shared.surfaces.lock().is_none() {
            return Err(PipelineError::ContextCreationFailed(
                "render loop started without surfaces".to_string(),
            ));
        }

        self.shared.export_slot.reopen();
        self.shared.running.store(true, Ordering::Release);

        let interval = self.config.frame_interval();
        let render = {
            let shared = Arc::clone(&self.shared);
            let effect = Arc::clone(&self.effect);
            thread::Builder::new()
                .name("render-loop".to_string())
                .spawn(move || run_render_loop(&shared, effect.as_ref(), interval))
                .map_err(|e| {
                    self.shared.running.store(false, Ordering::Release);
                    PipelineError::ThreadSpawn(format!("render loop: {}", e))
                })?
        };

        let export = {
            let shared = Arc::clone(&self.shared);
            thread::Builder::new()
                .name("frame-export".to_string())
                .spawn(move || run_export_pump(&shared, transport.as_ref()))
        };
        let export = match export {
            Ok(handle) => handle,
            Err(e) => {
                self.shared.running.store(false, Ordering::Release);
                self.shared.export_slot.close();
                join_worker(render, "render loop");
                return Err(PipelineError::ThreadSpawn(format!("frame export: {}", e)));
            }
        };

        self.threads = Some(RenderThreads { render, export });
        info!(
            fps = self.config.target_fps,
            interval_us = interval.as_micros() as u64,
            "Render loop started"
        );
        Ok(())
    }

    /// Stop both threads and wait for them to exit.
    ///
    /// A frame already inside `push_frame` completes first; the transport
    /// returns promptly once it has left the channel.
    pub fn stop(&mut self) {
        let Some(threads) = self.threads.take() else {
            return;
        };

        self.shared.running.store(false, Ordering::Release);
        self.shared.export_enabled.store(false, Ordering::Release);
        self.shared.export_slot.close();

        join_worker(threads.render, "render loop");
        join_worker(threads.export, "frame export");

        info!(cycles = self.shared.cycles.load(Ordering::Relaxed), "Render loop stopped");
    }

    /// Destroy both surfaces and the shared context together
    pub fn destroy_surfaces(&mut self) {
        self.stop();
        if let Some(pair) = self.shared.surfaces.lock().take() {
            pair.destroy();
        }
        self.display_handle = None;
    }

    /// Start or stop handing composited frames to the transport
    pub fn set_export_enabled(&self, enabled: bool) {
        let was = self.shared.export_enabled.swap(enabled, Ordering::AcqRel);
        if was != enabled {
            if !enabled {
                // Stale composite from the previous call
                if self.shared.export_slot.try_take().is_some() {
                    self.shared.exports_discarded.fetch_add(1, Ordering::Relaxed);
                }
            }
            debug!(enabled, "Frame export toggled");
        }
    }

    /// Suspend drawing; threads stay alive
    pub fn pause(&self) {
        if !self.shared.paused.swap(true, Ordering::AcqRel) {
            debug!("Render loop paused");
        }
    }

    /// Resume drawing after [`pause`](Self::pause)
    pub fn resume(&self) {
        if self.shared.paused.swap(false, Ordering::AcqRel) {
            debug!("Render loop resumed");
        }
    }

    /// Check if the render loop is running
    pub fn is_running(&self) -> bool {
        self.threads.is_some()
    }

    /// Check if frames are being exported
    pub fn is_exporting(&self) -> bool {
        self.shared.export_enabled.load(Ordering::Acquire)
    }

    /// Display surface handle, once surfaces exist
    pub fn display_handle(&self) -> Option<SurfaceHandle> {
        self.display_handle
    }

    /// Get render loop statistics
    pub fn stats(&self) -> RendererStats {
        RendererStats {
            cycles: self.shared.cycles.load(Ordering::Relaxed),
            last_cycle_us: self.shared.last_cycle_us.load(Ordering::Relaxed),
            max_cycle_us: self.shared.max_cycle_us.load(Ordering::Relaxed),
            exports_sent: self.shared.exports_sent.load(Ordering::Relaxed),
            exports_discarded: self.shared.exports_discarded.load(Ordering::Relaxed),
            handoff: self.shared.export_slot.stats(),
            paused: self.shared.paused.load(Ordering::Relaxed),
        }
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        self.destroy_surfaces();
    }
}

/// Join a worker thread, logging a panic instead of propagating it.
/// Returns `true` if the thread exited normally.
fn join_worker(handle: JoinHandle<()>, name: &str) -> bool {
    match handle.join() {
        Ok(()) => true,
        Err(_) => {
            warn!(thread = name, "Worker thread panicked");
            false
        }
    }
}

fn run_render_loop(shared: &RenderShared, effect: &dyn EffectProcessor, interval: Duration) {
    debug!("Render loop thread running");
    let mut next_deadline = Instant::now();

    while shared.running.load(Ordering::Acquire) {
        if shared.paused.load(Ordering::Acquire) {
            thread::sleep(interval);
            next_deadline = Instant::now();
            continue;
        }

        let cycle_start = Instant::now();
        let sequence = shared.cycles.load(Ordering::Relaxed) + 1;

        let exported = {
            let mut surfaces = shared.surfaces.lock();
            let Some(pair) = surfaces.as_mut() else {
                warn!("Surfaces destroyed under a running render loop");
                break;
            };

            effect.draw_composite(&mut pair.display);
            pair.display.present();

            if shared.export_enabled.load(Ordering::Acquire) {
                let SurfacePair { display, export } = pair;
                if !export.copy_from(display) {
                    effect.draw_composite(export);
                }
                Some(CompositedFrame::read_back(sequence, export))
            } else {
                None
            }
        };

        if let Some(frame) = exported {
            shared.metrics.increment_counter(metric_names::EXPORTS_OFFERED, 1);
            if let Some(replaced) = shared.export_slot.offer(frame) {
                trace!(sequence = replaced.sequence, "Unsent export frame replaced");
                shared
                    .metrics
                    .increment_counter(metric_names::EXPORTS_OVERWRITTEN, 1);
            }
        }

        let cycle_us = cycle_start.elapsed().as_micros() as u64;
        shared.cycles.store(sequence, Ordering::Relaxed);
        shared.last_cycle_us.store(cycle_us, Ordering::Relaxed);
        shared.max_cycle_us.fetch_max(cycle_us, Ordering::Relaxed);
        shared.metrics.increment_counter(metric_names::RENDER_CYCLES, 1);
        shared
            .metrics
            .record_histogram(metric_names::RENDER_CYCLE_US, cycle_us as f64);

        if sequence % shared.stats_interval == 0 {
            let handoff = shared.export_slot.stats();
            debug!(
                cycles = sequence,
                last_cycle_us = cycle_us,
                max_cycle_us = shared.max_cycle_us.load(Ordering::Relaxed),
                exports_sent = shared.exports_sent.load(Ordering::Relaxed),
                exports_overwritten = handoff.overwritten,
                overwrite_rate = format!("{:.1}%", handoff.overwrite_rate() * 100.0),
                "Render loop statistics"
            );
        }

        // Fixed cadence; a late cycle starts the next one immediately
        // without trying to catch up on missed ones
        next_deadline += interval;
        let now = Instant::now();
        if next_deadline > now {
            thread::sleep(next_deadline - now);
        } else {
            next_deadline = now;
        }
    }

    debug!("Render loop thread exiting");
}

fn run_export_pump(shared: &RenderShared, transport: &dyn TransportSink) {
    debug!("Frame export thread running");

    loop {
        match shared.export_slot.take_timeout(EXPORT_POLL) {
            Some(frame) => {
                if !shared.export_enabled.load(Ordering::Acquire) {
                    shared.exports_discarded.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
                let started = Instant::now();
                transport.push_frame(frame);
                shared.exports_sent.fetch_add(1, Ordering::Relaxed);
                shared.metrics.increment_counter(metric_names::EXPORTS_SENT, 1);
                shared
                    .metrics
                    .record_elapsed_us(metric_names::EXPORT_PUSH_US, started);
            }
            None if shared.export_slot.is_closed() => break,
            None => {}
        }
    }

    debug!("Frame export thread exiting");
}
