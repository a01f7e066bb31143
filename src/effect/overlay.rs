//! Software Overlay Effect Engine
//!
//! CPU implementation of the effect engine contract. It keeps only the most
//! recent raw frame (latest-frame-wins), converts it to RGBA on the render
//! thread, applies the active overlay, and scales it into whichever surface
//! the renderer passes in.
//!
//! Supported effect assets (matched on the last path segment):
//!
//! | Asset | Effect |
//! |-------|--------|
//! | `none` | Pass-through |
//! | `aviators` | Dark sunglasses band across the eye line |
//! | `grayscale` | Luma only |
//! | `invert` | Color negative |

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

use crate::call::events::EventSink;
use crate::capture::frame::{Orientation, RawFrame};
use crate::effect::{EffectEvent, EffectProcessor, EffectRef, FrameDisposition};
use crate::error::{PipelineError, Result};
use crate::handoff::LatestSlot;
use crate::render::surface::{Surface, SURFACE_BPP};

/// Overlay effects known to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectKind {
    /// Pass-through
    None,
    /// Sunglasses band
    Aviators,
    /// Luma only
    Grayscale,
    /// Color negative
    Invert,
}

impl EffectKind {
    /// Resolve an asset path such as `file:///android_asset/aviators`
    pub fn from_asset(path: &str) -> Option<Self> {
        let name = path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(path)
            .to_ascii_lowercase();

        match name.as_str() {
            "" | "none" => Some(Self::None),
            "aviators" => Some(Self::Aviators),
            "grayscale" => Some(Self::Grayscale),
            "invert" => Some(Self::Invert),
            _ => None,
        }
    }

    fn apply(&self, rgba: &mut [u8], width: u32, height: u32) {
        match self {
            Self::None => {}
            Self::Grayscale => {
                for px in rgba.chunks_exact_mut(SURFACE_BPP) {
                    let luma = (0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32)
                        .round() as u8;
                    px[0] = luma;
                    px[1] = luma;
                    px[2] = luma;
                }
            }
            Self::Invert => {
                for px in rgba.chunks_exact_mut(SURFACE_BPP) {
                    px[0] = 255 - px[0];
                    px[1] = 255 - px[1];
                    px[2] = 255 - px[2];
                }
            }
            Self::Aviators => {
                // Eye line sits a little above the vertical center in a
                // portrait selfie frame
                let top = height * 30 / 100;
                let bottom = height * 42 / 100;
                let left = width * 18 / 100;
                let right = width * 82 / 100;
                let bridge_left = width * 46 / 100;
                let bridge_right = width * 54 / 100;

                for y in top..bottom {
                    for x in left..right {
                        let i = (y as usize * width as usize + x as usize) * SURFACE_BPP;
                        let px = &mut rgba[i..i + SURFACE_BPP];
                        if x >= bridge_left && x < bridge_right {
                            // Gold bridge
                            px[0] = 212;
                            px[1] = 175;
                            px[2] = 55;
                        } else {
                            // 85% tinted lens
                            px[0] = (px[0] as u16 * 15 / 100) as u8;
                            px[1] = (px[1] as u16 * 15 / 100) as u8;
                            px[2] = (px[2] as u16 * 20 / 100) as u8;
                        }
                    }
                }
            }
        }
    }
}

/// Frame after conversion and effect processing
struct ProcessedFrame {
    frame_id: u64,
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

struct ActiveEffect {
    current: Option<(EffectRef, EffectKind)>,
    pending: Option<EffectRef>,
}

/// Overlay engine statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OverlayStats {
    /// Frames handed to `submit_frame`
    pub submitted: u64,
    /// Frames dropped because the engine was not initialized
    pub dropped_uninitialized: u64,
    /// Frames superseded before processing
    pub superseded: u64,
    /// Frames converted and processed
    pub processed: u64,
    /// `draw_composite` invocations
    pub draws: u64,
}

/// Software AR effect engine
pub struct OverlayEngine {
    init_delay: Duration,
    initialized: Arc<AtomicBool>,
    events: Arc<Mutex<Option<EventSink<EffectEvent>>>>,
    init_thread: Mutex<Option<JoinHandle<()>>>,
    latest: LatestSlot<RawFrame>,
    processed: Mutex<Option<ProcessedFrame>>,
    effect: Mutex<ActiveEffect>,
    face_visible: AtomicBool,
    submitted: AtomicU64,
    dropped_uninitialized: AtomicU64,
    processed_count: AtomicU64,
    draws: AtomicU64,
}

impl OverlayEngine {
    /// Create an engine whose initialization completes after `init_delay`
    pub fn new(init_delay: Duration) -> Self {
        Self {
            init_delay,
            initialized: Arc::new(AtomicBool::new(false)),
            events: Arc::new(Mutex::new(None)),
            init_thread: Mutex::new(None),
            latest: LatestSlot::new(),
            processed: Mutex::new(None),
            effect: Mutex::new(ActiveEffect {
                current: None,
                pending: None,
            }),
            face_visible: AtomicBool::new(false),
            submitted: AtomicU64::new(0),
            dropped_uninitialized: AtomicU64::new(0),
            processed_count: AtomicU64::new(0),
            draws: AtomicU64::new(0),
        }
    }

    /// Currently active effect
    pub fn active_effect(&self) -> Option<EffectRef> {
        self.effect
            .lock()
            .current
            .as_ref()
            .map(|(effect, _)| effect.clone())
    }

    /// Get engine statistics
    pub fn stats(&self) -> OverlayStats {
        OverlayStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            dropped_uninitialized: self.dropped_uninitialized.load(Ordering::Relaxed),
            superseded: self.latest.stats().overwritten,
            processed: self.processed_count.load(Ordering::Relaxed),
            draws: self.draws.load(Ordering::Relaxed),
        }
    }

    fn emit(&self, event: EffectEvent) {
        if let Some(sink) = self.events.lock().as_ref() {
            sink.emit(event);
        }
    }

    /// Resolve a pending switch request; runs on the render thread
    fn apply_pending_switch(&self) {
        let mut effect = self.effect.lock();
        let Some(requested) = effect.pending.take() else {
            return;
        };

        match EffectKind::from_asset(&requested.path) {
            Some(kind) => {
                info!(effect = %requested, ?kind, "Effect switched");
                effect.current = Some((requested.clone(), kind));
                drop(effect);
                self.emit(EffectEvent::EffectSwitched(requested));
            }
            None => {
                drop(effect);
                warn!(effect = %requested, "Unknown effect asset");
                self.emit(EffectEvent::Error {
                    kind: "effect_load".to_string(),
                    message: format!("unknown effect asset '{}'", requested.path),
                });
            }
        }
    }

    fn process(&self, frame: RawFrame) -> Option<ProcessedFrame> {
        if !frame.is_complete() {
            warn!(frame_id = frame.frame_id, "Skipping incomplete raw frame");
            return None;
        }

        let (width, height) = if frame.orientation.is_transposed() {
            (frame.height, frame.width)
        } else {
            (frame.width, frame.height)
        };

        let mut rgba = vec![0u8; width as usize * height as usize * SURFACE_BPP];
        for y in 0..height {
            for x in 0..width {
                // Front cameras are mirrored so the preview behaves like a mirror
                let ux = if frame.mirrored { width - 1 - x } else { x };
                let (sx, sy) = source_coords(frame.orientation, ux, y, frame.width, frame.height);
                let i = (y as usize * width as usize + x as usize) * SURFACE_BPP;
                rgba[i..i + SURFACE_BPP].copy_from_slice(&frame.sample_rgba(sx, sy));
            }
        }

        let kind = self
            .effect
            .lock()
            .current
            .as_ref()
            .map(|(_, kind)| *kind)
            .unwrap_or(EffectKind::None);
        kind.apply(&mut rgba, width, height);

        let total = self.processed_count.fetch_add(1, Ordering::Relaxed) + 1;
        if total % 100 == 0 {
            debug!(processed = total, superseded = self.latest.stats().overwritten, "Effect progress");
        }

        Some(ProcessedFrame {
            frame_id: frame.frame_id,
            width,
            height,
            rgba,
        })
    }
}

/// Map display coordinates back into sensor coordinates
fn source_coords(orientation: Orientation, x: u32, y: u32, src_w: u32, src_h: u32) -> (u32, u32) {
    match orientation {
        Orientation::Deg0 => (x, y),
        Orientation::Deg90 => (y, src_h - 1 - x),
        Orientation::Deg180 => (src_w - 1 - x, src_h - 1 - y),
        Orientation::Deg270 => (src_w - 1 - y, x),
    }
}

/// Nearest-neighbor scale of an RGBA buffer into a surface
fn blit_scaled(src: &[u8], src_w: u32, src_h: u32, target: &mut Surface) {
    let (dst_w, dst_h) = (target.width(), target.height());
    let dst = target.pixels_mut();

    for y in 0..dst_h {
        let sy = (y as u64 * src_h as u64 / dst_h as u64) as usize;
        for x in 0..dst_w {
            let sx = (x as u64 * src_w as u64 / dst_w as u64) as usize;
            let si = (sy * src_w as usize + sx) * SURFACE_BPP;
            let di = (y as usize * dst_w as usize + x as usize) * SURFACE_BPP;
            dst[di..di + SURFACE_BPP].copy_from_slice(&src[si..si + SURFACE_BPP]);
        }
    }
}

impl EffectProcessor for OverlayEngine {
    fn initialize(&self, events: EventSink<EffectEvent>) -> Result<()> {
        *self.events.lock() = Some(events);
        self.latest.reopen();

        if self.initialized.load(Ordering::SeqCst) {
            return Ok(());
        }

        let delay = self.init_delay;
        let initialized = Arc::clone(&self.initialized);
        let sink = Arc::clone(&self.events);

        let handle = thread::Builder::new()
            .name("effect-init".to_string())
            .spawn(move || {
                thread::sleep(delay);
                initialized.store(true, Ordering::SeqCst);
                info!(delay_ms = delay.as_millis() as u64, "Effect engine initialized");
                if let Some(sink) = sink.lock().as_ref() {
                    sink.emit(EffectEvent::Initialized);
                }
            })
            .map_err(|e| PipelineError::ThreadSpawn(e.to_string()))?;

        *self.init_thread.lock() = Some(handle);
        Ok(())
    }

    fn submit_frame(&self, frame: RawFrame) -> FrameDisposition {
        self.submitted.fetch_add(1, Ordering::Relaxed);

        if !self.initialized.load(Ordering::Acquire) {
            self.dropped_uninitialized.fetch_add(1, Ordering::Relaxed);
            trace!(frame_id = frame.frame_id, "Engine initializing, frame dropped");
            return FrameDisposition::Dropped;
        }

        match self.latest.offer(frame) {
            Some(superseded) => {
                trace!(frame_id = superseded.frame_id, "Raw frame superseded");
                FrameDisposition::ReplacedPending
            }
            None => FrameDisposition::Queued,
        }
    }

    fn draw_composite(&self, target: &mut Surface) {
        self.draws.fetch_add(1, Ordering::Relaxed);
        self.apply_pending_switch();

        if let Some(frame) = self.latest.try_take() {
            if let Some(processed) = self.process(frame) {
                if !self.face_visible.swap(true, Ordering::SeqCst) {
                    self.emit(EffectEvent::FaceVisibilityChanged(true));
                }
                *self.processed.lock() = Some(processed);
            }
        }

        let processed = self.processed.lock();
        match processed.as_ref() {
            Some(frame) => {
                trace!(frame_id = frame.frame_id, "Drawing composite");
                blit_scaled(&frame.rgba, frame.width, frame.height, target);
            }
            None => target.clear([0, 0, 0, 255]),
        }
    }

    fn switch_effect(&self, effect: EffectRef) {
        debug!(effect = %effect, "Effect switch requested");
        self.effect.lock().pending = Some(effect);
    }

    fn release(&self) {
        if let Some(handle) = self.init_thread.lock().take() {
            let _ = handle.join();
        }

        let was_initialized = self.initialized.swap(false, Ordering::SeqCst);
        self.latest.close();
        *self.processed.lock() = None;
        if self.face_visible.swap(false, Ordering::SeqCst) {
            self.emit(EffectEvent::FaceVisibilityChanged(false));
        }
        *self.events.lock() = None;

        if was_initialized {
            info!(stats = ?self.stats(), "Effect engine released");
        }
    }

    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }
}

impl Drop for OverlayEngine {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::events::{control_channel, ControlMessage};
    use crate::capture::frame::{CaptureFormat, PixelFormat};
    use crate::render::surface::{CpuBackend, GraphicsBackend, SurfaceConfig, SurfacePair};
    use bytes::Bytes;
    use std::time::Instant;

    fn surfaces() -> SurfacePair {
        CpuBackend::new()
            .create_context(&SurfaceConfig {
                display_width: 8,
                display_height: 8,
                export_width: 4,
                export_height: 4,
                color_bits: [8; 4],
                depth_bits: 16,
            })
            .unwrap()
    }

    fn solid_frame(frame_id: u64, rgba: [u8; 4]) -> RawFrame {
        let format = CaptureFormat {
            width: 8,
            height: 8,
            fps: 30,
            format: PixelFormat::Rgba,
            orientation: Orientation::Deg0,
            mirrored: false,
        };
        let data: Vec<u8> = rgba.iter().copied().cycle().take(8 * 8 * 4).collect();
        RawFrame::new(frame_id, Duration::ZERO, &format, Bytes::from(data))
    }

    fn wait_initialized(engine: &OverlayEngine) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !engine.is_initialized() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(engine.is_initialized());
    }

    #[test]
    fn test_effect_kind_from_asset() {
        assert_eq!(
            EffectKind::from_asset("file:///android_asset/aviators"),
            Some(EffectKind::Aviators)
        );
        assert_eq!(EffectKind::from_asset("Invert"), Some(EffectKind::Invert));
        assert_eq!(EffectKind::from_asset("none"), Some(EffectKind::None));
        assert_eq!(EffectKind::from_asset("dragon"), None);
    }

    #[test]
    fn test_frames_dropped_while_initializing() {
        let engine = OverlayEngine::new(Duration::from_secs(60));
        assert_eq!(
            engine.submit_frame(solid_frame(1, [1, 2, 3, 255])),
            FrameDisposition::Dropped
        );

        let stats = engine.stats();
        assert_eq!(stats.submitted, 1);
        assert_eq!(stats.dropped_uninitialized, 1);
    }

    #[test]
    fn test_initialized_event_delivered() {
        let (tx, mut rx) = control_channel();
        let engine = OverlayEngine::new(Duration::from_millis(1));
        engine.initialize(EventSink::effect(tx)).unwrap();
        wait_initialized(&engine);

        let deadline = Instant::now() + Duration::from_secs(2);
        let message = loop {
            if let Ok(message) = rx.try_recv() {
                break message;
            }
            assert!(Instant::now() < deadline, "no initialized event");
            thread::sleep(Duration::from_millis(1));
        };
        assert_eq!(message, ControlMessage::Effect(EffectEvent::Initialized));
    }

    #[test]
    fn test_latest_frame_wins() {
        let (tx, _rx) = control_channel();
        let engine = OverlayEngine::new(Duration::ZERO);
        engine.initialize(EventSink::effect(tx)).unwrap();
        wait_initialized(&engine);

        let dispositions = [
            engine.submit_frame(solid_frame(1, [10, 10, 10, 255])),
            engine.submit_frame(solid_frame(2, [20, 20, 20, 255])),
            engine.submit_frame(solid_frame(3, [30, 30, 30, 255])),
        ];
        assert_eq!(
            dispositions,
            [
                FrameDisposition::Queued,
                FrameDisposition::ReplacedPending,
                FrameDisposition::ReplacedPending,
            ]
        );

        let mut pair = surfaces();
        engine.draw_composite(&mut pair.display);

        assert_eq!(pair.display.pixel(0, 0), Some([30, 30, 30, 255]));
        let stats = engine.stats();
        assert_eq!(stats.superseded, 2);
        assert_eq!(stats.processed, 1);
    }

    #[test]
    fn test_redraw_reuses_last_processed_frame() {
        let (tx, _rx) = control_channel();
        let engine = OverlayEngine::new(Duration::ZERO);
        engine.initialize(EventSink::effect(tx)).unwrap();
        wait_initialized(&engine);
        engine.submit_frame(solid_frame(1, [40, 50, 60, 255]));

        let mut pair = surfaces();
        engine.draw_composite(&mut pair.display);
        engine.draw_composite(&mut pair.export);

        assert_eq!(pair.export.pixel(3, 3), Some([40, 50, 60, 255]));
        assert_eq!(engine.stats().processed, 1);
        assert_eq!(engine.stats().draws, 2);
    }

    #[test]
    fn test_switch_applies_on_next_draw() {
        let (tx, mut rx) = control_channel();
        let engine = OverlayEngine::new(Duration::ZERO);
        engine.initialize(EventSink::effect(tx)).unwrap();
        wait_initialized(&engine);

        let invert = EffectRef::new("mask", "invert");
        engine.switch_effect(invert.clone());
        assert_eq!(engine.active_effect(), None);

        engine.submit_frame(solid_frame(1, [0, 100, 255, 255]));
        let mut pair = surfaces();
        engine.draw_composite(&mut pair.display);

        assert_eq!(engine.active_effect(), Some(invert.clone()));
        assert_eq!(pair.display.pixel(0, 0), Some([255, 155, 0, 255]));

        let mut saw_switch = false;
        while let Ok(message) = rx.try_recv() {
            if message == ControlMessage::Effect(EffectEvent::EffectSwitched(invert.clone())) {
                saw_switch = true;
            }
        }
        assert!(saw_switch);
    }

    #[test]
    fn test_unknown_effect_reports_error() {
        let (tx, mut rx) = control_channel();
        let engine = OverlayEngine::new(Duration::ZERO);
        engine.initialize(EventSink::effect(tx)).unwrap();
        wait_initialized(&engine);

        engine.switch_effect(EffectRef::new("mask", "dragon"));
        let mut pair = surfaces();
        engine.draw_composite(&mut pair.display);

        let mut saw_error = false;
        while let Ok(message) = rx.try_recv() {
            if matches!(message, ControlMessage::Effect(EffectEvent::Error { .. })) {
                saw_error = true;
            }
        }
        assert!(saw_error);
        assert_eq!(engine.active_effect(), None);
    }

    #[test]
    fn test_aviators_darkens_eye_line() {
        let mut rgba: Vec<u8> = [200u8, 200, 200, 255]
            .iter()
            .copied()
            .cycle()
            .take(100 * 100 * 4)
            .collect();
        EffectKind::Aviators.apply(&mut rgba, 100, 100);

        let at = |x: usize, y: usize| rgba[(y * 100 + x) * 4];
        assert_eq!(at(25, 35), 30);
        assert_eq!(at(50, 35), 212);
        assert_eq!(at(25, 80), 200);
    }

    #[test]
    fn test_rotation_maps_coordinates() {
        // 90 degree sensor: display (0,0) reads the bottom-left sensor pixel
        assert_eq!(source_coords(Orientation::Deg90, 0, 0, 4, 2), (0, 1));
        assert_eq!(source_coords(Orientation::Deg180, 0, 0, 4, 2), (3, 1));
        assert_eq!(source_coords(Orientation::Deg270, 0, 0, 4, 2), (3, 0));
    }

    #[test]
    fn test_release_is_idempotent() {
        let (tx, _rx) = control_channel();
        let engine = OverlayEngine::new(Duration::ZERO);
        engine.initialize(EventSink::effect(tx)).unwrap();
        wait_initialized(&engine);

        engine.release();
        engine.release();
        assert!(!engine.is_initialized());

        engine.submit_frame(solid_frame(1, [1, 1, 1, 255]));
        assert_eq!(engine.stats().dropped_uninitialized, 1);
    }
}
