//! Camera Frame Source
//!
//! Owns the camera device and pushes frames to exactly one consumer from a
//! dedicated capture thread.
//!
//! # Architecture
//!
//! ```text
//! Control context                  Capture thread (std::thread)
//! ━━━━━━━━━━━━━━━                  ━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//!
//! open(consumer) ──acquire device──> run_capture_loop()
//!       │                                 │
//!       │                                 ├─ device.next_frame()
//!       │                                 ├─ lock binding
//!       │                                 │    └─ consumer(frame)
//!       │                                 └─ repeat until stop
//!       │
//! close() ──unbind under lock──────> (waits for in-flight delivery)
//!         ──stop + join─────────────> device handed back, released
//! ```
//!
//! # Delivery guarantee
//!
//! The consumer runs while the capture thread holds the binding lock.
//! `close()` clears the binding under that same lock, so once it returns no
//! further callback can start. The consumer must not call back into the
//! source.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, trace, warn};

use crate::capture::device::CaptureDevice;
use crate::capture::frame::{CaptureFormat, RawFrame};
use crate::error::{PipelineError, Result};

/// Frame consumer callback bound by `open`
pub type FrameConsumer = Box<dyn FnMut(RawFrame) + Send + 'static>;

/// Continuous producer of raw camera frames
pub trait FrameSource: Send {
    /// Bind `consumer` and start pushing frames at the native capture rate.
    ///
    /// Fails with `AlreadyOpen` if a consumer is bound and with
    /// `DeviceUnavailable` if the device cannot be acquired; on failure no
    /// consumer is bound.
    fn open(&mut self, consumer: FrameConsumer) -> Result<()>;

    /// Unbind the consumer and release the device.
    ///
    /// Synchronous: no consumer invocation starts after this returns.
    /// Closing a closed source is a no-op.
    fn close(&mut self);

    /// Check if a consumer is bound
    fn is_open(&self) -> bool;

    /// Frames delivered to consumers since creation
    fn frames_delivered(&self) -> u64;
}

/// Consumer slot shared with the capture thread
type Binding = Arc<Mutex<Option<FrameConsumer>>>;

/// Running capture session
struct CaptureSession<D: CaptureDevice> {
    thread_handle: JoinHandle<D>,
    stop: Arc<AtomicBool>,
    format: CaptureFormat,
}

/// Frame source backed by a `CaptureDevice`
pub struct CameraSource<D: CaptureDevice> {
    /// Device, present while no session is running
    device: Option<D>,
    binding: Binding,
    session: Option<CaptureSession<D>>,
    delivered: Arc<AtomicU64>,
}

impl<D: CaptureDevice> CameraSource<D> {
    /// Create a closed frame source for `device`
    pub fn new(device: D) -> Self {
        Self {
            device: Some(device),
            binding: Arc::new(Mutex::new(None)),
            session: None,
            delivered: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Format negotiated by the running session
    pub fn capture_format(&self) -> Option<CaptureFormat> {
        self.session.as_ref().map(|s| s.format)
    }
}

impl<D: CaptureDevice> FrameSource for CameraSource<D> {
    fn open(&mut self, consumer: FrameConsumer) -> Result<()> {
        if self.session.is_some() {
            return Err(PipelineError::AlreadyOpen);
        }

        let mut device = self
            .device
            .take()
            .ok_or_else(|| PipelineError::DeviceUnavailable("device lost".to_string()))?;

        let format = match device.acquire() {
            Ok(format) => format,
            Err(e) => {
                warn!(device = device.name(), error = %e, "Failed to acquire camera");
                self.device = Some(device);
                return Err(e);
            }
        };

        *self.binding.lock() = Some(consumer);

        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let binding = Arc::clone(&self.binding);
        let delivered = Arc::clone(&self.delivered);

        // The device moves onto the capture thread and comes back on join.
        // If the spawn fails the closure is dropped with the device in it,
        // so the device slot stays empty and later opens report it lost.
        let spawned = thread::Builder::new()
            .name("camera-capture".to_string())
            .spawn(move || run_capture_loop(device, binding, thread_stop, delivered));

        let thread_handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                *self.binding.lock() = None;
                return Err(PipelineError::ThreadSpawn(e.to_string()));
            }
        };

        info!(
            width = format.width,
            height = format.height,
            fps = format.fps,
            "Frame source opened"
        );

        self.session = Some(CaptureSession {
            thread_handle,
            stop,
            format,
        });
        Ok(())
    }

    fn close(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };

        // Blocks until any in-flight delivery has returned
        let consumer = self.binding.lock().take();
        drop(consumer);

        session.stop.store(true, Ordering::SeqCst);
        match session.thread_handle.join() {
            Ok(mut device) => {
                device.release();
                self.device = Some(device);
            }
            Err(_) => {
                warn!("Capture thread panicked; camera device lost");
            }
        }

        info!(
            delivered = self.delivered.load(Ordering::Relaxed),
            "Frame source closed"
        );
    }

    fn is_open(&self) -> bool {
        self.session.is_some()
    }

    fn frames_delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }
}

impl<D: CaptureDevice> Drop for CameraSource<D> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Capture thread body. Returns the device so the source can reuse it.
fn run_capture_loop<D: CaptureDevice>(
    mut device: D,
    binding: Binding,
    stop: Arc<AtomicBool>,
    delivered: Arc<AtomicU64>,
) -> D {
    debug!(device = device.name(), "Capture thread started");

    while !stop.load(Ordering::SeqCst) {
        let Some(frame) = device.next_frame() else {
            continue;
        };

        let frame_id = frame.frame_id;
        let mut guard = binding.lock();
        match guard.as_mut() {
            Some(consumer) => {
                consumer(frame);
                let total = delivered.fetch_add(1, Ordering::Relaxed) + 1;
                if total % 100 == 0 {
                    debug!(frames = total, "Capture delivery progress");
                }
            }
            None => {
                trace!(frame_id, "Discarding frame captured after close");
                break;
            }
        }
    }

    debug!(device = device.name(), "Capture thread exiting");
    device
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::device::SyntheticCamera;
    use crate::config::types::CaptureConfig;
    use std::time::Duration;

    fn fast_config() -> CaptureConfig {
        CaptureConfig {
            width: 16,
            height: 16,
            fps: 240,
            ..CaptureConfig::default()
        }
    }

    #[test]
    fn test_open_delivers_frames() {
        let mut source = CameraSource::new(SyntheticCamera::new(&fast_config()));
        let counter = Arc::new(AtomicU64::new(0));
        let sink = Arc::clone(&counter);

        source
            .open(Box::new(move |_frame| {
                sink.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
        assert!(source.is_open());

        thread::sleep(Duration::from_millis(60));
        source.close();

        assert!(!source.is_open());
        assert!(counter.load(Ordering::SeqCst) > 0);
        assert_eq!(counter.load(Ordering::SeqCst), source.frames_delivered());
    }

    #[test]
    fn test_second_open_fails_already_open() {
        let mut source = CameraSource::new(SyntheticCamera::new(&fast_config()));
        source.open(Box::new(|_| {})).unwrap();

        let err = source.open(Box::new(|_| {})).unwrap_err();
        assert_eq!(err, PipelineError::AlreadyOpen);
        source.close();
    }

    #[test]
    fn test_unavailable_device_binds_nothing() {
        let mut source = CameraSource::new(SyntheticCamera::unavailable(&fast_config()));

        let err = source.open(Box::new(|_| {})).unwrap_err();
        assert!(matches!(err, PipelineError::DeviceUnavailable(_)));
        assert!(!source.is_open());
        assert!(source.binding.lock().is_none());
    }

    #[test]
    fn test_no_delivery_after_close_returns() {
        let mut source = CameraSource::new(SyntheticCamera::new(&fast_config()));
        let counter = Arc::new(AtomicU64::new(0));
        let sink = Arc::clone(&counter);

        source
            .open(Box::new(move |_frame| {
                // Slow consumer widens the race window
                thread::sleep(Duration::from_millis(2));
                sink.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();

        thread::sleep(Duration::from_millis(30));
        source.close();
        let at_close = counter.load(Ordering::SeqCst);

        thread::sleep(Duration::from_millis(30));
        assert_eq!(counter.load(Ordering::SeqCst), at_close);
    }

    #[test]
    fn test_reopen_after_close() {
        let mut source = CameraSource::new(SyntheticCamera::new(&fast_config()));
        source.open(Box::new(|_| {})).unwrap();
        source.close();
        source.close();

        source.open(Box::new(|_| {})).unwrap();
        assert!(source.capture_format().is_some());
        source.close();
    }
}
