//! Camera Device Boundary
//!
//! `CaptureDevice` is the thin seam between the frame source and the
//! platform camera API. The synthetic camera implements it with a moving
//! test pattern so the whole pipeline runs without hardware.

use bytes::Bytes;
use std::thread;
use std::time::Instant;
use tracing::{debug, info};

use crate::capture::frame::{CaptureFormat, PixelFormat, RawFrame};
use crate::config::types::CaptureConfig;
use crate::error::{PipelineError, Result};

/// Platform camera device
///
/// The device is moved onto the capture thread while a session is open and
/// handed back when the session closes.
pub trait CaptureDevice: Send + 'static {
    /// Acquire the device and report the negotiated format
    fn acquire(&mut self) -> Result<CaptureFormat>;

    /// Block until the next frame is available.
    ///
    /// Returns `None` if no frame arrived within one capture interval; the
    /// capture loop simply polls again.
    fn next_frame(&mut self) -> Option<RawFrame>;

    /// Release the device
    fn release(&mut self);

    /// Human readable device name
    fn name(&self) -> &str;
}

/// Test-pattern camera paced at its configured frame rate
pub struct SyntheticCamera {
    name: String,
    format: CaptureFormat,
    acquired: bool,
    available: bool,
    frame_id: u64,
    started_at: Instant,
    next_deadline: Instant,
}

impl SyntheticCamera {
    /// Create a synthetic camera from the capture configuration
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            name: format!("synthetic-{}x{}", config.width, config.height),
            format: config.capture_format(),
            acquired: false,
            available: true,
            frame_id: 0,
            started_at: Instant::now(),
            next_deadline: Instant::now(),
        }
    }

    /// Create a camera whose acquisition always fails, as if the device
    /// were held by another process
    pub fn unavailable(config: &CaptureConfig) -> Self {
        Self {
            available: false,
            ..Self::new(config)
        }
    }

    /// Negotiated capture format
    pub fn format(&self) -> &CaptureFormat {
        &self.format
    }

    fn render_pattern(&self) -> Bytes {
        let CaptureFormat {
            width,
            height,
            format,
            ..
        } = self.format;
        let shift = (self.frame_id * 4) as usize;
        let mut data = vec![0u8; format.frame_size(width, height)];

        match format {
            PixelFormat::Rgba | PixelFormat::Bgra => {
                for y in 0..height as usize {
                    for x in 0..width as usize {
                        let i = (y * width as usize + x) * 4;
                        data[i] = ((x + shift) * 255 / width as usize) as u8;
                        data[i + 1] = (y * 255 / height as usize) as u8;
                        data[i + 2] = ((shift * 3) % 256) as u8;
                        data[i + 3] = 255;
                    }
                }
            }
            PixelFormat::Gray8 | PixelFormat::Nv21 => {
                let luma_len = width as usize * height as usize;
                for y in 0..height as usize {
                    for x in 0..width as usize {
                        data[y * width as usize + x] = ((x + y + shift) % 256) as u8;
                    }
                }
                // Neutral chroma
                data[luma_len..].fill(128);
            }
        }

        Bytes::from(data)
    }
}

impl CaptureDevice for SyntheticCamera {
    fn acquire(&mut self) -> Result<CaptureFormat> {
        if !self.available {
            return Err(PipelineError::DeviceUnavailable(format!(
                "{} is in use by another client",
                self.name
            )));
        }
        let CaptureFormat {
            width, height, fps, ..
        } = self.format;
        if width == 0 || height == 0 || fps == 0 {
            return Err(PipelineError::DeviceUnavailable(format!(
                "{} cannot deliver {}x{} at {} fps",
                self.name, width, height, fps
            )));
        }

        self.acquired = true;
        self.frame_id = 0;
        self.started_at = Instant::now();
        self.next_deadline = self.started_at;
        info!(
            device = %self.name,
            width = self.format.width,
            height = self.format.height,
            fps = self.format.fps,
            "Synthetic camera acquired"
        );
        Ok(self.format)
    }

    fn next_frame(&mut self) -> Option<RawFrame> {
        if !self.acquired {
            return None;
        }

        let now = Instant::now();
        if now < self.next_deadline {
            thread::sleep(self.next_deadline - now);
        }
        self.next_deadline += self.format.frame_interval();
        // Do not try to catch up after a stall
        if self.next_deadline < Instant::now() {
            self.next_deadline = Instant::now();
        }

        self.frame_id += 1;
        let data = self.render_pattern();
        Some(RawFrame::new(
            self.frame_id,
            self.started_at.elapsed(),
            &self.format,
            data,
        ))
    }

    fn release(&mut self) {
        if self.acquired {
            debug!(device = %self.name, frames = self.frame_id, "Synthetic camera released");
        }
        self.acquired = false;
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> CaptureConfig {
        CaptureConfig {
            width: 8,
            height: 4,
            fps: 200,
            ..CaptureConfig::default()
        }
    }

    #[test]
    fn test_synthetic_camera_produces_complete_frames() {
        let mut camera = SyntheticCamera::new(&small_config());
        let format = camera.acquire().unwrap();

        let first = camera.next_frame().unwrap();
        let second = camera.next_frame().unwrap();

        assert_eq!(first.frame_id, 1);
        assert_eq!(second.frame_id, 2);
        assert_eq!(first.width, format.width);
        assert!(first.is_complete());
        assert!(second.timestamp >= first.timestamp);
    }

    #[test]
    fn test_unacquired_camera_yields_nothing() {
        let mut camera = SyntheticCamera::new(&small_config());
        assert!(camera.next_frame().is_none());

        camera.acquire().unwrap();
        camera.release();
        assert!(camera.next_frame().is_none());
    }

    #[test]
    fn test_unavailable_camera_fails_acquire() {
        let mut camera = SyntheticCamera::unavailable(&small_config());
        let err = camera.acquire().unwrap_err();
        assert!(matches!(err, PipelineError::DeviceUnavailable(_)));
    }

    #[test]
    fn test_degenerate_format_fails_acquire() {
        for (width, height, fps) in [(0, 4, 30), (8, 0, 30), (8, 4, 0)] {
            let config = CaptureConfig {
                width,
                height,
                fps,
                ..CaptureConfig::default()
            };
            let mut camera = SyntheticCamera::new(&config);
            let err = camera.acquire().unwrap_err();
            assert!(matches!(err, PipelineError::DeviceUnavailable(_)));
            assert!(camera.next_frame().is_none());
        }
    }
}
