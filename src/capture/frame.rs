//! Raw Camera Frames
//!
//! Structures describing one unprocessed captured image. A `RawFrame` has a
//! single owner: it moves from the capture thread into the effect engine
//! and is dropped there, so it is deliberately not `Clone`.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Camera pixel layouts understood by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// RGBA 32-bit
    Rgba,
    /// BGRA 32-bit
    Bgra,
    /// Grayscale 8-bit
    Gray8,
    /// YUV 4:2:0 semi-planar, V before U (Android camera default)
    Nv21,
}

impl PixelFormat {
    /// Bytes per pixel of the first plane
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            Self::Rgba | Self::Bgra => 4,
            Self::Gray8 | Self::Nv21 => 1,
        }
    }

    /// Total buffer size for a tightly packed frame
    pub fn frame_size(&self, width: u32, height: u32) -> usize {
        let pixels = width as usize * height as usize;
        match self {
            Self::Nv21 => pixels + 2 * (width as usize).div_ceil(2) * (height as usize).div_ceil(2),
            other => pixels * other.bytes_per_pixel(),
        }
    }

    /// Row stride of the first plane for a tightly packed frame
    pub fn min_stride(&self, width: u32) -> u32 {
        width * self.bytes_per_pixel() as u32
    }
}

/// Sensor orientation relative to the display's natural orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Orientation {
    /// Upright
    #[default]
    Deg0,
    /// Rotated 90 degrees clockwise
    Deg90,
    /// Upside down
    Deg180,
    /// Rotated 270 degrees clockwise
    Deg270,
}

impl Orientation {
    /// Build from a rotation in degrees (multiples of 90)
    pub fn from_degrees(degrees: u32) -> Option<Self> {
        match degrees % 360 {
            0 => Some(Self::Deg0),
            90 => Some(Self::Deg90),
            180 => Some(Self::Deg180),
            270 => Some(Self::Deg270),
            _ => None,
        }
    }

    /// Rotation in degrees
    pub fn degrees(&self) -> u32 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }

    /// Whether width and height swap when the frame is displayed upright
    pub fn is_transposed(&self) -> bool {
        matches!(self, Self::Deg90 | Self::Deg270)
    }
}

/// Format metadata shared by every frame of a capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureFormat {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Native capture rate
    pub fps: u32,
    /// Pixel layout
    pub format: PixelFormat,
    /// Sensor orientation
    pub orientation: Orientation,
    /// Front-facing camera (image is mirrored for display)
    pub mirrored: bool,
}

impl CaptureFormat {
    /// Interval between two frames at the native capture rate
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps.max(1) as f64)
    }
}

/// One unprocessed captured video image
#[derive(Debug)]
pub struct RawFrame {
    /// Monotonic frame counter within a capture session
    pub frame_id: u64,

    /// Offset from the start of the capture session
    pub timestamp: Duration,

    /// Wall-clock capture instant
    pub captured_at: Instant,

    /// Frame width in pixels
    pub width: u32,

    /// Frame height in pixels
    pub height: u32,

    /// Row stride of the first plane in bytes
    pub stride: u32,

    /// Pixel layout
    pub format: PixelFormat,

    /// Sensor orientation
    pub orientation: Orientation,

    /// Front-facing camera
    pub mirrored: bool,

    /// Pixel data
    pub data: Bytes,
}

impl RawFrame {
    /// Create a frame from a capture format and pixel data
    pub fn new(frame_id: u64, timestamp: Duration, format: &CaptureFormat, data: Bytes) -> Self {
        Self {
            frame_id,
            timestamp,
            captured_at: Instant::now(),
            width: format.width,
            height: format.height,
            stride: format.format.min_stride(format.width),
            format: format.format,
            orientation: format.orientation,
            mirrored: format.mirrored,
            data,
        }
    }

    /// Check the buffer is large enough for the declared geometry
    pub fn is_complete(&self) -> bool {
        let first_plane = self.stride as usize * self.height as usize;
        match self.format {
            PixelFormat::Nv21 => self.data.len() >= self.format.frame_size(self.width, self.height),
            _ => self.data.len() >= first_plane,
        }
    }

    /// Age of the frame since capture
    pub fn age(&self) -> Duration {
        self.captured_at.elapsed()
    }

    /// Sample one pixel as RGBA. Coordinates must be inside the frame.
    pub fn sample_rgba(&self, x: u32, y: u32) -> [u8; 4] {
        let data = &self.data;
        match self.format {
            PixelFormat::Rgba => {
                let i = (y * self.stride + x * 4) as usize;
                [data[i], data[i + 1], data[i + 2], data[i + 3]]
            }
            PixelFormat::Bgra => {
                let i = (y * self.stride + x * 4) as usize;
                [data[i + 2], data[i + 1], data[i], data[i + 3]]
            }
            PixelFormat::Gray8 => {
                let v = data[(y * self.stride + x) as usize];
                [v, v, v, 255]
            }
            PixelFormat::Nv21 => {
                let luma = data[(y * self.stride + x) as usize] as f32;
                let chroma_base = (self.stride * self.height) as usize;
                let chroma_row = (y / 2) as usize * (self.width as usize).div_ceil(2) * 2;
                let ci = chroma_base + chroma_row + (x / 2) as usize * 2;
                let v = data[ci] as f32 - 128.0;
                let u = data[ci + 1] as f32 - 128.0;
                let r = luma + 1.402 * v;
                let g = luma - 0.344_136 * u - 0.714_136 * v;
                let b = luma + 1.772 * u;
                [clamp_u8(r), clamp_u8(g), clamp_u8(b), 255]
            }
        }
    }
}

fn clamp_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
