//! Composited Frames
//!
//! The image read back from the export surface for one render cycle.
//! Ownership moves into the transport's push call; the type is not `Clone`.

use bytes::Bytes;
use image::RgbaImage;
use std::path::Path;
use std::time::Instant;

use crate::render::surface::{Surface, SURFACE_BPP};

/// One effect-rendered image ready for transmission
#[derive(Debug)]
pub struct CompositedFrame {
    /// Render cycle that produced the frame
    pub sequence: u64,

    /// Frame width in pixels
    pub width: u32,

    /// Frame height in pixels
    pub height: u32,

    /// Row stride in bytes (RGBA8)
    pub stride: u32,

    /// Pixel data
    pub data: Bytes,

    /// Read-back instant
    pub rendered_at: Instant,
}

impl CompositedFrame {
    /// Read back an export surface
    pub fn read_back(sequence: u64, surface: &Surface) -> Self {
        Self {
            sequence,
            width: surface.width(),
            height: surface.height(),
            stride: surface.stride(),
            data: surface.read_pixels(),
            rendered_at: Instant::now(),
        }
    }

    /// Expected buffer length for the declared geometry
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * SURFACE_BPP
    }

    /// Convert to an `image` buffer
    pub fn to_rgba_image(&self) -> Option<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.data.to_vec())
    }

    /// Write the frame as a PNG file
    pub fn save_png(&self, path: &Path) -> anyhow::Result<()> {
        let image = self.to_rgba_image().ok_or_else(|| {
            anyhow::anyhow!(
                "frame buffer is {} bytes, expected {}",
                self.data.len(),
                self.expected_len()
            )
        })?;
        image.save_with_format(path, image::ImageFormat::Png)?;
        Ok(())
    }
}
