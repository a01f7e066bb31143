//! Shared Graphics Context and Surfaces
//!
//! A single context factory produces both the on-screen display surface and
//! the off-screen export surface. Both hold the same `SharedResources`
//! (programs, textures), are created together at pipeline start, and are
//! destroyed together at pipeline stop.
//!
//! ```text
//! GraphicsBackend::create_context()
//!         │
//!         ▼
//!   SurfacePair ──┬── display: Surface ──┐
//!                 │                      ├── Arc<SharedResources>
//!                 └── export:  Surface ──┘
//! ```

use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::types::RenderConfig;
use crate::error::{PipelineError, Result};

/// Bytes per pixel of every surface (RGBA8)
pub const SURFACE_BPP: usize = 4;

static NEXT_SURFACE_HANDLE: AtomicU64 = AtomicU64::new(1);
static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque handle identifying a renderable surface (local or remote)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceHandle(u64);

impl SurfaceHandle {
    /// Allocate a process-unique handle
    pub fn allocate() -> Self {
        Self(NEXT_SURFACE_HANDLE.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw handle value
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SurfaceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "surface#{}", self.0)
    }
}

/// Framebuffer configuration requested from the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceConfig {
    /// Display surface size
    pub display_width: u32,
    /// Display surface height
    pub display_height: u32,
    /// Export surface width (matches the encoder resolution)
    pub export_width: u32,
    /// Export surface height
    pub export_height: u32,
    /// Red, green, blue, alpha channel depth
    pub color_bits: [u8; 4],
    /// Depth buffer bits
    pub depth_bits: u8,
}

impl From<&RenderConfig> for SurfaceConfig {
    fn from(config: &RenderConfig) -> Self {
        Self {
            display_width: config.display_width,
            display_height: config.display_height,
            export_width: config.export_width,
            export_height: config.export_height,
            color_bits: config.color_bits,
            depth_bits: config.depth_bits,
        }
    }
}

/// Role of a surface within the pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceKind {
    /// On-screen preview
    Display,
    /// Off-screen read-back target for the call transport
    Export,
}

/// GPU resources shared by both surfaces of one context
#[derive(Debug)]
pub struct SharedResources {
    /// Context identifier
    pub context_id: u64,
    /// Backend that created the context
    pub backend: &'static str,
    /// Color channel depth
    pub color_bits: [u8; 4],
    /// Depth buffer bits
    pub depth_bits: u8,
}

/// RGBA8 render target
pub struct Surface {
    kind: SurfaceKind,
    handle: SurfaceHandle,
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    resources: Arc<SharedResources>,
    presented: u64,
}

impl Surface {
    fn new(kind: SurfaceKind, width: u32, height: u32, resources: Arc<SharedResources>) -> Self {
        Self {
            kind,
            handle: SurfaceHandle::allocate(),
            width,
            height,
            pixels: vec![0; width as usize * height as usize * SURFACE_BPP],
            resources,
            presented: 0,
        }
    }

    /// Surface role
    pub fn kind(&self) -> SurfaceKind {
        self.kind
    }

    /// Surface handle
    pub fn handle(&self) -> SurfaceHandle {
        self.handle
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row stride in bytes
    pub fn stride(&self) -> u32 {
        self.width * SURFACE_BPP as u32
    }

    /// Shared context resources
    pub fn resources(&self) -> &Arc<SharedResources> {
        &self.resources
    }

    /// Pixel storage
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Mutable pixel storage
    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    /// Fill with a solid color
    pub fn clear(&mut self, rgba: [u8; 4]) {
        for px in self.pixels.chunks_exact_mut(SURFACE_BPP) {
            px.copy_from_slice(&rgba);
        }
    }

    /// Write one pixel; out-of-bounds writes are ignored
    pub fn put_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        if x < self.width && y < self.height {
            let i = (y as usize * self.width as usize + x as usize) * SURFACE_BPP;
            self.pixels[i..i + SURFACE_BPP].copy_from_slice(&rgba);
        }
    }

    /// Read one pixel
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x < self.width && y < self.height {
            let i = (y as usize * self.width as usize + x as usize) * SURFACE_BPP;
            let mut px = [0u8; 4];
            px.copy_from_slice(&self.pixels[i..i + SURFACE_BPP]);
            Some(px)
        } else {
            None
        }
    }

    /// Copy another surface of the same size and context
    ///
    /// Returns false if the surfaces are incompatible.
    pub fn copy_from(&mut self, other: &Surface) -> bool {
        if self.width != other.width
            || self.height != other.height
            || !Arc::ptr_eq(&self.resources, &other.resources)
        {
            return false;
        }
        self.pixels.copy_from_slice(&other.pixels);
        true
    }

    /// Swap the frame onto the screen
    pub fn present(&mut self) {
        self.presented += 1;
    }

    /// Frames presented so far
    pub fn presented_frames(&self) -> u64 {
        self.presented
    }

    /// Read the framebuffer back into CPU memory
    pub fn read_pixels(&self) -> Bytes {
        Bytes::copy_from_slice(&self.pixels)
    }
}

/// Display and export surfaces sharing one context
pub struct SurfacePair {
    /// On-screen preview surface
    pub display: Surface,
    /// Off-screen export surface
    pub export: Surface,
}

impl SurfacePair {
    /// Shared context resources
    pub fn resources(&self) -> &Arc<SharedResources> {
        &self.display.resources
    }

    /// Whether the export surface can reuse the display composite as-is
    pub fn sizes_match(&self) -> bool {
        self.display.width == self.export.width && self.display.height == self.export.height
    }

    /// Destroy both surfaces and release the shared context
    pub fn destroy(self) {
        let context_id = self.resources().context_id;
        drop(self);
        debug!(context_id, "Surface pair destroyed");
    }
}

/// Factory for shared-context surface pairs
pub trait GraphicsBackend: Send {
    /// Create the shared context with its display and export surfaces
    fn create_context(&self, config: &SurfaceConfig) -> Result<SurfacePair>;

    /// Backend name for diagnostics
    fn name(&self) -> &'static str;
}

/// Software backend rendering into CPU memory
#[derive(Debug, Default)]
pub struct CpuBackend;

impl CpuBackend {
    /// Create the software backend
    pub fn new() -> Self {
        Self
    }
}

impl GraphicsBackend for CpuBackend {
    fn create_context(&self, config: &SurfaceConfig) -> Result<SurfacePair> {
        if config.display_width == 0
            || config.display_height == 0
            || config.export_width == 0
            || config.export_height == 0
        {
            return Err(PipelineError::ContextCreationFailed(format!(
                "zero-sized surface requested ({}x{} display, {}x{} export)",
                config.display_width,
                config.display_height,
                config.export_width,
                config.export_height
            )));
        }
        if config.color_bits.iter().any(|&bits| bits != 8) {
            return Err(PipelineError::ContextCreationFailed(format!(
                "no framebuffer config matches color bits {:?}",
                config.color_bits
            )));
        }

        let resources = Arc::new(SharedResources {
            context_id: NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed),
            backend: self.name(),
            color_bits: config.color_bits,
            depth_bits: config.depth_bits,
        });

        let pair = SurfacePair {
            display: Surface::new(
                SurfaceKind::Display,
                config.display_width,
                config.display_height,
                Arc::clone(&resources),
            ),
            export: Surface::new(
                SurfaceKind::Export,
                config.export_width,
                config.export_height,
                resources,
            ),
        };

        info!(
            context_id = pair.resources().context_id,
            display = %pair.display.handle(),
            export = %pair.export.handle(),
            "Shared graphics context created"
        );
        Ok(pair)
    }

    fn name(&self) -> &'static str {
        "cpu"
    }
}
