//! Rendering
//!
//! Shared-context surface pair, the render loop that drives the effect
//! engine into it, and the composited frames read back for export.

pub mod frame;
pub mod renderer;
pub mod surface;

pub use frame::CompositedFrame;
pub use renderer::{Renderer, RendererStats};
pub use surface::{
    CpuBackend, GraphicsBackend, SharedResources, Surface, SurfaceConfig, SurfaceHandle,
    SurfaceKind, SurfacePair,
};
