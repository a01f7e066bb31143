//! # arcall
//!
//! Real-time AR video call pipeline: camera frames go through an AR effect
//! engine, are composited into a preview surface and a shared-context export
//! surface, and the export is pushed to a call transport as an external
//! video source.
//!
//! # Architecture
//!
//! ```text
//! arcall
//!   ├─> FrameSource (camera capture thread)
//!   ├─> EffectProcessor (face tracking and effect compositing)
//!   ├─> Renderer (render-loop thread + frame-export pump)
//!   │     └─> SurfacePair (display + export, shared resources)
//!   ├─> TransportSink (network call engine)
//!   └─> CallSessionController (lifecycle, participant views)
//! ```
//!
//! # Data Flow
//!
//! **Video Path:** Camera → EffectProcessor → Display surface → Export
//! surface → LatestSlot → TransportSink
//!
//! **Control Path:** TransportSink / EffectProcessor → control queue →
//! CallSessionController → UI notifications
//!
//! # Threads
//!
//! | Context        | Runs                                                |
//! |----------------|-----------------------------------------------------|
//! | control        | every controller method, state and view registry    |
//! | `camera-capture` | device reads, `submit_frame`                      |
//! | `render-loop`  | fixed-cadence draw, present, export read-back       |
//! | `frame-export` | `push_frame`, the only place the transport may block |

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Call lifecycle, participant views, and event marshaling
pub mod call;

/// Camera capture
pub mod capture;

/// Configuration
pub mod config;

/// AR effect engine boundary
pub mod effect;

/// Pipeline error types
pub mod error;

/// Latest-value hand-off between threads
pub mod handoff;

/// Surfaces and the render loop
pub mod render;

/// Call transport boundary
pub mod transport;

/// Utility functions
pub mod utils;

pub use call::{CallSessionController, CallState, PipelineParts, SessionNotification};
pub use config::Config;
pub use error::{PipelineError, Result};
