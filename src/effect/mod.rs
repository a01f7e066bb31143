//! AR effect engine boundary
//!
//! The pipeline never implements face tracking or effect compositing
//! itself; it sequences calls into an [`EffectProcessor`]:
//!
//! - the capture thread calls [`EffectProcessor::submit_frame`]
//! - the render thread calls [`EffectProcessor::draw_composite`] once per
//!   surface per cycle
//! - the control context calls [`EffectProcessor::switch_effect`]
//!
//! Engine notifications travel through an [`EventSink`] onto the control
//! context. [`OverlayEngine`] is a software engine with the same contract,
//! used by the demo binary and the tests.

use serde::{Deserialize, Serialize};

use crate::call::events::EventSink;
use crate::capture::frame::RawFrame;
use crate::error::Result;
use crate::render::surface::Surface;

pub mod overlay;

pub use overlay::{EffectKind, OverlayEngine, OverlayStats};

/// Reference to an effect asset bound to a named slot
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EffectRef {
    /// Slot the effect is loaded into (e.g. "mask")
    pub slot: String,
    /// Asset path or name
    pub path: String,
}

impl EffectRef {
    /// Create an effect reference
    pub fn new(slot: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            slot: slot.into(),
            path: path.into(),
        }
    }
}

impl std::fmt::Display for EffectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.slot, self.path)
    }
}

/// Notifications raised by the effect engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EffectEvent {
    /// Engine finished its asynchronous initialization
    Initialized,
    /// A requested effect became active
    EffectSwitched(EffectRef),
    /// Engine reported an error
    Error {
        /// Engine-specific category
        kind: String,
        /// Detail message
        message: String,
    },
    /// A face entered or left the tracked area
    FaceVisibilityChanged(bool),
}

/// What became of a frame handed to [`EffectProcessor::submit_frame`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDisposition {
    /// Queued for the next draw
    Queued,
    /// Queued in place of an older frame that was never processed
    ReplacedPending,
    /// Discarded; the engine is not ready
    Dropped,
}

impl FrameDisposition {
    /// Number of frames this submission discarded
    pub fn dropped(self) -> u64 {
        match self {
            Self::Queued => 0,
            Self::ReplacedPending | Self::Dropped => 1,
        }
    }
}

/// AR effect engine
///
/// Methods take `&self`: the engine is shared by the capture thread, the
/// render thread, and the control context.
pub trait EffectProcessor: Send + Sync {
    /// Start asynchronous initialization; `Initialized` arrives on `events`
    fn initialize(&self, events: EventSink<EffectEvent>) -> Result<()>;

    /// Hand over a raw frame. Never blocks; dropped while initializing,
    /// superseded by a newer frame if not yet processed.
    fn submit_frame(&self, frame: RawFrame) -> FrameDisposition;

    /// Rasterize the latest processed frame into `target`
    fn draw_composite(&self, target: &mut Surface);

    /// Request an effect change; it becomes active on a later draw
    fn switch_effect(&self, effect: EffectRef);

    /// Release engine resources. Idempotent.
    fn release(&self);

    /// Check if initialization completed
    fn is_initialized(&self) -> bool;
}
