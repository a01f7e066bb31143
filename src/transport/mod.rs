//! Call transport boundary
//!
//! The network call engine is an external collaborator. The pipeline pushes
//! composited frames into it as an external video source and reacts to the
//! events it raises; encoding, signaling, and media transport stay on the
//! other side of [`TransportSink`].
//!
//! Events are raised on the transport's own delivery threads and must go
//! through the [`EventSink`] handed over in
//! [`TransportSink::set_event_sink`], which marshals them onto the control
//! context.

use std::fmt;
use std::time::Duration;

use crate::call::events::EventSink;
use crate::config::types::{ChannelProfile, ClientRole, EncoderConfig, RemoteRenderMode};
use crate::error::Result;
use crate::render::frame::CompositedFrame;
use crate::render::surface::SurfaceHandle;

pub mod loopback;

pub use loopback::{LinkPhase, LoopbackStats, LoopbackTransport};

/// Transport-assigned participant identifier, stable for one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParticipantId(pub u32);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "uid:{}", self.0)
    }
}

/// Name of the call channel to join
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelRef(String);

impl ChannelRef {
    /// Create a channel reference
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Channel name
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a remote participant went offline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeaveReason {
    /// Participant left the channel
    Quit,
    /// No data received for too long
    Timeout,
    /// Participant switched to the audience role
    BecameAudience,
}

impl LeaveReason {
    /// Map a transport reason code
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => Self::Timeout,
            2 => Self::BecameAudience,
            _ => Self::Quit,
        }
    }
}

impl fmt::Display for LeaveReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Quit => f.write_str("quit"),
            Self::Timeout => f.write_str("timeout"),
            Self::BecameAudience => f.write_str("became_audience"),
        }
    }
}

/// Events raised by the call transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Local user joined the channel
    Joined {
        /// Time the join took
        elapsed: Duration,
    },
    /// First video frame from a remote participant was decoded
    RemoteFrameFirstDecoded {
        /// Remote participant
        participant: ParticipantId,
        /// Decoded width
        width: u32,
        /// Decoded height
        height: u32,
    },
    /// Remote participant went offline
    ParticipantLeft {
        /// Remote participant
        participant: ParticipantId,
        /// Reason reported by the transport
        reason: LeaveReason,
    },
    /// Non-fatal transport warning
    Warning(i32),
    /// Transport error
    Error(i32),
}

/// Settings applied to the transport before the first join
#[derive(Debug, Clone, PartialEq)]
pub struct TransportSettings {
    /// Outgoing video encoder configuration
    pub encoder: EncoderConfig,
    /// Channel usage profile
    pub channel_profile: ChannelProfile,
}

/// Network call engine
///
/// Methods take `&self`; the renderer's export thread calls `push_frame`
/// while the control context drives everything else.
pub trait TransportSink: Send + Sync {
    /// Register where events are raised
    fn set_event_sink(&self, sink: EventSink<TransportEvent>);

    /// Enable video and apply encoder and channel settings
    fn configure(&self, settings: &TransportSettings) -> Result<()>;

    /// Switch outgoing video to externally pushed frames
    fn enable_external_video_source(&self) -> Result<()>;

    /// Push one composited frame for transmission.
    ///
    /// A silent no-op unless joined. May block on a slow network path, but
    /// must return promptly once `leave` or `destroy` is called: teardown
    /// joins the export thread that is blocked here.
    fn push_frame(&self, frame: CompositedFrame);

    /// Set the local client role
    fn set_client_role(&self, role: ClientRole) -> Result<()>;

    /// Start joining `channel`; completion is reported by `Joined`
    fn join(&self, channel: &ChannelRef) -> Result<()>;

    /// Leave the current channel. Idempotent.
    ///
    /// Must wake any `push_frame` blocked on another thread and make later
    /// pushes no-ops, and must cancel a pending join so no `Joined` event
    /// follows.
    fn leave(&self);

    /// Create a render surface bound to a remote participant's video
    fn create_remote_view(
        &self,
        participant: ParticipantId,
        mode: RemoteRenderMode,
    ) -> Result<SurfaceHandle>;

    /// Release a remote participant's render surface
    fn release_remote_view(&self, participant: ParticipantId);

    /// Destroy the engine instance. Idempotent.
    fn destroy(&self);
}
