//! Call session
//!
//! Lifecycle state machine, participant view registry, and the marshaling
//! of foreign-thread events onto the control context.

pub mod controller;
pub mod events;
pub mod registry;
pub mod state;

pub use controller::{CallSessionController, PipelineParts, PipelineStats, SessionNotification};
pub use events::{control_channel, ControlMessage, ControlReceiver, ControlSender, EventSink};
pub use registry::{ParticipantViewRegistry, ViewLayout, ViewSlot, ViewSource};
pub use state::{CallOperation, CallState};
