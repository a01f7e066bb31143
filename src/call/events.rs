//! Control Context Marshaling
//!
//! Transport and effect-engine callbacks fire on threads the pipeline does
//! not own. They never touch call state directly: each callback is wrapped
//! into a [`ControlMessage`] and queued for the control context, which is
//! the only place call state and the view registry are mutated.
//!
//! ```text
//! Transport delivery thread(s) ──EventSink<TransportEvent>──┐
//!                                                            ├──> ControlReceiver
//! Effect engine thread(s) ──────EventSink<EffectEvent>──────┘        │
//!                                                                    ▼
//!                                              CallSessionController (control context)
//! ```

use tokio::sync::mpsc;
use tracing::trace;

use crate::effect::EffectEvent;
use crate::transport::TransportEvent;

/// Message queued for the control context
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    /// Event from the call transport
    Transport(TransportEvent),
    /// Event from the AR effect engine
    Effect(EffectEvent),
}

/// Sending half of the control queue
pub type ControlSender = mpsc::UnboundedSender<ControlMessage>;

/// Receiving half of the control queue
pub type ControlReceiver = mpsc::UnboundedReceiver<ControlMessage>;

/// Create the control queue
///
/// Unbounded: sends never block a delivery thread, and event volume is
/// bounded by call activity rather than frame rate.
pub fn control_channel() -> (ControlSender, ControlReceiver) {
    mpsc::unbounded_channel()
}

/// Typed handle a collaborator uses to raise events onto the control context
pub struct EventSink<E> {
    tx: ControlSender,
    wrap: fn(E) -> ControlMessage,
    origin: &'static str,
}

impl<E> EventSink<E> {
    /// Queue an event. Returns false if the control context is gone.
    pub fn emit(&self, event: E) -> bool {
        let delivered = self.tx.send((self.wrap)(event)).is_ok();
        if !delivered {
            trace!(origin = self.origin, "Control queue closed, event dropped");
        }
        delivered
    }

    /// Check if the control context is still receiving
    pub fn is_connected(&self) -> bool {
        !self.tx.is_closed()
    }
}

impl EventSink<TransportEvent> {
    /// Sink for call transport events
    pub fn transport(tx: ControlSender) -> Self {
        Self {
            tx,
            wrap: ControlMessage::Transport,
            origin: "transport",
        }
    }
}

impl EventSink<EffectEvent> {
    /// Sink for effect engine events
    pub fn effect(tx: ControlSender) -> Self {
        Self {
            tx,
            wrap: ControlMessage::Effect,
            origin: "effect",
        }
    }
}

impl<E> Clone for EventSink<E> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            wrap: self.wrap,
            origin: self.origin,
        }
    }
}

impl<E> std::fmt::Debug for EventSink<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSink")
            .field("origin", &self.origin)
            .field("connected", &self.is_connected())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ParticipantId;
    use std::thread;

    #[test]
    fn test_events_from_foreign_threads_arrive_in_order() {
        let (tx, mut rx) = control_channel();
        let sink = EventSink::transport(tx);

        let worker_sink = sink.clone();
        thread::spawn(move || {
            for code in 0..5 {
                worker_sink.emit(TransportEvent::Warning(code));
            }
        })
        .join()
        .unwrap();

        for code in 0..5 {
            assert_eq!(
                rx.try_recv().unwrap(),
                ControlMessage::Transport(TransportEvent::Warning(code))
            );
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_emit_after_receiver_dropped() {
        let (tx, rx) = control_channel();
        let sink = EventSink::transport(tx);
        drop(rx);

        assert!(!sink.is_connected());
        assert!(!sink.emit(TransportEvent::RemoteFrameFirstDecoded {
            participant: ParticipantId(1),
            width: 480,
            height: 480,
        }));
    }

    #[test]
    fn test_effect_sink_wraps_effect_events() {
        let (tx, mut rx) = control_channel();
        EventSink::effect(tx).emit(EffectEvent::FaceVisibilityChanged(true));

        assert_eq!(
            rx.try_recv().unwrap(),
            ControlMessage::Effect(EffectEvent::FaceVisibilityChanged(true))
        );
    }
}
