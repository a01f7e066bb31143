//! Call lifecycle state machine
//!
//! ```text
//!          start()             joined           endCall()
//!   Idle ───────────> Initializing ───────> Active ───────> Terminating ──> Idle
//!    ▲                     │                                                 │
//!    └─────── endCall() ───┘ <─────────────── teardown() (any state) ────────┘
//! ```

use std::fmt;

/// Call lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CallState {
    /// No call; pipeline may or may not be open
    #[default]
    Idle,
    /// Pipeline started, waiting for a join to complete
    Initializing,
    /// In a call; frames are exported
    Active,
    /// Leaving the call
    Terminating,
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Initializing => "initializing",
            Self::Active => "active",
            Self::Terminating => "terminating",
        })
    }
}

/// Controller operations subject to state checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallOperation {
    /// Open the pipeline
    Start,
    /// Join the configured channel
    JoinCall,
    /// Leave the call
    EndCall,
    /// Release everything
    Teardown,
    /// Pause or resume the render loop
    PauseRendering,
}

impl fmt::Display for CallOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Start => "start",
            Self::JoinCall => "join call",
            Self::EndCall => "end call",
            Self::Teardown => "tear down",
            Self::PauseRendering => "pause rendering",
        })
    }
}

impl CallState {
    /// Check if `operation` is legal from this state
    ///
    /// `pipeline_ready` is true when a start succeeded and the pipeline has
    /// not been torn down since.
    pub fn permits(self, operation: CallOperation, pipeline_ready: bool) -> bool {
        match operation {
            CallOperation::Start => self == Self::Idle,
            CallOperation::JoinCall => match self {
                Self::Initializing => true,
                Self::Idle => pipeline_ready,
                Self::Active | Self::Terminating => false,
            },
            CallOperation::EndCall => matches!(self, Self::Initializing | Self::Active),
            CallOperation::Teardown => true,
            CallOperation::PauseRendering => pipeline_ready,
        }
    }

    /// Whether remote participants may be admitted
    pub fn admits_participants(self) -> bool {
        self == Self::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STATES: [CallState; 4] = [
        CallState::Idle,
        CallState::Initializing,
        CallState::Active,
        CallState::Terminating,
    ];

    #[test]
    fn test_start_only_from_idle() {
        for state in ALL_STATES {
            assert_eq!(
                state.permits(CallOperation::Start, false),
                state == CallState::Idle
            );
        }
    }

    #[test]
    fn test_join_from_idle_requires_ready_pipeline() {
        assert!(!CallState::Idle.permits(CallOperation::JoinCall, false));
        assert!(CallState::Idle.permits(CallOperation::JoinCall, true));
        assert!(CallState::Initializing.permits(CallOperation::JoinCall, true));
        assert!(!CallState::Active.permits(CallOperation::JoinCall, true));
        assert!(!CallState::Terminating.permits(CallOperation::JoinCall, true));
    }

    #[test]
    fn test_end_call_from_initializing_or_active() {
        assert!(CallState::Active.permits(CallOperation::EndCall, true));
        assert!(CallState::Initializing.permits(CallOperation::EndCall, true));
        assert!(!CallState::Idle.permits(CallOperation::EndCall, true));
        assert!(!CallState::Terminating.permits(CallOperation::EndCall, true));
    }

    #[test]
    fn test_teardown_always_permitted() {
        for state in ALL_STATES {
            assert!(state.permits(CallOperation::Teardown, false));
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(CallState::Terminating.to_string(), "terminating");
        assert_eq!(CallOperation::JoinCall.to_string(), "join call");
        assert!(CallState::Active.admits_participants());
        assert!(!CallState::Initializing.admits_participants());
    }
}
