//! Pipeline Error Types
//!
//! Error taxonomy shared by every pipeline component, plus a severity
//! classification the call controller uses to decide between rollback and
//! warn-and-continue.

use thiserror::Error;

use crate::call::state::{CallOperation, CallState};

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Pipeline error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// Camera device could not be acquired
    #[error("Camera device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Frame source already has a bound consumer
    #[error("Frame source is already open")]
    AlreadyOpen,

    /// Shared graphics context or surface creation failed
    #[error("Graphics context creation failed: {0}")]
    ContextCreationFailed(String),

    /// A start attempt failed and was rolled back
    #[error("Startup failed: {0}")]
    StartupFailed(Box<PipelineError>),

    /// Controller operation is illegal in the current call state
    #[error("Invalid state transition: cannot {operation} while {state}")]
    InvalidStateTransition {
        /// State the controller was in
        state: CallState,
        /// Operation that was attempted
        operation: CallOperation,
    },

    /// Remote view inserted before the local view was attached
    #[error("No local view attached")]
    NoLocalView,

    /// Pipeline was torn down and cannot be restarted
    #[error("Pipeline has been torn down")]
    TornDown,

    /// Remote view slots are exhausted
    #[error("View capacity exceeded (max remote views: {0})")]
    CapacityExceeded(usize),

    /// Opaque error code reported by the call transport
    #[error("Transport error code {0}")]
    TransportError(i32),

    /// Error reported by the AR effect engine
    #[error("Effect engine error ({kind}): {message}")]
    EffectEngineError {
        /// Engine-specific error category
        kind: String,
        /// Human readable detail
        message: String,
    },

    /// Worker thread could not be spawned
    #[error("Thread spawn failed: {0}")]
    ThreadSpawn(String),
}

/// Error classification for recovery strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorSeverity {
    /// Aborts the current start attempt; resources are rolled back
    Fatal,
    /// Logged and surfaced as a warning; the pipeline keeps running
    Recoverable,
    /// Caller used the controller API incorrectly
    ContractViolation,
}

impl PipelineError {
    /// Classify this error for recovery decisions
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::DeviceUnavailable(_)
            | Self::ContextCreationFailed(_)
            | Self::StartupFailed(_)
            | Self::ThreadSpawn(_) => ErrorSeverity::Fatal,
            Self::InvalidStateTransition { .. }
            | Self::AlreadyOpen
            | Self::NoLocalView
            | Self::TornDown => ErrorSeverity::ContractViolation,
            Self::CapacityExceeded(_)
            | Self::TransportError(_)
            | Self::EffectEngineError { .. } => ErrorSeverity::Recoverable,
        }
    }

    /// Check if this error aborts the current start attempt
    pub fn is_fatal(&self) -> bool {
        self.severity() == ErrorSeverity::Fatal
    }

    /// Wrap an acquisition failure as a rolled-back start attempt
    pub fn startup_failed(cause: PipelineError) -> Self {
        match cause {
            already @ Self::StartupFailed(_) => already,
            other => Self::StartupFailed(Box::new(other)),
        }
    }

    /// Root cause of a `StartupFailed`, or the error itself
    pub fn root_cause(&self) -> &PipelineError {
        match self {
            Self::StartupFailed(inner) => inner.root_cause(),
            other => other,
        }
    }
}
