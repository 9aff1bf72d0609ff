//! Error types for vmlite.
//!
//! Lifecycle operations return narrow, cloneable errors (`StartError`,
//! `StopError`) so that coalesced callers can share one outcome. Everything
//! else (config, storage, backend plumbing) uses [`VmliteError`].

use thiserror::Error;

use crate::state::VmState;

/// Result alias used across vmlite.
pub type VmliteResult<T> = Result<T, VmliteError>;

/// Errors returned by `LifecycleController::start`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StartError {
    #[error("vm cannot be started from state {0}")]
    InvalidState(VmState),

    #[error("vm already reached terminal state {0}")]
    AlreadyTerminal(VmState),

    #[error("backend rejected start: {0}")]
    BackendRejected(String),
}

/// Errors returned by `LifecycleController::stop`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StopError {
    #[error("vm cannot be stopped from state {0}")]
    InvalidState(VmState),

    #[error("vm already reached terminal state {0}")]
    AlreadyTerminal(VmState),

    #[error("backend cannot be stopped")]
    CannotStop,

    #[error("backend rejected stop: {0}")]
    BackendRejected(String),
}

/// Fatal, asynchronous backend conditions delivered through the event bus.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendFatal {
    #[error("vm crashed: {0}")]
    Crashed(String),

    #[error("device {device} disconnected: {reason}")]
    DeviceDisconnected { device: String, reason: String },
}

#[derive(Error, Debug)]
pub enum VmliteError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("engine error: {0}")]
    Engine(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Start(#[from] StartError),

    #[error(transparent)]
    Stop(#[from] StopError),

    #[error(transparent)]
    Fatal(#[from] BackendFatal),
}

impl From<std::io::Error> for VmliteError {
    fn from(err: std::io::Error) -> Self {
        VmliteError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for VmliteError {
    fn from(err: serde_json::Error) -> Self {
        VmliteError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_errors_convert() {
        let err: VmliteError = StopError::CannotStop.into();
        assert!(matches!(err, VmliteError::Stop(StopError::CannotStop)));
        assert_eq!(err.to_string(), "backend cannot be stopped");

        let err: VmliteError = StartError::InvalidState(VmState::Running).into();
        assert_eq!(err.to_string(), "vm cannot be started from state running");
    }

    #[test]
    fn test_backend_fatal_message() {
        let fatal = BackendFatal::DeviceDisconnected {
            device: "net0".into(),
            reason: "attachment lost".into(),
        };
        assert_eq!(fatal.to_string(), "device net0 disconnected: attachment lost");
    }
}
