//! VM lifecycle state and state machine.
//!
//! Defines the possible states of a single VM instance and the valid
//! transitions between them.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a VM.
///
/// State machine:
/// ```text
/// NotStarted --start()--> Starting --backend ok--> Running
/// Starting   --backend fail--> Failed
/// Running    --stop()--> StopRequested --timeout--> ForceStopping --backend ok--> Stopped
/// Running / StopRequested --guest stop--> Stopped
/// Running    --backend error--> Failed
/// ForceStopping --backend fail--> Failed
/// ```
///
/// Every transition strictly increases [`VmState::rank`], so the graph is a
/// DAG whose only sinks are `Stopped` and `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum VmState {
    /// Handle created, backend untouched.
    NotStarted,

    /// Backend start is outstanding.
    Starting,

    /// Backend confirmed the VM is running.
    Running,

    /// A polite stop was requested; waiting for the guest or the grace period.
    StopRequested,

    /// Forced stop issued to the backend.
    ForceStopping,

    /// VM is down. Terminal.
    Stopped,

    /// VM failed to start, stop or keep running. Terminal.
    Failed(String),
}

impl VmState {
    /// Position along the lifecycle. Terminal states share the highest rank.
    pub fn rank(&self) -> u8 {
        match self {
            VmState::NotStarted => 0,
            VmState::Starting => 1,
            VmState::Running => 2,
            VmState::StopRequested => 3,
            VmState::ForceStopping => 4,
            VmState::Stopped | VmState::Failed(_) => 5,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, VmState::Stopped | VmState::Failed(_))
    }

    pub fn is_running(&self) -> bool {
        matches!(self, VmState::Running)
    }

    /// Stop sequence has begun but not resolved.
    pub fn is_stopping(&self) -> bool {
        matches!(self, VmState::StopRequested | VmState::ForceStopping)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, VmState::Failed(_))
    }

    /// Check if start() can be called from this state.
    pub fn can_start(&self) -> bool {
        matches!(self, VmState::NotStarted)
    }

    /// Check if stop() can begin a new stop sequence from this state.
    pub fn can_stop(&self) -> bool {
        matches!(self, VmState::Running)
    }

    /// Check if transition to target state is valid.
    pub fn can_transition_to(&self, target: &VmState) -> bool {
        use VmState::*;
        matches!(
            (self, target),
            (NotStarted, Starting) |
            // Events may land while the backend start is outstanding
            (Starting, Running) |
            (Starting, Stopped) |
            (Starting, Failed(_)) |
            (Running, StopRequested) |
            (Running, Stopped) |
            (Running, Failed(_)) |
            (StopRequested, ForceStopping) |
            (StopRequested, Stopped) |
            (StopRequested, Failed(_)) |
            (ForceStopping, Stopped) |
            (ForceStopping, Failed(_))
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VmState::NotStarted => "not_started",
            VmState::Starting => "starting",
            VmState::Running => "running",
            VmState::StopRequested => "stop_requested",
            VmState::ForceStopping => "force_stopping",
            VmState::Stopped => "stopped",
            VmState::Failed(_) => "failed",
        }
    }
}

impl std::fmt::Display for VmState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VmState::Failed(reason) => write!(f, "failed ({})", reason),
            other => write!(f, "{}", other.as_str()),
        }
    }
}
