//! VM lifecycle management.
//!
//! [`LifecycleController`] owns the [`VmHandle`] and the current [`VmState`].
//! Every state change goes through [`LifecycleController::transition`], which
//! validates it against the state machine, records it, and reports terminal
//! states to the [`ProcessExitPolicy`].

mod countdown;
mod shutdown;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use vmlite_shared::VmState;
use vmlite_shared::errors::{BackendFatal, StartError, StopError};

pub use countdown::{Countdown, CountdownOutcome, ShutdownDeadline};
pub use shutdown::ShutdownCoordinator;

use crate::events::{EventBus, VmEvent};
use crate::exit::ProcessExitPolicy;
use crate::runtime::ShutdownOptions;
use crate::vmm::{VmBackend, VmHandle};

/// One applied state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: VmState,
    pub to: VmState,
    pub at: DateTime<Utc>,
}

pub struct LifecycleController {
    handle: VmHandle,
    state: watch::Sender<VmState>,
    history: Mutex<Vec<Transition>>,
    exit: ProcessExitPolicy,
    shutdown: ShutdownCoordinator,
}

impl LifecycleController {
    pub fn new(handle: VmHandle, exit: ProcessExitPolicy, options: ShutdownOptions) -> Self {
        let (state, _) = watch::channel(VmState::NotStarted);
        Self {
            handle,
            state,
            history: Mutex::new(Vec::new()),
            exit,
            shutdown: ShutdownCoordinator::new(options),
        }
    }

    pub fn name(&self) -> &str {
        self.handle.name()
    }

    pub fn state(&self) -> VmState {
        self.state.borrow().clone()
    }

    /// Watch state changes.
    pub fn subscribe(&self) -> watch::Receiver<VmState> {
        self.state.subscribe()
    }

    /// Every applied transition, oldest first.
    pub fn history(&self) -> Vec<Transition> {
        self.history.lock().clone()
    }

    pub fn shutdown(&self) -> &ShutdownCoordinator {
        &self.shutdown
    }

    pub fn exit_policy(&self) -> &ProcessExitPolicy {
        &self.exit
    }

    /// Wait until the VM reaches `Stopped` or `Failed`.
    pub async fn wait_terminal(&self) -> VmState {
        let mut rx = self.subscribe();
        match rx.wait_for(VmState::is_terminal).await {
            Ok(state) => state.clone(),
            // The sender lives in `self`, so this only happens during teardown.
            Err(_) => self.state(),
        }
    }

    /// Boot the VM: `NotStarted -> Starting -> Running`.
    pub async fn start(&self) -> Result<(), StartError> {
        if let Err(current) = self.transition(VmState::Starting) {
            return Err(if current.is_terminal() {
                StartError::AlreadyTerminal(current)
            } else {
                StartError::InvalidState(current)
            });
        }

        tracing::info!(vm = %self.name(), pid = std::process::id(), "start vm");
        match self.backend().start().await {
            Ok(()) => match self.transition(VmState::Running) {
                Ok(()) => {
                    tracing::info!(vm = %self.name(), "vm started");
                    Ok(())
                }
                Err(current) => {
                    tracing::warn!(
                        vm = %self.name(),
                        state = %current,
                        "vm left starting state before the backend confirmed start"
                    );
                    Err(StartError::AlreadyTerminal(current))
                }
            },
            Err(e) => {
                tracing::error!(vm = %self.name(), error = %e, "vm failed to start");
                let _ = self.fail(format!("vm failed to start: {}", e));
                Err(StartError::BackendRejected(e.to_string()))
            }
        }
    }

    /// Stop the VM gracefully, forcing it after the grace period.
    ///
    /// Concurrent and repeated calls share the outcome of a single stop
    /// sequence.
    pub async fn stop(&self) -> Result<(), StopError> {
        self.shutdown.stop(self).await
    }

    /// Single entry point for backend notifications.
    pub fn handle_event(&self, event: VmEvent) {
        match event {
            VmEvent::GuestStopped => self.on_guest_stopped(),
            VmEvent::Fatal(err) => self.on_backend_error(err),
        }
    }

    /// The guest shut itself down; no grace period applies.
    pub fn on_guest_stopped(&self) {
        tracing::info!(vm = %self.name(), "guest has stopped the vm");
        match self.transition(VmState::Stopped) {
            Ok(()) => {
                self.shutdown.cancel_countdown();
            }
            Err(state) => {
                tracing::warn!(vm = %self.name(), %state, "ignoring guest stop");
            }
        }
    }

    pub fn on_backend_error(&self, err: BackendFatal) {
        tracing::error!(vm = %self.name(), error = %err, "backend reported a fatal error");
        match self.fail(err.to_string()) {
            Ok(()) => {
                self.shutdown.cancel_countdown();
            }
            Err(state) => {
                tracing::warn!(vm = %self.name(), %state, "ignoring backend error");
            }
        }
    }

    /// Consume `bus` on a background task until the VM is terminal or every
    /// sender is gone.
    pub fn listen(self: &Arc<Self>, mut bus: EventBus) -> JoinHandle<()> {
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = bus.recv().await {
                tracing::debug!(vm = %controller.name(), ?event, "received vm event");
                controller.handle_event(event);
                if controller.state().is_terminal() {
                    break;
                }
            }
            tracing::debug!(vm = %controller.name(), "stopped listening for vm events");
        })
    }

    pub(crate) fn backend(&self) -> &dyn VmBackend {
        self.handle.backend()
    }

    /// Apply a validated transition.
    ///
    /// On rejection returns the state that was current instead.
    pub(crate) fn transition(&self, target: VmState) -> Result<(), VmState> {
        let mut outcome = Ok(());
        self.state.send_if_modified(|current| {
            if !current.can_transition_to(&target) {
                outcome = Err(current.clone());
                return false;
            }
            let from = std::mem::replace(current, target.clone());
            tracing::info!(vm = %self.handle.name(), %from, to = %target, "vm state changed");
            self.history.lock().push(Transition {
                from,
                to: target.clone(),
                at: Utc::now(),
            });
            true
        });
        outcome?;

        if target.is_terminal() {
            self.exit.on_terminal(&target);
        }
        Ok(())
    }

    pub(crate) fn fail(&self, reason: impl Into<String>) -> Result<(), VmState> {
        self.transition(VmState::Failed(reason.into()))
    }
}

impl std::fmt::Debug for LifecycleController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleController")
            .field("handle", &self.handle)
            .field("state", &self.state())
            .finish()
    }
}
