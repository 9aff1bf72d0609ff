//! Two-phase shutdown: polite request, then forced stop after the grace period.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::OnceCell;
use tokio::time::Instant;
use vmlite_shared::VmState;
use vmlite_shared::errors::StopError;

use super::LifecycleController;
use super::countdown::{Countdown, CountdownOutcome, ShutdownDeadline};
use crate::runtime::ShutdownOptions;

/// Runs at most one stop sequence per VM and shares its outcome with every
/// caller of `stop()`.
pub struct ShutdownCoordinator {
    options: ShutdownOptions,
    countdown: Countdown,
    deadline: Mutex<Option<ShutdownDeadline>>,
    begun: AtomicBool,
    outcome: OnceCell<Result<(), StopError>>,
}

/// Error for a `stop()` that never got to start a sequence.
fn rejected(state: VmState) -> StopError {
    if state.is_terminal() {
        StopError::AlreadyTerminal(state)
    } else {
        StopError::InvalidState(state)
    }
}

/// Outcome of a sequence that was overtaken by another transition.
fn settle(state: VmState) -> Result<(), StopError> {
    match state {
        VmState::Stopped => Ok(()),
        other => Err(rejected(other)),
    }
}

impl ShutdownCoordinator {
    pub fn new(options: ShutdownOptions) -> Self {
        Self {
            options,
            countdown: Countdown::new(),
            deadline: Mutex::new(None),
            begun: AtomicBool::new(false),
            outcome: OnceCell::new(),
        }
    }

    pub fn grace_period(&self) -> Duration {
        self.options.grace_period()
    }

    /// Deadline of the graceful phase while it is being waited on.
    pub fn deadline(&self) -> Option<ShutdownDeadline> {
        *self.deadline.lock()
    }

    pub fn has_begun(&self) -> bool {
        self.begun.load(Ordering::SeqCst)
    }

    pub fn countdown_outcome(&self) -> Option<CountdownOutcome> {
        self.countdown.outcome()
    }

    /// Abandon the graceful wait. Called once a terminal state is reached.
    pub(crate) fn cancel_countdown(&self) -> bool {
        let cancelled = self.countdown.cancel();
        if cancelled && self.has_begun() {
            tracing::debug!("grace period countdown cancelled");
        }
        cancelled
    }

    /// Stop the VM, or join the stop sequence already in flight.
    ///
    /// Callers that join a running sequence share its outcome. Once the
    /// sequence has finished the VM is terminal, and later calls fail with
    /// `AlreadyTerminal` like any other operation on a terminal VM.
    pub(crate) async fn stop(&self, ctl: &LifecycleController) -> Result<(), StopError> {
        if self.outcome.initialized() {
            return Err(rejected(ctl.state()));
        }

        // `begun` is set before the first transition, so it must be read
        // after the state: a sequence may start between the two reads.
        let state = ctl.state();
        if !state.can_stop() && !self.has_begun() {
            return Err(rejected(state));
        }

        self.outcome
            .get_or_init(|| self.run(ctl))
            .await
            .clone()
    }

    async fn run(&self, ctl: &LifecycleController) -> Result<(), StopError> {
        self.begun.store(true, Ordering::SeqCst);
        ctl.transition(VmState::StopRequested).map_err(rejected)?;
        tracing::info!(vm = %ctl.name(), pid = std::process::id(), "stop vm");
        self.request_graceful_stop(ctl).await
    }

    async fn request_graceful_stop(&self, ctl: &LifecycleController) -> Result<(), StopError> {
        let backend = ctl.backend();
        if !backend.can_request_stop() {
            tracing::info!(vm = %ctl.name(), "vm cannot be asked to stop, forcing");
            return self.force_stop(ctl).await;
        }

        tracing::info!(vm = %ctl.name(), "request vm to stop");
        if let Err(e) = backend.request_stop() {
            tracing::error!(vm = %ctl.name(), error = %e, "failed to request vm to stop");
            if let Err(state) = ctl.fail(format!("failed to request vm to stop: {}", e)) {
                return settle(state);
            }
            return Err(StopError::BackendRejected(e.to_string()));
        }

        let deadline = ShutdownDeadline::new(Instant::now(), self.grace_period());
        *self.deadline.lock() = Some(deadline);
        tracing::debug!(
            vm = %ctl.name(),
            grace_period_secs = self.options.grace_period_secs,
            "waiting for guest to stop"
        );

        let outcome = self.countdown.wait_until(deadline.deadline()).await;
        self.deadline.lock().take();

        match outcome {
            CountdownOutcome::Cancelled => settle(ctl.state()),
            CountdownOutcome::Expired => {
                tracing::warn!(
                    vm = %ctl.name(),
                    grace_period_secs = self.options.grace_period_secs,
                    "guest did not stop within grace period"
                );
                self.force_stop(ctl).await
            }
        }
    }

    async fn force_stop(&self, ctl: &LifecycleController) -> Result<(), StopError> {
        // A terminal event may have landed between expiry and here; never
        // force-stop a VM that is already down.
        if let Err(state) = ctl.transition(VmState::ForceStopping) {
            return settle(state);
        }

        let backend = ctl.backend();
        tracing::info!(vm = %ctl.name(), "force to stop vm");
        if !backend.can_stop() {
            tracing::error!(vm = %ctl.name(), "vm cannot be stopped");
            if let Err(state) = ctl.fail("backend cannot be stopped") {
                return settle(state);
            }
            return Err(StopError::CannotStop);
        }

        match backend.force_stop().await {
            Ok(()) => match ctl.transition(VmState::Stopped) {
                Ok(()) => {
                    tracing::info!(vm = %ctl.name(), "vm stopped");
                    Ok(())
                }
                Err(state) => settle(state),
            },
            Err(e) => {
                tracing::error!(vm = %ctl.name(), error = %e, "vm failed to stop");
                if let Err(state) = ctl.fail(format!("vm failed to stop: {}", e)) {
                    return settle(state);
                }
                Err(StopError::BackendRejected(e.to_string()))
            }
        }
    }
}
