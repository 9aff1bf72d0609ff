//! Process exit policy.
//!
//! Maps the first terminal VM state to an exit code and hands it to an
//! [`ExitSink`] exactly once. The sink is injected so tests can observe the
//! exit without terminating the test process.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;
use vmlite_shared::VmState;
use vmlite_shared::constants::exit_codes;

/// Receives the final exit code of the hosting process.
pub trait ExitSink: Send + Sync {
    fn exit(&self, code: i32);
}

/// Single-invocation gate between terminal VM states and the host process.
pub struct ProcessExitPolicy {
    sink: Arc<dyn ExitSink>,
    fired: AtomicBool,
}

impl ProcessExitPolicy {
    pub fn new(sink: Arc<dyn ExitSink>) -> Self {
        Self {
            sink,
            fired: AtomicBool::new(false),
        }
    }

    /// Exit code for a terminal state, `None` for non-terminal states.
    pub fn exit_code_for(state: &VmState) -> Option<i32> {
        match state {
            VmState::Stopped => Some(exit_codes::SUCCESS),
            VmState::Failed(_) => Some(exit_codes::FAILURE),
            _ => None,
        }
    }

    /// Report a terminal state.
    ///
    /// Only the first call with a terminal state reaches the sink; returns
    /// whether this call was the one that fired.
    pub fn on_terminal(&self, state: &VmState) -> bool {
        let Some(code) = Self::exit_code_for(state) else {
            tracing::warn!(%state, "exit policy invoked with non-terminal state");
            return false;
        };

        if self
            .fired
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!(%state, "exit already reported, ignoring");
            return false;
        }

        if code == exit_codes::SUCCESS {
            tracing::info!(%state, code, "vm reached terminal state");
        } else {
            tracing::error!(%state, code, "vm reached terminal state");
        }
        self.sink.exit(code);
        true
    }

    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }
}

/// Exit sink that publishes the code on a watch channel.
///
/// The owner of the process awaits [`ExitReceiver::wait`] and performs the
/// actual `std::process::exit` after flushing its own resources.
pub struct ExitSignal {
    tx: watch::Sender<Option<i32>>,
}

impl ExitSignal {
    pub fn new() -> (Self, ExitReceiver) {
        let (tx, rx) = watch::channel(None);
        (Self { tx }, ExitReceiver { rx })
    }
}

impl ExitSink for ExitSignal {
    fn exit(&self, code: i32) {
        self.tx.send_replace(Some(code));
    }
}

#[derive(Clone)]
pub struct ExitReceiver {
    rx: watch::Receiver<Option<i32>>,
}

impl ExitReceiver {
    /// Wait for the exit code.
    ///
    /// Resolves to the failure code if the sink is dropped without firing.
    pub async fn wait(mut self) -> i32 {
        match self.rx.wait_for(Option::is_some).await {
            Ok(code) => (*code).unwrap_or(exit_codes::FAILURE),
            Err(_) => exit_codes::FAILURE,
        }
    }

    pub fn code(&self) -> Option<i32> {
        *self.rx.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<i32>>);

    impl ExitSink for Recorder {
        fn exit(&self, code: i32) {
            self.0.lock().push(code);
        }
    }

    #[test]
    fn test_exit_code_mapping() {
        assert_eq!(ProcessExitPolicy::exit_code_for(&VmState::Stopped), Some(0));
        assert_eq!(
            ProcessExitPolicy::exit_code_for(&VmState::Failed("x".into())),
            Some(1)
        );
        assert_eq!(ProcessExitPolicy::exit_code_for(&VmState::Running), None);
    }

    #[test]
    fn test_fires_once() {
        let recorder = Arc::new(Recorder::default());
        let policy = ProcessExitPolicy::new(recorder.clone());

        assert!(policy.on_terminal(&VmState::Failed("crash".into())));
        assert!(!policy.on_terminal(&VmState::Stopped));
        assert!(policy.has_fired());
        assert_eq!(*recorder.0.lock(), vec![1]);
    }

    #[test]
    fn test_non_terminal_state_ignored() {
        let recorder = Arc::new(Recorder::default());
        let policy = ProcessExitPolicy::new(recorder.clone());

        assert!(!policy.on_terminal(&VmState::Running));
        assert!(!policy.has_fired());
        assert!(policy.on_terminal(&VmState::Stopped));
        assert_eq!(*recorder.0.lock(), vec![0]);
    }

    #[tokio::test]
    async fn test_exit_signal_delivers_code() {
        let (sink, rx) = ExitSignal::new();
        assert_eq!(rx.code(), None);
        sink.exit(0);
        assert_eq!(rx.wait().await, 0);
    }

    #[tokio::test]
    async fn test_exit_signal_dropped_without_code() {
        let (sink, rx) = ExitSignal::new();
        drop(sink);
        assert_eq!(rx.wait().await, exit_codes::FAILURE);
    }
}
