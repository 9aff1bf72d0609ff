//! Controller driving real child processes through ProcessBackend.

use std::sync::Arc;
use std::time::Duration;

use vmlite::events::EventBus;
use vmlite::exit::{ExitReceiver, ExitSignal, ProcessExitPolicy};
use vmlite::lifecycle::LifecycleController;
use vmlite::runtime::{BackendCommand, ShutdownOptions, VmConfig};
use vmlite::vmm::{ProcessBackend, VmHandle};
use vmlite::VmState;

const TIMEOUT: Duration = Duration::from_secs(30);

fn controller(
    args: &[&str],
    grace_period: Duration,
) -> (Arc<LifecycleController>, ExitReceiver) {
    let mut config = VmConfig::new(BackendCommand::new(args[0]).with_args(args[1..].iter().copied()));
    config.shutdown = ShutdownOptions::with_grace_period(grace_period);

    let (events_tx, events) = EventBus::channel();
    let backend = ProcessBackend::new("e2e-vm", &config, events_tx);
    let (sink, exit_rx) = ExitSignal::new();

    let controller = Arc::new(LifecycleController::new(
        VmHandle::new("e2e-vm", Box::new(backend)),
        ProcessExitPolicy::new(Arc::new(sink)),
        config.shutdown.clone(),
    ));
    controller.listen(events);
    (controller, exit_rx)
}

#[tokio::test]
async fn test_guest_exit_stops_vm() {
    let (controller, exit_rx) = controller(&["true"], Duration::from_secs(15));
    // The process may exit before `Running` is recorded.
    let _ = controller.start().await;

    let code = tokio::time::timeout(TIMEOUT, exit_rx.wait()).await.unwrap();
    assert_eq!(code, 0);
    assert_eq!(controller.state(), VmState::Stopped);
}

#[tokio::test]
async fn test_hypervisor_crash_fails_vm() {
    let (controller, exit_rx) = controller(&["sh", "-c", "exit 3"], Duration::from_secs(15));
    let _ = controller.start().await;

    let code = tokio::time::timeout(TIMEOUT, exit_rx.wait()).await.unwrap();
    assert_eq!(code, 1);
    assert!(controller.state().is_failed());
}

#[tokio::test]
async fn test_polite_stop_with_sigterm() {
    let (controller, exit_rx) = controller(&["sleep", "300"], Duration::from_secs(15));
    controller.start().await.unwrap();

    tokio::time::timeout(TIMEOUT, controller.stop())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(controller.state(), VmState::Stopped);
    assert_eq!(exit_rx.code(), Some(0));
    let forced = controller
        .history()
        .iter()
        .any(|t| t.to == VmState::ForceStopping);
    assert!(!forced, "sleep honours SIGTERM, no forced stop expected");
}

#[tokio::test]
async fn test_ignored_sigterm_is_forced_after_grace_period() {
    let (controller, exit_rx) = controller(
        &["sh", "-c", "trap '' TERM; exec sleep 300"],
        Duration::from_secs(1),
    );
    controller.start().await.unwrap();
    // Give the shell time to install its trap.
    tokio::time::sleep(Duration::from_millis(200)).await;

    tokio::time::timeout(TIMEOUT, controller.stop())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(controller.state(), VmState::Stopped);
    assert_eq!(exit_rx.code(), Some(0));
    assert!(
        controller
            .history()
            .iter()
            .any(|t| t.to == VmState::ForceStopping)
    );
}
