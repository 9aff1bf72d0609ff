//! Shared fixtures for vmlite tests.
//!
//! - [`MockBackend`]: a scripted `VmBackend` that counts calls and can play
//!   the guest (emit events) when asked to stop.
//! - [`RecordingExit`]: an `ExitSink` that records codes instead of exiting.
//! - [`Harness`]: a controller wired to both, already listening for events.
//! - [`TestHome`]: a throwaway vmlite home directory.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use vmlite::events::{EventBus, EventSender, VmEvent};
use vmlite::exit::{ExitSink, ProcessExitPolicy};
use vmlite::lifecycle::LifecycleController;
use vmlite::runtime::{ShutdownOptions, VmliteOptions};
use vmlite::vmm::{VmBackend, VmHandle};
use vmlite::{VmliteError, VmliteResult};

/// What the mock backend answers.
#[derive(Clone, Debug)]
pub struct MockScript {
    pub start: Result<(), String>,
    pub can_request_stop: bool,
    pub request_stop: Result<(), String>,
    pub can_stop: bool,
    pub force_stop: Result<(), String>,
    /// When set, a successful `request_stop` makes the guest shut down
    /// (emit `GuestStopped`) after this delay.
    pub guest_stops_after: Option<Duration>,
    /// Time `start` takes before answering.
    pub start_delay: Duration,
    /// Time `force_stop` takes before answering.
    pub force_stop_delay: Duration,
}

impl Default for MockScript {
    fn default() -> Self {
        Self {
            start: Ok(()),
            can_request_stop: true,
            request_stop: Ok(()),
            can_stop: true,
            force_stop: Ok(()),
            guest_stops_after: None,
            start_delay: Duration::ZERO,
            force_stop_delay: Duration::ZERO,
        }
    }
}

/// Call counters, shared with the test after the backend is boxed.
#[derive(Debug, Default)]
pub struct MockCalls {
    pub start: AtomicUsize,
    pub request_stop: AtomicUsize,
    pub force_stop: AtomicUsize,
}

impl MockCalls {
    pub fn start(&self) -> usize {
        self.start.load(Ordering::SeqCst)
    }

    pub fn request_stop(&self) -> usize {
        self.request_stop.load(Ordering::SeqCst)
    }

    pub fn force_stop(&self) -> usize {
        self.force_stop.load(Ordering::SeqCst)
    }
}

pub struct MockBackend {
    script: MockScript,
    calls: Arc<MockCalls>,
    events: Option<EventSender>,
}

impl MockBackend {
    pub fn new(script: MockScript) -> Self {
        Self {
            script,
            calls: Arc::new(MockCalls::default()),
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    pub fn calls(&self) -> Arc<MockCalls> {
        Arc::clone(&self.calls)
    }
}

fn scripted(result: &Result<(), String>) -> VmliteResult<()> {
    result.clone().map_err(VmliteError::Engine)
}

#[async_trait::async_trait]
impl VmBackend for MockBackend {
    async fn start(&self) -> VmliteResult<()> {
        self.calls.start.fetch_add(1, Ordering::SeqCst);
        if !self.script.start_delay.is_zero() {
            tokio::time::sleep(self.script.start_delay).await;
        }
        scripted(&self.script.start)
    }

    fn can_request_stop(&self) -> bool {
        self.script.can_request_stop
    }

    fn request_stop(&self) -> VmliteResult<()> {
        self.calls.request_stop.fetch_add(1, Ordering::SeqCst);
        scripted(&self.script.request_stop)?;

        if let (Some(delay), Some(events)) = (self.script.guest_stops_after, &self.events) {
            let events = events.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                events.send(VmEvent::GuestStopped);
            });
        }
        Ok(())
    }

    fn can_stop(&self) -> bool {
        self.script.can_stop
    }

    async fn force_stop(&self) -> VmliteResult<()> {
        self.calls.force_stop.fetch_add(1, Ordering::SeqCst);
        if !self.script.force_stop_delay.is_zero() {
            tokio::time::sleep(self.script.force_stop_delay).await;
        }
        scripted(&self.script.force_stop)
    }
}

/// Exit sink that records every code it is handed.
#[derive(Debug, Default)]
pub struct RecordingExit {
    codes: Mutex<Vec<i32>>,
}

impl RecordingExit {
    pub fn codes(&self) -> Vec<i32> {
        self.codes.lock().clone()
    }
}

impl ExitSink for RecordingExit {
    fn exit(&self, code: i32) {
        self.codes.lock().push(code);
    }
}

/// Controller wired to a [`MockBackend`] and a [`RecordingExit`].
///
/// Must be created inside a tokio runtime: the event listener is spawned
/// immediately.
pub struct Harness {
    pub controller: Arc<LifecycleController>,
    pub calls: Arc<MockCalls>,
    pub exits: Arc<RecordingExit>,
    /// Inject backend events as if the hypervisor sent them.
    pub events: EventSender,
    pub listener: JoinHandle<()>,
}

impl Harness {
    pub fn new(script: MockScript) -> Self {
        Self::with_options(script, ShutdownOptions::default())
    }

    pub fn with_options(script: MockScript, options: ShutdownOptions) -> Self {
        let (events, bus) = EventBus::channel();
        let backend = MockBackend::new(script).with_events(events.clone());
        let calls = backend.calls();
        let exits = Arc::new(RecordingExit::default());

        let controller = Arc::new(LifecycleController::new(
            VmHandle::new("mock-vm", Box::new(backend)),
            ProcessExitPolicy::new(exits.clone()),
            options,
        ));
        let listener = controller.listen(bus);

        Self {
            controller,
            calls,
            exits,
            events,
            listener,
        }
    }

    /// Harness whose VM is already `Running`.
    pub async fn running(script: MockScript) -> Self {
        let harness = Self::new(script);
        harness
            .controller
            .start()
            .await
            .expect("mock vm failed to start");
        harness
    }

    /// Let spawned tasks (listener, mock guest) catch up.
    pub async fn settle(&self) {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }
}

/// Throwaway vmlite home directory.
pub struct TestHome {
    pub options: VmliteOptions,
    _temp_dir: TempDir,
}

impl TestHome {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        Self {
            options: VmliteOptions::new(temp_dir.path()),
            _temp_dir: temp_dir,
        }
    }
}

impl Default for TestHome {
    fn default() -> Self {
        Self::new()
    }
}
