//! ProcessBackend - runs the hypervisor as a child process.
//!
//! Any hypervisor that can be driven from a command line (qemu, krunvm,
//! cloud-hypervisor, ...) fits behind this backend:
//!
//! - `start` spawns the command,
//! - `request_stop` sends `SIGTERM` (qemu and friends treat it as a power button),
//! - `force_stop` sends `SIGKILL` and waits for the process to be reaped,
//! - both signals go to the whole process group, so helpers the hypervisor
//!   forked are stopped along with it,
//! - the exit of the process is reported on the event bus: a clean exit (or
//!   death by the `SIGTERM` we sent) is a guest-initiated stop, anything else
//!   is a crash.

use std::os::unix::process::ExitStatusExt;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use nix::sys::signal::Signal;
use parking_lot::Mutex;
use tokio::process::{Child, Command};
use tokio::sync::watch;
use vmlite_shared::errors::{VmliteError, VmliteResult};

use crate::events::{EventSender, VmEvent};
use crate::runtime::VmConfig;
use crate::util::{is_process_alive, send_group_signal};

use super::backend::VmBackend;

/// Signal used for a polite stop request.
const STOP_SIGNAL: Signal = Signal::SIGTERM;

/// Bookkeeping for a spawned hypervisor process.
struct ChildState {
    pid: i32,
    /// Flips to `true` once the process has been reaped.
    exited: watch::Receiver<bool>,
    stop_requested: Arc<AtomicBool>,
    force_stopping: Arc<AtomicBool>,
}

/// [`VmBackend`] that drives a hypervisor running as a child process.
pub struct ProcessBackend {
    name: String,
    executable: String,
    args: Vec<String>,
    env: Vec<(String, String)>,
    events: EventSender,
    child: Mutex<Option<ChildState>>,
}

impl ProcessBackend {
    /// Create a backend for the VM `name`.
    ///
    /// Nothing is spawned until [`VmBackend::start`].
    ///
    /// # Arguments
    /// * `name` - VM name, exported to the hypervisor environment
    /// * `config` - VM config providing the hypervisor command line
    /// * `events` - Where process exits are reported
    pub fn new(name: impl Into<String>, config: &VmConfig, events: EventSender) -> Self {
        let name = name.into();
        Self {
            executable: config.backend.executable.clone(),
            args: config.backend.args.clone(),
            env: config.backend_env(&name),
            name,
            events,
            child: Mutex::new(None),
        }
    }

    /// PID of the hypervisor process once started.
    ///
    /// # Returns
    /// The PID, which is also the process group ID of everything the
    /// hypervisor forks, or `None` before `start`.
    pub fn pid(&self) -> Option<i32> {
        self.child.lock().as_ref().map(|child| child.pid)
    }
}

#[async_trait::async_trait]
impl VmBackend for ProcessBackend {
    async fn start(&self) -> VmliteResult<()> {
        if self.child.lock().is_some() {
            return Err(VmliteError::InvalidState(format!(
                "backend process already spawned, name={}",
                self.name
            )));
        }

        tracing::debug!(
            executable = %self.executable,
            args = ?self.args,
            "spawning backend process"
        );

        let spawn_start = Instant::now();
        let mut child = Command::new(&self.executable)
            .args(&self.args)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            // Own process group: a Ctrl-C on the controller's terminal must
            // not reach the hypervisor directly.
            .process_group(0)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                VmliteError::Engine(format!(
                    "failed to spawn backend process {}: {}",
                    self.executable, e
                ))
            })?;

        let Some(pid) = child.id() else {
            // Already reaped: the process exited before we could look at it.
            let status = child.wait().await.ok();
            return Err(VmliteError::Engine(format!(
                "backend process exited immediately, status={:?}",
                status
            )));
        };
        let pid = pid as i32;

        let (exited_tx, exited_rx) = watch::channel(false);
        let stop_requested = Arc::new(AtomicBool::new(false));
        let force_stopping = Arc::new(AtomicBool::new(false));

        tokio::spawn(watch_child(
            child,
            self.name.clone(),
            self.events.clone(),
            exited_tx,
            Arc::clone(&stop_requested),
            Arc::clone(&force_stopping),
        ));

        *self.child.lock() = Some(ChildState {
            pid,
            exited: exited_rx,
            stop_requested,
            force_stopping,
        });

        tracing::info!(
            vm = %self.name,
            pid,
            spawn_duration_ms = spawn_start.elapsed().as_millis(),
            "backend process spawned"
        );
        Ok(())
    }

    fn can_request_stop(&self) -> bool {
        match self.child.lock().as_ref() {
            Some(child) => !*child.exited.borrow() && is_process_alive(child.pid),
            None => false,
        }
    }

    fn request_stop(&self) -> VmliteResult<()> {
        let guard = self.child.lock();
        let child = guard.as_ref().ok_or_else(|| {
            VmliteError::InvalidState("backend process not started".to_string())
        })?;

        child.stop_requested.store(true, Ordering::SeqCst);
        // The child leads its own group (`process_group(0)`), so pid == pgid.
        send_group_signal(child.pid, STOP_SIGNAL)?;
        tracing::debug!(vm = %self.name, pid = child.pid, signal = %STOP_SIGNAL, "stop requested");
        Ok(())
    }

    fn can_stop(&self) -> bool {
        self.child.lock().is_some()
    }

    async fn force_stop(&self) -> VmliteResult<()> {
        let (pid, mut exited) = {
            let guard = self.child.lock();
            let child = guard.as_ref().ok_or_else(|| {
                VmliteError::InvalidState("backend process not started".to_string())
            })?;
            child.force_stopping.store(true, Ordering::SeqCst);
            (child.pid, child.exited.clone())
        };

        // Sent even if the leader is gone: forked helpers may outlive it.
        send_group_signal(pid, Signal::SIGKILL)?;

        exited.wait_for(|exited| *exited).await.map_err(|_| {
            VmliteError::Internal(format!(
                "backend process watcher went away before pid {} was reaped",
                pid
            ))
        })?;

        tracing::debug!(vm = %self.name, pid, "backend process reaped after forced stop");
        Ok(())
    }
}

/// Wait for the hypervisor process and report how it ended.
async fn watch_child(
    mut child: Child,
    name: String,
    events: EventSender,
    exited: watch::Sender<bool>,
    stop_requested: Arc<AtomicBool>,
    force_stopping: Arc<AtomicBool>,
) {
    let status = child.wait().await;
    exited.send_replace(true);

    if force_stopping.load(Ordering::SeqCst) {
        // force_stop() reports the outcome itself.
        return;
    }

    let event = match status {
        Ok(status) => {
            tracing::info!(vm = %name, %status, "backend process exited");
            classify_exit(status, stop_requested.load(Ordering::SeqCst))
        }
        Err(e) => VmEvent::crashed(format!("failed to wait for backend process: {}", e)),
    };
    events.send(event);
}

/// Map a process exit to the lifecycle event it represents.
fn classify_exit(status: ExitStatus, stop_requested: bool) -> VmEvent {
    if status.success() {
        return VmEvent::GuestStopped;
    }
    if stop_requested && status.signal() == Some(STOP_SIGNAL as i32) {
        return VmEvent::GuestStopped;
    }
    VmEvent::crashed(format!("backend process exited unexpectedly, {}", status))
}
