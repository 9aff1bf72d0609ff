use std::fs::OpenOptions;
use std::os::unix::process::CommandExt;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use tokio::signal::unix::{SignalKind, signal};
use vmlite::events::EventBus;
use vmlite::exit::{ExitSignal, ProcessExitPolicy};
use vmlite::lifecycle::LifecycleController;
use vmlite::runtime::{VmDir, VmliteOptions};
use vmlite::util::{env_filter_or, init_file_logging};
use vmlite::vmm::{ProcessBackend, VmHandle};
use vmlite_shared::constants::exit_codes;

/// How long `run -d` waits for the background instance to take the lock.
const STARTUP_POLL_ATTEMPTS: u32 = 50;
const STARTUP_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Name of the VM
    pub name: String,

    /// Run the VM in the background, logging to <home>/logs/<name>.log
    #[arg(short = 'd', long)]
    pub detached: bool,

    /// Set on the re-executed background instance
    #[arg(long, hide = true, conflicts_with = "detached")]
    pub background: bool,
}

/// Run the VM until it reaches a terminal state and return the exit code.
pub async fn execute(args: RunArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<i32> {
    let options = global.options();
    let name = args.name.as_str();
    let dir = options.vm_dir(name);
    if !dir.initialized() {
        anyhow::bail!("vm not initialized, name={}", name);
    }

    if args.detached {
        return launch_in_background(name, &options, &dir).await;
    }

    // Flushed when dropped, so it must outlive the last log line.
    let log_guard = if args.background {
        let log_path = dir.log_path(&options.logs_dir());
        let guard = init_file_logging(&log_path, env_filter_or("info"))
            .with_context(|| format!("failed to open log file {}", log_path.display()))?;
        Some(guard)
    } else {
        None
    };

    // Must come before the lock: closing any descriptor of config.json
    // releases the lock, so the file is not touched once it is held.
    let config = dir.load_config()?;
    let lock = dir.lock()?;

    let (events_tx, events) = EventBus::channel();
    let backend = ProcessBackend::new(name, &config, events_tx);
    let (sink, exit_rx) = ExitSignal::new();
    let controller = Arc::new(LifecycleController::new(
        VmHandle::new(name, Box::new(backend)),
        ProcessExitPolicy::new(Arc::new(sink)),
        config.shutdown.clone(),
    ));
    controller.listen(events);
    handle_signals(Arc::clone(&controller))?;

    if let Err(e) = controller.start().await {
        // The failure is already terminal; the exit code below reflects it.
        tracing::debug!(vm = %name, error = %e, "start did not complete");
    }

    let code = exit_rx.wait().await;
    tracing::info!(vm = %name, code, state = %controller.state(), "vm controller exiting");

    // Logs are complete on disk before `vmlite stop` sees the lock go away.
    drop(log_guard);
    drop(lock);
    Ok(code)
}

/// Translate SIGTERM, SIGINT and SIGQUIT into a graceful stop.
fn handle_signals(controller: Arc<LifecycleController>) -> anyhow::Result<()> {
    let mut sigterm = signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("failed to install SIGINT handler")?;
    let mut sigquit = signal(SignalKind::quit()).context("failed to install SIGQUIT handler")?;

    tokio::spawn(async move {
        loop {
            let received = tokio::select! {
                _ = sigterm.recv() => "SIGTERM",
                _ = sigint.recv() => "SIGINT",
                _ = sigquit.recv() => "SIGQUIT",
            };
            tracing::info!(vm = %controller.name(), signal = received, "received signal");

            // Repeated signals join the stop sequence already in flight.
            let controller = Arc::clone(&controller);
            tokio::spawn(async move {
                if let Err(e) = controller.stop().await {
                    tracing::warn!(vm = %controller.name(), error = %e, "stop did not complete");
                }
            });
        }
    });
    Ok(())
}

/// Re-execute `vmlite run` detached from the terminal.
async fn launch_in_background(
    name: &str,
    options: &VmliteOptions,
    dir: &VmDir,
) -> anyhow::Result<i32> {
    if let Some(pid) = dir.pid() {
        anyhow::bail!("vm is already running, name={}, pid={}", name, pid);
    }

    let logs_dir = options.logs_dir();
    std::fs::create_dir_all(&logs_dir)
        .with_context(|| format!("failed to create {}", logs_dir.display()))?;
    let log_path = dir.log_path(&logs_dir);
    let log = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("log file is not writable, path={}", log_path.display()))?;

    let exe = std::env::current_exe().context("failed to locate vmlite executable")?;
    let mut child = std::process::Command::new(exe)
        .arg("--home")
        .arg(&options.home_dir)
        .args(["run", name, "--background"])
        .stdin(Stdio::null())
        .stdout(Stdio::from(log.try_clone()?))
        .stderr(Stdio::from(log))
        .process_group(0)
        .spawn()
        .context("failed to launch vm in background")?;

    for _ in 0..STARTUP_POLL_ATTEMPTS {
        if let Some(pid) = dir.pid() {
            tracing::info!(vm = %name, pid, log = %log_path.display(), "vm launched in background");
            println!("{}", name);
            return Ok(exit_codes::SUCCESS);
        }
        if let Some(status) = child.try_wait()? {
            if status.success() {
                tracing::info!(vm = %name, "vm ran to completion in background");
                return Ok(exit_codes::SUCCESS);
            }
            anyhow::bail!(
                "vm exited during startup, {}, check log in {}",
                status,
                log_path.display()
            );
        }
        tokio::time::sleep(STARTUP_POLL_INTERVAL).await;
    }

    anyhow::bail!(
        "timed out waiting for vm to start, check log in {}",
        log_path.display()
    )
}
