use std::time::Duration;

use anyhow::Context;
use clap::Args;
use nix::sys::signal::Signal;
use vmlite::runtime::VmDir;
use vmlite::util::send_signal;
use vmlite_shared::constants::shutdown::{
    DEFAULT_GRACE_PERIOD_SECS, STOP_WAIT_ATTEMPTS, STOP_WAIT_INTERVAL_MS, STOP_WAIT_MARGIN_SECS,
};

#[derive(Args, Debug)]
pub struct StopArgs {
    /// Name of the VM
    pub name: String,
}

/// Ask the controller holding the VM lock to stop, then wait for it to let go.
pub async fn execute(args: StopArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let name = args.name.as_str();
    let dir = global.options().vm_dir(name);
    if !dir.initialized() {
        anyhow::bail!("vm not initialized, name={}", name);
    }

    let pid = dir
        .pid()
        .with_context(|| format!("vm not running, name={}", name))?;

    let grace_period = match dir.load_config() {
        Ok(config) => config.shutdown.grace_period(),
        Err(e) => {
            tracing::warn!(vm = %name, error = %e, "failed to load vm config, assuming default grace period");
            Duration::from_secs(DEFAULT_GRACE_PERIOD_SECS)
        }
    };
    let attempts = stop_wait_attempts(grace_period);

    tracing::info!(vm = %name, pid, grace_period_secs = grace_period.as_secs(), "stop vm");
    send_signal(pid, Signal::SIGINT)?;

    if wait_until_stopped(&dir, attempts).await {
        tracing::info!(vm = %name, "vm stopped");
        println!("{}", name);
        Ok(())
    } else {
        anyhow::bail!("failed to stop vm, name={}, pid={}", name, pid)
    }
}

/// Polls to wait for the controller: the VM's grace period plus a margin for
/// the forced stop, and never fewer than the fixed minimum.
fn stop_wait_attempts(grace_period: Duration) -> u32 {
    let interval = Duration::from_millis(STOP_WAIT_INTERVAL_MS);
    let budget = grace_period.saturating_add(Duration::from_secs(STOP_WAIT_MARGIN_SECS));
    let polls = budget.as_millis().div_ceil(interval.as_millis());
    u32::try_from(polls)
        .unwrap_or(u32::MAX)
        .max(STOP_WAIT_ATTEMPTS)
}

async fn wait_until_stopped(dir: &VmDir, attempts: u32) -> bool {
    for _ in 0..attempts {
        tokio::time::sleep(Duration::from_millis(STOP_WAIT_INTERVAL_MS)).await;
        if dir.pid().is_none() {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use vmlite_shared::constants::shutdown::MAX_GRACE_PERIOD_SECS;

    fn waited(attempts: u32) -> Duration {
        Duration::from_millis(STOP_WAIT_INTERVAL_MS) * attempts
    }

    #[test]
    fn test_short_grace_period_uses_minimum() {
        assert_eq!(stop_wait_attempts(Duration::ZERO), STOP_WAIT_ATTEMPTS);
        assert_eq!(stop_wait_attempts(Duration::from_secs(2)), STOP_WAIT_ATTEMPTS);
    }

    #[test]
    fn test_wait_outlasts_grace_period() {
        for secs in [15, 30, 60, 600] {
            let grace = Duration::from_secs(secs);
            let attempts = stop_wait_attempts(grace);
            assert!(
                waited(attempts) >= grace + Duration::from_secs(STOP_WAIT_MARGIN_SECS),
                "grace={}s attempts={}",
                secs,
                attempts
            );
        }
    }

    #[test]
    fn test_longest_grace_period_fits() {
        let grace = Duration::from_secs(MAX_GRACE_PERIOD_SECS);
        assert!(waited(stop_wait_attempts(grace)) > grace);
    }
}
