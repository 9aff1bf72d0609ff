//! Configuration for vmlite.

use std::path::PathBuf;
use std::time::Duration;

use dirs::home_dir;
use serde::{Deserialize, Serialize};
use vmlite_shared::constants::{envs, layout, shutdown};
use vmlite_shared::errors::VmliteResult;

use super::layout::VmDir;

/// Runtime-level options: where VM directories live.
#[derive(Clone, Debug)]
pub struct VmliteOptions {
    /// Home directory (`$VMLITE_HOME`, else `~/.vmlite`).
    pub home_dir: PathBuf,
}

impl Default for VmliteOptions {
    fn default() -> Self {
        let home_dir = std::env::var_os(envs::VMLITE_HOME)
            .map(PathBuf::from)
            .or_else(|| home_dir().map(|home| home.join(layout::DEFAULT_HOME_DIR)))
            .unwrap_or_else(|| PathBuf::from(layout::DEFAULT_HOME_DIR));
        Self { home_dir }
    }
}

impl VmliteOptions {
    pub fn new(home_dir: impl Into<PathBuf>) -> Self {
        Self {
            home_dir: home_dir.into(),
        }
    }

    pub fn vms_dir(&self) -> PathBuf {
        self.home_dir.join(layout::VMS_DIR)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.home_dir.join(layout::LOGS_DIR)
    }

    pub fn vm_dir(&self, name: &str) -> VmDir {
        VmDir::new(self.vms_dir().join(name))
    }

    /// All initialized VM directories, sorted by name.
    pub fn vm_dirs(&self) -> VmliteResult<Vec<VmDir>> {
        let vms_dir = self.vms_dir();
        if !vms_dir.exists() {
            return Ok(Vec::new());
        }

        let mut dirs = Vec::new();
        for entry in std::fs::read_dir(&vms_dir)? {
            let path = entry?.path();
            if path.is_dir() {
                let dir = VmDir::new(path);
                if dir.initialized() {
                    dirs.push(dir);
                }
            }
        }
        dirs.sort_by_key(|dir| dir.name());
        Ok(dirs)
    }
}

/// Shutdown timing for a stop sequence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutdownOptions {
    /// Seconds to wait for the guest after a polite stop request.
    #[serde(default = "default_grace_period_secs")]
    pub grace_period_secs: u64,
}

fn default_grace_period_secs() -> u64 {
    shutdown::DEFAULT_GRACE_PERIOD_SECS
}

impl Default for ShutdownOptions {
    fn default() -> Self {
        Self {
            grace_period_secs: default_grace_period_secs(),
        }
    }
}

impl ShutdownOptions {
    /// Options with the given grace period.
    ///
    /// The config stores whole seconds, so a fractional `grace_period` is
    /// rounded up: 500ms becomes 1s rather than an immediate forced stop.
    pub fn with_grace_period(grace_period: Duration) -> Self {
        let grace_period_secs = grace_period
            .as_secs()
            .saturating_add(u64::from(grace_period.subsec_nanos() > 0));
        Self { grace_period_secs }
    }

    /// Grace period, capped at `MAX_GRACE_PERIOD_SECS`.
    ///
    /// `VmConfig::validate` rejects larger values; the cap covers options
    /// built in code without going through a config file.
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs.min(shutdown::MAX_GRACE_PERIOD_SECS))
    }
}
