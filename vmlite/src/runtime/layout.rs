//! Per-VM directory layout.
//!
//! ```text
//! <home>/vms/<name>/config.json   VM config, also the lock file
//! <home>/logs/<name>.log          output of detached runs
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use vmlite_shared::constants::layout;
use vmlite_shared::errors::{VmliteError, VmliteResult};

use super::config::VmConfig;
use super::lock::VmLock;

/// Handle on `<home>/vms/<name>`. Nothing touches the disk until a method does.
#[derive(Clone, Debug)]
pub struct VmDir {
    dir: PathBuf,
    config_path: PathBuf,
}

/// Reject names that would escape the VMs directory.
pub fn validate_vm_name(name: &str) -> VmliteResult<()> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\0')
    {
        return Err(VmliteError::Config(format!("invalid vm name: {:?}", name)));
    }
    Ok(())
}

impl VmDir {
    pub fn new(dir: PathBuf) -> Self {
        let config_path = dir.join(layout::CONFIG_FILE);
        Self { dir, config_path }
    }

    pub fn name(&self) -> String {
        self.dir
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn initialized(&self) -> bool {
        self.config_path.is_file()
    }

    /// Create the directory and write the initial config.
    ///
    /// # Arguments
    /// * `config` - Config to store; validated first
    ///
    /// # Returns
    /// `Config` for an invalid name or config, `AlreadyExists` if the VM
    /// was created before, `Storage` if the directory cannot be made.
    pub fn create(&self, config: &VmConfig) -> VmliteResult<()> {
        validate_vm_name(&self.name())?;
        config.validate()?;
        if self.initialized() {
            return Err(VmliteError::AlreadyExists(format!(
                "vm already exists, name={}",
                self.name()
            )));
        }

        fs::create_dir_all(&self.dir).map_err(|e| {
            VmliteError::Storage(format!(
                "failed to create vm dir {}: {}",
                self.dir.display(),
                e
            ))
        })?;
        self.save_config(config)?;
        tracing::info!(name = %self.name(), dir = %self.dir.display(), "created vm");
        Ok(())
    }

    /// Read and validate `config.json`.
    ///
    /// # Returns
    /// The stored config, or `NotFound` if the VM was never created.
    pub fn load_config(&self) -> VmliteResult<VmConfig> {
        if !self.initialized() {
            return Err(VmliteError::NotFound(format!(
                "vm not initialized, name={}",
                self.name()
            )));
        }
        let json = fs::read_to_string(&self.config_path)?;
        VmConfig::from_json(&json)
    }

    /// Overwrite `config.json`. Releases this process's lock, if it holds one.
    pub fn save_config(&self, config: &VmConfig) -> VmliteResult<()> {
        let json = config.to_json_pretty()?;
        fs::write(&self.config_path, json)?;
        Ok(())
    }

    /// Lock the VM for the lifetime of the returned guard.
    ///
    /// POSIX record locks are dropped as soon as this process closes *any*
    /// descriptor of the config file, so load the config before locking and
    /// do not touch the file again while the guard is alive.
    ///
    /// # Returns
    /// The lock guard, `NotFound` if the VM was never created, or
    /// `InvalidState` if another controller is running it.
    pub fn lock(&self) -> VmliteResult<VmLock> {
        if !self.initialized() {
            return Err(VmliteError::NotFound(format!(
                "vm not initialized, name={}",
                self.name()
            )));
        }
        VmLock::acquire(&self.config_path)
    }

    /// PID of the controller process running this VM, if any.
    ///
    /// # Returns
    /// The lock holder's PID. `None` when the VM is not running, was never
    /// created, or is locked by the calling process itself.
    pub fn pid(&self) -> Option<i32> {
        if !self.initialized() {
            return None;
        }
        match VmLock::holder_pid(&self.config_path) {
            Ok(pid) => pid,
            Err(e) => {
                tracing::warn!(name = %self.name(), error = %e, "failed to query vm lock");
                None
            }
        }
    }

    pub fn log_path(&self, logs_dir: &Path) -> PathBuf {
        logs_dir.join(format!("{}.log", self.name()))
    }
}
