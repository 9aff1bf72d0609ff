//! Constants shared between the controller library and the CLI.

/// Process exit codes reported by the exit policy.
pub mod exit_codes {
    /// VM stopped cleanly (backend-confirmed or guest-initiated).
    pub const SUCCESS: i32 = 0;

    /// Any failure: start, stop, backend error, device disconnect.
    pub const FAILURE: i32 = 1;
}

/// Shutdown timing defaults.
pub mod shutdown {
    /// Seconds to wait for the guest after a polite stop request
    /// before forcing the VM down.
    pub const DEFAULT_GRACE_PERIOD_SECS: u64 = 15;

    /// Upper bound accepted for a configured grace period (one day).
    pub const MAX_GRACE_PERIOD_SECS: u64 = 24 * 60 * 60;

    /// Poll attempts used by `vmlite stop` while waiting for the
    /// controller process to release the VM lock.
    pub const STOP_WAIT_ATTEMPTS: u32 = 20;

    /// Interval between polls, in milliseconds.
    pub const STOP_WAIT_INTERVAL_MS: u64 = 1000;

    /// Extra polls granted on top of the VM's grace period, covering the
    /// forced stop itself.
    pub const STOP_WAIT_MARGIN_SECS: u64 = 5;
}

pub mod envs {
    pub const VMLITE_HOME: &str = "VMLITE_HOME";

    /// Exported to the backend process.
    pub const VMLITE_CPUS: &str = "VMLITE_CPUS";
    pub const VMLITE_MEMORY_MIB: &str = "VMLITE_MEMORY_MIB";
    pub const VMLITE_VM_NAME: &str = "VMLITE_VM_NAME";
}

/// Directory and file names under the vmlite home directory.
pub mod layout {
    /// Default home directory name (relative to the user's home).
    pub const DEFAULT_HOME_DIR: &str = ".vmlite";

    pub const VMS_DIR: &str = "vms";
    pub const LOGS_DIR: &str = "logs";
    pub const CONFIG_FILE: &str = "config.json";
}

/// Virtual machine resource defaults.
pub mod vm_defaults {
    pub const DEFAULT_CPUS: u8 = 1;
    pub const DEFAULT_MEMORY_MIB: u32 = 2048;
}
