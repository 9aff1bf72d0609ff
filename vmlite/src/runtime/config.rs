//! Per-VM configuration persisted as `config.json`.

use serde::{Deserialize, Serialize};
use vmlite_shared::constants::{envs, shutdown, vm_defaults};
use vmlite_shared::errors::{VmliteError, VmliteResult};

use super::options::ShutdownOptions;

/// Command line that runs the hypervisor for one VM.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendCommand {
    pub executable: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: Vec<(String, String)>,
}

impl BackendCommand {
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

/// Complete configuration for a VM.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmConfig {
    pub backend: BackendCommand,
    #[serde(default = "default_cpus")]
    pub cpus: u8,
    #[serde(default = "default_memory_mib")]
    pub memory_mib: u32,
    #[serde(default)]
    pub shutdown: ShutdownOptions,
}

fn default_cpus() -> u8 {
    vm_defaults::DEFAULT_CPUS
}

fn default_memory_mib() -> u32 {
    vm_defaults::DEFAULT_MEMORY_MIB
}

impl VmConfig {
    pub fn new(backend: BackendCommand) -> Self {
        Self {
            backend,
            cpus: default_cpus(),
            memory_mib: default_memory_mib(),
            shutdown: ShutdownOptions::default(),
        }
    }

    pub fn validate(&self) -> VmliteResult<()> {
        if self.backend.executable.trim().is_empty() {
            return Err(VmliteError::Config("backend executable is empty".into()));
        }
        if self.cpus == 0 {
            return Err(VmliteError::Config("cpus must be at least 1".into()));
        }
        if self.memory_mib == 0 {
            return Err(VmliteError::Config("memory_mib must be at least 1".into()));
        }
        if self.shutdown.grace_period_secs > shutdown::MAX_GRACE_PERIOD_SECS {
            return Err(VmliteError::Config(format!(
                "grace_period_secs must be at most {}, got {}",
                shutdown::MAX_GRACE_PERIOD_SECS,
                self.shutdown.grace_period_secs
            )));
        }
        Ok(())
    }

    /// Environment handed to the backend process: user entries first,
    /// then the resource hints.
    pub fn backend_env(&self, vm_name: &str) -> Vec<(String, String)> {
        let mut env = self.backend.env.clone();
        env.push((envs::VMLITE_VM_NAME.to_string(), vm_name.to_string()));
        env.push((envs::VMLITE_CPUS.to_string(), self.cpus.to_string()));
        env.push((
            envs::VMLITE_MEMORY_MIB.to_string(),
            self.memory_mib.to_string(),
        ));
        env
    }

    pub fn from_json(json: &str) -> VmliteResult<Self> {
        let config: VmConfig = serde_json::from_str(json)
            .map_err(|e| VmliteError::Config(format!("invalid vm config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> VmliteResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| VmliteError::Config(format!("failed to serialize vm config: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = VmConfig::from_json(r#"{"backend":{"executable":"qemu-system-x86_64"}}"#)
            .unwrap();
        assert_eq!(config.cpus, 1);
        assert_eq!(config.memory_mib, 2048);
        assert_eq!(config.shutdown.grace_period_secs, 15);
        assert!(config.backend.args.is_empty());
    }

    #[test]
    fn test_full_config() {
        let config = VmConfig::from_json(
            r#"{
                "backend": {
                    "executable": "cloud-hypervisor",
                    "args": ["--kernel", "vmlinux"],
                    "env": [["RUST_BACKTRACE", "1"]]
                },
                "cpus": 4,
                "memory_mib": 8192,
                "shutdown": {"grace_period_secs": 30}
            }"#,
        )
        .unwrap();
        assert_eq!(config.backend.args, vec!["--kernel", "vmlinux"]);
        assert_eq!(config.cpus, 4);
        assert_eq!(config.shutdown.grace_period_secs, 30);
    }

    #[test]
    fn test_invalid_configs_rejected() {
        assert!(VmConfig::from_json(r#"{"backend":{"executable":""}}"#).is_err());
        assert!(VmConfig::from_json(r#"{"backend":{"executable":"x"},"cpus":0}"#).is_err());
        assert!(VmConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_grace_period_bounded() {
        let mut config = VmConfig::new(BackendCommand::new("qemu"));
        config.shutdown.grace_period_secs = shutdown::MAX_GRACE_PERIOD_SECS;
        assert!(config.validate().is_ok());

        config.shutdown.grace_period_secs = u64::MAX;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, VmliteError::Config(ref msg) if msg.contains("grace_period_secs")));

        let json = format!(
            r#"{{"backend":{{"executable":"x"}},"shutdown":{{"grace_period_secs":{}}}}}"#,
            u64::MAX
        );
        assert!(VmConfig::from_json(&json).is_err());
    }

    #[test]
    fn test_backend_env_appends_resource_hints() {
        let mut config = VmConfig::new(BackendCommand::new("krunvm"));
        config.backend.env.push(("FOO".into(), "bar".into()));
        config.cpus = 2;

        let env = config.backend_env("debian");
        assert_eq!(env[0], ("FOO".to_string(), "bar".to_string()));
        assert!(env.contains(&("VMLITE_VM_NAME".to_string(), "debian".to_string())));
        assert!(env.contains(&("VMLITE_CPUS".to_string(), "2".to_string())));
        assert!(env.contains(&("VMLITE_MEMORY_MIB".to_string(), "2048".to_string())));
    }
}
