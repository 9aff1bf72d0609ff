#![allow(dead_code)]

use assert_cmd::Command;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

/// A `vmlite` invocation bound to a private home directory.
pub struct TestContext {
    pub cmd: Command,
    pub home: TempDir,
}

impl TestContext {
    /// Another command sharing the same home directory.
    pub fn new_cmd(&self) -> Command {
        command(self.home.path())
    }

    /// Create a VM whose "hypervisor" is `command`.
    pub fn create_vm(&self, name: &str, command: &[&str]) {
        self.new_cmd()
            .args(["create", name, "--grace-period", "2", "--"])
            .args(command)
            .assert()
            .success();
    }

    /// Stop a VM left running by a test; errors are ignored.
    pub fn cleanup_vm(&self, name: &str) {
        let _ = self.new_cmd().args(["stop", name]).ok();
    }
}

fn command(home: &Path) -> Command {
    let bin_path = env!("CARGO_BIN_EXE_vmlite");
    let mut cmd = Command::new(bin_path);
    // You can override this with .timeout(Duration::from_secs(N))
    cmd.timeout(Duration::from_secs(60));
    cmd.env_remove("VMLITE_HOME");
    cmd.arg("--home").arg(home);
    cmd
}

pub fn vmlite() -> TestContext {
    let home = TempDir::new().expect("Failed to create temp dir");
    TestContext {
        cmd: command(home.path()),
        home,
    }
}
