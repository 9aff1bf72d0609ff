//! Process helpers for signalling the backend and controller processes.

use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use vmlite_shared::errors::{VmliteError, VmliteResult};

/// Check if a process with the given PID exists.
///
/// Sends the null signal; a permission error still means the process exists.
pub fn is_process_alive(pid: i32) -> bool {
    match signal::kill(Pid::from_raw(pid), None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

/// Send `sig` to `pid`.
///
/// A process that is already gone is not an error.
pub fn send_signal(pid: i32, sig: Signal) -> VmliteResult<()> {
    match signal::kill(Pid::from_raw(pid), sig) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(VmliteError::Engine(format!(
            "failed to send {} to pid {}: {}",
            sig, pid, e
        ))),
    }
}

/// Send `sig` to every process in the group led by `pgid`.
///
/// # Arguments
/// * `pgid` - Process group ID, the PID of a leader spawned with its own group
/// * `sig` - Signal to deliver
///
/// # Returns
/// `Ok(())` when delivered or when the group no longer exists.
pub fn send_group_signal(pgid: i32, sig: Signal) -> VmliteResult<()> {
    match signal::killpg(Pid::from_raw(pgid), sig) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(VmliteError::Engine(format!(
            "failed to send {} to process group {}: {}",
            sig, pgid, e
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_process_is_alive() {
        assert!(is_process_alive(std::process::id() as i32));
    }

    #[test]
    fn test_reaped_child_is_not_alive() {
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id() as i32;
        child.wait().unwrap();
        assert!(!is_process_alive(pid));
        assert!(send_signal(pid, Signal::SIGTERM).is_ok());
    }

    #[test]
    fn test_group_signal_reaches_every_member() {
        use std::os::unix::process::CommandExt;

        let mut child = std::process::Command::new("sh")
            .args(["-c", "sleep 300 & wait"])
            .process_group(0)
            .spawn()
            .unwrap();
        let pgid = child.id() as i32;

        send_group_signal(pgid, Signal::SIGKILL).unwrap();
        let status = child.wait().unwrap();
        assert!(!status.success());

        // An exhausted group is not an error.
        assert!(send_group_signal(pgid, Signal::SIGKILL).is_ok());
    }
}
