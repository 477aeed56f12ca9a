//! Export process discovery and termination.
//!
//! vblade keeps its invocation on its command line
//! (`vblade <shelf> <slot> <netif> <device>`), so the process table is the
//! authoritative record of which device each shelf/slot is serving.

use std::path::Path;

use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use tracing::{debug, info, warn};

use super::error::{AoeError, Result};
use super::types::{AoeAddress, DevicePath, RunningExport};

/// Interpret a process command line as a vblade invocation.
///
/// Returns `None` for anything that is not `vblade`/`vbladed` followed by
/// exactly four positional arguments.
pub fn parse_cmdline(pid: i32, cmdline: &[String]) -> Option<RunningExport> {
    let [program, shelf, slot, netif, device] = cmdline else {
        return None;
    };

    let name = Path::new(program).file_name()?.to_str()?;
    if name != "vblade" && name != "vbladed" {
        return None;
    }

    Some(RunningExport {
        pid,
        address: AoeAddress::new(shelf.parse().ok()?, slot.parse().ok()?),
        netif: netif.clone(),
        device_path: DevicePath::parse(device).ok()?,
    })
}

/// List all vblade processes visible in /proc.
pub fn list_vblade_processes() -> Result<Vec<RunningExport>> {
    let processes = procfs::process::all_processes()
        .map_err(|e| AoeError::CommandFailed(format!("failed to enumerate processes: {}", e)))?;

    let mut exports = Vec::new();
    for process in processes {
        // Processes can exit mid-scan
        let Ok(process) = process else { continue };
        let Ok(cmdline) = process.cmdline() else { continue };

        if let Some(export) = parse_cmdline(process.pid(), &cmdline) {
            debug!(
                pid = export.pid,
                address = %export.address,
                device = %export.device_path,
                "Found running vblade"
            );
            exports.push(export);
        }
    }

    Ok(exports)
}

/// Ask a process to exit with SIGTERM.
///
/// A process that is already gone counts as terminated.
pub fn terminate(pid: i32) -> Result<()> {
    if pid <= 1 {
        warn!("Refusing to signal system process with PID {}", pid);
        return Err(AoeError::CommandFailed(format!(
            "refusing to signal PID {}",
            pid
        )));
    }

    match kill(Pid::from_raw(pid), Signal::SIGTERM) {
        Ok(()) => {
            info!("Sent SIGTERM to vblade PID {}", pid);
            Ok(())
        }
        Err(nix::Error::ESRCH) => {
            debug!("Process {} not found (already terminated)", pid);
            Ok(())
        }
        Err(e) => Err(AoeError::CommandFailed(format!(
            "failed to signal PID {}: {}",
            pid, e
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_vblade_cmdline() {
        let export = parse_cmdline(
            11982,
            &argv(&["vblade", "9", "0", "eth0", "/dev/zvol/rpool/test"]),
        )
        .unwrap();
        assert_eq!(export.pid, 11982);
        assert_eq!(export.address, AoeAddress::new(9, 0));
        assert_eq!(export.netif, "eth0");
        assert_eq!(export.device_path.as_str(), "/dev/zvol/rpool/test");
    }

    #[test]
    fn test_parse_full_path_program() {
        let export = parse_cmdline(
            42,
            &argv(&["/usr/sbin/vbladed", "3", "1", "eth1", "/dev/sdb"]),
        );
        assert!(export.is_some());
    }

    #[test]
    fn test_reject_other_commands() {
        assert!(parse_cmdline(1, &argv(&["vi", "9", "0", "eth0", "/dev/sdb"])).is_none());
        assert!(parse_cmdline(1, &argv(&["vblade", "9", "0", "eth0"])).is_none());
        assert!(
            parse_cmdline(1, &argv(&["vblade", "-r", "9", "0", "eth0", "/dev/sdb"])).is_none()
        );
        assert!(parse_cmdline(1, &argv(&["vblade", "x", "0", "eth0", "/dev/sdb"])).is_none());
        assert!(parse_cmdline(1, &[]).is_none());
    }

    #[test]
    fn test_refuse_to_signal_init() {
        assert!(terminate(1).is_err());
        assert!(terminate(0).is_err());
    }
}
