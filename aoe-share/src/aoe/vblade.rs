//! vblade export process control.

use std::io::{Read, Seek, SeekFrom};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, info, instrument, warn};

use super::error::{AoeError, Result};
use super::process;
use super::types::{DevicePath, RunningExport, ShareOptions};

/// Default location of the daemonizing vblade wrapper
pub const VBLADE_CMD_PATH: &str = "/usr/bin/vbladed";

/// Starts, stops and lists AoE export processes.
pub trait ExportController {
    /// Path of the export executable.
    fn executable(&self) -> &Path;

    /// Whether the export executable is installed and executable.
    fn is_available(&self) -> bool;

    /// Launch an export of `device_path` at the address in `options`.
    fn start_export(&self, options: &ShareOptions, device_path: &DevicePath) -> Result<()>;

    /// Terminate one export process found by `running_exports`.
    ///
    /// Succeeds when that process is no longer running.
    fn stop_export(&self, export: &RunningExport) -> Result<()>;

    /// Export processes currently running on this host.
    fn running_exports(&self) -> Result<Vec<RunningExport>>;
}

/// Controller backed by the vblade executable and the host process table
#[derive(Debug, Clone)]
pub struct Vblade {
    path: PathBuf,
}

impl Vblade {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn ensure_available(&self) -> Result<()> {
        if self.is_available() {
            Ok(())
        } else {
            Err(AoeError::Unavailable(self.path.clone()))
        }
    }
}

impl Default for Vblade {
    fn default() -> Self {
        Self::new(VBLADE_CMD_PATH)
    }
}

impl ExportController for Vblade {
    fn executable(&self) -> &Path {
        &self.path
    }

    fn is_available(&self) -> bool {
        match std::fs::metadata(&self.path) {
            Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o111 != 0,
            Err(_) => false,
        }
    }

    #[instrument(skip(self))]
    fn start_export(&self, options: &ShareOptions, device_path: &DevicePath) -> Result<()> {
        self.ensure_available()?;

        let shelf = options.shelf.to_string();
        let slot = options.slot.to_string();
        debug!(
            "Running {} {} {} {} {}",
            self.path.display(),
            shelf,
            slot,
            options.netif,
            device_path
        );

        // The backgrounded vblade inherits these descriptors; no pipes, or
        // waiting on the wrapper lasts as long as the export.
        let mut stderr = tempfile::tempfile()?;
        let status = Command::new(&self.path)
            .args([
                shelf.as_str(),
                slot.as_str(),
                options.netif.as_str(),
                device_path.as_str(),
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(stderr.try_clone()?)
            .status()
            .map_err(|e| {
                AoeError::CommandFailed(format!(
                    "failed to execute {}: {}",
                    self.path.display(),
                    e
                ))
            })?;

        if !status.success() {
            let mut message = String::new();
            stderr.seek(SeekFrom::Start(0))?;
            stderr.read_to_string(&mut message)?;
            warn!(status = %status, "vblade failed: {}", message.trim());
            return Err(AoeError::CommandFailed(format!(
                "{} exited with {}: {}",
                self.path.display(),
                status,
                message.trim()
            )));
        }

        info!(
            address = %options.address(),
            netif = %options.netif,
            device = %device_path,
            "Started AoE export"
        );
        Ok(())
    }

    #[instrument(skip(self, export), fields(pid = export.pid, address = %export.address))]
    fn stop_export(&self, export: &RunningExport) -> Result<()> {
        self.ensure_available()?;

        // The PID may have been reused since the export was listed
        let still_running = self.running_exports()?.into_iter().any(|r| r == *export);
        if !still_running {
            info!(device = %export.device_path, "vblade no longer running, nothing to stop");
            return Ok(());
        }

        process::terminate(export.pid)?;

        info!(
            netif = %export.netif,
            device = %export.device_path,
            "Stopped AoE export"
        );
        Ok(())
    }

    fn running_exports(&self) -> Result<Vec<RunningExport>> {
        process::list_vblade_processes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_missing_executable_is_unavailable() {
        let vblade = Vblade::new("/nonexistent/vbladed");
        assert!(!vblade.is_available());

        let device = DevicePath::parse("/dev/zvol/tank/vol1").unwrap();
        let err = vblade
            .start_export(&ShareOptions::default(), &device)
            .unwrap_err();
        assert!(matches!(err, AoeError::Unavailable(_)));

        let export = RunningExport {
            pid: 4242,
            address: crate::aoe::AoeAddress::new(9, 0),
            netif: "eth0".into(),
            device_path: device,
        };
        let err = vblade.stop_export(&export).unwrap_err();
        assert!(matches!(err, AoeError::Unavailable(_)));
    }

    #[test]
    fn test_non_executable_file_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vbladed");
        fs::write(&path, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        assert!(!Vblade::new(&path).is_available());

        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        assert!(Vblade::new(&path).is_available());
    }

    #[test]
    fn test_directory_is_unavailable() {
        let dir = TempDir::new().unwrap();
        assert!(!Vblade::new(dir.path()).is_available());
    }

    #[test]
    fn test_default_path() {
        assert_eq!(Vblade::default().executable(), Path::new(VBLADE_CMD_PATH));
    }
}
