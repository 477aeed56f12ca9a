//! Discovery of AoE devices from the kernel's block-device tree.
//!
//! The aoe driver registers one block device per target, named
//! `etherd!e<shelf>.<slot>`, with single-line attribute files `netif`, `state`
//! and `size` (in 512-byte sectors).

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use super::types::{AoeAddress, DiscoveredExport, RunningExport};

/// Default directory holding the AoE block devices
pub const DEFAULT_BLOCK_DIR: &str = "/sys/devices/virtual/block";

/// Status reported for exports only seen in the process table
pub const STATUS_RUNNING: &str = "running";

static ETHERD_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^etherd!e(\d+)\.(\d+)$").expect("Invalid regex pattern")
});

/// Parse an `etherd!e<shelf>.<slot>` device name.
pub fn parse_device_name(name: &str) -> Option<AoeAddress> {
    let caps = ETHERD_NAME.captures(name)?;
    Some(AoeAddress::new(caps[1].parse().ok()?, caps[2].parse().ok()?))
}

/// Whether a kernel `netif` attribute, which names every interface the
/// target is reachable on, includes `netif`.
fn lists_netif(attribute: &str, netif: &str) -> bool {
    attribute
        .split(|c: char| c == ',' || c.is_whitespace())
        .any(|name| name == netif)
}

/// Read the first line of a sysfs attribute, without its line ending.
pub fn read_sysfs_value(path: &Path) -> io::Result<String> {
    let mut line = String::new();
    let read = BufReader::new(File::open(path)?).read_line(&mut line)?;
    if read == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("{} is empty", path.display()),
        ));
    }

    let trimmed_len = line.trim_end_matches(['\r', '\n']).len();
    line.truncate(trimmed_len);
    Ok(line)
}

/// Snapshot scanner over a block-device directory
#[derive(Debug, Clone)]
pub struct DeviceScanner {
    block_dir: PathBuf,
}

impl DeviceScanner {
    pub fn new(block_dir: impl Into<PathBuf>) -> Self {
        Self {
            block_dir: block_dir.into(),
        }
    }

    pub fn block_dir(&self) -> &Path {
        &self.block_dir
    }

    /// Build a fresh snapshot of exported devices.
    ///
    /// Kernel entries are resolved to their backing device through the
    /// matching entry in `running`. Running exports with no kernel entry are
    /// appended with status `running`. Reading stops at the first kernel
    /// entry with an unreadable attribute, keeping what was gathered so far.
    pub fn scan(&self, running: &[RunningExport]) -> Vec<DiscoveredExport> {
        let mut exports = self.scan_kernel_devices();

        for export in exports.iter_mut() {
            let address = export.address();
            export.device_path = running
                .iter()
                .find(|r| r.address == address && lists_netif(&export.netif, &r.netif))
                .or_else(|| running.iter().find(|r| r.address == address))
                .map(|r| r.device_path.clone());
        }

        for r in running {
            let seen = exports
                .iter()
                .any(|e| e.address() == r.address && e.device_path.as_ref() == Some(&r.device_path));
            if !seen {
                exports.push(DiscoveredExport {
                    shelf: r.address.shelf,
                    slot: r.address.slot,
                    netif: r.netif.clone(),
                    status: STATUS_RUNNING.to_string(),
                    size_sectors: 0,
                    device_path: Some(r.device_path.clone()),
                });
            }
        }

        debug!(count = exports.len(), "Scanned AoE exports");
        exports
    }

    fn scan_kernel_devices(&self) -> Vec<DiscoveredExport> {
        let mut exports = Vec::new();

        let entries = match fs::read_dir(&self.block_dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = %self.block_dir.display(), error = %e, "No block device directory");
                return exports;
            }
        };

        let mut devices: Vec<(AoeAddress, PathBuf)> = entries
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name();
                let address = parse_device_name(name.to_str()?)?;
                Some((address, entry.path()))
            })
            .collect();
        devices.sort_by_key(|(address, _)| (address.shelf, address.slot));

        for (address, dir) in devices {
            match read_device(address, &dir) {
                Ok(export) => exports.push(export),
                Err(e) => {
                    warn!(
                        device = %dir.display(),
                        error = %e,
                        "Failed to read AoE device attributes, returning partial list"
                    );
                    break;
                }
            }
        }

        exports
    }
}

impl Default for DeviceScanner {
    fn default() -> Self {
        Self::new(DEFAULT_BLOCK_DIR)
    }
}

fn read_device(address: AoeAddress, dir: &Path) -> io::Result<DiscoveredExport> {
    let netif = read_sysfs_value(&dir.join("netif"))?;
    let status = read_sysfs_value(&dir.join("state"))?;
    let size = read_sysfs_value(&dir.join("size"))?;
    let size_sectors = size.trim().parse::<u64>().map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("invalid size '{}': {}", size, e),
        )
    })?;

    Ok(DiscoveredExport {
        shelf: address.shelf,
        slot: address.slot,
        netif,
        status,
        size_sectors,
        device_path: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aoe::types::DevicePath;
    use tempfile::TempDir;

    fn add_device(root: &Path, name: &str, netif: &str, state: &str, size: &str) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("netif"), netif).unwrap();
        fs::write(dir.join("state"), state).unwrap();
        fs::write(dir.join("size"), size).unwrap();
    }

    fn running(pid: i32, shelf: u16, slot: u8, device: &str) -> RunningExport {
        running_on(pid, shelf, slot, "eth0", device)
    }

    fn running_on(pid: i32, shelf: u16, slot: u8, netif: &str, device: &str) -> RunningExport {
        RunningExport {
            pid,
            address: AoeAddress::new(shelf, slot),
            netif: netif.to_string(),
            device_path: DevicePath::parse(device).unwrap(),
        }
    }

    #[test]
    fn test_parse_device_name() {
        assert_eq!(parse_device_name("etherd!e9.0"), Some(AoeAddress::new(9, 0)));
        assert_eq!(parse_device_name("etherd!e3.7"), Some(AoeAddress::new(3, 7)));
        assert_eq!(parse_device_name("etherd!e9.0p1"), None);
        assert_eq!(parse_device_name("sda"), None);
        assert_eq!(parse_device_name("etherd!e99999.0"), None);
    }

    #[test]
    fn test_lists_netif() {
        assert!(lists_netif("eth0", "eth0"));
        assert!(lists_netif("eth0,eth1", "eth1"));
        assert!(lists_netif("eth0 eth1", "eth1"));
        assert!(!lists_netif("eth10", "eth1"));
        assert!(!lists_netif("", "eth0"));
    }

    #[test]
    fn test_read_sysfs_value_trims_line_endings() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state");
        fs::write(&path, "up\r\n").unwrap();
        assert_eq!(read_sysfs_value(&path).unwrap(), "up");

        fs::write(&path, "up,closewait\nsecond line\n").unwrap();
        assert_eq!(read_sysfs_value(&path).unwrap(), "up,closewait");

        fs::write(&path, "").unwrap();
        assert!(read_sysfs_value(&path).is_err());
        assert!(read_sysfs_value(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_scan_reads_attributes() {
        let dir = TempDir::new().unwrap();
        add_device(dir.path(), "etherd!e9.0", "eth0\n", "up\n", "2097152\n");
        add_device(dir.path(), "etherd!e3.7", "eth1\n", "down\n", "1024\n");
        fs::create_dir_all(dir.path().join("loop0")).unwrap();

        let exports = DeviceScanner::new(dir.path()).scan(&[]);
        assert_eq!(exports.len(), 2);
        assert_eq!(exports[0].address(), AoeAddress::new(3, 7));
        assert_eq!(exports[0].netif, "eth1");
        assert_eq!(exports[0].status, "down");
        assert_eq!(exports[1].size_sectors, 2097152);
        assert!(exports.iter().all(|e| e.device_path.is_none()));
    }

    #[test]
    fn test_scan_missing_directory_is_empty() {
        let scanner = DeviceScanner::new("/nonexistent/sys/block");
        assert!(scanner.scan(&[]).is_empty());
    }

    #[test]
    fn test_scan_stops_at_unreadable_entry() {
        let dir = TempDir::new().unwrap();
        add_device(dir.path(), "etherd!e1.0", "eth0\n", "up\n", "100\n");
        let broken = dir.path().join("etherd!e2.0");
        fs::create_dir_all(&broken).unwrap();
        fs::write(broken.join("netif"), "eth0\n").unwrap();
        add_device(dir.path(), "etherd!e3.0", "eth0\n", "up\n", "300\n");

        let exports = DeviceScanner::new(dir.path()).scan(&[]);
        assert_eq!(exports.len(), 1);
        assert_eq!(exports[0].shelf, 1);
    }

    #[test]
    fn test_scan_resolves_device_paths() {
        let dir = TempDir::new().unwrap();
        add_device(dir.path(), "etherd!e9.0", "eth0\n", "up\n", "2048\n");

        let procs = vec![
            running(100, 9, 0, "/dev/zvol/rpool/test"),
            running(200, 9, 1, "/dev/zvol/rpool/other"),
        ];
        let exports = DeviceScanner::new(dir.path()).scan(&procs);

        assert_eq!(exports.len(), 2);
        assert_eq!(exports[0].status, "up");
        assert_eq!(
            exports[0].device_path.as_ref().map(|p| p.as_str()),
            Some("/dev/zvol/rpool/test")
        );
        assert_eq!(exports[1].status, STATUS_RUNNING);
        assert_eq!(exports[1].address(), AoeAddress::new(9, 1));
        assert_eq!(exports[1].size_sectors, 0);
    }

    #[test]
    fn test_scan_prefers_process_on_listed_netif() {
        let dir = TempDir::new().unwrap();
        add_device(dir.path(), "etherd!e9.0", "eth0,eth1\n", "up\n", "2048\n");

        let procs = vec![
            running_on(100, 9, 0, "eth2", "/dev/zvol/rpool/other"),
            running_on(200, 9, 0, "eth1", "/dev/zvol/rpool/test"),
        ];
        let exports = DeviceScanner::new(dir.path()).scan(&procs);

        assert_eq!(
            exports[0].device_path.as_ref().map(|p| p.as_str()),
            Some("/dev/zvol/rpool/test")
        );
        // The unmatched process is still reported
        assert_eq!(exports.len(), 2);
        assert_eq!(
            exports[1].device_path.as_ref().map(|p| p.as_str()),
            Some("/dev/zvol/rpool/other")
        );
    }
}
