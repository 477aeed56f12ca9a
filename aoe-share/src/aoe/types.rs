//! Type-safe wrappers for AoE identifiers.
//!
//! This module provides the resolved share configuration, shelf/slot
//! addresses, interface names and device paths used throughout the crate,
//! along with the snapshot records produced by discovery.

use std::fmt::{self, Display};
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::{AoeError, Result};

/// Default shelf (major AoE address)
pub const DEFAULT_SHELF: u16 = 9;
/// Default slot (minor AoE address)
pub const DEFAULT_SLOT: u8 = 0;
/// Default network interface for new exports
pub const DEFAULT_NETIF: &str = "eth0";

/// Longest interface name the kernel accepts (IFNAMSIZ - 1).
pub const NETIF_MAX_LEN: usize = 15;

/// Highest usable shelf; 0xffff is the AoE broadcast shelf.
pub const MAX_SHELF: u16 = 0xfffe;
/// Highest usable slot; 0xff is the AoE broadcast slot.
pub const MAX_SLOT: u8 = 0xfe;

// ============================================================================
// AoeAddress
// ============================================================================

/// Shelf/slot pair identifying one AoE target.
///
/// Displays in the kernel's naming convention, e.g. `e9.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AoeAddress {
    pub shelf: u16,
    pub slot: u8,
}

impl AoeAddress {
    pub fn new(shelf: u16, slot: u8) -> Self {
        Self { shelf, slot }
    }
}

impl Display for AoeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}.{}", self.shelf, self.slot)
    }
}

// ============================================================================
// NetIf
// ============================================================================

/// A network interface name, non-empty and bounded to `NETIF_MAX_LEN` bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetIf(String);

impl NetIf {
    /// Build an interface name, truncating anything past the kernel bound.
    pub fn new(name: &str) -> Result<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AoeError::Syntax("netif cannot be empty".into()));
        }
        if name
            .chars()
            .any(|c| c.is_whitespace() || c == '/' || c == ',' || c == '=')
        {
            return Err(AoeError::Syntax(format!(
                "netif '{}' contains invalid characters",
                name
            )));
        }

        let mut end = name.len().min(NETIF_MAX_LEN);
        while !name.is_char_boundary(end) {
            end -= 1;
        }
        Ok(Self(name[..end].to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for NetIf {
    fn default() -> Self {
        Self(DEFAULT_NETIF.to_string())
    }
}

impl Display for NetIf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NetIf {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// ShareOptions / ShareSetting
// ============================================================================

/// Resolved configuration for one export
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareOptions {
    /// Shelf (major AoE address)
    pub shelf: u16,
    /// Slot (minor AoE address)
    pub slot: u8,
    /// Ethernet interface the target is served on
    pub netif: NetIf,
}

impl ShareOptions {
    pub fn address(&self) -> AoeAddress {
        AoeAddress::new(self.shelf, self.slot)
    }
}

impl Default for ShareOptions {
    fn default() -> Self {
        Self {
            shelf: DEFAULT_SHELF,
            slot: DEFAULT_SLOT,
            netif: NetIf::default(),
        }
    }
}

impl Display for ShareOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "shelf={},slot={},netif={}",
            self.shelf, self.slot, self.netif
        )
    }
}

/// A complete option string: explicitly off, or on with resolved options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareSetting {
    Off,
    On(ShareOptions),
}

impl Display for ShareSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShareSetting::Off => write!(f, "off"),
            ShareSetting::On(opts) => write!(f, "{}", opts),
        }
    }
}

impl FromStr for ShareSetting {
    type Err = AoeError;

    fn from_str(s: &str) -> Result<Self> {
        super::options::parse_options(s)
    }
}

// ============================================================================
// DevicePath
// ============================================================================

/// A validated path to the block device backing a share.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DevicePath(String);

impl DevicePath {
    const ZVOL_PREFIX: &'static str = "/dev/zvol/";

    /// Device path of a ZFS volume, e.g. `tank/vol1` -> `/dev/zvol/tank/vol1`.
    pub fn from_dataset(dataset_name: &str) -> Result<Self> {
        if dataset_name.is_empty() {
            return Err(AoeError::InvalidName("dataset name cannot be empty".into()));
        }
        if dataset_name.starts_with('/') {
            return Err(AoeError::InvalidName(format!(
                "dataset name '{}' must not be an absolute path",
                dataset_name
            )));
        }
        Self::parse(&format!("{}{}", Self::ZVOL_PREFIX, dataset_name))
    }

    /// Parse an existing device path string.
    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(AoeError::InvalidName("device path cannot be empty".into()));
        }
        if !s.starts_with('/') {
            return Err(AoeError::InvalidName(format!(
                "device path '{}' must be absolute",
                s
            )));
        }
        if s.contains("..") {
            return Err(AoeError::InvalidName(format!(
                "device path '{}' contains path traversal",
                s
            )));
        }
        if !s
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '.' || c == '/')
        {
            return Err(AoeError::InvalidName(format!(
                "device path '{}' contains invalid characters",
                s
            )));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for DevicePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DevicePath {
    type Err = AoeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl AsRef<str> for DevicePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl AsRef<Path> for DevicePath {
    fn as_ref(&self) -> &Path {
        Path::new(&self.0)
    }
}

// ============================================================================
// Discovery records
// ============================================================================

/// One export observed in live system state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredExport {
    pub shelf: u16,
    pub slot: u8,
    pub netif: String,
    /// Kernel state string (e.g. "up"), or "running" for process-only entries
    pub status: String,
    pub size_sectors: u64,
    /// Backing device, when a running export process accounts for this entry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_path: Option<DevicePath>,
}

impl DiscoveredExport {
    pub fn address(&self) -> AoeAddress {
        AoeAddress::new(self.shelf, self.slot)
    }
}

/// An export process found in the process table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningExport {
    pub pid: i32,
    pub address: AoeAddress,
    pub netif: String,
    pub device_path: DevicePath,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_display() {
        assert_eq!(AoeAddress::new(9, 0).to_string(), "e9.0");
        assert_eq!(AoeAddress::new(12, 254).to_string(), "e12.254");
    }

    #[test]
    fn test_share_options_default() {
        let opts = ShareOptions::default();
        assert_eq!(opts.shelf, 9);
        assert_eq!(opts.slot, 0);
        assert_eq!(opts.netif.as_str(), "eth0");
        assert_eq!(opts.to_string(), "shelf=9,slot=0,netif=eth0");
    }

    #[test]
    fn test_netif_truncation() {
        let netif = NetIf::new("enp0s31f6-very-long-name").unwrap();
        assert_eq!(netif.as_str().len(), NETIF_MAX_LEN);
        assert_eq!(netif.as_str(), "enp0s31f6-very-");
    }

    #[test]
    fn test_netif_validation() {
        assert!(NetIf::new("").is_err());
        assert!(NetIf::new("   ").is_err());
        assert!(NetIf::new("eth 0").is_err());
        assert_eq!(NetIf::new(" eth1 ").unwrap().as_str(), "eth1");
    }

    #[test]
    fn test_device_path_from_dataset() {
        let path = DevicePath::from_dataset("rpool/test").unwrap();
        assert_eq!(path.as_str(), "/dev/zvol/rpool/test");
        assert!(DevicePath::from_dataset("").is_err());
        assert!(DevicePath::from_dataset("/rpool/test").is_err());
    }

    #[test]
    fn test_device_path_validation() {
        assert!(DevicePath::parse("").is_err());
        assert!(DevicePath::parse("dev/sda").is_err());
        assert!(DevicePath::parse("/dev/zvol/../etc/passwd").is_err());
        assert!(DevicePath::parse("/dev/zvol/tank;rm").is_err());
        assert!(DevicePath::parse("/dev/sdb").is_ok());
    }

    #[test]
    fn test_discovered_export_serializes_without_missing_path() {
        let export = DiscoveredExport {
            shelf: 9,
            slot: 0,
            netif: "eth0".into(),
            status: "up".into(),
            size_sectors: 2048,
            device_path: None,
        };
        let json = serde_json::to_string(&export).unwrap();
        assert!(!json.contains("device_path"));
        assert!(json.contains("\"size_sectors\":2048"));
    }
}
