//! Runtime configuration for the AoE share controller.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::aoe::sysfs::DEFAULT_BLOCK_DIR;
use crate::aoe::vblade::VBLADE_CMD_PATH;

/// Host paths the controller works against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AoeConfig {
    /// Export executable launched per share
    pub vblade_path: PathBuf,
    /// Directory holding the kernel's `etherd!e<shelf>.<slot>` devices
    pub block_dir: PathBuf,
}

impl Default for AoeConfig {
    fn default() -> Self {
        Self {
            vblade_path: PathBuf::from(VBLADE_CMD_PATH),
            block_dir: PathBuf::from(DEFAULT_BLOCK_DIR),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AoeConfig::default();
        assert_eq!(config.vblade_path, PathBuf::from("/usr/bin/vbladed"));
        assert_eq!(config.block_dir, PathBuf::from("/sys/devices/virtual/block"));
    }
}
