//! AoE Share Library
//!
//! This library exports ZFS volumes (or any block device) over
//! ATA-over-Ethernet by supervising one `vblade` process per share.
//!
//! The library is split into several modules:
//! - `aoe`: option parsing, device discovery and vblade process control
//! - `share`: share lifecycle (enable, disable, option updates)
//! - `config`: host paths the controller works against
//! - `metrics`: operation metrics

pub mod aoe;
pub mod config;
pub mod metrics;
pub mod share;

pub use aoe::{AoeError, ErrorKind, ExportController, ShareOptions, ShareSetting, Vblade};
pub use config::AoeConfig;
pub use share::{AoeShareController, Share};
