pub mod error;
pub mod options;
pub mod process;
pub mod sysfs;
pub mod types;
pub mod vblade;

pub use error::{AoeError, ErrorKind, Result};
pub use options::{SHAREOPTS_OFF, parse_options, validate_options};
pub use sysfs::DeviceScanner;
pub use types::{
    AoeAddress, DevicePath, DiscoveredExport, NetIf, RunningExport, ShareOptions, ShareSetting,
};
pub use vblade::{ExportController, Vblade};
