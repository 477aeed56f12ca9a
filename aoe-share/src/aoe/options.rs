//! Share option string codec.
//!
//! An option string is either the literal `off`, or a comma-separated list of
//! `on` and `key=value` items with keys `shelf`, `slot` and `netif`, e.g.
//! `shelf=9,slot=0,netif=eth0`. Unset keys fall back to the defaults.

use tracing::debug;

use super::error::{AoeError, Result};
use super::types::{MAX_SHELF, MAX_SLOT, NetIf, ShareOptions, ShareSetting};

/// Option string that explicitly opts a dataset out of AoE sharing
pub const SHAREOPTS_OFF: &str = "off";
const SHAREOPTS_ON: &str = "on";

/// Parse an option string into a share setting.
pub fn parse_options(shareopts: &str) -> Result<ShareSetting> {
    if shareopts == SHAREOPTS_OFF {
        return Ok(ShareSetting::Off);
    }

    let mut opts = ShareOptions::default();

    for item in shareopts.split(',').map(str::trim) {
        if item.is_empty() {
            continue;
        }

        let (key, value) = match item.split_once('=') {
            Some((key, value)) => (key.trim(), Some(value.trim())),
            None => (item, None),
        };

        match (key, value) {
            (SHAREOPTS_ON, None) => {}
            ("shelf", Some(value)) => opts.shelf = parse_number(key, value, MAX_SHELF)?,
            ("slot", Some(value)) => opts.slot = parse_number(key, value, MAX_SLOT)?,
            ("netif", Some(value)) => opts.netif = NetIf::new(value)?,
            ("shelf" | "slot" | "netif", None) => {
                return Err(AoeError::Syntax(format!("option '{}' requires a value", key)));
            }
            _ => {
                return Err(AoeError::Syntax(format!("unknown option '{}'", item)));
            }
        }
    }

    debug!(options = %opts, "Parsed share options");
    Ok(ShareSetting::On(opts))
}

/// Check that an option string is syntactically valid.
///
/// Uses the same grammar as enabling a share, so anything accepted here will
/// also be accepted when the share is turned on.
pub fn validate_options(shareopts: &str) -> Result<()> {
    parse_options(shareopts).map(|_| ())
}

fn parse_number<T>(key: &str, value: &str, max: T) -> Result<T>
where
    T: std::str::FromStr + PartialOrd + std::fmt::Display,
{
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AoeError::Syntax(format!(
            "{} must be a non-negative integer, got '{}'",
            key, value
        )));
    }
    match value.parse::<T>() {
        Ok(n) if n <= max => Ok(n),
        _ => Err(AoeError::Syntax(format!(
            "{} '{}' out of range (0-{})",
            key, value, max
        ))),
    }
}
