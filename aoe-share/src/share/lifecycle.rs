//! AoE share lifecycle: enable, disable and option updates.
//!
//! Every operation works from a fresh view of the host. Discovered exports are
//! returned by value and never cached between calls, so the controller holds
//! no mutable state of its own.

use tracing::{debug, info, instrument, warn};

use crate::aoe::{
    AoeError, DeviceScanner, DiscoveredExport, ExportController, Result, RunningExport,
    SHAREOPTS_OFF, ShareSetting, Vblade, parse_options,
};
use crate::config::AoeConfig;
use crate::metrics::{self, OperationTimer};

use super::handle::Share;

/// Reconciles a share's option string with the running export processes
pub struct AoeShareController<C = Vblade> {
    exports: C,
    scanner: DeviceScanner,
}

impl AoeShareController<Vblade> {
    /// Controller using the host's vblade and sysfs paths from `config`
    pub fn from_config(config: &AoeConfig) -> Self {
        info!(
            vblade = %config.vblade_path.display(),
            block_dir = %config.block_dir.display(),
            "Initializing AoE share controller"
        );
        Self::new(
            Vblade::new(&config.vblade_path),
            DeviceScanner::new(&config.block_dir),
        )
    }
}

impl<C: ExportController> AoeShareController<C> {
    pub fn new(exports: C, scanner: DeviceScanner) -> Self {
        Self { exports, scanner }
    }

    pub fn exports(&self) -> &C {
        &self.exports
    }

    /// Fresh snapshot of the exports present on this host.
    pub fn discover(&self) -> Vec<DiscoveredExport> {
        let running = match self.exports.running_exports() {
            Ok(running) => running,
            Err(e) => {
                warn!(error = %e, "Failed to list running exports, using kernel state only");
                Vec::new()
            }
        };

        let found = self.scanner.scan(&running);
        metrics::set_discovered_count(found.len());
        found
    }

    fn find_export(&self, share: &Share) -> Option<DiscoveredExport> {
        self.discover()
            .into_iter()
            .find(|export| export.device_path.as_ref() == Some(share.sharepath()))
    }

    /// Whether an export for this share's device is currently running.
    pub fn is_share_active(&self, share: &Share) -> bool {
        if !self.exports.is_available() {
            return false;
        }
        self.find_export(share).is_some()
    }

    /// Check an option string before the volume manager stores it.
    pub fn validate_options(&self, shareopts: &str) -> Result<()> {
        crate::aoe::validate_options(shareopts)
    }

    /// Start exporting a share according to its option string.
    #[instrument(skip(self, share), fields(share = %share.sharepath()))]
    pub fn enable(&self, share: &Share) -> Result<()> {
        OperationTimer::new("enable").finish(self.enable_share(share))
    }

    fn enable_share(&self, share: &Share) -> Result<()> {
        if !self.exports.is_available() {
            return Err(AoeError::Unavailable(self.exports.executable().to_path_buf()));
        }

        let shareopts = share.shareopts().ok_or_else(|| {
            AoeError::InvalidShare(format!("{} has no share options", share.sharepath()))
        })?;

        let options = match parse_options(shareopts) {
            Ok(ShareSetting::Off) => {
                debug!("Share options are 'off', not exporting");
                return Ok(());
            }
            Ok(ShareSetting::On(options)) => options,
            Err(e) => return Err(AoeError::InvalidOptions(e.to_string())),
        };

        // One device per address and interface
        let address = options.address();
        let running = self.exports.running_exports()?;
        if let Some(r) = running
            .iter()
            .find(|r| r.address == address && options.netif.as_str() == r.netif)
        {
            if &r.device_path == share.sharepath() {
                info!(address = %address, "Share already exported");
                return Ok(());
            }
            warn!(
                address = %address,
                netif = %r.netif,
                device = %r.device_path,
                "AoE address already in use"
            );
            return Err(AoeError::AddressInUse {
                address,
                netif: r.netif.clone(),
                device: r.device_path.clone(),
            });
        }

        info!(
            address = %address,
            netif = %options.netif,
            "Enabling AoE share"
        );
        self.exports.start_export(&options, share.sharepath())
    }

    /// Stop exporting a share.
    ///
    /// A share that is not currently exported is already disabled.
    #[instrument(skip(self, share), fields(share = %share.sharepath()))]
    pub fn disable(&self, share: &Share) -> Result<()> {
        OperationTimer::new("disable").finish(self.disable_share(share))
    }

    fn disable_share(&self, share: &Share) -> Result<()> {
        if !self.exports.is_available() {
            debug!("AoE support unavailable, share cannot be active");
            return Ok(());
        }

        let serving: Vec<RunningExport> = self
            .exports
            .running_exports()?
            .into_iter()
            .filter(|r| &r.device_path == share.sharepath())
            .collect();

        if serving.is_empty() {
            info!("Share not exported (idempotent)");
            return Ok(());
        }

        for export in &serving {
            info!(
                address = %export.address,
                netif = %export.netif,
                pid = export.pid,
                "Disabling AoE share"
            );
            self.exports.stop_export(export)?;
        }
        Ok(())
    }

    /// Store a new option string, re-exporting the share if it changed while
    /// the share was active.
    ///
    /// The old export is always torn down before the new options are stored:
    /// a running vblade cannot change its address or interface.
    #[instrument(skip(self, share))]
    pub fn update_options(&self, share: Option<&mut Share>, shareopts: &str) -> Result<()> {
        OperationTimer::new("update").finish(self.update_share(share, shareopts))
    }

    fn update_share(&self, share: Option<&mut Share>, shareopts: &str) -> Result<()> {
        let share = share.ok_or_else(|| AoeError::InvalidShare("missing share handle".into()))?;

        let active = self.is_share_active(share);
        share.set_active(active);

        let needs_reshare = active && share.shareopts().is_some_and(|old| old != shareopts);
        if needs_reshare {
            info!(share = %share.sharepath(), "Share options changed, resharing");
            self.disable(share)?;
            share.set_active(false);
        }

        let mut copy = String::new();
        copy.try_reserve_exact(shareopts.len())
            .map_err(|_| AoeError::NoMemory)?;
        copy.push_str(shareopts);
        share.set_shareopts(Some(copy));

        if needs_reshare {
            self.enable(share)?;
            share.set_active(shareopts != SHAREOPTS_OFF);
        }

        Ok(())
    }

    /// Drop a share's option string before the volume manager frees it.
    pub fn clear_options(&self, share: &mut Share) {
        share.set_shareopts(None);
    }
}
