use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

use aoe_share::aoe::sysfs::DEFAULT_BLOCK_DIR;
use aoe_share::aoe::vblade::VBLADE_CMD_PATH;
use aoe_share::aoe::{DevicePath, Result};
use aoe_share::{AoeConfig, AoeShareController, Share};

#[derive(Parser, Debug)]
#[command(name = "aoe-share")]
#[command(about = "Export ZFS volumes over ATA-over-Ethernet with vblade")]
struct Args {
    /// Path to the vblade executable
    #[arg(long, env = "AOE_VBLADE_PATH", default_value = VBLADE_CMD_PATH)]
    vblade_path: PathBuf,

    /// Directory holding the kernel's etherd block devices
    #[arg(long, env = "AOE_BLOCK_DIR", default_value = DEFAULT_BLOCK_DIR)]
    block_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start exporting a share
    Enable {
        /// Device path or dataset name (mapped under /dev/zvol/)
        share: String,
        /// Share options, e.g. "shelf=9,slot=0,netif=eth0"
        #[arg(long, default_value = "on")]
        options: String,
    },
    /// Stop exporting a share
    Disable {
        /// Device path or dataset name
        share: String,
    },
    /// Check an option string
    Validate {
        options: String,
    },
    /// Apply changed options, re-exporting the share if it is running
    Update {
        /// Device path or dataset name
        share: String,
        /// Options the share is currently exported with
        #[arg(long)]
        old: Option<String>,
        /// New options
        #[arg(long)]
        new: String,
    },
    /// List AoE exports on this host
    Status {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install log subscriber: {}", e);
    }

    let config = AoeConfig {
        vblade_path: args.vblade_path,
        block_dir: args.block_dir,
    };
    let controller = AoeShareController::from_config(&config);

    match run(&controller, args.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("{}: {}", e.kind(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(controller: &AoeShareController, command: Command) -> Result<()> {
    match command {
        Command::Enable { share, options } => {
            let share = Share::new(share_path(&share)?).with_options(options);
            controller.enable(&share)?;
            info!(share = %share.sharepath(), "Share enabled");
        }
        Command::Disable { share } => {
            let share = Share::new(share_path(&share)?);
            controller.disable(&share)?;
            info!(share = %share.sharepath(), "Share disabled");
        }
        Command::Validate { options } => {
            controller.validate_options(&options)?;
            println!("ok");
        }
        Command::Update { share, old, new } => {
            let mut share = Share::new(share_path(&share)?);
            share.set_shareopts(old);
            controller.update_options(Some(&mut share), &new)?;
            println!(
                "{} {}",
                share.sharepath(),
                if share.is_active() { "active" } else { "inactive" }
            );
        }
        Command::Status { json } => {
            let exports = controller.discover();
            if json {
                let out = serde_json::to_string_pretty(&exports)
                    .map_err(|e| aoe_share::AoeError::CommandFailed(e.to_string()))?;
                println!("{}", out);
            } else {
                for export in &exports {
                    println!(
                        "{:>10} {:>8} {:<14} {:>12} {}",
                        export.address().to_string(),
                        export.netif,
                        export.status,
                        export.size_sectors,
                        export
                            .device_path
                            .as_ref()
                            .map(|p| p.as_str())
                            .unwrap_or("-")
                    );
                }
            }
        }
    }
    Ok(())
}

/// Accept either an absolute device path or a ZFS dataset name.
fn share_path(share: &str) -> Result<DevicePath> {
    if share.starts_with('/') {
        DevicePath::parse(share)
    } else {
        DevicePath::from_dataset(share)
    }
}
