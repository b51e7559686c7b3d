//! Command-line interface for the irbridge remote-command manager.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use irbridge_core::config::{env_vars, paths};
use irbridge_core::types::{DevicePatch, EntityKind, SignalKind};
use irbridge_learn::HttpHub;
use irbridge_service::{BridgeService, ServiceConfig};
use irbridge_storage::DeviceStore;

/// Manage learned IR/RF remote commands and generate entity definitions.
#[derive(Parser, Debug)]
#[command(name = "irbridge")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Action to perform.
    #[command(subcommand)]
    command: Command,

    /// Device store file.
    #[arg(long, global = true, env = env_vars::DATA_FILE, default_value = paths::DATA_FILE)]
    data_file: PathBuf,

    /// Rendered entity output file.
    #[arg(long, global = true, env = env_vars::OUTPUT_FILE, default_value = paths::OUTPUT_FILE)]
    output_file: PathBuf,

    /// Base URL of the hub bridge daemon.
    #[arg(long, global = true, env = env_vars::HUB_URL, default_value = "http://localhost:9380")]
    hub_url: String,

    /// Verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Register a new device.
    AddDevice {
        /// Display name; the device id is derived from it.
        name: String,
        /// Entity kind: light, fan, switch, media_player, cover, climate.
        kind: EntityKind,
        /// Controlling hub reference, required before learning.
        #[arg(long)]
        hub: Option<String>,
        /// Fixture group label for multi-entity appliances.
        #[arg(long)]
        group: Option<String>,
    },
    /// List all devices.
    List,
    /// Show one device with its commands.
    Show { device_id: String },
    /// Change a device's display name.
    Rename { device_id: String, name: String },
    /// Delete a device and all of its commands.
    RemoveDevice { device_id: String },
    /// Learn one command from the remote.
    Learn {
        device_id: String,
        /// Command name, e.g. turn_on or speed_2.
        command: String,
        /// Signal kind: ir or rf.
        #[arg(long, default_value = "ir")]
        signal: SignalKind,
    },
    /// List a device's learned commands.
    Commands { device_id: String },
    /// Delete one learned command.
    Forget { device_id: String, command: String },
    /// Rebuild the entity/helper definitions from the store.
    Generate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(env_vars::LOG).unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let store = Arc::new(DeviceStore::open(&args.data_file));
    let report = store.recovery_report().await;
    if report.recovered_from_backup {
        eprintln!("warning: store file was corrupt, recovered from backup");
    } else if report.started_empty_after_corruption {
        eprintln!("warning: store and backup were unusable, starting empty");
    }

    let hub = Arc::new(HttpHub::new(&args.hub_url));
    let service = BridgeService::new(
        store,
        hub,
        ServiceConfig {
            output_file: args.output_file.clone(),
            auto_generate: false,
        },
    );

    match args.command {
        Command::AddDevice { name, kind, hub, group } => {
            let mut device = service.create_device(&name, kind, hub).await?;
            if let Some(group) = group {
                let patch = DevicePatch {
                    group: Some(Some(group)),
                    ..Default::default()
                };
                device = service.update_device(&device.id.clone(), patch).await?;
            }
            println!("created {} ({})", device.id, device.entity_kind);
        }
        Command::List => {
            for device in service.list_devices().await {
                println!(
                    "{:<24} {:<12} {:>3} commands  {}",
                    device.id,
                    device.entity_kind,
                    device.commands.len(),
                    device.display_name
                );
            }
        }
        Command::Show { device_id } => {
            let device = service.get_device(&device_id).await?;
            println!("{}", serde_json::to_string_pretty(&device)?);
        }
        Command::Rename { device_id, name } => {
            let patch = DevicePatch {
                display_name: Some(name),
                ..Default::default()
            };
            let device = service.update_device(&device_id, patch).await?;
            println!("renamed {} to {:?}", device.id, device.display_name);
        }
        Command::RemoveDevice { device_id } => {
            service.delete_device(&device_id).await?;
            println!("removed {device_id}");
        }
        Command::Learn { device_id, command, signal } => {
            if signal == SignalKind::Rf {
                println!("hold the remote button until the frequency locks, then press again");
            } else {
                println!("point the remote at the hub and press the button");
            }
            let session = service.learn(&device_id, &command, signal).await?;
            let status = service.wait_learn(&session).await?;
            match status.phase {
                irbridge_learn::SessionPhase::Succeeded => {
                    println!("learned {device_id}/{}", status.command_name);
                }
                phase => {
                    let reason = status.error.unwrap_or_else(|| phase.to_string());
                    anyhow::bail!("capture ended in {phase}: {reason}");
                }
            }
        }
        Command::Commands { device_id } => {
            for command in service.list_commands(&device_id).await? {
                let freq = command
                    .frequency
                    .map(|f| format!(" @ {f} MHz"))
                    .unwrap_or_default();
                println!("{:<24} {}{}", command.name, command.signal_kind.as_str(), freq);
            }
        }
        Command::Forget { device_id, command } => {
            service.delete_command(&device_id, &command).await?;
            println!("forgot {device_id}/{command}");
        }
        Command::Generate => {
            let report = service
                .regenerate_entities()
                .await
                .context("entity generation failed")?;
            println!(
                "wrote {} ({} entities, {} helpers)",
                report.output_file.display(),
                report.entity_count,
                report.helper_count
            );
            for device_id in report.no_capability_devices {
                eprintln!("warning: {device_id} has no mappable commands");
            }
        }
    }

    Ok(())
}
