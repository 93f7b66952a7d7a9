//! Tuyalink CLI
//!
//! Command-line interface for inspecting and controlling devices linked to
//! a Tuya cloud project.
//!
//! # Usage
//!
//! ```bash
//! # Every device with its live status
//! tuyalink devices
//!
//! # Raw status of one device, as JSON
//! tuyalink status bf0123456789 --format json
//!
//! # Switch a plug on and dim a bulb
//! tuyalink send bf0123456789 switch_1=true bright_value=300
//! ```
//!
//! Credentials are read from `tuyalink.toml` in the platform config
//! directory, or from `TUYA_CLIENT_ID` / `TUYA_CLIENT_SECRET`.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};
use tuyalink_core::{
    Command, DeviceStatus, MergedDevice, MergedDeviceList, StatusValue, TuyaClient,
};

mod config;

#[derive(Parser)]
#[command(name = "tuyalink")]
#[command(about = "Inspect and control devices on the Tuya cloud")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to tuyalink.toml in the config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every device merged with its live status
    Devices {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Show the live status of one device
    Status {
        /// Device id
        device_id: String,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Show the details of one device
    Device {
        /// Device id
        device_id: String,
    },

    /// Send commands to a device
    Send {
        /// Device id
        device_id: String,

        /// Commands as code=value (e.g. switch_1=true bright_value=300)
        #[arg(required = true, value_parser = parse_command)]
        commands: Vec<Command>,
    },

    /// Show project statistics
    Stats,

    /// List devices bound to the linked app account
    UserDevices {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = config::load_config(cli.config.as_deref())?;
    init_logging(cli.verbose, &config.log_level);
    info!("Loaded configuration from {:?}", config.config_path);

    let client = TuyaClient::new(config.to_client_config()?)
        .context("Failed to create cloud client")?;

    match cli.command {
        Commands::Devices { format } => list_devices(&client, format).await,
        Commands::Status { device_id, format } => show_status(&client, &device_id, format).await,
        Commands::Device { device_id } => show_device(&client, &device_id).await,
        Commands::Send { device_id, commands } => {
            send_commands(&client, &device_id, &commands).await
        }
        Commands::Stats => show_statistics(&client).await,
        Commands::UserDevices { format } => list_user_devices(&client, format).await,
    }
}

/// Logs go to stderr so JSON output on stdout stays clean.
fn init_logging(verbose: bool, default_level: &str) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Parse `code=value`; the value goes through [`StatusValue::parse_literal`].
fn parse_command(raw: &str) -> Result<Command, String> {
    let (code, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected code=value, got {:?}", raw))?;
    let code = code.trim();
    if code.is_empty() {
        return Err(format!("missing command code in {:?}", raw));
    }
    Ok(Command::new(code, StatusValue::parse_literal(value.trim())))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn format_value(value: &StatusValue) -> String {
    match value {
        StatusValue::Text(s) => s.clone(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

fn print_status(status: &[DeviceStatus], indent: &str) {
    for point in status {
        println!("{}{} = {}", indent, point.code, format_value(&point.value));
    }
}

fn print_merged(device: &MergedDevice) {
    println!(
        "{}  {}  {} ({})",
        device.id,
        if device.online { "online " } else { "offline" },
        device.name.as_deref().unwrap_or("-"),
        device.product_name.as_deref().unwrap_or("-"),
    );
    print_status(&device.status, "    ");
}

/// An empty project comes back unsuccessful but without an error code or message.
fn is_empty_listing(merged: &MergedDeviceList) -> bool {
    merged.result.is_empty() && merged.code.is_none() && merged.msg.is_none()
}

async fn list_devices(client: &TuyaClient, format: OutputFormat) -> Result<()> {
    let merged = client.list_merged_devices().await;

    if format == OutputFormat::Json {
        return print_json(&merged);
    }

    if is_empty_listing(&merged) {
        println!("No devices found");
        return Ok(());
    }

    if !merged.success {
        bail!(
            "Device listing failed: {} (code {})",
            merged.msg.as_deref().unwrap_or("unknown error"),
            merged.code.map_or_else(|| "-".to_string(), |c| c.to_string())
        );
    }

    for device in &merged.result {
        print_merged(device);
    }
    let online = merged.result.iter().filter(|d| d.online).count();
    println!("{} devices, {} online", merged.result.len(), online);
    Ok(())
}

async fn show_status(client: &TuyaClient, device_id: &str, format: OutputFormat) -> Result<()> {
    let envelope = client
        .get_device_status(device_id)
        .await
        .with_context(|| format!("Failed to fetch status of {}", device_id))?;

    if format == OutputFormat::Json {
        return print_json(&envelope);
    }

    if !envelope.success {
        bail!("Status request failed: {}", envelope.failure_message());
    }
    print_status(envelope.result.as_deref().unwrap_or_default(), "");
    Ok(())
}

async fn show_device(client: &TuyaClient, device_id: &str) -> Result<()> {
    let envelope = client
        .get_device(device_id)
        .await
        .with_context(|| format!("Failed to fetch device {}", device_id))?;
    print_json(&envelope)
}

async fn send_commands(client: &TuyaClient, device_id: &str, commands: &[Command]) -> Result<()> {
    let envelope = client
        .send_commands(device_id, commands)
        .await
        .with_context(|| format!("Failed to send commands to {}", device_id))?;

    if !envelope.success {
        bail!("Command rejected: {}", envelope.failure_message());
    }
    println!(
        "Sent {} command(s) to {}: {}",
        commands.len(),
        device_id,
        if envelope.result.unwrap_or(false) { "accepted" } else { "not accepted" }
    );
    Ok(())
}

async fn show_statistics(client: &TuyaClient) -> Result<()> {
    let stats = client
        .get_statistics()
        .await
        .context("Failed to fetch statistics")?;
    print_json(&stats)
}

async fn list_user_devices(client: &TuyaClient, format: OutputFormat) -> Result<()> {
    let devices = client
        .list_user_devices()
        .await
        .context("Failed to list user devices")?;

    if format == OutputFormat::Json {
        return print_json(&devices);
    }

    for device in &devices {
        println!(
            "{}  {} ({})",
            device.id,
            device.name.as_deref().unwrap_or("-"),
            device.product_name.as_deref().unwrap_or("-"),
        );
    }
    println!("{} devices", devices.len());
    Ok(())
}
