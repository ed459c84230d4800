//! Command implementations.
//!
//! Each subcommand is implemented in its own module; the helpers here open
//! the bus and build progress indicators shared between them.

pub(crate) mod completions;
pub(crate) mod device;
pub(crate) mod dump;
pub(crate) mod flash;
pub(crate) mod info;

use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use log::debug;
use rfunit::{
    DEVICE_ADDRESS, HeartbeatDelay, I2cConfig, RfUnit, RfUnitConfig, Transport, TransportKind,
    open_transport,
};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::config::Config;
use crate::{Cli, CliError, use_fancy_output};

/// Default I2C character device.
const DEFAULT_BUS: &str = "/dev/i2c-1";

/// Heartbeat callback driving the bootloader wait spinner.
pub(crate) type Heartbeat = Box<dyn FnMut(Duration, Duration)>;

/// Controller as used by the CLI.
pub(crate) type Unit = RfUnit<Box<dyn Transport>, HeartbeatDelay<Heartbeat>>;

/// Resolve the transport backend: flag, then config file, then Linux.
fn transport_kind(cli: &Cli, config: &Config) -> Result<TransportKind> {
    if let Some(arg) = cli.transport {
        return Ok(arg.into());
    }
    match config.bus.transport.as_deref() {
        Some(name) => TransportKind::from_name(name).ok_or_else(|| {
            CliError::Usage(format!("Unknown transport '{name}' in config file")).into()
        }),
        None => Ok(TransportKind::default()),
    }
}

/// Spinner shown while the device switches into LDROM.
fn bootloader_heartbeat(show: bool) -> Heartbeat {
    let mut spinner: Option<ProgressBar> = None;
    Box::new(move |elapsed: Duration, total: Duration| {
        let message = format!(
            "Waiting for bootloader {}/{}s",
            elapsed.as_secs(),
            total.as_secs()
        );
        if !show {
            debug!("{message}");
            return;
        }
        let pb = spinner.get_or_insert_with(|| {
            let pb = ProgressBar::new_spinner();
            pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
            pb
        });
        pb.set_message(message);
        pb.tick();
        if elapsed >= total {
            if let Some(pb) = spinner.take() {
                pb.finish_and_clear();
            }
        }
    })
}

/// Open the bus and build a controller without touching the device.
pub(crate) fn open_unit(cli: &Cli, config: &Config) -> Result<Unit> {
    let kind = transport_kind(cli, config)?;
    let device = cli
        .bus
        .clone()
        .or_else(|| config.bus.device.clone())
        .unwrap_or_else(|| DEFAULT_BUS.to_string());
    let address = cli.address.or(config.bus.address).unwrap_or(DEVICE_ADDRESS);

    debug!("Opening {kind} transport on {device} at {address:#04x}");
    let transport = open_transport(kind, &I2cConfig::new(device.as_str()).with_address(address))
        .with_context(|| format!("Failed to open {device}"))?;

    let unit_config = config.apply_timing(RfUnitConfig::new().with_address(address));
    let delay = HeartbeatDelay::new(bootloader_heartbeat(!cli.quiet && use_fancy_output()));
    Ok(RfUnit::with_delay(transport, delay, unit_config))
}

/// Open the bus, detect the device and bring it to a known state.
pub(crate) fn connect(cli: &Cli, config: &Config) -> Result<Unit> {
    let mut unit = open_unit(cli, config)?;
    unit.detect()?;
    unit.initialize()?;
    unit.stop()?;
    if !cli.quiet {
        eprintln!(
            "{} RF unit detected at {:#04x}",
            style("✓").green(),
            unit.config().address
        );
    }
    Ok(unit)
}

/// Print firmware versions when the device runs its application firmware.
pub(crate) fn print_versions(cli: &Cli, unit: &mut Unit) -> Result<()> {
    if unit.is_bootloader()? {
        if !cli.quiet {
            eprintln!("{} Device is in LDROM", style("!").yellow());
        }
        return Ok(());
    }
    let firmware = unit.read_fw_version()?;
    let application = unit.read_app_version()?;
    if !cli.quiet {
        eprintln!("  Firmware:    {}", style(firmware).cyan());
        eprintln!("  Application: {}", style(application).cyan());
    }
    Ok(())
}

/// Size of `path` in bytes, zero when it does not exist.
pub(crate) fn file_size(path: &Path) -> u64 {
    fs::metadata(path).map_or(0, |m| m.len())
}

/// Byte progress bar on stderr, hidden in quiet or plain mode.
pub(crate) fn progress_bar(cli: &Cli, total: u64, message: &str) -> ProgressBar {
    if cli.quiet || !use_fancy_output() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total);
    #[allow(clippy::unwrap_used)] // Static template string
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}",
            )
            .unwrap()
            .progress_chars("#>-"),
    );
    pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
    pb.set_message(message.to_string());
    pb
}
