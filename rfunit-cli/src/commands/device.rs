//! Device control commands: detection, mode switches, tones and raw registers.

use anyhow::Result;
use console::style;
use rfunit::Sound;

use super::{connect, open_unit};
use crate::Cli;
use crate::config::Config;

fn done(cli: &Cli, message: &str) {
    if !cli.quiet {
        eprintln!("{} {message}", style("✓").green());
    }
}

/// Detect command implementation.
pub(crate) fn cmd_detect(cli: &Cli, config: &Config) -> Result<()> {
    let mut unit = open_unit(cli, config)?;
    unit.detect()?;
    done(
        cli,
        &format!("RF unit found at {:#04x}", unit.config().address),
    );
    Ok(())
}

/// Enter-bootloader command implementation.
pub(crate) fn cmd_enter_bootloader(cli: &Cli, config: &Config) -> Result<()> {
    let mut unit = connect(cli, config)?;
    if unit.is_bootloader()? {
        done(cli, "Already in LDROM");
        return Ok(());
    }
    unit.enter_bootloader()?;
    done(cli, "Device is in LDROM");
    Ok(())
}

/// Leave-bootloader command implementation.
pub(crate) fn cmd_leave_bootloader(cli: &Cli, config: &Config) -> Result<()> {
    let mut unit = connect(cli, config)?;
    if !unit.is_bootloader()? {
        done(cli, "Already in APROM");
        return Ok(());
    }
    unit.leave_bootloader()?;
    done(cli, "Device is back in APROM");
    Ok(())
}

/// Reset command implementation.
pub(crate) fn cmd_reset(cli: &Cli, config: &Config) -> Result<()> {
    let mut unit = connect(cli, config)?;
    unit.reset()?;
    done(cli, "Reset sent");
    Ok(())
}

/// Boot-repair command implementation.
pub(crate) fn cmd_boot_repair(cli: &Cli, config: &Config) -> Result<()> {
    let mut unit = connect(cli, config)?;
    unit.boot_repair()?;
    done(cli, "Boot repair complete");
    Ok(())
}

/// Play command implementation.
pub(crate) fn cmd_play(cli: &Cli, config: &Config, sound: Sound) -> Result<()> {
    let mut unit = connect(cli, config)?;
    unit.play_sound(sound)?;
    done(cli, &format!("Playing {sound}"));
    Ok(())
}

/// Format register bytes the way `reg-write` accepts them.
fn hex_bytes(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Reg-read command implementation. Prints the raw bytes to stdout.
pub(crate) fn cmd_reg_read(cli: &Cli, config: &Config, register: u8) -> Result<()> {
    let mut unit = connect(cli, config)?;
    let value = unit.read_register(register)?;
    println!("{}", hex_bytes(&value));
    Ok(())
}

/// Reg-write command implementation.
pub(crate) fn cmd_reg_write(cli: &Cli, config: &Config, register: u8, data: &[u8]) -> Result<()> {
    let mut unit = connect(cli, config)?;
    unit.write_register(register, data)?;
    done(
        cli,
        &format!("Wrote {} to register {register:#04x}", hex_bytes(data)),
    );
    Ok(())
}
