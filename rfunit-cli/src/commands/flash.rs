//! Flash and auto command implementations.

use anyhow::{Context, Result};
use console::style;
use indicatif::ProgressBar;
use rfunit::FLASH_SIZE;
use std::fs;
use std::path::Path;

use super::dump::dump_to_file;
use super::{Unit, connect, file_size, print_versions, progress_bar};
use crate::config::Config;
use crate::{Cli, CliError};

/// Read a full flash image, rejecting any other size.
pub(crate) fn load_image(path: &Path) -> Result<Vec<u8>> {
    let image = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    if image.len() != FLASH_SIZE as usize {
        return Err(anyhow::Error::new(rfunit::Error::SizeMismatch {
            expected: FLASH_SIZE as usize,
            actual: image.len(),
        })
        .context(format!("{} is not a full flash image", path.display())));
    }
    Ok(image)
}

/// Reflash the device, drawing the bar once writing starts.
fn flash_with_progress(cli: &Cli, unit: &mut Unit, image: &[u8]) -> Result<()> {
    let mut pb: Option<ProgressBar> = None;
    unit.flash_image(image, |done, total| {
        pb.get_or_insert_with(|| progress_bar(cli, total as u64, "Writing"))
            .set_position(done as u64);
    })?;
    if let Some(pb) = pb {
        pb.finish_with_message("Complete");
    }
    if !cli.quiet {
        eprintln!("{} Flashed {:#x} bytes", style("✓").green(), image.len());
    }
    Ok(())
}

/// Flash command implementation.
pub(crate) fn cmd_flash(cli: &Cli, config: &Config, path: &Path, stay: bool) -> Result<()> {
    let image = load_image(path)?;

    let mut unit = connect(cli, config)?;
    print_versions(cli, &mut unit)?;
    flash_with_progress(cli, &mut unit, &image)?;

    if stay {
        if !cli.quiet {
            eprintln!("{} Staying in LDROM", style("!").yellow());
        }
        return Ok(());
    }
    unit.finish()?;
    Ok(())
}

/// Auto command implementation.
///
/// Flashes the configured image when it exists and is non-empty. Otherwise
/// dumps to the configured dump file, refusing to overwrite a non-empty one.
/// Either way the device is returned to APROM and chimes.
pub(crate) fn cmd_auto(cli: &Cli, config: &Config) -> Result<()> {
    let flash_path = config.flash_path();
    let dump_path = config.dump_path();

    let mut unit = connect(cli, config)?;
    print_versions(cli, &mut unit)?;

    if file_size(&flash_path) > 0 {
        let image = load_image(&flash_path)?;
        flash_with_progress(cli, &mut unit, &image)?;
    } else if file_size(&dump_path) > 0 {
        return Err(CliError::DumpExists(dump_path).into());
    } else {
        let written = dump_to_file(cli, &mut unit, &dump_path)?;
        if !cli.quiet {
            eprintln!(
                "{} Dumped {written} bytes to {}",
                style("✓").green(),
                style(dump_path.display()).yellow()
            );
        }
    }

    unit.finish()?;
    Ok(())
}
