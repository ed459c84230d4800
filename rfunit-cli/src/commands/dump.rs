//! Flash dump command implementation.

use anyhow::{Context, Result};
use console::style;
use log::debug;
use rfunit::FLASH_SIZE;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use super::{Unit, connect, file_size, print_versions, progress_bar};
use crate::config::Config;
use crate::{Cli, CliError};

/// Stream the whole flash into `path`, removing the file if the dump fails.
pub(crate) fn dump_to_file(cli: &Cli, unit: &mut Unit, path: &Path) -> Result<usize> {
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    let pb = progress_bar(cli, u64::from(FLASH_SIZE), "Dumping");
    let result = unit.dump_to(&mut writer, |done, _| pb.set_position(done as u64));
    drop(writer);

    match result {
        Ok(written) => {
            pb.finish_with_message("Complete");
            Ok(written)
        },
        Err(err) => {
            pb.abandon();
            if let Err(e) = fs::remove_file(path) {
                debug!("Could not remove partial dump {}: {e}", path.display());
            }
            Err(anyhow::Error::new(err).context(format!("Dump to {} failed", path.display())))
        },
    }
}

/// Dump command implementation.
pub(crate) fn cmd_dump(cli: &Cli, config: &Config, path: &Path, force: bool) -> Result<()> {
    if !force && file_size(path) > 0 {
        return Err(CliError::DumpExists(path.to_path_buf()).into());
    }

    let mut unit = connect(cli, config)?;
    print_versions(cli, &mut unit)?;
    let written = dump_to_file(cli, &mut unit, path)?;

    if !cli.quiet {
        eprintln!(
            "{} Dumped {written} bytes to {}",
            style("✓").green(),
            style(path.display()).yellow()
        );
    }
    Ok(())
}
