//! rfunit CLI - Command-line tool for dumping and reflashing the RF unit.
//!
//! ## Features
//!
//! - Detect the RF unit and show its firmware versions
//! - Dump the whole flash to a file
//! - Reflash a full image through the bootloader
//! - Raw register access and device control commands
//! - Shell completion generation
//! - Environment variable and config file support

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use console::style;
use env_logger::Env;
use log::debug;
use rfunit::{Sound, TransportKind};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;

mod commands;
mod config;

use config::Config;

/// Whether stderr is a terminal (set once at startup).
static STDERR_IS_TTY: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(true);

/// Check if animations should be used (TTY and colors enabled).
pub(crate) fn use_fancy_output() -> bool {
    STDERR_IS_TTY.load(std::sync::atomic::Ordering::Relaxed) && console::colors_enabled_stderr()
}

/// CLI-only failures, each with its own exit code.
#[derive(Debug, Error)]
pub(crate) enum CliError {
    /// Refusing to overwrite an existing dump.
    #[error("Dump '{0}' already exists, not doing anything (use --force to overwrite)")]
    DumpExists(PathBuf),

    /// Invalid invocation that clap cannot catch.
    #[error("{0}")]
    Usage(String),
}

impl CliError {
    fn code(&self) -> u8 {
        match self {
            Self::DumpExists(_) => 3,
            Self::Usage(_) => 2,
        }
    }
}

/// Map an error chain to the process exit code.
///
/// Library errors keep their own result code so scripts can tell a missing
/// device from a failed erase.
fn exit_code(err: &anyhow::Error) -> u8 {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<rfunit::Error>() {
            return e.code();
        }
        if let Some(e) = cause.downcast_ref::<CliError>() {
            return e.code();
        }
    }
    1
}

/// rfunit - Dump and reflash the Xbox One RF unit over I2C.
///
/// Environment variables:
///   RFUNIT_BUS        - I2C device (default: /dev/i2c-1)
///   RFUNIT_TRANSPORT  - Transport backend (linux, dummy)
///   RFUNIT_ADDRESS    - Device address (default: 0x5A)
#[derive(Parser)]
#[command(name = "rfunit")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub(crate) struct Cli {
    /// I2C character device to use.
    #[arg(short, long, global = true, env = "RFUNIT_BUS")]
    bus: Option<String>,

    /// Transport backend.
    #[arg(short, long, global = true, env = "RFUNIT_TRANSPORT")]
    transport: Option<TransportArg>,

    /// 7-bit device address (hex).
    #[arg(short, long, global = true, env = "RFUNIT_ADDRESS", value_parser = parse_hex_u8)]
    address: Option<u8>,

    /// Verbose output level (-v, -vv, -vvv for increasing detail).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress non-essential output).
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to a configuration file.
    #[arg(long = "config", global = true, value_name = "PATH")]
    config_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Supported transport backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum TransportArg {
    /// Linux i2c-dev (default).
    Linux,
    /// Log every command, answer with zeros.
    Dummy,
}

impl From<TransportArg> for TransportKind {
    fn from(arg: TransportArg) -> Self {
        match arg {
            TransportArg::Linux => TransportKind::Linux,
            TransportArg::Dummy => TransportKind::Dummy,
        }
    }
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Check that the RF unit answers on the bus.
    Detect,

    /// Show status, mode and firmware versions.
    Info {
        /// Output information as JSON to stdout.
        #[arg(long)]
        json: bool,
    },

    /// Dump the whole flash to a file.
    Dump {
        /// Output file (default: dump.bin).
        file: Option<PathBuf>,

        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },

    /// Reflash the whole device from an image file.
    Flash {
        /// Image file, exactly 0x24400 bytes (default: flash.bin).
        file: Option<PathBuf>,

        /// Stay in the bootloader after writing.
        #[arg(long)]
        stay: bool,
    },

    /// Flash flash.bin if present, otherwise dump to dump.bin.
    Auto,

    /// Switch the device into the bootloader (LDROM).
    EnterBootloader,

    /// Return the device to its application firmware (APROM).
    LeaveBootloader,

    /// Reset the device.
    Reset,

    /// Run the boot repair command.
    BootRepair,

    /// Play a built-in tone.
    Play {
        /// Tone name (power-on, bing, power-off, disc-drive-1..3, plopp, no-disc,
        /// plopp-louder) or number.
        #[arg(value_parser = parse_sound)]
        sound: Sound,
    },

    /// Read a raw register.
    RegRead {
        /// Register index (hex).
        #[arg(value_parser = parse_hex_u8)]
        register: u8,
    },

    /// Write raw bytes to a register.
    RegWrite {
        /// Register index (hex).
        #[arg(value_parser = parse_hex_u8)]
        register: u8,

        /// Bytes to write (hex).
        #[arg(required = true, value_parser = parse_hex_u8)]
        data: Vec<u8>,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Shell type for completions (auto-detected if not specified with --install).
        #[arg(value_enum)]
        shell: Option<Shell>,

        /// Automatically install completions to your shell configuration.
        #[arg(long)]
        install: bool,
    },
}

/// Parse a hexadecimal byte (supports 0x prefix).
fn parse_hex_u8(s: &str) -> Result<u8, String> {
    let s = s.trim();
    let s = s.trim_start_matches("0x").trim_start_matches("0X");
    u8::from_str_radix(s, 16).map_err(|e| format!("Invalid hex byte: {e}"))
}

/// Parse a tone by name or number.
fn parse_sound(s: &str) -> Result<Sound, String> {
    if let Some(sound) = Sound::from_name(s) {
        return Ok(sound);
    }
    s.parse::<u8>()
        .ok()
        .and_then(|n| Sound::ALL.get(usize::from(n)).copied())
        .ok_or_else(|| format!("Unknown sound: '{s}'"))
}

fn main() -> ExitCode {
    // --- NO_COLOR and TTY detection (clig.dev best practice) ---
    let stderr_is_tty = console::Term::stderr().is_term();
    STDERR_IS_TTY.store(stderr_is_tty, std::sync::atomic::Ordering::Relaxed);

    if env::var("NO_COLOR").is_ok() || !stderr_is_tty {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_target(cli.verbose >= 2)
        .format_timestamp(if cli.verbose >= 2 {
            Some(env_logger::TimestampPrecision::Millis)
        } else {
            None
        })
        .init();

    debug!(
        "rfunit v{} (verbose level: {})",
        env!("CARGO_PKG_VERSION"),
        cli.verbose
    );

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err:#}", style("Error:").red().bold());
            ExitCode::from(exit_code(&err))
        },
    }
}

fn run(cli: &Cli) -> Result<()> {
    // Load configuration
    let config = if let Some(ref path) = cli.config_path {
        Config::load_from_path(path)
    } else {
        Config::load()
    };

    match &cli.command {
        Commands::Detect => commands::device::cmd_detect(cli, &config),
        Commands::Info { json } => commands::info::cmd_info(cli, &config, *json),
        Commands::Dump { file, force } => {
            let path = file.clone().unwrap_or_else(|| config.dump_path());
            commands::dump::cmd_dump(cli, &config, &path, *force)
        },
        Commands::Flash { file, stay } => {
            let path = file.clone().unwrap_or_else(|| config.flash_path());
            commands::flash::cmd_flash(cli, &config, &path, *stay)
        },
        Commands::Auto => commands::flash::cmd_auto(cli, &config),
        Commands::EnterBootloader => commands::device::cmd_enter_bootloader(cli, &config),
        Commands::LeaveBootloader => commands::device::cmd_leave_bootloader(cli, &config),
        Commands::Reset => commands::device::cmd_reset(cli, &config),
        Commands::BootRepair => commands::device::cmd_boot_repair(cli, &config),
        Commands::Play { sound } => commands::device::cmd_play(cli, &config, *sound),
        Commands::RegRead { register } => commands::device::cmd_reg_read(cli, &config, *register),
        Commands::RegWrite { register, data } => {
            commands::device::cmd_reg_write(cli, &config, *register, data)
        },
        Commands::Completions { shell, install } => {
            if *install {
                commands::completions::cmd_completions_install(*shell)
            } else {
                let shell = shell.ok_or_else(|| {
                    CliError::Usage(
                        "specify a shell type, e.g.: rfunit completions bash \
                         (or use --install to auto-install completions)"
                            .to_string(),
                    )
                })?;
                commands::completions::cmd_completions(shell);
                Ok(())
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_command_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_parse_dump() {
        let cli = Cli::try_parse_from(["rfunit", "dump"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Dump {
                file: None,
                force: false
            }
        ));

        let cli = Cli::try_parse_from(["rfunit", "dump", "out.bin", "--force"]).unwrap();
        match cli.command {
            Commands::Dump { file, force } => {
                assert_eq!(file, Some(PathBuf::from("out.bin")));
                assert!(force);
            },
            _ => panic!("expected dump"),
        }
    }

    #[test]
    fn test_cli_parse_flash() {
        let cli = Cli::try_parse_from(["rfunit", "flash", "image.bin", "--stay"]).unwrap();
        match cli.command {
            Commands::Flash { file, stay } => {
                assert_eq!(file, Some(PathBuf::from("image.bin")));
                assert!(stay);
            },
            _ => panic!("expected flash"),
        }
    }

    #[test]
    fn test_cli_parse_info_json() {
        let cli = Cli::try_parse_from(["rfunit", "info", "--json"]).unwrap();
        assert!(matches!(cli.command, Commands::Info { json: true }));
    }

    #[test]
    fn test_cli_parse_play() {
        let cli = Cli::try_parse_from(["rfunit", "play", "no-disc"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Play {
                sound: Sound::NoDisc
            }
        ));

        let cli = Cli::try_parse_from(["rfunit", "play", "1"]).unwrap();
        assert!(matches!(cli.command, Commands::Play { sound: Sound::Bing }));

        assert!(Cli::try_parse_from(["rfunit", "play", "9"]).is_err());
        assert!(Cli::try_parse_from(["rfunit", "play", "beep"]).is_err());
    }

    #[test]
    fn test_cli_parse_registers() {
        let cli = Cli::try_parse_from(["rfunit", "reg-read", "0x0c"]).unwrap();
        assert!(matches!(cli.command, Commands::RegRead { register: 0x0C }));

        let cli = Cli::try_parse_from(["rfunit", "reg-write", "04", "ff", "0xFF"]).unwrap();
        match cli.command {
            Commands::RegWrite { register, data } => {
                assert_eq!(register, 0x04);
                assert_eq!(data, vec![0xFF, 0xFF]);
            },
            _ => panic!("expected reg-write"),
        }

        assert!(Cli::try_parse_from(["rfunit", "reg-write", "04"]).is_err());
    }

    #[test]
    fn test_cli_global_options() {
        let cli = Cli::try_parse_from([
            "rfunit",
            "--bus",
            "/dev/i2c-3",
            "--transport",
            "dummy",
            "--address",
            "5b",
            "-vv",
            "detect",
        ])
        .unwrap();
        assert_eq!(cli.bus.as_deref(), Some("/dev/i2c-3"));
        assert_eq!(cli.transport, Some(TransportArg::Dummy));
        assert_eq!(cli.address, Some(0x5B));
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Detect));
    }

    #[test]
    fn test_cli_global_options_after_subcommand() {
        let cli = Cli::try_parse_from(["rfunit", "detect", "-t", "dummy", "-q"]).unwrap();
        assert_eq!(cli.transport, Some(TransportArg::Dummy));
        assert!(cli.quiet);
    }

    #[test]
    fn test_cli_missing_subcommand() {
        assert!(Cli::try_parse_from(["rfunit"]).is_err());
    }

    #[test]
    fn test_cli_invalid_transport() {
        assert!(Cli::try_parse_from(["rfunit", "--transport", "serial", "detect"]).is_err());
    }

    #[test]
    fn test_parse_hex_u8() {
        assert_eq!(parse_hex_u8("0x5A"), Ok(0x5A));
        assert_eq!(parse_hex_u8("5a"), Ok(0x5A));
        assert_eq!(parse_hex_u8(" 0X0c "), Ok(0x0C));
        assert!(parse_hex_u8("0x100").is_err());
        assert!(parse_hex_u8("zz").is_err());
    }

    #[test]
    fn test_transport_arg_conversion() {
        assert_eq!(TransportKind::from(TransportArg::Linux), TransportKind::Linux);
        assert_eq!(TransportKind::from(TransportArg::Dummy), TransportKind::Dummy);
    }

    #[test]
    fn test_exit_code_mapping() {
        let err: anyhow::Error = rfunit::Error::DeviceNotDetected { address: 0x5A }.into();
        assert_eq!(exit_code(&err), 1);

        let err: anyhow::Error = rfunit::Error::SizeMismatch {
            expected: 0x24400,
            actual: 100,
        }
        .into();
        assert_eq!(exit_code(&err.context("checking flash.bin")), 2);

        let err: anyhow::Error = CliError::DumpExists(PathBuf::from("dump.bin")).into();
        assert_eq!(exit_code(&err), 3);

        let err: anyhow::Error = rfunit::Error::Erase(rfunit::WaitError::Timeout { retries: 50 }).into();
        assert_eq!(exit_code(&err), 5);

        assert_eq!(exit_code(&anyhow::anyhow!("something else")), 1);
    }
}
