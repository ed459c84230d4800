//! Shell completion generation and installation.

use anyhow::{Context, Result};
use clap::CommandFactory;
use clap_complete::{Shell, generate};
use console::style;
use std::env;
use std::fs;
use std::io;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use crate::Cli;

/// Binary name used in completion scripts and file names.
const BIN: &str = "rfunit";

/// Render the completion script for `shell`.
fn render(shell: Shell, out: &mut dyn io::Write) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, BIN, out);
}

/// Generate shell completions to stdout.
pub(crate) fn cmd_completions(shell: Shell) {
    render(shell, &mut io::stdout());
}

/// Detect the user's current shell from environment.
fn detect_shell_type() -> Option<Shell> {
    env::var("SHELL")
        .ok()
        .and_then(|path| shell_from_path(&path))
}

/// Parse a shell binary path into its `Shell` enum.
fn shell_from_path(shell_path: &str) -> Option<Shell> {
    let shell_name = Path::new(shell_path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");
    match shell_name {
        "bash" => Some(Shell::Bash),
        "zsh" => Some(Shell::Zsh),
        "fish" => Some(Shell::Fish),
        "elvish" => Some(Shell::Elvish),
        "pwsh" | "powershell" => Some(Shell::PowerShell),
        _ => None,
    }
}

/// Get the completion script installation path for a given shell.
fn get_completion_install_path(shell: Shell) -> Result<PathBuf> {
    let home = home_dir()?;
    let data = env::var("XDG_DATA_HOME")
        .map_or_else(|_| home.join(".local").join("share"), PathBuf::from);
    let config = env::var("XDG_CONFIG_HOME").map_or_else(|_| home.join(".config"), PathBuf::from);

    Ok(match shell {
        Shell::Bash => data.join("bash-completion").join("completions").join(BIN),
        Shell::Zsh => home.join(".zfunc").join(format!("_{BIN}")),
        Shell::Fish => config
            .join("fish")
            .join("completions")
            .join(format!("{BIN}.fish")),
        Shell::PowerShell => config
            .join("powershell")
            .join("completions")
            .join(format!("{BIN}.ps1")),
        Shell::Elvish => config.join("elvish").join("lib").join(format!("{BIN}.elv")),
        _ => anyhow::bail!("Unsupported shell for auto-install"),
    })
}

/// Get home directory.
fn home_dir() -> Result<PathBuf> {
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(PathBuf::from)
        .context("Could not determine home directory")
}

/// Install shell completions automatically.
pub(crate) fn cmd_completions_install(shell_arg: Option<Shell>) -> Result<()> {
    let shell = match shell_arg {
        Some(s) => s,
        None => detect_shell_type().context(
            "Could not detect your shell. Please specify it explicitly:\n  \
             rfunit completions --install bash",
        )?,
    };

    let path = get_completion_install_path(shell)?;

    let mut buf = Vec::new();
    render(shell, &mut buf);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    fs::write(&path, &buf)
        .with_context(|| format!("Failed to write completion file: {}", path.display()))?;

    eprintln!(
        "{} Installed {} completions to {}",
        style("✓").green().bold(),
        style(format!("{shell:?}")).cyan(),
        style(path.display()).yellow()
    );

    if shell == Shell::Zsh {
        let zshrc = home_dir()?.join(".zshrc");
        let fpath_line = "fpath=(~/.zfunc $fpath)";
        let needs_fpath =
            fs::read_to_string(&zshrc).map_or(true, |content| !content.contains(fpath_line));

        if needs_fpath {
            let mut file = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&zshrc)
                .with_context(|| format!("Failed to update {}", zshrc.display()))?;
            writeln!(file, "\n# {BIN} completions")?;
            writeln!(file, "{fpath_line}")?;
            writeln!(file, "autoload -Uz compinit && compinit")?;
            eprintln!(
                "{} Added fpath to {}",
                style("✓").green().bold(),
                style(zshrc.display()).yellow()
            );
        }
        eprintln!("Restart your shell or run: {}", style("exec zsh").cyan());
    } else {
        eprintln!("Completions will be loaded on new {shell:?} sessions.");
    }

    Ok(())
}
