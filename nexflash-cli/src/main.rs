//! nexflash CLI - Command-line tool for uploading firmware to Nextion HMI
//! displays.
//!
//! ## Features
//!
//! - Upload `.tft` firmware images over a serial port
//! - Interactive serial port selection
//! - Shell completion generation
//! - Environment variable support

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use console::style;
use env_logger::Env;
use log::debug;
use std::io;
use std::path::PathBuf;

/// Whether stderr is a terminal (set once at startup).
static STDERR_IS_TTY: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(true);

/// Check if animations should be used (TTY and colors enabled).
fn use_fancy_output() -> bool {
    STDERR_IS_TTY.load(std::sync::atomic::Ordering::Relaxed) && console::colors_enabled_stderr()
}

mod commands;
mod config;
mod serial;

use config::Config;
use serial::{SerialOptions, ask_remember_port, select_serial_port};

/// nexflash - A cross-platform tool for uploading firmware to Nextion HMI
/// displays.
///
/// Environment variables:
///   NEXFLASH_PORT              - Default serial port
///   NEXFLASH_BAUD              - Baud rate for the data phase (default: 921600)
///   NEXFLASH_CONNECT_BAUD      - Baud rate for the handshake (default: 115200)
///   NEXFLASH_NON_INTERACTIVE   - Non-interactive mode (disable prompts)
#[derive(Parser)]
#[command(name = "nexflash")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[allow(clippy::struct_excessive_bools)]
struct Cli {
    /// Serial port to use (auto-detected if not specified).
    #[arg(short, long, global = true, env = "NEXFLASH_PORT")]
    port: Option<String>,

    /// Baud rate for the data transfer phase [default: 921600].
    #[arg(short, long, global = true, env = "NEXFLASH_BAUD")]
    baud: Option<u32>,

    /// Baud rate the display currently listens at [default: 115200].
    #[arg(long, global = true, env = "NEXFLASH_CONNECT_BAUD")]
    connect_baud: Option<u32>,

    /// Verbose output level (-v, -vv, -vvv for increasing detail).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress non-essential output).
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Non-interactive mode (fail instead of prompting).
    #[arg(long, global = true, env = "NEXFLASH_NON_INTERACTIVE")]
    non_interactive: bool,

    /// Confirm port selection even for auto-detected ports.
    #[arg(long, global = true)]
    confirm_port: bool,

    /// List all available ports (including unknown types).
    #[arg(long, global = true)]
    list_all_ports: bool,

    /// Path to a configuration file.
    #[arg(long = "config", global = true, value_name = "PATH")]
    config_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Upload a .tft firmware image to the display.
    Upload {
        /// Path to the firmware image.
        firmware: PathBuf,
    },

    /// List available serial ports.
    ListPorts {
        /// Output port list as JSON to stdout.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Shell type for completions.
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// CLI error classes that map to distinct process exit codes.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    /// Usage/setup problem; exits with code 2.
    #[error("{0}")]
    Usage(String),
    /// User cancelled a prompt; exits with code 130.
    #[error("{0}")]
    Cancelled(String),
}

fn main() {
    let cli = Cli::parse();

    // --- NO_COLOR and TTY detection ---
    let stderr_is_tty = console::Term::stderr().is_term();
    STDERR_IS_TTY.store(stderr_is_tty, std::sync::atomic::Ordering::Relaxed);

    if std::env::var("NO_COLOR").is_ok() || !stderr_is_tty {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

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
        "nexflash v{} (verbose level: {})",
        env!("CARGO_PKG_VERSION"),
        cli.verbose
    );

    if let Err(err) = run(&cli) {
        eprintln!("{} {err:#}", style("Error:").red().bold());
        let code = match err.downcast_ref::<CliError>() {
            Some(CliError::Usage(_)) => 2,
            Some(CliError::Cancelled(_)) => 130,
            None => 1,
        };
        std::process::exit(code);
    }
}

fn run(cli: &Cli) -> Result<()> {
    // Load configuration
    let mut config = if let Some(ref path) = cli.config_path {
        Config::load_from_path(path)
    } else {
        Config::load()
    };

    match &cli.command {
        Commands::Upload { firmware } => {
            commands::upload::cmd_upload(cli, &mut config, firmware)?;
        },
        Commands::ListPorts { json } => {
            cmd_list_ports(*json);
        },
        Commands::Completions { shell } => {
            cmd_completions(*shell);
        },
    }

    Ok(())
}

/// Get serial port from CLI args, config, or interactive selection.
fn get_port(cli: &Cli, config: &mut Config) -> Result<String> {
    let options = SerialOptions {
        port: cli.port.clone(),
        list_all_ports: cli.list_all_ports,
        non_interactive: cli.non_interactive,
        confirm_port: cli.confirm_port,
    };

    let selected = select_serial_port(&options, config)?;

    // Ask to remember if not a known device and interactive mode
    if !selected.is_known && !cli.non_interactive {
        ask_remember_port(&selected.port, config)?;
    }

    Ok(selected.port.name)
}

/// Effective baud rate for the data phase: CLI flag, then config, then the
/// protocol default.
fn upload_baud(cli: &Cli, config: &Config) -> u32 {
    cli.baud
        .or(config.upload.baud)
        .unwrap_or(nexflash::HIGH_BAUD)
}

/// Effective baud rate for the handshake: CLI flag, then config, then the
/// protocol default.
fn connect_baud(cli: &Cli, config: &Config) -> u32 {
    cli.connect_baud
        .or(config.upload.connect_baud)
        .unwrap_or(nexflash::DEFAULT_BAUD)
}

/// List ports command implementation.
fn cmd_list_ports(json: bool) {
    let detected = nexflash::detect_ports();

    if json {
        let ports: Vec<serde_json::Value> = detected
            .iter()
            .map(|p| {
                serde_json::json!({
                    "name": p.name,
                    "bridge": p.bridge.name(),
                    "known": p.bridge.is_known(),
                    "vid": p.vid,
                    "pid": p.pid,
                    "manufacturer": p.manufacturer,
                    "product": p.product,
                    "serial": p.serial,
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&ports).unwrap_or_default()
        );
        return;
    }

    eprintln!("{}", style("Available serial ports:").bold().underlined());

    if detected.is_empty() {
        eprintln!("  {}", style("no serial ports found").dim());
    } else {
        for line in nexflash::format_port_list(&detected) {
            eprintln!("  {} {}", style("•").green(), line);
        }

        // Show auto-detection result
        if let Ok(auto_port) = nexflash::auto_detect_port() {
            eprintln!(
                "\n{} would auto-select {}",
                style("→").green().bold(),
                style(&auto_port.name).cyan().bold()
            );
        }
    }
}

/// Generate shell completions.
fn cmd_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
}
