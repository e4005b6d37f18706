//! Upload command implementation.

use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use nexflash::{UploadConfig, Uploader, WINDOW_SIZE};
use std::path::Path;

use crate::config::Config;
use crate::{Cli, CliError, connect_baud, get_port, upload_baud, use_fancy_output};

/// Upload command implementation.
pub(crate) fn cmd_upload(cli: &Cli, config: &mut Config, firmware: &Path) -> Result<()> {
    if !cli.quiet {
        eprintln!(
            "{} Loading firmware image {}",
            style("📦").cyan(),
            style(firmware.display()).bold()
        );
    }

    let image = std::fs::read(firmware)
        .with_context(|| format!("Failed to read firmware image {}", firmware.display()))?;
    if image.is_empty() {
        return Err(CliError::Usage(format!(
            "firmware image {} is empty",
            firmware.display()
        ))
        .into());
    }

    // Get port
    let port = get_port(cli, config)?;
    let connect_baud = connect_baud(cli, config);
    let upload_baud = upload_baud(cli, config);
    if !cli.quiet {
        eprintln!(
            "{} Using port {} ({} baud handshake, {} baud upload)",
            style("🔌").cyan(),
            style(&port).bold(),
            connect_baud,
            upload_baud
        );
    }

    let upload_config = UploadConfig::default()
        .with_connect_baud(connect_baud)
        .with_upload_baud(upload_baud);
    let mut uploader = Uploader::open(&port, upload_config)
        .with_context(|| format!("Failed to open serial port {port}"))?;

    // Handshake
    if !cli.quiet {
        eprintln!("{} Waking display...", style("⏳").yellow());
    }
    uploader
        .connect(image.len())
        .context("Failed to place the display into upload mode")?;

    if let Some(info) = uploader.device_info() {
        if !cli.quiet {
            eprintln!("{} Connected to {info}", style("✓").green());
        }
        if image.len() as u64 > u64::from(info.flash_size) {
            eprintln!(
                "{} image is {} bytes but the display reports only {} bytes of flash",
                style("⚠").yellow(),
                image.len(),
                info.flash_size
            );
        }
    } else if !cli.quiet {
        eprintln!("{} Connected (model not identified)", style("✓").green());
    }

    // Create progress bar
    let pb = if cli.quiet || !use_fancy_output() {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(image.len() as u64);
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
        pb
    };

    // Stream the image in window-sized chunks
    let mut offset = 0;
    while offset < image.len() {
        let end = (offset + WINDOW_SIZE).min(image.len());
        uploader
            .send(&image[offset..end])
            .with_context(|| format!("Transfer failed at byte {offset}"))?;
        offset = end;
        pb.set_position(offset as u64);
    }

    pb.finish_with_message("done");

    if !cli.quiet {
        eprintln!(
            "\n{} Upload complete; the display is rebooting into the new firmware",
            style("🎉").green().bold()
        );
    }

    Ok(())
}
