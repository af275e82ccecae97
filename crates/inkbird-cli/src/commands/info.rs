//! Info command implementation.

use std::time::Duration;

use anyhow::{Context, Result};
use inkbird_core::{BleTransport, read_identity};
use tokio::time::timeout;

use crate::cli::OutputFormat;
use crate::format::{FormatOptions, format_identity_text};
use crate::util::write_output;

pub async fn cmd_info(
    identifier: &str,
    connect_timeout: Duration,
    format: OutputFormat,
    quiet: bool,
    opts: &FormatOptions,
) -> Result<()> {
    if !quiet && format == OutputFormat::Text {
        eprintln!("Connecting to {}...", identifier);
    }

    let transport = BleTransport::new(identifier);
    let identity = timeout(connect_timeout, read_identity(&transport))
        .await
        .with_context(|| format!("Timed out reading device info from {}", identifier))?
        .context("Failed to read device info")?;

    let content = match format {
        OutputFormat::Json => opts.as_json(&identity)?,
        OutputFormat::Text => format_identity_text(&identity, opts),
    };
    write_output(&content)
}
