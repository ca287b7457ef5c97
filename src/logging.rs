use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

/// Send `tracing` output to a log file; the terminal belongs to the UI.
/// Honors `RUST_LOG`, defaulting to info for this crate.
pub fn init() -> Result<PathBuf> {
    let log_dir = dirs::cache_dir()
        .ok_or_else(|| anyhow!("Could not determine cache directory"))?
        .join("obd-chat");
    fs::create_dir_all(&log_dir)?;

    let log_path = log_dir.join("obd-chat.log");
    let file = OpenOptions::new().create(true).append(true).open(&log_path)?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("obd_chat=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;

    Ok(log_path)
}
