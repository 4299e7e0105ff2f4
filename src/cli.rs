// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Viewing the configured streams (terminal or headless)
//! - Listing connected devices and their profiles
//! - Printing and saving the effective configuration

use clap::Args;
use depthview::backends::{self, BackendType};
use depthview::config::Config;
use depthview::constants::DEFAULT_HEADLESS_PRESENTS;
use depthview::display::{HeadlessWindow, TerminalWindow};
use depthview::errors::{AppError, AppResult, ConfigError};
use depthview::media::StreamKind;
use depthview::pipeline::OverflowPolicy;
use depthview::viewer;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

/// Options that override the config file
#[derive(Args, Debug, Default)]
pub struct Overrides {
    /// Config file (default: <config dir>/depthview/config.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Frame source backend: synthetic or v4l2
    #[arg(long, global = true)]
    pub backend: Option<BackendType>,

    /// Device index (from 'depthview list')
    #[arg(short, long, global = true)]
    pub device: Option<usize>,

    /// Frame queue capacity
    #[arg(long, global = true)]
    pub capacity: Option<usize>,

    /// Queue overflow policy: block, drop-oldest or drop-newest
    #[arg(long, global = true)]
    pub overflow: Option<OverflowPolicy>,
}

impl Overrides {
    fn config_path(&self) -> Option<PathBuf> {
        self.config.clone().or_else(Config::default_path)
    }

    /// Load the config file and apply command line overrides
    fn load(&self) -> AppResult<Config> {
        let mut config = match self.config_path() {
            Some(path) => Config::load_or_default(&path)?,
            None => Config::default(),
        };

        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if let Some(device) = self.device {
            config.device_index = device;
        }
        if let Some(capacity) = self.capacity {
            config.queue.capacity = capacity;
        }
        if let Some(overflow) = self.overflow {
            config.queue.overflow = overflow;
        }

        config.validate()?;
        Ok(config)
    }
}

/// Run the viewer
pub fn view(overrides: &Overrides, headless: bool, frames: Option<u64>) -> AppResult<()> {
    let config = overrides.load()?;
    let source = backends::get_source(config.backend)?;

    info!(
        backend = %config.backend,
        capacity = config.queue.capacity,
        overflow = %config.queue.overflow,
        "Starting viewer"
    );

    let stats = if headless {
        let stop = Arc::new(AtomicBool::new(false));
        let handler_stop = Arc::clone(&stop);
        if let Err(e) = ctrlc::set_handler(move || handler_stop.store(true, Ordering::SeqCst)) {
            warn!(error = %e, "Could not install Ctrl+C handler");
        }

        let window = HeadlessWindow::create_window(
            config.window.width,
            config.window.height,
            &config.window.title,
        )
        .with_max_presents(frames.unwrap_or(DEFAULT_HEADLESS_PRESENTS))
        .with_stop_signal(stop);
        viewer::run_viewer(source.as_ref(), &config, window)?
    } else {
        if frames.is_some() {
            warn!("--frames only applies to headless mode");
        }
        let window = TerminalWindow::create_window(
            config.window.width,
            config.window.height,
            &config.window.title,
        )?;
        viewer::run_viewer(source.as_ref(), &config, window)?
    };

    println!("{}", stats);
    Ok(())
}

/// List all connected devices
pub fn list_devices(overrides: &Overrides) -> AppResult<()> {
    let config = overrides.load()?;
    let source = backends::get_source(config.backend)?;
    let devices = source.enumerate_devices()?;

    if devices.is_empty() {
        println!("No devices found.");
        return Ok(());
    }

    println!("Available devices ({}):", source.name());
    println!();
    for (index, device) in devices.iter().enumerate() {
        let info = device.info();
        println!("  [{}] {}", index, info.name);
        println!("      Serial:   {}", info.serial);
        println!("      Firmware: {}", info.firmware);
        println!("      Path:     {}", info.path);
        println!("      Depth scale: {} m/unit", device.depth_scale());

        for stream in StreamKind::ALL {
            let mut modes: Vec<String> = Vec::new();
            for profile in device.profiles().iter().filter(|p| p.stream == stream) {
                let mode = format!(
                    "{}x{}@{}fps {}",
                    profile.width, profile.height, profile.fps, profile.format
                );
                if !modes.contains(&mode) {
                    modes.push(mode);
                }
            }
            if modes.is_empty() {
                continue;
            }

            // Show the first few modes, the rest as a count
            let shown = modes.len().min(4);
            let mut line = modes[..shown].join(", ");
            if modes.len() > shown {
                line.push_str(&format!(" (+{} more)", modes.len() - shown));
            }
            println!("      {:<9} {}", format!("{}:", stream), line);
        }
        println!();
    }

    Ok(())
}

/// Print the effective configuration, optionally saving it
pub fn print_config(overrides: &Overrides, write: bool) -> AppResult<()> {
    let config = overrides.load()?;
    let json = serde_json::to_string_pretty(&config)
        .map_err(|e| ConfigError::Invalid(format!("cannot serialize config: {}", e)))?;
    println!("{}", json);

    if write {
        let path = overrides
            .config_path()
            .ok_or_else(|| AppError::Config(ConfigError::Invalid("no config directory".into())))?;
        config.save(&path)?;
        eprintln!("Saved to {}", path.display());
    }
    Ok(())
}
