// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use std::process::ExitCode;

mod cli;

#[derive(Parser)]
#[command(name = "depthview")]
#[command(about = "Show depth, infrared and color streams of a depth camera side by side")]
#[command(version = env!("GIT_VERSION"))]
#[command(subcommand_required = false)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    overrides: cli::Overrides,

    /// Log to stderr even in terminal mode
    #[arg(long, global = true)]
    log_stderr: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// View the configured streams (default)
    View {
        /// Render off-screen instead of to the terminal
        #[arg(long)]
        headless: bool,

        /// Stop after presenting this many images (headless default: 300)
        #[arg(short, long)]
        frames: Option<u64>,
    },

    /// List connected devices and their stream profiles
    List,

    /// Print the effective configuration as JSON
    Config {
        /// Save it to the config file
        #[arg(short, long)]
        write: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let command = cli.command.unwrap_or(Commands::View {
        headless: false,
        frames: None,
    });
    let terminal_mode = matches!(command, Commands::View { headless: false, .. });
    init_logging(terminal_mode && !cli.log_stderr);

    let result = match command {
        Commands::View { headless, frames } => cli::view(&cli.overrides, headless, frames),
        Commands::List => cli::list_devices(&cli.overrides),
        Commands::Config { write } => cli::print_config(&cli.overrides, write),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "depthview failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Initialize logging
///
/// Set RUST_LOG to control the level (e.g. `RUST_LOG=depthview=debug`).
/// The terminal viewer owns the screen, so its logs go to a file.
fn init_logging(to_file: bool) {
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
    };

    if to_file && let Some(file) = open_log_file() {
        tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_target(true)
            .with_level(true)
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(file))
            .init();
        return;
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();
}

fn open_log_file() -> Option<std::fs::File> {
    let dir = dirs::state_dir()
        .or_else(dirs::cache_dir)?
        .join(depthview::constants::APP_NAME);
    std::fs::create_dir_all(&dir).ok()?;
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("depthview.log"))
        .ok()
}
