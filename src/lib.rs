// SPDX-License-Identifier: GPL-3.0-only

//! depthview - multi-stream depth camera viewer
//!
//! Opens depth, infrared and color streams from a depth camera, funnels
//! their frames through one bounded queue and renders the latest frame of
//! every stream side by side.
//!
//! # Architecture
//!
//! - [`backends`]: frame sources (synthetic camera, V4L2)
//! - [`pipeline`]: frame queue and frontbuffer table
//! - [`viewer`]: display loop state machine and session setup
//! - [`display`]: window implementations (terminal, headless)
//! - [`media`]: frame types and pixel conversions
//! - [`config`]: user configuration
//! - [`storage`]: snapshot files
//!
//! # Example
//!
//! ```no_run
//! use depthview::backends::synthetic::SyntheticSource;
//! use depthview::display::HeadlessWindow;
//! use depthview::{Config, viewer};
//!
//! let config = Config::default();
//! let window = HeadlessWindow::create_window(1280, 960, "depthview").with_max_presents(30);
//! let stats = viewer::run_viewer(&SyntheticSource::default(), &config, window)?;
//! println!("{}", stats);
//! # Ok::<(), depthview::AppError>(())
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod display;
pub mod errors;
pub mod media;
pub mod pipeline;
pub mod storage;
pub mod viewer;

// Re-export commonly used types
pub use config::Config;
pub use errors::{AppError, AppResult};
pub use media::{Frame, StreamConfig, StreamKind};
pub use pipeline::{FrameQueue, FrontbufferTable, OverflowPolicy};
pub use viewer::{DisplayLoop, LoopState, LoopStats};
