// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Application name, used for config and snapshot directories
pub const APP_NAME: &str = "depthview";

/// Default window title
pub const DEFAULT_WINDOW_TITLE: &str = "depthview - depth, infrared and color";

/// Default window size: a 2x2 grid of 640x480 streams
pub const DEFAULT_WINDOW_WIDTH: u32 = 1280;
pub const DEFAULT_WINDOW_HEIGHT: u32 = 960;

/// Default per-stream resolution and rate
pub const DEFAULT_STREAM_WIDTH: u32 = 640;
pub const DEFAULT_STREAM_HEIGHT: u32 = 480;
pub const DEFAULT_STREAM_FPS: u32 = 30;

/// Frames the queue holds before its overflow policy applies
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// Upper bound accepted for the queue capacity
pub const MAX_QUEUE_CAPACITY: usize = 1024;

/// How long the display loop waits for a frame before redrawing anyway
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_millis(500);

/// Meters per Z16 unit when the device does not report a scale
pub const DEFAULT_DEPTH_SCALE: f32 = 0.001;

/// Depth shown at full intensity (meters)
pub const DEFAULT_MAX_DEPTH_M: f32 = 2.0;

/// Presents before a headless run closes its window
pub const DEFAULT_HEADLESS_PRESENTS: u64 = 300;

/// Producer log cadence: one debug line every N frames
pub const FRAME_LOG_INTERVAL: u64 = 60;

/// Key bindings shown in the terminal status bar
pub mod keys {
    pub const QUIT: char = 'q';
    pub const SNAPSHOT: char = 'p';
    pub const HELP: char = 'h';
}
