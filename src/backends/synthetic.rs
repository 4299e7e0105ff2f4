// SPDX-License-Identifier: GPL-3.0-only

//! Synthetic depth camera
//!
//! Generates deterministic test patterns for all three streams so the viewer
//! runs without hardware:
//!
//! - Depth: a tilted floor plane with a sphere sweeping across it
//! - Infrared: a fixed projector speckle over a vignette
//! - Color: a gradient whose blue channel cycles with time
//!
//! Each opened stream gets its own producer thread paced at the configured
//! frame rate, like a real sensor delivering from its own USB transfer loop.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::frame_loop::{CaptureLoopController, LoopAction, sleep_until};
use super::{Device, DeviceInfo, FrameSource, StreamHandle, describe_configs, negotiate};
use crate::constants::{DEFAULT_DEPTH_SCALE, FRAME_LOG_INTERVAL};
use crate::errors::{SourceError, SourceErrorKind, SourceResult};
use crate::media::{Frame, PixelFormat, StreamConfig, StreamKind};
use crate::pipeline::{FrameQueue, PushOutcome};

/// Resolutions offered by every synthetic sensor
const RESOLUTIONS: [(u32, u32); 3] = [(640, 480), (320, 240), (160, 120)];

/// Frame rates offered by every synthetic sensor
const FRAME_RATES: [u32; 3] = [15, 30, 60];

/// Source producing synthetic depth cameras
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    device_count: usize,
    frame_limit: Option<u64>,
}

impl Default for SyntheticSource {
    fn default() -> Self {
        Self {
            device_count: 1,
            frame_limit: None,
        }
    }
}

impl SyntheticSource {
    /// Source reporting `device_count` cameras (zero simulates no hardware)
    pub fn new(device_count: usize) -> Self {
        Self {
            device_count,
            ..Self::default()
        }
    }

    /// End every stream after `frames` frames, as if the device was unplugged
    pub fn with_frame_limit(mut self, frames: u64) -> Self {
        self.frame_limit = Some(frames);
        self
    }
}

impl FrameSource for SyntheticSource {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn enumerate_devices(&self) -> SourceResult<Vec<Box<dyn Device>>> {
        let devices = (0..self.device_count)
            .map(|index| {
                let device = SyntheticDevice::new(index, self.frame_limit);
                debug!(name = %device.info.name, serial = %device.info.serial, "Found synthetic device");
                Box::new(device) as Box<dyn Device>
            })
            .collect();
        Ok(devices)
    }
}

/// One synthetic camera
#[derive(Debug, Clone)]
pub struct SyntheticDevice {
    info: DeviceInfo,
    profiles: Vec<StreamConfig>,
    frame_limit: Option<u64>,
}

impl SyntheticDevice {
    pub fn new(index: usize, frame_limit: Option<u64>) -> Self {
        Self {
            info: DeviceInfo {
                name: "Synthetic Depth Camera".to_string(),
                serial: format!("SYN{:06}", index + 1),
                firmware: env!("CARGO_PKG_VERSION").to_string(),
                path: format!("synthetic:{}", index),
            },
            profiles: synthetic_profiles(),
            frame_limit,
        }
    }
}

fn synthetic_profiles() -> Vec<StreamConfig> {
    let formats: [(StreamKind, &[PixelFormat]); 3] = [
        (StreamKind::Depth, &[PixelFormat::Z16]),
        (StreamKind::Infrared, &[PixelFormat::Y8, PixelFormat::Y16]),
        (
            StreamKind::Color,
            &[
                PixelFormat::Rgb8,
                PixelFormat::Bgr8,
                PixelFormat::Rgba8,
                PixelFormat::Yuyv,
            ],
        ),
    ];

    let mut profiles = Vec::new();
    for (stream, stream_formats) in formats {
        for &format in stream_formats {
            for (width, height) in RESOLUTIONS {
                for fps in FRAME_RATES {
                    profiles.push(StreamConfig::new(stream, width, height, fps, format));
                }
            }
        }
    }
    profiles
}

impl Device for SyntheticDevice {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn profiles(&self) -> &[StreamConfig] {
        &self.profiles
    }

    fn depth_scale(&self) -> f32 {
        DEFAULT_DEPTH_SCALE
    }

    fn open_stream(&self, configs: &[StreamConfig]) -> SourceResult<Box<dyn StreamHandle>> {
        let sensor = negotiate(&self.profiles, configs)?;
        info!(
            device = %self.info.name,
            sensor = %sensor,
            streams = %describe_configs(configs),
            "Opened synthetic streams"
        );
        Ok(Box::new(SyntheticStream {
            configs: configs.to_vec(),
            frame_limit: self.frame_limit,
            depth_scale: self.depth_scale(),
            loops: Vec::new(),
        }))
    }
}

/// Running (or ready) synthetic streams of one sensor
pub struct SyntheticStream {
    configs: Vec<StreamConfig>,
    frame_limit: Option<u64>,
    depth_scale: f32,
    loops: Vec<CaptureLoopController>,
}

impl StreamHandle for SyntheticStream {
    fn configs(&self) -> &[StreamConfig] {
        &self.configs
    }

    fn start(&mut self, queue: &Arc<FrameQueue>) -> SourceResult<()> {
        if !self.loops.is_empty() {
            return Err(SourceError::new(
                "start",
                describe_configs(&self.configs),
                SourceErrorKind::DeviceBusy,
                "streams already started",
            ));
        }

        let started = Instant::now();
        for config in self.configs.clone() {
            let producer = queue.register_producer();
            let generator = PatternGenerator::new(config, self.depth_scale);
            let frame_limit = self.frame_limit;
            let interval = config.frame_interval();
            let mut sequence = 0u64;
            let mut next_deadline = started;

            let controller = CaptureLoopController::start(
                &config.stream.display_name().to_lowercase(),
                move |stop| {
                    if frame_limit.is_some_and(|limit| sequence >= limit) {
                        return LoopAction::Stop;
                    }
                    if !sleep_until(next_deadline, stop) {
                        return LoopAction::Stop;
                    }
                    next_deadline += interval;

                    let timestamp = started.elapsed();
                    let frame = generator.frame(sequence, timestamp);
                    if producer.push(frame) == PushOutcome::Closed {
                        return LoopAction::Stop;
                    }
                    if sequence % FRAME_LOG_INTERVAL == 0 {
                        debug!(
                            stream = %config.stream,
                            sequence,
                            pending = producer.queue().len(),
                            "Synthetic frame produced"
                        );
                    }
                    sequence += 1;
                    LoopAction::Continue
                },
            )
            .map_err(|e| SourceError::io("start", config.to_string(), e))?;

            self.loops.push(controller);
        }

        info!(streams = %describe_configs(&self.configs), "Synthetic streams started");
        Ok(())
    }

    fn stop(&mut self) {
        for controller in &self.loops {
            controller.request_stop();
        }
        for mut controller in self.loops.drain(..) {
            controller.stop();
        }
    }

    fn is_streaming(&self) -> bool {
        self.loops.iter().any(CaptureLoopController::is_running)
    }
}

impl Drop for SyntheticStream {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Deterministic pattern for one stream configuration
#[derive(Debug, Clone, Copy)]
pub struct PatternGenerator {
    config: StreamConfig,
    depth_scale: f32,
}

impl PatternGenerator {
    pub fn new(config: StreamConfig, depth_scale: f32) -> Self {
        Self {
            config,
            depth_scale,
        }
    }

    /// Render frame `sequence` of the stream
    pub fn frame(&self, sequence: u64, timestamp: Duration) -> Frame {
        let StreamConfig {
            stream,
            width,
            height,
            format,
            ..
        } = self.config;

        let data = match format {
            PixelFormat::Z16 => self.depth(sequence),
            PixelFormat::Y8 => self.infrared(false),
            PixelFormat::Y16 => self.infrared(true),
            _ => self.color(sequence),
        };

        Frame::new(stream, width, height, format, data).with_sequence(sequence, timestamp)
    }

    fn depth(&self, sequence: u64) -> Vec<u8> {
        let (w, h) = (self.config.width as f32, self.config.height as f32);
        let units_per_m = 1.0 / self.depth_scale.max(f32::EPSILON);

        // Sphere sweeps left to right once every 4 seconds of frames
        let period = (self.config.fps.max(1) * 4) as f32;
        let phase = (sequence as f32 % period) / period;
        let cx = phase * w;
        let cy = h * 0.5;
        let radius = h * 0.2;

        let mut data = Vec::with_capacity((self.config.width * self.config.height * 2) as usize);
        for y in 0..self.config.height {
            // Floor recedes from 0.5 m (bottom) to 3 m (top)
            let floor_m = 3.0 - 2.5 * (y as f32 / h);
            for x in 0..self.config.width {
                let dx = x as f32 - cx;
                let dy = y as f32 - cy;
                let dist2 = dx * dx + dy * dy;
                let meters = if dist2 < radius * radius {
                    let bulge = (1.0 - dist2 / (radius * radius)).sqrt();
                    0.9 - 0.3 * bulge
                } else {
                    floor_m
                };
                let units = (meters * units_per_m).clamp(0.0, u16::MAX as f32) as u16;
                data.extend_from_slice(&units.to_le_bytes());
            }
        }
        data
    }

    fn infrared(&self, wide: bool) -> Vec<u8> {
        let (w, h) = (self.config.width, self.config.height);
        let bytes = if wide { 2 } else { 1 };
        let mut data = Vec::with_capacity((w * h * bytes) as usize);
        for y in 0..h {
            for x in 0..w {
                let dx = x as f32 / w as f32 - 0.5;
                let dy = y as f32 / h as f32 - 0.5;
                let vignette = 1.0 - (dx * dx + dy * dy) * 1.6;
                let base = (90.0 * vignette).max(0.0);
                let speckle = if speckle_hash(x, y) % 11 == 0 { 150.0 } else { 0.0 };
                let level = (base + speckle).min(255.0) as u8;
                if wide {
                    data.extend_from_slice(&((level as u16) << 8).to_le_bytes());
                } else {
                    data.push(level);
                }
            }
        }
        data
    }

    fn color(&self, sequence: u64) -> Vec<u8> {
        let (w, h) = (self.config.width, self.config.height);
        let blue = ((sequence * 4) % 256) as u8;
        let format = self.config.format;
        let mut data = Vec::with_capacity((format.min_stride(w) * h) as usize);

        for y in 0..h {
            let g = (y * 255 / h.max(1)) as u8;
            if format == PixelFormat::Yuyv {
                for x in (0..w).step_by(2) {
                    let r0 = (x * 255 / w.max(1)) as u8;
                    let r1 = ((x + 1).min(w - 1) * 255 / w.max(1)) as u8;
                    let (y0, u0, v0) = rgb_to_yuv(r0, g, blue);
                    let (y1, u1, v1) = rgb_to_yuv(r1, g, blue);
                    let u = ((u0 as u16 + u1 as u16) / 2) as u8;
                    let v = ((v0 as u16 + v1 as u16) / 2) as u8;
                    data.extend_from_slice(&[y0, u, y1, v]);
                }
                continue;
            }
            for x in 0..w {
                let r = (x * 255 / w.max(1)) as u8;
                match format {
                    PixelFormat::Bgr8 => data.extend_from_slice(&[blue, g, r]),
                    PixelFormat::Rgba8 => data.extend_from_slice(&[r, g, blue, 255]),
                    _ => data.extend_from_slice(&[r, g, blue]),
                }
            }
        }
        data
    }
}

/// Stable per-pixel hash for the speckle pattern
fn speckle_hash(x: u32, y: u32) -> u32 {
    let mut h = x.wrapping_mul(0x9E37_79B1) ^ y.wrapping_mul(0x85EB_CA77);
    h ^= h >> 15;
    h = h.wrapping_mul(0xC2B2_AE3D);
    h ^ (h >> 13)
}

/// Convert RGB to YUV (BT.601, full range)
fn rgb_to_yuv(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let (r, g, b) = (r as f32, g as f32, b as f32);
    let y = 0.299 * r + 0.587 * g + 0.114 * b;
    let u = (b - y) * 0.564 + 128.0;
    let v = (r - y) * 0.713 + 128.0;
    (
        y.clamp(0.0, 255.0) as u8,
        u.clamp(0.0, 255.0) as u8,
        v.clamp(0.0, 255.0) as u8,
    )
}
