// SPDX-License-Identifier: GPL-3.0-only

//! Video4Linux capture backend
//!
//! Depth cameras usually expose one V4L2 node per sensor output (depth,
//! infrared, color) that share the same `bus_info`. Nodes are grouped by bus
//! into one [`Device`], so opening depth + infrared opens two nodes of the
//! same camera, each captured on its own thread into the shared queue.
//!
//! Formats are mapped by FourCC: `Z16 ` carries depth, `GREY`/`Y16 `
//! infrared, and the RGB/YUV packings color.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};
use v4l::buffer::Type;
use v4l::capability::Flags;
use v4l::io::mmap::Stream as MmapStream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::video::capture::Parameters;
use v4l::{FourCC, frameinterval::FrameIntervalEnum, framesize::FrameSizeEnum};

use super::frame_loop::{CaptureLoopController, LoopAction};
use super::{Device, DeviceInfo, FrameSource, StreamHandle, describe_configs, negotiate};
use crate::constants::{DEFAULT_DEPTH_SCALE, FRAME_LOG_INTERVAL};
use crate::errors::{SourceError, SourceErrorKind, SourceResult};
use crate::media::{Frame, PixelFormat, StreamConfig, StreamKind};
use crate::pipeline::{FrameQueue, PushOutcome};

/// Memory-mapped buffers per capture stream
const BUFFER_COUNT: u32 = 4;

/// Enumerates V4L2 capture nodes grouped by physical device
pub struct V4l2Source;

impl FrameSource for V4l2Source {
    fn name(&self) -> &'static str {
        "v4l2"
    }

    fn enumerate_devices(&self) -> SourceResult<Vec<Box<dyn Device>>> {
        let mut by_bus: BTreeMap<String, V4l2Device> = BTreeMap::new();

        for node in v4l::context::enum_devices() {
            let path = node.path().to_string_lossy().to_string();
            let dev = match v4l::Device::with_path(&path) {
                Ok(d) => d,
                Err(e) => {
                    debug!(path = %path, error = %e, "Skipping unopenable node");
                    continue;
                }
            };
            let caps = match dev.query_caps() {
                Ok(c) => c,
                Err(e) => {
                    debug!(path = %path, error = %e, "Skipping node without caps");
                    continue;
                }
            };
            if !caps.capabilities.contains(Flags::VIDEO_CAPTURE) {
                continue;
            }

            let profiles = node_profiles(&dev);
            if profiles.is_empty() {
                debug!(path = %path, "Node has no supported formats");
                continue;
            }

            debug!(
                path = %path,
                card = %caps.card,
                bus = %caps.bus,
                profiles = profiles.len(),
                "Found capture node"
            );

            let device = by_bus.entry(caps.bus.clone()).or_insert_with(|| V4l2Device {
                info: DeviceInfo {
                    name: caps.card.clone(),
                    serial: caps.bus.clone(),
                    firmware: format!("{}.{}.{}", caps.version.0, caps.version.1, caps.version.2),
                    path: path.clone(),
                },
                nodes: Vec::new(),
                profiles: Vec::new(),
            });
            device.profiles.extend(profiles.iter().copied());
            device.nodes.push(CaptureNode { path, profiles });
        }

        let devices: Vec<Box<dyn Device>> = by_bus
            .into_values()
            .map(|d| {
                info!(name = %d.info.name, nodes = d.nodes.len(), "Found V4L2 camera");
                Box::new(d) as Box<dyn Device>
            })
            .collect();
        Ok(devices)
    }
}

/// Supported stream configurations of one node
fn node_profiles(dev: &v4l::Device) -> Vec<StreamConfig> {
    let mut profiles = Vec::new();
    let Ok(descriptions) = dev.enum_formats() else {
        return profiles;
    };

    for desc in descriptions {
        let Some(format) = PixelFormat::from_fourcc(&desc.fourcc.repr) else {
            continue;
        };
        let Some(stream) = StreamKind::ALL.into_iter().find(|s| format.carries(*s)) else {
            continue;
        };
        let Ok(sizes) = dev.enum_framesizes(desc.fourcc) else {
            continue;
        };

        for size in sizes {
            let FrameSizeEnum::Discrete(discrete) = size.size else {
                continue;
            };
            let Ok(intervals) = dev.enum_frameintervals(desc.fourcc, discrete.width, discrete.height)
            else {
                continue;
            };
            for interval in intervals {
                let fps = match interval.interval {
                    FrameIntervalEnum::Discrete(frac) if frac.numerator > 0 => {
                        frac.denominator / frac.numerator
                    }
                    _ => 30,
                };
                let config = StreamConfig::new(stream, discrete.width, discrete.height, fps, format);
                if !profiles.contains(&config) {
                    profiles.push(config);
                }
            }
        }
    }
    profiles
}

#[derive(Debug, Clone)]
struct CaptureNode {
    path: String,
    profiles: Vec<StreamConfig>,
}

/// One physical camera (all nodes sharing a bus)
#[derive(Debug, Clone)]
pub struct V4l2Device {
    info: DeviceInfo,
    nodes: Vec<CaptureNode>,
    profiles: Vec<StreamConfig>,
}

impl Device for V4l2Device {
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
        negotiate(&self.profiles, configs)?;

        let mut assignments: Vec<(String, StreamConfig)> = Vec::new();
        for config in configs {
            let node = self
                .nodes
                .iter()
                .find(|n| n.profiles.contains(config))
                .ok_or_else(|| {
                    SourceError::rejected(
                        "open_stream",
                        describe_configs(configs),
                        format!("no node delivers {}", config),
                    )
                })?;
            if assignments.iter().any(|(path, _)| *path == node.path) {
                return Err(SourceError::rejected(
                    "open_stream",
                    describe_configs(configs),
                    format!("{} would share node {} with another stream", config, node.path),
                ));
            }
            assignments.push((node.path.clone(), *config));
        }

        Ok(Box::new(V4l2Stream {
            configs: configs.to_vec(),
            assignments,
            loops: Vec::new(),
        }))
    }
}

/// Opened V4L2 streams, one capture thread per node
pub struct V4l2Stream {
    configs: Vec<StreamConfig>,
    assignments: Vec<(String, StreamConfig)>,
    loops: Vec<CaptureLoopController>,
}

/// Per-thread capture state
struct NodeCapture {
    stream: MmapStream<'static>,
    config: StreamConfig,
    stride: u32,
    started: Instant,
    sequence: u64,
}

/// Open a node, apply the configuration and map its buffers
fn open_node(path: &str, config: StreamConfig) -> Result<NodeCapture, String> {
    let dev = v4l::Device::with_path(path).map_err(|e| format!("open {}: {}", path, e))?;

    let mut format = dev.format().map_err(|e| format!("query format: {}", e))?;
    format.width = config.width;
    format.height = config.height;
    format.fourcc = FourCC::new(&config.format.fourcc());
    let applied = dev
        .set_format(&format)
        .map_err(|e| format!("set format {}: {}", config, e))?;
    if applied.fourcc != format.fourcc
        || applied.width != config.width
        || applied.height != config.height
    {
        return Err(format!(
            "driver applied {}x{} {} instead of {}",
            applied.width, applied.height, applied.fourcc, config
        ));
    }

    if let Err(e) = dev.set_params(&Parameters::with_fps(config.fps)) {
        warn!(path, error = %e, "Could not set frame rate, using driver default");
    }

    let stream = MmapStream::with_buffers(&dev, Type::VideoCapture, BUFFER_COUNT)
        .map_err(|e| format!("map buffers: {}", e))?;

    info!(path, config = %config, stride = applied.stride, "V4L2 capture started");

    Ok(NodeCapture {
        stream,
        config,
        stride: applied.stride,
        started: Instant::now(),
        sequence: 0,
    })
}

impl StreamHandle for V4l2Stream {
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

        // Fail fast on nodes that cannot be opened before spawning anything
        for (path, _) in &self.assignments {
            v4l::Device::with_path(path).map_err(|e| SourceError::io("start", path.clone(), e))?;
        }

        for (path, config) in self.assignments.clone() {
            let producer = queue.register_producer();
            let init_path = path.clone();

            let controller = CaptureLoopController::start_with_init(
                &config.stream.display_name().to_lowercase(),
                move || open_node(&init_path, config),
                move |capture: &mut NodeCapture, _stop| {
                    let (buf, meta) = match capture.stream.next() {
                        Ok(next) => next,
                        Err(e) => {
                            warn!(stream = %capture.config.stream, error = %e, "Capture failed");
                            return LoopAction::Stop;
                        }
                    };

                    let frame = Frame::new(
                        capture.config.stream,
                        capture.config.width,
                        capture.config.height,
                        capture.config.format,
                        buf,
                    )
                    .with_stride(capture.stride)
                    .with_sequence(capture.sequence, capture.started.elapsed());

                    if capture.sequence % FRAME_LOG_INTERVAL == 0 {
                        debug!(
                            stream = %capture.config.stream,
                            sequence = meta.sequence,
                            bytes = buf.len(),
                            "V4L2 frame captured"
                        );
                    }
                    capture.sequence += 1;

                    match producer.push(frame) {
                        PushOutcome::Closed => LoopAction::Stop,
                        _ => LoopAction::Continue,
                    }
                },
            )
            .map_err(|e| SourceError::io("start", path.clone(), e))?;

            self.loops.push(controller);
        }

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

impl Drop for V4l2Stream {
    fn drop(&mut self) {
        self.stop();
    }
}
