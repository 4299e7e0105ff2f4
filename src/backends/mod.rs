// SPDX-License-Identifier: GPL-3.0-only

//! Frame source abstraction
//!
//! ```text
//! ┌─────────────────────┐
//! │    FrameSource      │  ← device enumeration
//! └──────────┬──────────┘
//!            │ Box<dyn Device>
//!            ▼
//! ┌─────────────────────┐
//! │       Device        │  ← identity, profiles, stream negotiation
//! └──────────┬──────────┘
//!            │ open_stream(&[StreamConfig])
//!            ▼
//! ┌─────────────────────┐
//! │    StreamHandle     │  ← start(queue) / stop, one thread per stream
//! └─────────────────────┘
//! ```
//!
//! Concrete sources: [`synthetic`] (test-pattern camera, always available)
//! and `v4l2` (real capture devices, behind the `v4l2` feature).

pub mod frame_loop;
pub mod synthetic;
#[cfg(feature = "v4l2")]
pub mod v4l2;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::errors::{SourceError, SourceResult};
use crate::media::{SensorKind, StreamConfig};
use crate::pipeline::FrameQueue;

/// Identity reported by a device
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub serial: String,
    pub firmware: String,
    /// Backend-specific location (e.g. `/dev/video2`)
    pub path: String,
}

/// Enumerates devices of one backend
pub trait FrameSource {
    /// Backend name used in logs
    fn name(&self) -> &'static str;

    /// Enumerate connected devices
    fn enumerate_devices(&self) -> SourceResult<Vec<Box<dyn Device>>>;
}

/// A connected depth camera
pub trait Device: Send {
    fn info(&self) -> &DeviceInfo;

    /// Stream configurations the device can deliver
    fn profiles(&self) -> &[StreamConfig];

    /// Meters per Z16 depth unit
    fn depth_scale(&self) -> f32;

    /// Negotiate and open one or more streams of a single sensor
    ///
    /// Every config must match a supported profile and all configs must
    /// belong to the same sensor; otherwise the call fails with
    /// [`SourceErrorKind::StreamRejected`](crate::errors::SourceErrorKind).
    fn open_stream(&self, configs: &[StreamConfig]) -> SourceResult<Box<dyn StreamHandle>>;
}

/// Opened streams of one sensor
pub trait StreamHandle: Send {
    fn configs(&self) -> &[StreamConfig];

    /// Start delivering frames into `queue`
    fn start(&mut self, queue: &Arc<FrameQueue>) -> SourceResult<()>;

    /// Stop delivery and wait for the producer threads to exit
    fn stop(&mut self);

    fn is_streaming(&self) -> bool;
}

/// Available frame source backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// Built-in test pattern camera
    #[default]
    Synthetic,
    /// Video4Linux capture devices
    V4l2,
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendType::Synthetic => write!(f, "synthetic"),
            BackendType::V4l2 => write!(f, "v4l2"),
        }
    }
}

impl std::str::FromStr for BackendType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "synthetic" => Ok(BackendType::Synthetic),
            "v4l2" => Ok(BackendType::V4l2),
            other => Err(format!("unknown backend '{}' (synthetic, v4l2)", other)),
        }
    }
}

/// Get a frame source for a backend type
pub fn get_source(backend: BackendType) -> SourceResult<Box<dyn FrameSource>> {
    match backend {
        BackendType::Synthetic => Ok(Box::new(synthetic::SyntheticSource::default())),
        #[cfg(feature = "v4l2")]
        BackendType::V4l2 => Ok(Box::new(v4l2::V4l2Source)),
        #[cfg(not(feature = "v4l2"))]
        BackendType::V4l2 => Err(SourceError::new(
            "get_source",
            "v4l2",
            crate::errors::SourceErrorKind::Unsupported,
            "built without the v4l2 feature",
        )),
    }
}

/// Check a stream request against a device's profiles
///
/// Shared negotiation rules: at least one config, one sensor only, no
/// duplicate streams, and each config exactly matching a profile.
pub fn negotiate(profiles: &[StreamConfig], configs: &[StreamConfig]) -> SourceResult<SensorKind> {
    let args = describe_configs(configs);

    let Some(first) = configs.first() else {
        return Err(SourceError::rejected("open_stream", args, "no stream requested"));
    };
    let sensor = first.stream.sensor();

    for (i, config) in configs.iter().enumerate() {
        if config.stream.sensor() != sensor {
            return Err(SourceError::rejected(
                "open_stream",
                args,
                format!("{} is not produced by the {}", config.stream, sensor),
            ));
        }
        if configs[..i].iter().any(|c| c.stream == config.stream) {
            return Err(SourceError::rejected(
                "open_stream",
                args,
                format!("{} requested twice", config.stream),
            ));
        }
        if !config.format.carries(config.stream) {
            return Err(SourceError::rejected(
                "open_stream",
                args,
                format!("{} cannot carry {}", config.format, config.stream),
            ));
        }
        if !profiles.contains(config) {
            return Err(SourceError::rejected(
                "open_stream",
                args,
                format!("no matching profile for {}", config),
            ));
        }
    }

    Ok(sensor)
}

/// Render configs as the argument list of a failed call
pub fn describe_configs(configs: &[StreamConfig]) -> String {
    configs
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
