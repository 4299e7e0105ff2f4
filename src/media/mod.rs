// SPDX-License-Identifier: GPL-3.0-only

//! Frame types and pixel format handling

pub mod conversions;
pub mod frame;

pub use conversions::DepthTransfer;
pub use frame::{Frame, FrameData, PixelFormat, SensorKind, StreamConfig, StreamKind};
