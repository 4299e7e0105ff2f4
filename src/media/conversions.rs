// SPDX-License-Identifier: GPL-3.0-only

//! Pixel conversions to displayable RGB
//!
//! All formats a stream can carry are sampled per pixel into RGB triples.
//! Depth values are mapped linearly onto the red channel over a configured
//! range, infrared intensity onto luminance.

use super::frame::PixelFormat;

/// Mapping applied to depth pixels before display
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthTransfer {
    /// Meters per Z16 unit
    pub depth_scale: f32,
    /// Depth shown at full red intensity
    pub max_depth_m: f32,
}

impl DepthTransfer {
    pub fn new(depth_scale: f32, max_depth_m: f32) -> Self {
        Self {
            depth_scale,
            max_depth_m,
        }
    }

    /// Red intensity for a raw depth value
    pub fn intensity(&self, raw: u16) -> u8 {
        if self.max_depth_m <= 0.0 {
            return 0;
        }
        let meters = raw as f32 * self.depth_scale;
        ((meters / self.max_depth_m).clamp(0.0, 1.0) * 255.0).round() as u8
    }
}

impl Default for DepthTransfer {
    fn default() -> Self {
        Self {
            depth_scale: crate::constants::DEFAULT_DEPTH_SCALE,
            max_depth_m: crate::constants::DEFAULT_MAX_DEPTH_M,
        }
    }
}

/// Sample one pixel of a buffer as RGB
///
/// Coordinates are clamped to the image; reads past the end of the buffer
/// yield black.
#[allow(clippy::too_many_arguments)]
pub fn sample_rgb(
    data: &[u8],
    format: PixelFormat,
    width: u32,
    height: u32,
    stride: u32,
    x: u32,
    y: u32,
    transfer: &DepthTransfer,
) -> (u8, u8, u8) {
    if width == 0 || height == 0 {
        return (0, 0, 0);
    }
    let x = x.min(width - 1) as usize;
    let y = y.min(height - 1) as usize;
    let row = y * stride as usize;

    match format {
        PixelFormat::Z16 => match read_u16(data, row + x * 2) {
            Some(raw) => (transfer.intensity(raw), 0, 0),
            None => (0, 0, 0),
        },
        PixelFormat::Y8 => match data.get(row + x) {
            Some(&v) => (v, v, v),
            None => (0, 0, 0),
        },
        PixelFormat::Y16 => match read_u16(data, row + x * 2) {
            Some(v) => {
                let v = (v >> 8) as u8;
                (v, v, v)
            }
            None => (0, 0, 0),
        },
        PixelFormat::Rgb8 => {
            let idx = row + x * 3;
            match data.get(idx..idx + 3) {
                Some(px) => (px[0], px[1], px[2]),
                None => (0, 0, 0),
            }
        }
        PixelFormat::Bgr8 => {
            let idx = row + x * 3;
            match data.get(idx..idx + 3) {
                Some(px) => (px[2], px[1], px[0]),
                None => (0, 0, 0),
            }
        }
        PixelFormat::Rgba8 => {
            let idx = row + x * 4;
            match data.get(idx..idx + 3) {
                Some(px) => (px[0], px[1], px[2]),
                None => (0, 0, 0),
            }
        }
        PixelFormat::Yuyv | PixelFormat::Uyvy => {
            // Two pixels share one chroma pair
            let base = row + (x & !1) * 2;
            let Some(px) = data.get(base..base + 4) else {
                return (0, 0, 0);
            };
            let odd = x & 1 == 1;
            let (luma, u, v) = if format == PixelFormat::Yuyv {
                (if odd { px[2] } else { px[0] }, px[1], px[3])
            } else {
                (if odd { px[3] } else { px[1] }, px[0], px[2])
            };
            yuv_to_rgb(luma, u, v)
        }
    }
}

fn read_u16(data: &[u8], idx: usize) -> Option<u16> {
    let bytes = data.get(idx..idx + 2)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

/// Convert YUV (BT.601) to RGB
pub fn yuv_to_rgb(y: u8, u: u8, v: u8) -> (u8, u8, u8) {
    let y = y as f32;
    let u = u as f32 - 128.0;
    let v = v as f32 - 128.0;

    let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
    let g = (y - 0.344136 * u - 0.714136 * v).clamp(0.0, 255.0) as u8;
    let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;

    (r, g, b)
}

/// Convert a whole buffer to tightly packed RGB24
pub fn to_rgb24(
    data: &[u8],
    format: PixelFormat,
    width: u32,
    height: u32,
    stride: u32,
    transfer: &DepthTransfer,
) -> Vec<u8> {
    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
        for x in 0..width {
            let (r, g, b) = sample_rgb(data, format, width, height, stride, x, y, transfer);
            rgb.extend_from_slice(&[r, g, b]);
        }
    }
    rgb
}
