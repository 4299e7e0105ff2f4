// SPDX-License-Identifier: GPL-3.0-only

//! RGB24 back buffer shared by the window implementations

use super::RasterImage;
use crate::errors::DisplayResult;
use crate::media::conversions::sample_rgb;

/// Background color of a cleared canvas
pub const CLEAR_COLOR: (u8, u8, u8) = (0, 0, 0);

/// Tightly packed RGB24 pixel buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 3],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn clear(&mut self) {
        let (r, g, b) = CLEAR_COLOR;
        for px in self.pixels.chunks_exact_mut(3) {
            px.copy_from_slice(&[r, g, b]);
        }
    }

    /// Color at a canvas position (clamped to the edges)
    pub fn pixel(&self, x: u32, y: u32) -> (u8, u8, u8) {
        if self.width == 0 || self.height == 0 {
            return CLEAR_COLOR;
        }
        let x = x.min(self.width - 1) as usize;
        let y = y.min(self.height - 1) as usize;
        let idx = (y * self.width as usize + x) * 3;
        (self.pixels[idx], self.pixels[idx + 1], self.pixels[idx + 2])
    }

    /// Draw an image at its position, 1:1, clipped to the canvas
    ///
    /// Returns the number of pixels written.
    pub fn blit(&mut self, image: &RasterImage<'_>) -> DisplayResult<usize> {
        image.validate()?;

        let x0 = image.position.x;
        let y0 = image.position.y;
        if x0 >= self.width || y0 >= self.height {
            return Ok(0);
        }
        let visible_w = image.width.min(self.width - x0);
        let visible_h = image.height.min(self.height - y0);

        for y in 0..visible_h {
            let row = ((y0 + y) as usize * self.width as usize + x0 as usize) * 3;
            for x in 0..visible_w {
                let (r, g, b) = sample_rgb(
                    image.data,
                    image.format,
                    image.width,
                    image.height,
                    image.stride,
                    x,
                    y,
                    &image.transfer,
                );
                let idx = row + x as usize * 3;
                self.pixels[idx] = r;
                self.pixels[idx + 1] = g;
                self.pixels[idx + 2] = b;
            }
        }

        Ok(visible_w as usize * visible_h as usize)
    }
}
