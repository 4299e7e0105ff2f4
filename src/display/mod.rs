// SPDX-License-Identifier: GPL-3.0-only

//! Display surfaces
//!
//! A [`Window`] is a raster target with a back buffer: the display loop
//! clears it, draws one [`RasterImage`] per stream at its layout position and
//! presents the result with [`Window::swap_buffers`].
//!
//! - [`terminal::TerminalWindow`] renders to the terminal with half-block
//!   characters
//! - [`headless::HeadlessWindow`] renders off-screen (batch runs, tests)

pub mod canvas;
pub mod headless;
pub mod terminal;

pub use canvas::Canvas;
pub use headless::HeadlessWindow;
pub use terminal::TerminalWindow;

use crate::errors::{DisplayError, DisplayResult};
use crate::media::{DepthTransfer, Frame, PixelFormat};

/// Top-left corner of an image on the window, in window pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Position {
    pub x: u32,
    pub y: u32,
}

impl Position {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// Input delivered by a window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowEvent {
    /// The user asked to close the window
    CloseRequested,
    /// Save the current frames to disk
    SnapshotRequested,
    /// Toggle the key help in the status line
    ToggleHelp,
}

/// A pixel buffer to draw at a window position
#[derive(Debug, Clone, Copy)]
pub struct RasterImage<'a> {
    pub position: Position,
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    pub format: PixelFormat,
    pub data: &'a [u8],
    /// Depth to red mapping, used for [`PixelFormat::Z16`] only
    pub transfer: DepthTransfer,
}

impl<'a> RasterImage<'a> {
    /// Borrow a frame's pixels for drawing
    pub fn from_frame(frame: &'a Frame, position: Position, transfer: DepthTransfer) -> Self {
        Self {
            position,
            width: frame.width(),
            height: frame.height(),
            stride: frame.stride(),
            format: frame.format(),
            data: frame.data(),
            transfer,
        }
    }

    /// Check that the buffer covers the declared geometry
    pub fn validate(&self) -> DisplayResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(DisplayError::InvalidImage(format!(
                "empty image {}x{}",
                self.width, self.height
            )));
        }
        let min_stride = self.format.min_stride(self.width);
        if self.stride < min_stride {
            return Err(DisplayError::InvalidImage(format!(
                "stride {} shorter than a {} row of {} pixels",
                self.stride, self.format, self.width
            )));
        }
        let needed = self.stride as usize * (self.height as usize - 1) + min_stride as usize;
        if self.data.len() < needed {
            return Err(DisplayError::InvalidImage(format!(
                "{} bytes for a {}x{} {} image (need {})",
                self.data.len(),
                self.width,
                self.height,
                self.format,
                needed
            )));
        }
        Ok(())
    }
}

/// A display surface with a back buffer
pub trait Window {
    /// Window size in pixels
    fn size(&self) -> (u32, u32);

    /// Collect pending input without blocking
    fn poll_events(&mut self) -> Vec<WindowEvent>;

    /// True once a close was requested or the window was closed
    fn should_close(&self) -> bool;

    /// Clear the back buffer
    fn clear(&mut self);

    /// Draw an image into the back buffer
    fn draw_pixels(&mut self, image: &RasterImage<'_>) -> DisplayResult<()>;

    /// Present the back buffer
    fn swap_buffers(&mut self) -> DisplayResult<()>;

    /// Replace the status line text
    fn set_status(&mut self, message: &str);

    /// Release the surface; further presents are ignored
    fn close(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::StreamKind;

    #[test]
    fn test_raster_from_frame() {
        let frame = Frame::new(StreamKind::Infrared, 4, 2, PixelFormat::Y8, vec![7u8; 8]);
        let image = RasterImage::from_frame(&frame, Position::new(3, 5), DepthTransfer::default());
        assert_eq!(image.position, Position::new(3, 5));
        assert_eq!((image.width, image.height, image.stride), (4, 2, 4));
        assert!(image.validate().is_ok());
    }

    #[test]
    fn test_raster_validate_rejects_short_buffer() {
        let frame = Frame::new(StreamKind::Depth, 4, 4, PixelFormat::Z16, vec![0u8; 10]);
        let image = RasterImage::from_frame(&frame, Position::default(), DepthTransfer::default());
        assert!(matches!(image.validate(), Err(DisplayError::InvalidImage(_))));
    }

    #[test]
    fn test_raster_validate_allows_unpadded_last_row() {
        // Last row need not carry the padding of the stride
        let frame = Frame::new(StreamKind::Infrared, 2, 2, PixelFormat::Y8, vec![0u8; 6])
            .with_stride(4);
        let image = RasterImage::from_frame(&frame, Position::default(), DepthTransfer::default());
        assert!(image.validate().is_ok());
    }
}
