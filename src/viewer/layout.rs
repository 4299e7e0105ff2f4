// SPDX-License-Identifier: GPL-3.0-only

//! Window placement of each stream
//!
//! ```text
//! ┌───────────┬───────────┐
//! │   Depth   │   Color   │
//! ├───────────┼───────────┤
//! │ Infrared  │           │
//! └───────────┴───────────┘
//! ```

use crate::display::Position;
use crate::media::StreamKind;

/// Quadrant layout for a window of a given size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    width: u32,
    height: u32,
}

impl Layout {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Top-left corner of a stream's quadrant
    pub fn position(&self, stream: StreamKind) -> Position {
        let (half_w, half_h) = (self.width / 2, self.height / 2);
        match stream {
            StreamKind::Depth => Position::new(0, 0),
            StreamKind::Color => Position::new(half_w, 0),
            StreamKind::Infrared => Position::new(0, half_h),
        }
    }

    /// Size of one quadrant
    pub fn cell_size(&self) -> (u32, u32) {
        (self.width / 2, self.height / 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quadrants_for_default_window() {
        let layout = Layout::new(1280, 960);
        assert_eq!(layout.position(StreamKind::Depth), Position::new(0, 0));
        assert_eq!(layout.position(StreamKind::Color), Position::new(640, 0));
        assert_eq!(layout.position(StreamKind::Infrared), Position::new(0, 480));
        assert_eq!(layout.cell_size(), (640, 480));
    }

    #[test]
    fn test_quadrants_never_overlap() {
        let layout = Layout::new(320, 240);
        let positions: Vec<_> = StreamKind::ALL.iter().map(|s| layout.position(*s)).collect();
        for (i, a) in positions.iter().enumerate() {
            assert!(positions[i + 1..].iter().all(|b| b != a));
        }
    }
}
