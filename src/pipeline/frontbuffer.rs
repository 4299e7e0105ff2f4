// SPDX-License-Identifier: GPL-3.0-only

//! Latest frame per stream
//!
//! One slot per [`StreamKind`], indexed by its ordinal. Installing a frame
//! releases whatever the slot held before; slots never influence each other.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::warn;

use crate::media::{Frame, StreamKind};

/// Fixed-size table of the most recently received frame per stream
#[derive(Debug, Default)]
pub struct FrontbufferTable {
    slots: Mutex<[Option<Arc<Frame>>; StreamKind::COUNT]>,
}

impl FrontbufferTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a frame in the slot of its own stream
    pub fn update(&self, frame: Frame) {
        let stream = frame.stream();
        // Keyed by the frame itself, so this always lands
        self.update_stream(stream, frame);
    }

    /// Install a frame in the slot for `stream`
    ///
    /// A frame belonging to another stream is dropped and `false` returned.
    pub fn update_stream(&self, stream: StreamKind, frame: Frame) -> bool {
        if frame.stream() != stream {
            warn!(
                slot = %stream,
                frame_stream = %frame.stream(),
                sequence = frame.sequence(),
                "Dropping frame for a foreign slot"
            );
            return false;
        }
        let previous = self.lock()[stream.index()].replace(Arc::new(frame));
        // Prior frame is released after the lock is gone
        drop(previous);
        true
    }

    /// Current frame for a stream, if one was ever received
    pub fn get(&self, stream: StreamKind) -> Option<Arc<Frame>> {
        self.lock()[stream.index()].clone()
    }

    pub fn contains(&self, stream: StreamKind) -> bool {
        self.lock()[stream.index()].is_some()
    }

    /// Populated slots in render order
    pub fn populated(&self) -> Vec<Arc<Frame>> {
        self.lock().iter().flatten().cloned().collect()
    }

    /// Release a single slot
    pub fn take(&self, stream: StreamKind) -> Option<Arc<Frame>> {
        self.lock()[stream.index()].take()
    }

    /// Release every slot
    pub fn clear(&self) {
        let released: Vec<Arc<Frame>> = self.lock().iter_mut().filter_map(Option::take).collect();
        drop(released);
    }

    fn lock(&self) -> MutexGuard<'_, [Option<Arc<Frame>>; StreamKind::COUNT]> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::PixelFormat;

    fn depth_frame(pixels: Arc<[u8]>, sequence: u64) -> Frame {
        Frame::new(StreamKind::Depth, 1, 1, PixelFormat::Z16, pixels)
            .with_sequence(sequence, std::time::Duration::ZERO)
    }

    #[test]
    fn test_get_returns_last_update() {
        let table = FrontbufferTable::new();
        let pixels: Arc<[u8]> = Arc::from(vec![0u8, 0]);
        table.update(depth_frame(pixels.clone(), 1));
        assert_eq!(table.get(StreamKind::Depth).map(|f| f.sequence()), Some(1));
        // Stable until the next update
        assert_eq!(table.get(StreamKind::Depth).map(|f| f.sequence()), Some(1));
    }

    #[test]
    fn test_overwrite_releases_prior_frame_once() {
        let table = FrontbufferTable::new();
        let a: Arc<[u8]> = Arc::from(vec![1u8, 0]);
        let b: Arc<[u8]> = Arc::from(vec![2u8, 0]);

        table.update(depth_frame(a.clone(), 1));
        assert_eq!(Arc::strong_count(&a), 2);

        table.update(depth_frame(b.clone(), 2));
        assert_eq!(Arc::strong_count(&a), 1);
        assert_eq!(Arc::strong_count(&b), 2);

        let current = table.get(StreamKind::Depth).expect("depth frame");
        assert_eq!(current.sequence(), 2);
        assert_eq!(current.data(), &[2u8, 0]);
    }

    #[test]
    fn test_never_populated_is_none() {
        let table = FrontbufferTable::new();
        table.update(depth_frame(Arc::from(vec![0u8, 0]), 1));
        assert!(table.get(StreamKind::Infrared).is_none());
        assert!(!table.contains(StreamKind::Color));
    }

    #[test]
    fn test_slots_are_independent() {
        let table = FrontbufferTable::new();
        table.update(depth_frame(Arc::from(vec![0u8, 0]), 1));
        table.update(Frame::new(StreamKind::Color, 1, 1, PixelFormat::Rgb8, vec![1u8, 2, 3]));
        table.update(depth_frame(Arc::from(vec![0u8, 0]), 2));

        assert_eq!(table.get(StreamKind::Color).map(|f| f.data().to_vec()), Some(vec![1, 2, 3]));
        let order: Vec<StreamKind> = table.populated().iter().map(|f| f.stream()).collect();
        assert_eq!(order, vec![StreamKind::Depth, StreamKind::Color]);
    }

    #[test]
    fn test_foreign_frame_is_rejected() {
        let table = FrontbufferTable::new();
        let pixels: Arc<[u8]> = Arc::from(vec![0u8, 0]);
        table.update(depth_frame(pixels.clone(), 1));

        let stray = Frame::new(StreamKind::Color, 1, 1, PixelFormat::Rgb8, vec![1u8, 2, 3]);
        assert!(!table.update_stream(StreamKind::Depth, stray));

        // Neither slot changed and the stray frame is already released
        assert_eq!(table.get(StreamKind::Depth).map(|f| f.sequence()), Some(1));
        assert!(table.get(StreamKind::Color).is_none());
        assert_eq!(Arc::strong_count(&pixels), 2);
    }

    #[test]
    fn test_keyed_update_with_matching_stream() {
        let table = FrontbufferTable::new();
        assert!(table.update_stream(StreamKind::Depth, depth_frame(Arc::from(vec![0u8, 0]), 4)));
        assert_eq!(table.get(StreamKind::Depth).map(|f| f.sequence()), Some(4));
    }

    #[test]
    fn test_clear_releases_everything() {
        let table = FrontbufferTable::new();
        let pixels: Arc<[u8]> = Arc::from(vec![0u8, 0]);
        table.update(depth_frame(pixels.clone(), 1));
        table.clear();
        assert_eq!(Arc::strong_count(&pixels), 1);
        assert!(table.populated().is_empty());
    }

    #[test]
    fn test_reader_keeps_frame_alive_across_overwrite() {
        let table = FrontbufferTable::new();
        let a: Arc<[u8]> = Arc::from(vec![1u8, 0]);
        table.update(depth_frame(a.clone(), 1));

        let held = table.get(StreamKind::Depth).expect("frame");
        table.update(depth_frame(Arc::from(vec![2u8, 0]), 2));
        assert_eq!(held.sequence(), 1);
        drop(held);
        assert_eq!(Arc::strong_count(&a), 1);
    }
}
