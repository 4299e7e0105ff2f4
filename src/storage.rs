// SPDX-License-Identifier: GPL-3.0-only

//! Snapshot files
//!
//! Frames are converted with the same mapping used on screen (depth shows as
//! red intensity) and written as PNG, one file per stream.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::constants::APP_NAME;
use crate::errors::{AppError, AppResult};
use crate::media::conversions::to_rgb24;
use crate::media::{DepthTransfer, Frame};

/// Directory snapshots are written to
///
/// An explicitly configured directory wins; otherwise
/// `<Pictures>/depthview`, falling back to the working directory.
pub fn snapshot_directory(configured: Option<&Path>) -> PathBuf {
    if let Some(dir) = configured {
        return dir.to_path_buf();
    }
    dirs::picture_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// File name for a snapshot of `frame` taken at `stamp`
pub fn snapshot_file_name(frame: &Frame, stamp: &str) -> String {
    format!(
        "{}_{}_{:06}.png",
        frame.stream().display_name().to_lowercase(),
        stamp,
        frame.sequence()
    )
}

/// Save one frame as PNG into `dir`
pub fn save_snapshot(frame: &Frame, transfer: &DepthTransfer, dir: &Path) -> AppResult<PathBuf> {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
    save_snapshot_as(frame, transfer, &dir.join(snapshot_file_name(frame, &stamp)))
}

/// Save one frame as PNG at `path`
pub fn save_snapshot_as(frame: &Frame, transfer: &DepthTransfer, path: &Path) -> AppResult<PathBuf> {
    let rgb = to_rgb24(
        frame.data(),
        frame.format(),
        frame.width(),
        frame.height(),
        frame.stride(),
        transfer,
    );
    let img: image::RgbImage = image::ImageBuffer::from_raw(frame.width(), frame.height(), rgb)
        .ok_or_else(|| {
            AppError::Storage(format!(
                "{}x{} {} frame does not form an image",
                frame.width(),
                frame.height(),
                frame.stream()
            ))
        })?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| AppError::Storage(format!("{}: {}", parent.display(), e)))?;
    }

    img.save_with_format(path, image::ImageFormat::Png)
        .map_err(|e| AppError::Storage(format!("{}: {}", path.display(), e)))?;

    debug!(path = %path.display(), stream = %frame.stream(), "Snapshot written");
    Ok(path.to_path_buf())
}

/// Save every given frame, stopping at the first failure
pub fn save_snapshots(
    frames: &[Arc<Frame>],
    transfer: &DepthTransfer,
    dir: &Path,
) -> AppResult<Vec<PathBuf>> {
    let paths = frames
        .iter()
        .map(|frame| save_snapshot(frame, transfer, dir))
        .collect::<AppResult<Vec<_>>>()?;
    info!(count = paths.len(), dir = %dir.display(), "Snapshots saved");
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{PixelFormat, StreamKind};
    use std::time::Duration;

    #[test]
    fn test_configured_directory_wins() {
        let dir = Path::new("/tmp/shots");
        assert_eq!(snapshot_directory(Some(dir)), dir);
        assert!(snapshot_directory(None).ends_with(APP_NAME));
    }

    #[test]
    fn test_file_name_carries_stream_and_sequence() {
        let frame = Frame::new(StreamKind::Infrared, 1, 1, PixelFormat::Y8, vec![0u8])
            .with_sequence(42, Duration::ZERO);
        assert_eq!(
            snapshot_file_name(&frame, "20240101_120000"),
            "infrared_20240101_120000_000042.png"
        );
    }

    #[test]
    fn test_save_depth_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let mut data = Vec::new();
        for raw in [0u16, 1000, 2000, 4000] {
            data.extend_from_slice(&raw.to_le_bytes());
        }
        let frame = Frame::new(StreamKind::Depth, 2, 2, PixelFormat::Z16, data);

        let path = save_snapshot(&frame, &DepthTransfer::new(0.001, 2.0), dir.path()).unwrap();
        let img = image::open(&path).unwrap().to_rgb8();
        assert_eq!(img.dimensions(), (2, 2));
        assert_eq!(img.get_pixel(0, 0).0, [0, 0, 0]);
        assert_eq!(img.get_pixel(1, 1).0, [255, 0, 0]);
    }

    #[test]
    fn test_save_snapshots_writes_one_file_per_frame() {
        let dir = tempfile::tempdir().unwrap();
        let frames = vec![
            Arc::new(Frame::new(StreamKind::Depth, 1, 1, PixelFormat::Z16, vec![0u8, 0])),
            Arc::new(Frame::new(StreamKind::Color, 1, 1, PixelFormat::Rgb8, vec![1u8, 2, 3])),
        ];
        let paths = save_snapshots(&frames, &DepthTransfer::default(), dir.path()).unwrap();
        assert_eq!(paths.len(), 2);
        assert!(paths.iter().all(|p| p.exists()));
    }
}
