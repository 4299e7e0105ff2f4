// SPDX-License-Identifier: GPL-3.0-only

//! Frame and stream types shared by sources, the pipeline and the viewer

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Logical data channel of a depth camera
///
/// The set is closed, so per-stream state is kept in fixed arrays indexed
/// by [`StreamKind::index`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Depth,
    Infrared,
    Color,
}

impl StreamKind {
    /// Number of stream kinds
    pub const COUNT: usize = 3;

    /// All stream kinds in render order
    pub const ALL: [StreamKind; StreamKind::COUNT] =
        [StreamKind::Depth, StreamKind::Infrared, StreamKind::Color];

    /// Stable ordinal used to index per-stream tables
    pub fn index(self) -> usize {
        match self {
            StreamKind::Depth => 0,
            StreamKind::Infrared => 1,
            StreamKind::Color => 2,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            StreamKind::Depth => "Depth",
            StreamKind::Infrared => "Infrared",
            StreamKind::Color => "Color",
        }
    }

    /// Sensor the stream is produced by
    ///
    /// Depth and infrared share the depth sensor; streams opened together
    /// must come from one sensor.
    pub fn sensor(self) -> SensorKind {
        match self {
            StreamKind::Depth | StreamKind::Infrared => SensorKind::Depth,
            StreamKind::Color => SensorKind::Color,
        }
    }
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl std::str::FromStr for StreamKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "depth" => Ok(StreamKind::Depth),
            "infrared" | "ir" => Ok(StreamKind::Infrared),
            "color" | "colour" | "rgb" => Ok(StreamKind::Color),
            other => Err(format!("unknown stream '{}'", other)),
        }
    }
}

/// Physical sensor on a depth camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    Depth,
    Color,
}

impl std::fmt::Display for SensorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorKind::Depth => write!(f, "depth sensor"),
            SensorKind::Color => write!(f, "color sensor"),
        }
    }
}

/// Pixel layout of a frame buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PixelFormat {
    /// 16-bit little-endian depth units (scaled by the device depth scale)
    Z16,
    /// 8-bit luminance
    Y8,
    /// 16-bit little-endian luminance
    Y16,
    /// Packed 24-bit RGB
    Rgb8,
    /// Packed 24-bit BGR
    Bgr8,
    /// Packed 32-bit RGBA
    Rgba8,
    /// Packed 4:2:2 (Y0 U Y1 V)
    Yuyv,
    /// Packed 4:2:2 (U Y0 V Y1)
    Uyvy,
}

impl PixelFormat {
    /// Bytes per pixel (4:2:2 formats average to 2)
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            PixelFormat::Y8 => 1,
            PixelFormat::Z16 | PixelFormat::Y16 | PixelFormat::Yuyv | PixelFormat::Uyvy => 2,
            PixelFormat::Rgb8 | PixelFormat::Bgr8 => 3,
            PixelFormat::Rgba8 => 4,
        }
    }

    /// Tightly packed row length in bytes
    pub fn min_stride(self, width: u32) -> u32 {
        width * self.bytes_per_pixel()
    }

    /// Whether the format can carry the given stream
    pub fn carries(self, stream: StreamKind) -> bool {
        match stream {
            StreamKind::Depth => self == PixelFormat::Z16,
            StreamKind::Infrared => matches!(self, PixelFormat::Y8 | PixelFormat::Y16),
            StreamKind::Color => matches!(
                self,
                PixelFormat::Rgb8
                    | PixelFormat::Bgr8
                    | PixelFormat::Rgba8
                    | PixelFormat::Yuyv
                    | PixelFormat::Uyvy
            ),
        }
    }

    /// V4L2 FourCC code for this format
    pub fn fourcc(self) -> [u8; 4] {
        match self {
            PixelFormat::Z16 => *b"Z16 ",
            PixelFormat::Y8 => *b"GREY",
            PixelFormat::Y16 => *b"Y16 ",
            PixelFormat::Rgb8 => *b"RGB3",
            PixelFormat::Bgr8 => *b"BGR3",
            PixelFormat::Rgba8 => *b"AB24",
            PixelFormat::Yuyv => *b"YUYV",
            PixelFormat::Uyvy => *b"UYVY",
        }
    }

    /// Parse a V4L2 FourCC code
    pub fn from_fourcc(code: &[u8; 4]) -> Option<Self> {
        match code {
            b"Z16 " => Some(PixelFormat::Z16),
            b"GREY" => Some(PixelFormat::Y8),
            b"Y16 " => Some(PixelFormat::Y16),
            b"RGB3" => Some(PixelFormat::Rgb8),
            b"BGR3" => Some(PixelFormat::Bgr8),
            b"AB24" => Some(PixelFormat::Rgba8),
            b"YUYV" => Some(PixelFormat::Yuyv),
            b"UYVY" => Some(PixelFormat::Uyvy),
            _ => None,
        }
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PixelFormat::Z16 => "Z16",
            PixelFormat::Y8 => "Y8",
            PixelFormat::Y16 => "Y16",
            PixelFormat::Rgb8 => "RGB8",
            PixelFormat::Bgr8 => "BGR8",
            PixelFormat::Rgba8 => "RGBA8",
            PixelFormat::Yuyv => "YUYV",
            PixelFormat::Uyvy => "UYVY",
        };
        write!(f, "{}", name)
    }
}

/// Requested configuration for one stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamConfig {
    pub stream: StreamKind,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub format: PixelFormat,
}

impl StreamConfig {
    pub fn new(stream: StreamKind, width: u32, height: u32, fps: u32, format: PixelFormat) -> Self {
        Self {
            stream,
            width,
            height,
            fps,
            format,
        }
    }

    /// Time between two frames at the configured rate
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.fps.max(1)
    }
}

impl std::fmt::Display for StreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}x{} @ {}fps {}",
            self.stream, self.width, self.height, self.fps, self.format
        )
    }
}

/// Immutable, reference counted pixel storage
#[derive(Clone)]
pub struct FrameData(Arc<[u8]>);

impl FrameData {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for FrameData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FrameData({} bytes)", self.0.len())
    }
}

impl From<Vec<u8>> for FrameData {
    fn from(data: Vec<u8>) -> Self {
        FrameData(Arc::from(data))
    }
}

impl From<Arc<[u8]>> for FrameData {
    fn from(data: Arc<[u8]>) -> Self {
        FrameData(data)
    }
}

impl From<&[u8]> for FrameData {
    fn from(data: &[u8]) -> Self {
        FrameData(Arc::from(data))
    }
}

impl std::ops::Deref for FrameData {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

/// One timestamped sample of pixel data for a stream
///
/// Frames are deliberately not `Clone`: a frame moves from its producer into
/// the queue and from the queue into the frontbuffer table.
#[derive(Debug)]
pub struct Frame {
    stream: StreamKind,
    width: u32,
    height: u32,
    stride: u32,
    format: PixelFormat,
    data: FrameData,
    sequence: u64,
    timestamp: Duration,
    captured_at: Instant,
}

impl Frame {
    /// Create a tightly packed frame
    pub fn new(
        stream: StreamKind,
        width: u32,
        height: u32,
        format: PixelFormat,
        data: impl Into<FrameData>,
    ) -> Self {
        Self {
            stream,
            width,
            height,
            stride: format.min_stride(width),
            format,
            data: data.into(),
            sequence: 0,
            timestamp: Duration::ZERO,
            captured_at: Instant::now(),
        }
    }

    /// Override the row stride (rows may carry padding)
    pub fn with_stride(mut self, stride: u32) -> Self {
        self.stride = stride;
        self
    }

    /// Attach the producer's sequence number and stream-relative timestamp
    pub fn with_sequence(mut self, sequence: u64, timestamp: Duration) -> Self {
        self.sequence = sequence;
        self.timestamp = timestamp;
        self
    }

    pub fn stream(&self) -> StreamKind {
        self.stream
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Time since the producing stream started
    pub fn timestamp(&self) -> Duration {
        self.timestamp
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    /// Whether the buffer is large enough for the declared geometry
    pub fn is_complete(&self) -> bool {
        if self.width == 0 || self.height == 0 {
            return false;
        }
        let row = self.format.min_stride(self.width) as usize;
        let needed = (self.height as usize - 1) * self.stride as usize + row;
        self.stride as usize >= row && self.data.len() >= needed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_indices_are_dense() {
        for (expected, kind) in StreamKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), expected);
        }
    }

    #[test]
    fn test_stream_from_str() {
        assert_eq!("ir".parse::<StreamKind>(), Ok(StreamKind::Infrared));
        assert_eq!("Depth".parse::<StreamKind>(), Ok(StreamKind::Depth));
        assert!("thermal".parse::<StreamKind>().is_err());
    }

    #[test]
    fn test_format_carries_stream() {
        assert!(PixelFormat::Z16.carries(StreamKind::Depth));
        assert!(!PixelFormat::Z16.carries(StreamKind::Color));
        assert!(PixelFormat::Y8.carries(StreamKind::Infrared));
        assert!(PixelFormat::Yuyv.carries(StreamKind::Color));
    }

    #[test]
    fn test_fourcc_roundtrip_for_known_codes() {
        assert_eq!(PixelFormat::from_fourcc(b"YUYV"), Some(PixelFormat::Yuyv));
        assert_eq!(PixelFormat::from_fourcc(b"GREY"), Some(PixelFormat::Y8));
        assert_eq!(PixelFormat::from_fourcc(b"MJPG"), None);
    }

    #[test]
    fn test_frame_completeness() {
        let frame = Frame::new(StreamKind::Depth, 4, 2, PixelFormat::Z16, vec![0u8; 16]);
        assert!(frame.is_complete());

        let short = Frame::new(StreamKind::Depth, 4, 2, PixelFormat::Z16, vec![0u8; 15]);
        assert!(!short.is_complete());

        let padded = Frame::new(StreamKind::Infrared, 3, 2, PixelFormat::Y8, vec![0u8; 7])
            .with_stride(4);
        assert!(padded.is_complete());
    }

    #[test]
    fn test_frame_interval() {
        let config = StreamConfig::new(StreamKind::Color, 640, 480, 30, PixelFormat::Rgb8);
        assert_eq!(config.frame_interval(), Duration::from_secs(1) / 30);
    }
}
