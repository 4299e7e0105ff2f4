// SPDX-License-Identifier: GPL-3.0-only

//! Device selection and stream startup
//!
//! Opens the configured device, negotiates one stream set per sensor and
//! starts every stream into a shared frame queue before the display loop
//! takes over.

use std::sync::Arc;
use tracing::info;

use super::{DisplayLoop, LoopStats};
use crate::backends::{Device, DeviceInfo, FrameSource, StreamHandle};
use crate::config::Config;
use crate::display::Window;
use crate::errors::{AppResult, SetupError};
use crate::media::{DepthTransfer, SensorKind, StreamConfig};
use crate::pipeline::FrameQueue;
use crate::storage;

/// An opened device with its streams running
pub struct Session {
    device: Box<dyn Device>,
    queue: Arc<FrameQueue>,
    handles: Vec<Box<dyn StreamHandle>>,
}

impl Session {
    /// Select the configured device and start its streams
    pub fn open(source: &dyn FrameSource, config: &Config) -> AppResult<Self> {
        let mut devices = source.enumerate_devices()?;
        info!(backend = source.name(), count = devices.len(), "Devices connected");

        if devices.is_empty() {
            return Err(SetupError::NoDevices.into());
        }
        if config.device_index >= devices.len() {
            return Err(SetupError::DeviceIndexOutOfRange {
                index: config.device_index,
                count: devices.len(),
            }
            .into());
        }
        let device = devices.swap_remove(config.device_index);

        let info = device.info();
        info!(
            name = %info.name,
            serial = %info.serial,
            firmware = %info.firmware,
            path = %info.path,
            depth_scale = device.depth_scale(),
            "Using device"
        );

        let groups = group_by_sensor(&config.streams);
        if groups.is_empty() {
            return Err(SetupError::NoStreamsConfigured.into());
        }

        let queue = Arc::new(FrameQueue::new(config.queue.capacity, config.queue.overflow));

        let mut handles = Vec::with_capacity(groups.len());
        for (sensor, configs) in &groups {
            let handle = device.open_stream(configs)?;
            info!(sensor = %sensor, streams = configs.len(), "Streams opened");
            handles.push(handle);
        }
        for handle in &mut handles {
            if let Err(e) = handle.start(&queue) {
                // Streams already started stop when `handles` drops
                queue.close();
                return Err(e.into());
            }
        }

        Ok(Self {
            device,
            queue,
            handles,
        })
    }

    pub fn device_info(&self) -> &DeviceInfo {
        self.device.info()
    }

    pub fn depth_scale(&self) -> f32 {
        self.device.depth_scale()
    }

    pub fn queue(&self) -> &Arc<FrameQueue> {
        &self.queue
    }

    /// Streams currently opened
    pub fn configs(&self) -> Vec<StreamConfig> {
        self.handles.iter().flat_map(|h| h.configs().to_vec()).collect()
    }

    /// Hand the running streams to a display loop drawing into `window`
    pub fn into_display_loop<W: Window>(mut self, window: W, config: &Config) -> DisplayLoop<W> {
        let transfer = DepthTransfer::new(self.device.depth_scale(), config.max_depth_m);
        let mut display = DisplayLoop::new(window, Arc::clone(&self.queue))
            .with_wait_timeout(config.queue.wait_timeout())
            .with_transfer(transfer)
            .with_snapshot_dir(storage::snapshot_directory(config.snapshot_dir.as_deref()));
        for handle in std::mem::take(&mut self.handles) {
            display.attach_stream(handle);
        }
        display
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.handles.is_empty() {
            // Release producers blocked on a full queue before joining them
            self.queue.close();
            for handle in &mut self.handles {
                handle.stop();
            }
        }
    }
}

/// Split stream configs into one request per sensor, depth sensor first
fn group_by_sensor(streams: &[StreamConfig]) -> Vec<(SensorKind, Vec<StreamConfig>)> {
    [SensorKind::Depth, SensorKind::Color]
        .into_iter()
        .map(|sensor| {
            let configs: Vec<StreamConfig> = streams
                .iter()
                .filter(|c| c.stream.sensor() == sensor)
                .copied()
                .collect();
            (sensor, configs)
        })
        .filter(|(_, configs)| !configs.is_empty())
        .collect()
}

/// Open the configured device and run the display loop until it stops
pub fn run_viewer<W: Window>(
    source: &dyn FrameSource,
    config: &Config,
    window: W,
) -> AppResult<LoopStats> {
    let session = Session::open(source, config)?;
    let mut display = session.into_display_loop(window, config);
    Ok(display.run())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::synthetic::SyntheticSource;
    use crate::display::HeadlessWindow;
    use crate::errors::{AppError, SourceErrorKind};
    use crate::media::{PixelFormat, StreamKind};
    use std::sync::Mutex;

    /// Collects formatted log output in memory
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn small_config() -> Config {
        let mut config = Config::default();
        for stream in &mut config.streams {
            stream.width = 160;
            stream.height = 120;
            stream.fps = 60;
        }
        config
    }

    #[test]
    fn test_group_by_sensor_orders_depth_first() {
        let groups = group_by_sensor(&Config::default().streams);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, SensorKind::Depth);
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[1].0, SensorKind::Color);
    }

    #[test]
    fn test_no_devices() {
        let source = SyntheticSource::new(0);
        let err = Session::open(&source, &small_config()).err().unwrap();
        assert!(matches!(err, AppError::Setup(SetupError::NoDevices)));
    }

    #[test]
    fn test_setup_error_is_returned_without_logging() {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .finish();

        let config = small_config();
        let result = tracing::subscriber::with_default(subscriber, || {
            let window = HeadlessWindow::create_window(320, 240, "test");
            run_viewer(&SyntheticSource::new(0), &config, window)
        });

        assert!(matches!(result, Err(AppError::Setup(SetupError::NoDevices))));
        // Reporting the failure is left to the caller
        assert_eq!(logs.text(), "");
    }

    #[test]
    fn test_device_index_out_of_range() {
        let mut config = small_config();
        config.device_index = 3;
        let err = Session::open(&SyntheticSource::new(2), &config).err().unwrap();
        assert!(matches!(
            err,
            AppError::Setup(SetupError::DeviceIndexOutOfRange { index: 3, count: 2 })
        ));
    }

    #[test]
    fn test_no_streams_configured() {
        let mut config = small_config();
        config.streams.clear();
        let err = Session::open(&SyntheticSource::default(), &config).err().unwrap();
        assert!(matches!(err, AppError::Setup(SetupError::NoStreamsConfigured)));
    }

    #[test]
    fn test_unsupported_profile_is_rejected() {
        let mut config = small_config();
        config.streams[0] = StreamConfig::new(StreamKind::Depth, 1920, 1080, 30, PixelFormat::Z16);
        let err = Session::open(&SyntheticSource::default(), &config).err().unwrap();
        match err {
            AppError::Source(e) => {
                assert_eq!(e.kind, SourceErrorKind::StreamRejected);
                assert_eq!(e.operation, "open_stream");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_open_starts_all_configured_streams() {
        let session = Session::open(&SyntheticSource::default(), &small_config()).unwrap();
        assert_eq!(session.configs().len(), 3);
        assert_eq!(session.queue().producer_count(), 3);
        assert_eq!(session.device_info().serial, "SYN000001");
    }
}
