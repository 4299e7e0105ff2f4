// SPDX-License-Identifier: GPL-3.0-only

//! Display loop
//!
//! Runs on the calling thread and moves through three states:
//!
//! ```text
//! RUNNING ──close requested / queue terminated──▶ STOPPING ──▶ STOPPED
//! ```
//!
//! Each running iteration polls window input, waits (bounded) for the next
//! frame, installs it in the frontbuffer table and redraws every populated
//! stream in a fixed order before presenting.

pub mod layout;
pub mod session;

pub use layout::Layout;
pub use session::{Session, run_viewer};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

use crate::backends::StreamHandle;
use crate::constants::{DEFAULT_WAIT_TIMEOUT, FRAME_LOG_INTERVAL};
use crate::display::{RasterImage, Window, WindowEvent};
use crate::media::{DepthTransfer, Frame, StreamKind};
use crate::pipeline::{FrameQueue, FrontbufferTable, WaitOutcome};
use crate::storage;

/// Display loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopping,
    Stopped,
}

/// Counters collected while the loop runs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub iterations: u64,
    pub presents: u64,
    pub frames_received: u64,
    pub frames_per_stream: [u64; StreamKind::COUNT],
    /// Waits that ended without a frame
    pub timeouts: u64,
    /// Renders skipped because a stream had no frame yet
    pub missing_per_stream: [u64; StreamKind::COUNT],
    pub draw_failures: u64,
    pub snapshots_saved: u64,
}

impl LoopStats {
    pub fn frames(&self, stream: StreamKind) -> u64 {
        self.frames_per_stream[stream.index()]
    }

    pub fn missing(&self, stream: StreamKind) -> u64 {
        self.missing_per_stream[stream.index()]
    }
}

impl std::fmt::Display for LoopStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} iterations, {} presents, {} frames (",
            self.iterations, self.presents, self.frames_received
        )?;
        for (i, stream) in StreamKind::ALL.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} {}", stream, self.frames(*stream))?;
        }
        write!(
            f,
            "), {} timeouts, {} draw failures",
            self.timeouts, self.draw_failures
        )
    }
}

pub struct DisplayLoop<W: Window> {
    window: W,
    queue: Arc<FrameQueue>,
    frontbuffers: FrontbufferTable,
    streams: Vec<Box<dyn StreamHandle>>,
    /// Streams a missing frame is counted for
    expected: [bool; StreamKind::COUNT],
    layout: Layout,
    transfer: DepthTransfer,
    wait_timeout: Duration,
    snapshot_dir: PathBuf,
    state: LoopState,
    stats: LoopStats,
    show_help: bool,
    notice: Option<String>,
}

impl<W: Window> DisplayLoop<W> {
    pub fn new(window: W, queue: Arc<FrameQueue>) -> Self {
        let (width, height) = window.size();
        Self {
            window,
            queue,
            frontbuffers: FrontbufferTable::new(),
            streams: Vec::new(),
            expected: [true; StreamKind::COUNT],
            layout: Layout::new(width, height),
            transfer: DepthTransfer::default(),
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            snapshot_dir: storage::snapshot_directory(None),
            state: LoopState::Running,
            stats: LoopStats::default(),
            show_help: false,
            notice: None,
        }
    }

    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    pub fn with_transfer(mut self, transfer: DepthTransfer) -> Self {
        self.transfer = transfer;
        self
    }

    pub fn with_snapshot_dir(mut self, dir: PathBuf) -> Self {
        self.snapshot_dir = dir;
        self
    }

    /// Hand over an opened stream; it is stopped when the loop stops
    ///
    /// Once streams are attached, only their kinds count as missing.
    pub fn attach_stream(&mut self, handle: Box<dyn StreamHandle>) {
        if self.streams.is_empty() {
            self.expected = [false; StreamKind::COUNT];
        }
        for config in handle.configs() {
            self.expected[config.stream.index()] = true;
        }
        self.streams.push(handle);
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }

    pub fn window(&self) -> &W {
        &self.window
    }

    pub fn window_mut(&mut self) -> &mut W {
        &mut self.window
    }

    pub fn frontbuffers(&self) -> &FrontbufferTable {
        &self.frontbuffers
    }

    pub fn queue(&self) -> &Arc<FrameQueue> {
        &self.queue
    }

    /// Run one iteration; a stopped loop stays stopped
    pub fn step(&mut self) -> LoopState {
        match self.state {
            LoopState::Running => self.step_running(),
            LoopState::Stopping => self.shutdown(),
            LoopState::Stopped => {}
        }
        self.state
    }

    /// Step until stopped
    pub fn run(&mut self) -> LoopStats {
        info!(
            timeout_ms = self.wait_timeout.as_millis() as u64,
            streams = self.streams.len(),
            "Display loop started"
        );
        while self.step() != LoopState::Stopped {}
        info!(stats = %self.stats, "Display loop finished");
        self.stats.clone()
    }

    fn step_running(&mut self) {
        self.stats.iterations += 1;

        for event in self.window.poll_events() {
            match event {
                WindowEvent::CloseRequested => {
                    info!("Window close requested");
                    self.state = LoopState::Stopping;
                }
                WindowEvent::SnapshotRequested => self.save_snapshots(),
                WindowEvent::ToggleHelp => self.show_help = !self.show_help,
            }
        }
        if self.state != LoopState::Running || self.window.should_close() {
            self.state = LoopState::Stopping;
            return;
        }

        match self.queue.wait_for_frame_timeout(self.wait_timeout) {
            // One frame per iteration; the rest stays queued for later passes
            WaitOutcome::Frame(frame) => self.receive(frame),
            WaitOutcome::TimedOut => {
                self.stats.timeouts += 1;
                debug!(
                    timeout_ms = self.wait_timeout.as_millis() as u64,
                    "No frame within timeout, redrawing last frames"
                );
            }
            WaitOutcome::Terminated => {
                info!("Frame queue terminated");
                self.state = LoopState::Stopping;
                return;
            }
        }

        self.render();
    }

    fn receive(&mut self, frame: Frame) {
        let stream = frame.stream();
        self.stats.frames_received += 1;
        self.stats.frames_per_stream[stream.index()] += 1;
        if frame.sequence() % FRAME_LOG_INTERVAL == 0 {
            debug!(
                stream = %stream,
                sequence = frame.sequence(),
                latency_ms = frame.captured_at().elapsed().as_millis() as u64,
                "Frame received"
            );
        }
        self.frontbuffers.update(frame);
    }

    fn render(&mut self) {
        self.window.clear();

        for stream in StreamKind::ALL {
            let Some(frame) = self.frontbuffers.get(stream) else {
                if self.expected[stream.index()] {
                    self.stats.missing_per_stream[stream.index()] += 1;
                    trace!(stream = %stream, "No frame yet, skipping");
                }
                continue;
            };

            let image = RasterImage::from_frame(&frame, self.layout.position(stream), self.transfer);
            if let Err(e) = self.window.draw_pixels(&image) {
                self.stats.draw_failures += 1;
                warn!(stream = %stream, sequence = frame.sequence(), error = %e, "Draw failed, skipping stream");
            }
        }

        let status = self.status_line();
        self.window.set_status(&status);

        match self.window.swap_buffers() {
            Ok(()) => self.stats.presents += 1,
            Err(e) => {
                error!(error = %e, "Present failed, stopping");
                self.state = LoopState::Stopping;
            }
        }
    }

    fn status_line(&self) -> String {
        if self.show_help {
            return "p: Save snapshot | h: Toggle help | q/Esc/Ctrl+C: Quit".to_string();
        }

        let mut parts: Vec<String> = StreamKind::ALL
            .iter()
            .filter(|s| self.expected[s.index()])
            .map(|s| match self.frontbuffers.get(*s) {
                Some(frame) => format!("{} #{}", s.display_name(), frame.sequence()),
                None => format!("{} --", s.display_name()),
            })
            .collect();
        if let Some(notice) = &self.notice {
            parts.push(notice.clone());
        }
        parts.push("'p' snapshot | 'h' help | 'q' quit".to_string());
        parts.join(" | ")
    }

    fn save_snapshots(&mut self) {
        let frames = self.frontbuffers.populated();
        if frames.is_empty() {
            self.notice = Some("Nothing to save yet".to_string());
            return;
        }

        match storage::save_snapshots(&frames, &self.transfer, &self.snapshot_dir) {
            Ok(paths) => {
                self.stats.snapshots_saved += paths.len() as u64;
                self.notice = Some(format!(
                    "Saved {} snapshot(s) to {}",
                    paths.len(),
                    self.snapshot_dir.display()
                ));
            }
            Err(e) => {
                error!(error = %e, "Failed to save snapshots");
                self.notice = Some(format!("Error: {}", e));
            }
        }
    }

    /// Stop producers, release every frame and close the window
    fn shutdown(&mut self) {
        info!("Stopping display loop");

        // Closing first releases producers blocked on a full queue
        self.queue.close();
        for handle in &mut self.streams {
            handle.stop();
        }
        let discarded = self.queue.flush();
        self.frontbuffers.clear();
        self.window.close();

        debug!(discarded, "Display loop stopped");
        self.state = LoopState::Stopped;
    }
}

impl<W: Window> Drop for DisplayLoop<W> {
    fn drop(&mut self) {
        if self.state != LoopState::Stopped {
            self.shutdown();
        }
    }
}
