// SPDX-License-Identifier: GPL-3.0-only

//! Off-screen window
//!
//! Renders into a [`Canvas`] and keeps the last presented image. It closes
//! itself after a configured number of presents or when an external stop
//! signal (Ctrl+C) is raised, which makes it suitable for batch runs.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

use super::{Canvas, RasterImage, Window, WindowEvent};
use crate::errors::DisplayResult;

pub struct HeadlessWindow {
    title: String,
    back: Canvas,
    front: Canvas,
    presents: u64,
    draw_calls: u64,
    max_presents: Option<u64>,
    stop_signal: Option<Arc<AtomicBool>>,
    pending: VecDeque<WindowEvent>,
    status: String,
    close_requested: bool,
    closed: bool,
}

impl HeadlessWindow {
    pub fn create_window(width: u32, height: u32, title: &str) -> Self {
        info!(width, height, title, "Created headless window");
        Self {
            title: title.to_string(),
            back: Canvas::new(width, height),
            front: Canvas::new(width, height),
            presents: 0,
            draw_calls: 0,
            max_presents: None,
            stop_signal: None,
            pending: VecDeque::new(),
            status: String::new(),
            close_requested: false,
            closed: false,
        }
    }

    /// Request close once `count` images have been presented
    pub fn with_max_presents(mut self, count: u64) -> Self {
        self.max_presents = Some(count);
        self
    }

    /// Request close when `signal` is raised
    pub fn with_stop_signal(mut self, signal: Arc<AtomicBool>) -> Self {
        self.stop_signal = Some(signal);
        self
    }

    /// Queue an event for the next [`poll_events`](Window::poll_events)
    pub fn inject_event(&mut self, event: WindowEvent) {
        self.pending.push_back(event);
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Last presented image
    pub fn front_buffer(&self) -> &Canvas {
        &self.front
    }

    pub fn presents(&self) -> u64 {
        self.presents
    }

    /// Images drawn successfully
    pub fn draw_calls(&self) -> u64 {
        self.draw_calls
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Window for HeadlessWindow {
    fn size(&self) -> (u32, u32) {
        (self.back.width(), self.back.height())
    }

    fn poll_events(&mut self) -> Vec<WindowEvent> {
        let mut events: Vec<WindowEvent> = self.pending.drain(..).collect();

        let limit_reached = self.max_presents.is_some_and(|max| self.presents >= max);
        let interrupted = self
            .stop_signal
            .as_ref()
            .is_some_and(|s| s.load(Ordering::SeqCst));
        if limit_reached || interrupted {
            debug!(limit_reached, interrupted, "Headless window closing");
            events.push(WindowEvent::CloseRequested);
        }

        if events.contains(&WindowEvent::CloseRequested) {
            self.close_requested = true;
        }
        events
    }

    fn should_close(&self) -> bool {
        self.close_requested || self.closed
    }

    fn clear(&mut self) {
        self.back.clear();
    }

    fn draw_pixels(&mut self, image: &RasterImage<'_>) -> DisplayResult<()> {
        self.back.blit(image)?;
        self.draw_calls += 1;
        Ok(())
    }

    fn swap_buffers(&mut self) -> DisplayResult<()> {
        if self.closed {
            return Ok(());
        }
        std::mem::swap(&mut self.front, &mut self.back);
        self.presents += 1;
        Ok(())
    }

    fn set_status(&mut self, message: &str) {
        self.status = message.to_string();
    }

    fn close(&mut self) {
        if !self.closed {
            info!(presents = self.presents, "Headless window closed");
        }
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::Position;
    use crate::media::{DepthTransfer, PixelFormat};

    #[test]
    fn test_closes_after_max_presents() {
        let mut window = HeadlessWindow::create_window(2, 2, "test").with_max_presents(2);
        assert!(window.poll_events().is_empty());
        window.swap_buffers().unwrap();
        window.swap_buffers().unwrap();
        assert_eq!(window.poll_events(), vec![WindowEvent::CloseRequested]);
        assert!(window.should_close());
    }

    #[test]
    fn test_stop_signal_requests_close() {
        let signal = Arc::new(AtomicBool::new(false));
        let mut window =
            HeadlessWindow::create_window(2, 2, "test").with_stop_signal(Arc::clone(&signal));
        assert!(!window.should_close());
        signal.store(true, Ordering::SeqCst);
        assert!(window.poll_events().contains(&WindowEvent::CloseRequested));
    }

    #[test]
    fn test_swap_presents_back_buffer() {
        let mut window = HeadlessWindow::create_window(1, 1, "test");
        let data = [9u8, 8, 7];
        let image = RasterImage {
            position: Position::default(),
            width: 1,
            height: 1,
            stride: 3,
            format: PixelFormat::Rgb8,
            data: &data,
            transfer: DepthTransfer::default(),
        };
        window.clear();
        window.draw_pixels(&image).unwrap();
        assert_eq!(window.front_buffer().pixel(0, 0), (0, 0, 0));
        window.swap_buffers().unwrap();
        assert_eq!(window.front_buffer().pixel(0, 0), (9, 8, 7));
        assert_eq!(window.presents(), 1);
        assert_eq!(window.draw_calls(), 1);
    }

    #[test]
    fn test_closed_window_ignores_presents() {
        let mut window = HeadlessWindow::create_window(1, 1, "test");
        window.close();
        window.swap_buffers().unwrap();
        assert_eq!(window.presents(), 0);
        assert!(window.should_close());
    }

    #[test]
    fn test_injected_events_are_delivered_once() {
        let mut window = HeadlessWindow::create_window(1, 1, "test");
        window.inject_event(WindowEvent::SnapshotRequested);
        assert_eq!(window.poll_events(), vec![WindowEvent::SnapshotRequested]);
        assert!(window.poll_events().is_empty());
    }
}
