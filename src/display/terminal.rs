// SPDX-License-Identifier: GPL-3.0-only

//! Terminal window
//!
//! Renders the window canvas to the terminal using Unicode half-block
//! characters for improved vertical resolution, with a one-line status bar
//! at the bottom.

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{
        EnterAlternateScreen, LeaveAlternateScreen, SetTitle, disable_raw_mode, enable_raw_mode,
    },
};
use ratatui::{
    Terminal, backend::CrosstermBackend, buffer::Buffer, layout::Rect, style::Color,
    widgets::Widget,
};
use std::io::{self, Stdout, stdout};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{Canvas, RasterImage, Window, WindowEvent};
use crate::constants::keys;
use crate::errors::DisplayResult;

pub struct TerminalWindow {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    back: Canvas,
    front: Canvas,
    presented: bool,
    status: String,
    close_requested: bool,
    closed: bool,
}

impl TerminalWindow {
    /// Switch the terminal to raw mode on the alternate screen
    ///
    /// `width` x `height` is the logical pixel size images are laid out in;
    /// it is scaled to fit the terminal on every present.
    pub fn create_window(width: u32, height: u32, title: &str) -> DisplayResult<Self> {
        enable_raw_mode()?;
        let mut stdout = stdout();
        if let Err(e) = execute!(stdout, EnterAlternateScreen, SetTitle(title)) {
            let _ = disable_raw_mode();
            return Err(e.into());
        }
        let backend = CrosstermBackend::new(stdout);
        let terminal = match Terminal::new(backend) {
            Ok(t) => t,
            Err(e) => {
                let _ = disable_raw_mode();
                let _ = execute!(io::stdout(), LeaveAlternateScreen);
                return Err(e.into());
            }
        };

        info!(width, height, title, "Created terminal window");

        Ok(Self {
            terminal,
            back: Canvas::new(width, height),
            front: Canvas::new(width, height),
            presented: false,
            status: String::new(),
            close_requested: false,
            closed: false,
        })
    }

    fn restore(&mut self) -> io::Result<()> {
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()
    }

    fn render(&mut self) -> io::Result<()> {
        let widget = CanvasWidget {
            canvas: self.presented.then_some(&self.front),
        };
        let status = StatusBar {
            message: &self.status,
        };

        self.terminal.draw(|f| {
            let area = f.area();

            // Reserve bottom line for status
            let canvas_area = Rect {
                x: area.x,
                y: area.y,
                width: area.width,
                height: area.height.saturating_sub(1),
            };
            f.render_widget(widget, canvas_area);

            let status_area = Rect {
                x: area.x,
                y: area.height.saturating_sub(1),
                width: area.width,
                height: 1,
            };
            f.render_widget(status, status_area);
        })?;
        Ok(())
    }
}

impl Window for TerminalWindow {
    fn size(&self) -> (u32, u32) {
        (self.back.width(), self.back.height())
    }

    fn poll_events(&mut self) -> Vec<WindowEvent> {
        let mut events = Vec::new();

        loop {
            match event::poll(Duration::ZERO) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    warn!(error = %e, "Terminal input failed, closing");
                    events.push(WindowEvent::CloseRequested);
                    break;
                }
            }

            let key = match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => key,
                Ok(_) => continue,
                Err(e) => {
                    warn!(error = %e, "Terminal input failed, closing");
                    events.push(WindowEvent::CloseRequested);
                    break;
                }
            };

            let event = match key.code {
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    Some(WindowEvent::CloseRequested)
                }
                KeyCode::Esc => Some(WindowEvent::CloseRequested),
                KeyCode::Char(keys::QUIT) => Some(WindowEvent::CloseRequested),
                KeyCode::Char(keys::SNAPSHOT) => Some(WindowEvent::SnapshotRequested),
                KeyCode::Char(keys::HELP) => Some(WindowEvent::ToggleHelp),
                _ => None,
            };
            if let Some(event) = event {
                debug!(?event, "Key event");
                events.push(event);
            }
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
        Ok(())
    }

    fn swap_buffers(&mut self) -> DisplayResult<()> {
        if self.closed {
            return Ok(());
        }
        std::mem::swap(&mut self.front, &mut self.back);
        self.presented = true;
        self.render()?;
        Ok(())
    }

    fn set_status(&mut self, message: &str) {
        self.status = message.to_string();
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.restore() {
            warn!(error = %e, "Failed to restore terminal");
        }
        info!("Terminal window closed");
    }
}

impl Drop for TerminalWindow {
    fn drop(&mut self) {
        self.close();
    }
}

/// Widget that renders a canvas using half-block characters
struct CanvasWidget<'a> {
    canvas: Option<&'a Canvas>,
}

impl Widget for CanvasWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let Some(canvas) = self.canvas.filter(|c| c.width() > 0 && c.height() > 0) else {
            // Nothing presented yet
            let msg = "Waiting for frames...";
            let x = area.x + (area.width.saturating_sub(msg.len() as u16)) / 2;
            let y = area.y + area.height / 2;
            if y < area.y + area.height && x < area.x + area.width {
                buf.set_string(x, y, msg, ratatui::style::Style::default());
            }
            return;
        };

        // Each terminal cell displays 2 vertical pixels
        let aspect = canvas.width() as f64 / canvas.height() as f64;
        let term_width = area.width as f64;
        let term_height = (area.height * 2) as f64;

        let (display_width, display_height) = if term_width / term_height > aspect {
            let h = term_height;
            let w = h * aspect;
            (w as u16, (h / 2.0) as u16)
        } else {
            let w = term_width;
            let h = w / aspect;
            (w as u16, (h / 2.0) as u16)
        };
        if display_width == 0 || display_height == 0 {
            return;
        }

        let x_offset = area.x + (area.width.saturating_sub(display_width)) / 2;
        let y_offset = area.y + (area.height.saturating_sub(display_height)) / 2;

        let x_scale = canvas.width() as f64 / display_width as f64;
        let y_scale = canvas.height() as f64 / (display_height * 2) as f64;

        // Upper half (▀) colored with fg, lower half with bg
        for ty in 0..display_height {
            for tx in 0..display_width {
                let term_x = x_offset + tx;
                let term_y = y_offset + ty;
                if term_x >= area.x + area.width || term_y >= area.y + area.height {
                    continue;
                }

                let src_x = (tx as f64 * x_scale) as u32;
                let src_y_top = (ty as f64 * 2.0 * y_scale) as u32;
                let src_y_bottom = ((ty as f64 * 2.0 + 1.0) * y_scale) as u32;

                let (r, g, b) = canvas.pixel(src_x, src_y_top);
                let top = Color::Rgb(r, g, b);
                let (r, g, b) = canvas.pixel(src_x, src_y_bottom);
                let bottom = Color::Rgb(r, g, b);

                if let Some(cell) = buf.cell_mut((term_x, term_y)) {
                    cell.set_char('▀');
                    cell.set_fg(top);
                    cell.set_bg(bottom);
                }
            }
        }
    }
}

/// Status bar widget
struct StatusBar<'a> {
    message: &'a str,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        for x in area.x..area.x + area.width {
            if let Some(cell) = buf.cell_mut((x, area.y)) {
                cell.set_char(' ');
                cell.set_bg(Color::DarkGray);
            }
        }

        let text: String = self.message.chars().take(area.width as usize).collect();
        buf.set_string(
            area.x,
            area.y,
            text,
            ratatui::style::Style::default()
                .fg(Color::White)
                .bg(Color::DarkGray),
        );
    }
}
