// SPDX-License-Identifier: MIT
//
// Screen backends — what an application draws through.
//
// `ScreenBackend` is the capability set an application needs: start and
// stop the display, know the size, draw a canvas, register palette
// entries, toggle mouse tracking. `RawScreen` implements it by writing
// escape sequences to any `Write`, which makes the whole display path
// testable against a `Vec<u8>`.
//
// Terminal modes (termios) are not touched here; see `terminal.rs`.

use std::io::{self, Write};

use tracing::debug;

use crate::canvas::Canvas;
use crate::color::AttrSpec;
use crate::error::PaletteError;
use crate::escape;
use crate::palette::Palette;
use crate::render::{DisplayMode, RenderOutcome, Renderer, TerminalProperties};
use crate::resize::ResizeWatch;
use crate::terminal::Size;

// ─── ScreenBackend ───────────────────────────────────────────────────────────

/// A display an application can start, draw on and stop.
pub trait ScreenBackend {
    /// Take over the display.
    ///
    /// # Errors
    ///
    /// Write errors.
    fn start(&mut self) -> io::Result<()>;

    /// Hand the display back.
    ///
    /// # Errors
    ///
    /// Write errors.
    fn stop(&mut self) -> io::Result<()>;

    fn is_started(&self) -> bool;

    /// Current size in columns and rows.
    fn cols_rows(&self) -> Size;

    /// Draw a canvas of exactly [`cols_rows`](Self::cols_rows) size.
    ///
    /// # Errors
    ///
    /// Write errors. Geometry races are [`RenderOutcome::Abandoned`].
    fn draw_screen(&mut self, canvas: &Canvas, watch: &dyn ResizeWatch) -> io::Result<RenderOutcome>;

    /// Force the next draw to repaint everything.
    fn clear(&mut self);

    /// Register a palette entry. See [`Palette::register_entry`].
    ///
    /// # Errors
    ///
    /// Bad descriptors, or [`PaletteError::ScreenActive`] once started.
    fn register_palette_entry(
        &mut self,
        name: &str,
        fg: &str,
        bg: &str,
        mono: Option<&str>,
        fg_high: Option<&str>,
        bg_high: Option<&str>,
    ) -> Result<(), PaletteError>;

    /// Turn mouse reporting on or off.
    ///
    /// # Errors
    ///
    /// Write errors.
    fn set_mouse_tracking(&mut self, enable: bool) -> io::Result<()>;

    fn set_terminal_properties(&mut self, props: TerminalProperties);
}

// ─── RawScreen ───────────────────────────────────────────────────────────────

/// Display options fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenConfig {
    /// Use the alternate buffer (full-screen). Otherwise draw in partial
    /// mode below the cursor.
    pub alternate_buffer: bool,
    /// Enable mouse tracking on start.
    pub mouse: bool,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            alternate_buffer: true,
            mouse: false,
        }
    }
}

/// A report the terminal is asked for. The answer arrives as input:
/// `status ok`, or [`Event::CursorPosition`](crate::input::Event::CursorPosition).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Query {
    Status,
    CursorPosition,
}

impl Query {
    #[must_use]
    pub const fn sequence(self) -> &'static str {
        match self {
            Self::Status => escape::REPORT_STATUS,
            Self::CursorPosition => escape::REPORT_CURSOR_POSITION,
        }
    }
}

/// A screen writing escape sequences to `W`.
pub struct RawScreen<W: Write> {
    renderer: Renderer<W>,
    palette: Palette,
    size: Size,
    config: ScreenConfig,
    started: bool,
    mouse_on: bool,
}

impl<W: Write> RawScreen<W> {
    #[must_use]
    pub fn new(out: W, size: Size, config: ScreenConfig, props: TerminalProperties) -> Self {
        let mode = if config.alternate_buffer {
            DisplayMode::Full
        } else {
            DisplayMode::Partial
        };
        Self {
            renderer: Renderer::new(out, mode, props),
            palette: Palette::new(),
            size,
            config,
            started: false,
            mouse_on: false,
        }
    }

    #[inline]
    #[must_use]
    pub const fn palette(&self) -> &Palette {
        &self.palette
    }

    #[inline]
    #[must_use]
    pub const fn renderer(&self) -> &Renderer<W> {
        &self.renderer
    }

    #[inline]
    #[must_use]
    pub const fn config(&self) -> ScreenConfig {
        self.config
    }

    /// Adopt a new size after a resize. The next draw repaints everything.
    pub fn set_size(&mut self, size: Size) {
        if size != self.size {
            debug!(cols = size.cols, rows = size.rows, "screen resized");
        }
        self.size = size;
        self.renderer.clear();
    }

    /// Write raw bytes outside a frame (status queries and the like).
    ///
    /// # Errors
    ///
    /// Write errors.
    pub fn write_raw(&mut self, s: &str) -> io::Result<()> {
        let w = self.renderer.writer_mut();
        w.write_all(s.as_bytes())?;
        w.flush()
    }

    /// Ask the terminal for a report.
    ///
    /// # Errors
    ///
    /// Write errors.
    pub fn query(&mut self, query: Query) -> io::Result<()> {
        debug!(?query, "terminal query");
        self.write_raw(query.sequence())
    }

    #[must_use]
    pub fn into_inner(self) -> W {
        self.renderer.into_inner()
    }
}

impl<W: Write> ScreenBackend for RawScreen<W> {
    fn start(&mut self) -> io::Result<()> {
        if self.started {
            return Ok(());
        }
        let mode = self.renderer.mode();
        self.renderer.set_mode(mode);
        if self.config.alternate_buffer {
            self.write_raw(escape::SWITCH_TO_ALTERNATE_BUFFER)?;
        }
        self.started = true;
        if self.config.mouse {
            self.set_mouse_tracking(true)?;
        }
        debug!(
            alternate_buffer = self.config.alternate_buffer,
            mouse = self.config.mouse,
            "screen started"
        );
        Ok(())
    }

    fn stop(&mut self) -> io::Result<()> {
        if !self.started {
            return Ok(());
        }
        let reset = AttrSpec::plain().to_escape(self.renderer.properties().bright_is_bold);
        self.write_raw(&reset)?;
        self.write_raw(escape::SI)?;
        if self.config.alternate_buffer {
            self.write_raw(escape::RESTORE_NORMAL_BUFFER)?;
        } else {
            self.renderer.park_below()?;
        }
        self.write_raw(escape::SHOW_CURSOR)?;
        self.set_mouse_tracking(false)?;
        self.renderer.clear();
        self.started = false;
        debug!("screen stopped");
        Ok(())
    }

    fn is_started(&self) -> bool {
        self.started
    }

    fn cols_rows(&self) -> Size {
        self.size
    }

    fn draw_screen(&mut self, canvas: &Canvas, watch: &dyn ResizeWatch) -> io::Result<RenderOutcome> {
        self.renderer.render(self.size, canvas, &self.palette, watch)
    }

    fn clear(&mut self) {
        self.renderer.clear();
    }

    fn register_palette_entry(
        &mut self,
        name: &str,
        fg: &str,
        bg: &str,
        mono: Option<&str>,
        fg_high: Option<&str>,
        bg_high: Option<&str>,
    ) -> Result<(), PaletteError> {
        if self.started {
            return Err(PaletteError::ScreenActive);
        }
        self.palette.register_entry(name, fg, bg, mono, fg_high, bg_high)
    }

    fn set_mouse_tracking(&mut self, enable: bool) -> io::Result<()> {
        if enable == self.mouse_on {
            return Ok(());
        }
        self.write_raw(if enable {
            escape::MOUSE_TRACKING_ON
        } else {
            escape::MOUSE_TRACKING_OFF
        })?;
        self.mouse_on = enable;
        Ok(())
    }

    fn set_terminal_properties(&mut self, props: TerminalProperties) {
        self.renderer.set_properties(props);
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
