// SPDX-License-Identifier: MIT
//
// Incremental renderer — canvas in, minimal escape stream out.
//
// Each call compares the new canvas against the previous frame row by
// row and redraws only rows that differ. A redrawn row is written as its
// runs in order: one SGR when the attribute changes, one SO/SI when the
// charset changes, then the text.
//
// # Staging
//
// The frame is composed into an OutputBuffer and only written once it is
// complete. If the terminal resizes while composing, the staged bytes are
// dropped and the render state is left exactly as it was, so the next
// attempt (at the new size) starts from a consistent picture.
//
// # The last row
//
// Writing the bottom-right cell of the screen makes many terminals wrap
// or scroll. On the last row of a full-screen frame the renderer writes
// everything except the second-to-last character Y, with the final
// character Z in Y's place, backs up over Z, and inserts Y in insert
// mode. Z slides into the corner without the cursor ever reaching it:
//
//   written:  XXXXXXXXXXXZ_      then ESC[4h Y ESC[4l
//   result:   XXXXXXXXXXXYZ
//
// # Partial display
//
// In partial mode the engine owns only some rows starting at the line
// the cursor was on when it started. Absolute addressing is useless
// there, so rows are reached with `\b\r` plus relative up/down moves.
// Blank rows below the lowest row drawn so far are skipped, leaving
// whatever is in the terminal there untouched.

use std::io::{self, Write};

use tracing::debug;

use crate::canvas::{self, Canvas, Cell, Charset, Row};
use crate::color::{AttrSpec, Depth, Settings};
use crate::escape;
use crate::output::OutputBuffer;
use crate::palette::Palette;
use crate::resize::ResizeWatch;
use crate::terminal::Size;
use crate::width::{self, ByteEncoding};

// ─── Configuration ───────────────────────────────────────────────────────────

/// What the terminal can display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalProperties {
    /// Palette depth used to pick entry variants.
    pub colors: Depth,
    /// Draw bright foregrounds as bold + base color.
    pub bright_is_bold: bool,
    /// Whether underline is shown. Dropped from every SGR when `false`.
    pub has_underline: bool,
}

impl Default for TerminalProperties {
    fn default() -> Self {
        Self {
            colors: Depth::Basic,
            bright_is_bold: false,
            has_underline: true,
        }
    }
}

impl TerminalProperties {
    /// Guess from `TERM` and `COLORTERM`.
    #[must_use]
    pub fn detect() -> Self {
        let term = std::env::var("TERM").ok();
        let colorterm = std::env::var("COLORTERM").ok();
        Self::from_env(term.as_deref(), colorterm.as_deref())
    }

    /// [`detect`](Self::detect) with the variables passed in.
    #[must_use]
    pub fn from_env(term: Option<&str>, colorterm: Option<&str>) -> Self {
        let term = term.unwrap_or("");
        let truecolor = matches!(colorterm, Some("truecolor" | "24bit"));
        let colors = if term.contains("256color") || truecolor {
            Depth::High256
        } else if term.contains("88color") {
            Depth::High88
        } else if term.is_empty() || term == "dumb" {
            Depth::Mono
        } else {
            Depth::Basic
        };
        Self {
            colors,
            bright_is_bold: term != "xterm" && !term.starts_with("xterm-"),
            has_underline: !term.starts_with("linux"),
        }
    }
}

/// Which part of the terminal the renderer owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayMode {
    /// The whole screen, addressed absolutely.
    #[default]
    Full,
    /// Rows from the starting cursor line down, addressed relatively.
    Partial,
}

// ─── Outcome ─────────────────────────────────────────────────────────────────

/// Counters for one committed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderStats {
    /// Rows written.
    pub rows_rendered: usize,
    /// Rows left alone (unchanged, or blank below the used region).
    pub rows_skipped: usize,
    /// Bytes written to the terminal.
    pub bytes: usize,
}

/// Result of [`Renderer::render`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    Drawn(RenderStats),
    /// Geometry did not match or a resize arrived; nothing was written.
    Abandoned,
}

// ─── State ───────────────────────────────────────────────────────────────────

/// What the terminal is known to show after the last committed frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct RenderState {
    previous: Option<Vec<Row>>,
    cursor: Option<(u16, u16)>,
    /// Row the real cursor is on (partial mode positioning).
    current_row: usize,
    /// G1 is active (SO sent, no SI since).
    shifted: bool,
    /// Lowest row drawn so far in partial mode; `None` before any.
    rows_used: Option<usize>,
    /// `ESC ) 0` has been sent.
    g1_designated: bool,
}

// ─── Composer ────────────────────────────────────────────────────────────────

/// Writes one frame into the staging buffer against a copy of the state.
struct Composer<'a> {
    out: &'a mut OutputBuffer,
    palette: &'a Palette,
    props: TerminalProperties,
    partial: bool,
    current_row: usize,
    shifted: bool,
}

/// A last row split for the insert trick.
#[derive(Debug, PartialEq, Eq)]
struct LastRow {
    /// The row without Y, with Z moved into Y's columns.
    row: Row,
    /// Backspaces from the end of `row` to Y's column.
    back: usize,
    /// Y, to be inserted.
    insert: Cell,
}

impl Composer<'_> {
    fn attr_for(&self, cell: &Cell) -> AttrSpec {
        let attr = self.palette.resolve(&cell.style, self.props.colors);
        if self.props.has_underline {
            attr
        } else {
            attr.without(Settings::UNDERLINE)
        }
    }

    fn set_attr(&mut self, attr: AttrSpec) {
        self.out.push_str(&attr.to_escape(self.props.bright_is_bold));
    }

    fn shift_to(&mut self, charset: Charset) {
        match (charset, self.shifted) {
            (Charset::Special, false) => {
                self.out.push_str(escape::SO);
                self.shifted = true;
            }
            (Charset::Default, true) => {
                self.out.push_str(escape::SI);
                self.shifted = false;
            }
            _ => {}
        }
    }

    fn push_text(&mut self, text: &str) {
        for ch in text.chars() {
            self.out.push_char(if ch < ' ' { '?' } else { ch });
        }
    }

    /// Move to column `x` of row `y`.
    fn move_to(&mut self, x: u16, y: usize) -> io::Result<()> {
        if self.partial {
            self.out.push_str("\x08");
            self.out.push_str(escape::CURSOR_HOME_COL);
            if y < self.current_row {
                escape::move_cursor_up(&mut *self.out, to_u16(self.current_row - y))?;
            } else {
                escape::move_cursor_down(&mut *self.out, to_u16(y - self.current_row))?;
            }
            escape::move_cursor_right(&mut *self.out, x)?;
        } else {
            escape::set_cursor_position(&mut *self.out, x, to_u16(y))?;
        }
        self.current_row = y;
        Ok(())
    }

    fn write_runs(&mut self, row: &[Cell]) {
        let mut last: Option<AttrSpec> = None;
        for cell in row {
            let attr = self.attr_for(cell);
            if last != Some(attr) {
                self.set_attr(attr);
                last = Some(attr);
            }
            self.shift_to(cell.charset);
            self.push_text(&cell.text);
        }
    }

    fn write_last_row(&mut self, last: &LastRow) {
        self.write_runs(&last.row);
        for _ in 0..last.back {
            self.out.push_str("\x08");
        }
        let attr = self.attr_for(&last.insert);
        self.set_attr(attr);
        self.shift_to(last.insert.charset);
        self.out.push_str(escape::INSERT_ON);
        self.push_text(&last.insert.text);
        self.out.push_str(escape::INSERT_OFF);
    }

    fn place_cursor(&mut self, cursor: Option<(u16, u16)>) -> io::Result<()> {
        match cursor {
            Some((x, y)) if self.partial => {
                self.move_to(x, usize::from(y))?;
                self.out.push_str(escape::SHOW_CURSOR);
                Ok(())
            }
            Some((x, y)) => {
                self.current_row = usize::from(y);
                escape::place_cursor(&mut *self.out, Some((x, y)))
            }
            None => escape::place_cursor(&mut *self.out, None),
        }
    }
}

#[inline]
fn to_u16(n: usize) -> u16 {
    u16::try_from(n).unwrap_or(u16::MAX)
}

/// Split a full-width last row into the shortened row and the cell to
/// insert. `None` when the row has no second-to-last character to move.
///
/// The shortened row ends with Z written in Y's columns, so the cursor
/// backs up by Z's width to land on Y's column before the insert.
fn split_last_row(row: &[Cell]) -> Option<LastRow> {
    let (last, init) = row.split_last()?;
    let text = last.text.as_bytes();
    let last_cols = width::str_width(&last.text);
    let (z_offs, z_col) =
        width::calc_text_pos(text, 0, text.len(), last_cols.checked_sub(1)?, ByteEncoding::Utf8);
    let back = last_cols - z_col;

    let mut shortened: Row = init.to_vec();
    let y_cell = if z_offs == 0 {
        // Z is the whole last run: Y ends the run before it.
        let prev = shortened.pop()?;
        let prev_cols = width::str_width(&prev.text);
        let ptext = prev.text.as_bytes();
        let (y_offs, _) = width::calc_text_pos(
            ptext,
            0,
            ptext.len(),
            prev_cols.checked_sub(1)?,
            ByteEncoding::Utf8,
        );
        if y_offs > 0 {
            shortened.push(Cell {
                text: prev.text[..y_offs].to_string(),
                ..prev.clone()
            });
        }
        Cell {
            text: prev.text[y_offs..].to_string(),
            ..prev
        }
    } else {
        let head_cols = width::str_width(&last.text[..z_offs]);
        let (y_offs, _) =
            width::calc_text_pos(text, 0, z_offs, head_cols.checked_sub(1)?, ByteEncoding::Utf8);
        if y_offs > 0 {
            shortened.push(Cell {
                text: last.text[..y_offs].to_string(),
                ..last.clone()
            });
        }
        Cell {
            text: last.text[y_offs..z_offs].to_string(),
            ..last.clone()
        }
    };

    if y_cell.text.is_empty() || back == 0 {
        return None;
    }
    shortened.push(Cell {
        text: last.text[z_offs..].to_string(),
        ..last.clone()
    });
    Some(LastRow {
        row: shortened,
        back,
        insert: y_cell,
    })
}

// ─── Renderer ────────────────────────────────────────────────────────────────

/// Per-terminal renderer writing to `W`.
pub struct Renderer<W: Write> {
    out: W,
    stage: OutputBuffer,
    state: RenderState,
    mode: DisplayMode,
    props: TerminalProperties,
    last_stats: RenderStats,
}

impl<W: Write> Renderer<W> {
    #[must_use]
    pub fn new(out: W, mode: DisplayMode, props: TerminalProperties) -> Self {
        Self {
            out,
            stage: OutputBuffer::new(),
            state: RenderState::default(),
            mode,
            props,
            last_stats: RenderStats::default(),
        }
    }

    #[inline]
    #[must_use]
    pub const fn mode(&self) -> DisplayMode {
        self.mode
    }

    /// Switch mode. The next frame is a full repaint.
    pub fn set_mode(&mut self, mode: DisplayMode) {
        self.mode = mode;
        self.state = RenderState::default();
    }

    #[inline]
    #[must_use]
    pub const fn properties(&self) -> TerminalProperties {
        self.props
    }

    /// Change terminal properties. The next frame is a full repaint.
    pub fn set_properties(&mut self, props: TerminalProperties) {
        self.props = props;
        self.clear();
    }

    /// Forget the previous frame so the next render redraws every row.
    pub fn clear(&mut self) {
        self.state.previous = None;
        self.state.cursor = None;
        self.state.g1_designated = false;
    }

    /// Counters from the last committed frame.
    #[inline]
    #[must_use]
    pub const fn last_stats(&self) -> RenderStats {
        self.last_stats
    }

    /// Whether G1 is currently shifted in on the terminal.
    #[inline]
    #[must_use]
    pub const fn charset_shifted(&self) -> bool {
        self.state.shifted
    }

    /// The writer, for sequences outside frames (start/stop).
    #[inline]
    pub const fn writer_mut(&mut self) -> &mut W {
        &mut self.out
    }

    #[inline]
    #[must_use]
    pub const fn writer(&self) -> &W {
        &self.out
    }

    #[must_use]
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Partial mode: put the cursor at column 0 of the row below the used
    /// region, so the shell prompt lands after the output. No-op in full
    /// mode.
    ///
    /// # Errors
    ///
    /// Write errors from the underlying writer.
    pub fn park_below(&mut self) -> io::Result<()> {
        if self.mode != DisplayMode::Partial || self.state.previous.is_none() {
            return Ok(());
        }
        self.stage.clear();
        self.stage.push_str("\x08");
        self.stage.push_str(escape::CURSOR_HOME_COL);
        let used = self.state.rows_used.unwrap_or(0);
        let down = used.saturating_sub(self.state.current_row);
        escape::move_cursor_down(&mut self.stage, to_u16(down))?;
        self.stage.push_str("\r\n");
        self.stage.flush_to(&mut self.out)?;
        self.state.current_row = used + 1;
        Ok(())
    }

    /// Draw `canvas` on a terminal of `size`.
    ///
    /// Rows equal to the previous frame's are skipped. If nothing changed,
    /// nothing is written.
    ///
    /// # Errors
    ///
    /// Write errors from the underlying writer. `Interrupted` is retried.
    pub fn render(
        &mut self,
        size: Size,
        canvas: &Canvas,
        palette: &Palette,
        watch: &(impl ResizeWatch + ?Sized),
    ) -> io::Result<RenderOutcome> {
        let rows = canvas.rows();
        if rows.len() != usize::from(size.rows) {
            debug!(
                canvas_rows = rows.len(),
                rows = size.rows,
                "frame abandoned: row count mismatch"
            );
            return Ok(RenderOutcome::Abandoned);
        }
        let cols = usize::from(size.cols);
        if let Some(y) = rows.iter().position(|row| canvas::row_width(row) > cols) {
            debug!(row = y, cols, "frame abandoned: row wider than terminal");
            return Ok(RenderOutcome::Abandoned);
        }

        self.stage.clear();
        let partial = self.mode == DisplayMode::Partial;
        let previous = self.state.previous.as_deref().unwrap_or(&[]);
        let mut rows_used = self.state.rows_used;
        let mut stats = RenderStats::default();

        let mut composer = Composer {
            out: &mut self.stage,
            palette,
            props: self.props,
            partial,
            current_row: self.state.current_row,
            shifted: self.state.shifted,
        };

        if !self.state.g1_designated {
            composer.out.push_str(escape::DESIGNATE_G1_SPECIAL);
        }

        for (y, row) in rows.iter().enumerate() {
            if watch.resize_pending() {
                composer.out.clear();
                debug!(row = y, "frame abandoned: resized while composing");
                return Ok(RenderOutcome::Abandoned);
            }

            if partial && rows_used.is_none_or(|used| y > used) {
                if canvas::is_blank_row(row) {
                    stats.rows_skipped += 1;
                    continue;
                }
                rows_used = Some(y);
            }
            if previous.get(y) == Some(row) {
                stats.rows_skipped += 1;
                continue;
            }

            composer.move_to(0, y)?;
            let bottom = !partial && y + 1 == rows.len() && cols > 1 && canvas::row_width(row) == cols;
            match bottom.then(|| split_last_row(row)).flatten() {
                Some(last) => composer.write_last_row(&last),
                None => composer.write_runs(row),
            }
            stats.rows_rendered += 1;
        }

        let cursor = canvas.cursor();
        if stats.rows_rendered > 0 || cursor != self.state.cursor {
            composer.place_cursor(cursor)?;
        }
        let current_row = composer.current_row;
        let shifted = composer.shifted;

        if watch.resize_pending() {
            self.stage.clear();
            debug!("frame abandoned: resized before flush");
            return Ok(RenderOutcome::Abandoned);
        }

        stats.bytes = self.stage.len();
        self.stage.flush_to(&mut self.out)?;

        self.state = RenderState {
            previous: Some(rows.to_vec()),
            cursor,
            current_row,
            shifted,
            rows_used,
            g1_designated: true,
        };
        self.last_stats = stats;
        Ok(RenderOutcome::Drawn(stats))
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
