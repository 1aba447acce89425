// SPDX-License-Identifier: MIT
//
// Canvas — the grid of attributed text runs handed to the renderer.
//
// A row is a list of cells, and each cell is one run of text sharing a
// style and a charset. Runs instead of per-column cells keep rows compact
// and map directly onto the escape stream: one SGR per run, one shift
// byte per charset change.
//
// Whoever paints the canvas owns layout. The renderer only checks that
// every row is exactly as wide as the terminal and refuses the frame
// otherwise.

use crate::color::AttrSpec;
use crate::width::{self, ByteEncoding};

// ─── Charset ────────────────────────────────────────────────────────────────

/// Which character set a run is drawn in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Charset {
    /// Normal text (G0).
    #[default]
    Default,
    /// DEC special graphics, reached by shifting out to G1.
    Special,
}

// ─── Style ──────────────────────────────────────────────────────────────────

/// How a run is colored: a palette name or an inline attribute.
///
/// Names that are not registered render with default colors.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Style {
    /// Look the attribute up in the palette at render time.
    Named(String),
    /// Use this attribute directly.
    Spec(AttrSpec),
}

impl Default for Style {
    fn default() -> Self {
        Self::Spec(AttrSpec::plain())
    }
}

impl From<&str> for Style {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl From<String> for Style {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

impl From<AttrSpec> for Style {
    fn from(spec: AttrSpec) -> Self {
        Self::Spec(spec)
    }
}

// ─── Cell ───────────────────────────────────────────────────────────────────

/// One run of text with a single style and charset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Cell {
    pub style: Style,
    pub charset: Charset,
    pub text: String,
}

impl Cell {
    /// A run in the default charset.
    #[must_use]
    pub fn new(style: impl Into<Style>, text: impl Into<String>) -> Self {
        Self {
            style: style.into(),
            charset: Charset::Default,
            text: text.into(),
        }
    }

    /// A run of DEC special-graphics bytes (`q` for `─`, `x` for `│`, ...).
    #[must_use]
    pub fn special(style: impl Into<Style>, text: impl Into<String>) -> Self {
        Self {
            style: style.into(),
            charset: Charset::Special,
            text: text.into(),
        }
    }

    /// Display width in columns.
    #[inline]
    #[must_use]
    pub fn width(&self) -> usize {
        width::str_width(&self.text)
    }
}

// ─── Row ────────────────────────────────────────────────────────────────────

/// A screen row: runs laid left to right.
pub type Row = Vec<Cell>;

/// Total display width of a row.
#[must_use]
pub fn row_width(row: &[Cell]) -> usize {
    row.iter().map(Cell::width).sum()
}

/// A row that is a single run of whitespace.
///
/// Partial-display rendering leaves such rows alone below the used region
/// so terminal scrollback survives.
#[must_use]
pub fn is_blank_row(row: &[Cell]) -> bool {
    match row {
        [] => true,
        [only] => only.text.chars().all(char::is_whitespace),
        _ => false,
    }
}

/// A row of `cols` spaces in the default style.
#[must_use]
pub fn blank_row(cols: u16) -> Row {
    vec![Cell::new(Style::default(), " ".repeat(usize::from(cols)))]
}

/// Lay `text` out as one row exactly `cols` wide.
///
/// Line-drawing characters move to the DEC special charset. Text past
/// `cols` is cut at a character boundary and the rest is padded with
/// spaces in the same style.
#[must_use]
pub fn text_row(style: impl Into<Style>, text: &str, cols: u16) -> Row {
    let style = style.into();
    let cols = usize::from(cols);
    let (end, _) = width::calc_text_pos(text.as_bytes(), 0, text.len(), cols, ByteEncoding::Utf8);
    let visible = &text[..end];

    let mut row: Row = width::split_dec_special(visible)
        .into_iter()
        .map(|(charset, run)| Cell {
            style: style.clone(),
            charset,
            text: run,
        })
        .collect();

    let pad = cols.saturating_sub(row_width(&row));
    if pad > 0 {
        match row.last_mut() {
            Some(cell) if cell.charset == Charset::Default => cell.text.push_str(&" ".repeat(pad)),
            _ => row.push(Cell::new(style, " ".repeat(pad))),
        }
    }
    row
}

// ─── Canvas ─────────────────────────────────────────────────────────────────

/// A full frame: rows plus where the cursor should be shown.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Canvas {
    rows: Vec<Row>,
    cursor: Option<(u16, u16)>,
}

impl Canvas {
    /// Build a canvas from prepared rows.
    #[must_use]
    pub const fn from_rows(rows: Vec<Row>) -> Self {
        Self { rows, cursor: None }
    }

    /// A blank canvas of `rows` rows, each `cols` spaces wide.
    #[must_use]
    pub fn blank(cols: u16, rows: u16) -> Self {
        Self::from_rows((0..rows).map(|_| blank_row(cols)).collect())
    }

    #[inline]
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Number of rows.
    #[inline]
    #[must_use]
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    #[must_use]
    pub const fn cursor(&self) -> Option<(u16, u16)> {
        self.cursor
    }

    /// Show the cursor at `(x, y)`, or hide it with `None`.
    pub const fn set_cursor(&mut self, cursor: Option<(u16, u16)>) {
        self.cursor = cursor;
    }

    /// Replace row `y`. Returns `false` if `y` is out of range.
    pub fn set_row(&mut self, y: usize, row: Row) -> bool {
        match self.rows.get_mut(y) {
            Some(slot) => {
                *slot = row;
                true
            }
            None => false,
        }
    }

    /// Replace row `y` with `text` laid out `cols` wide.
    pub fn paint_text(&mut self, y: usize, style: impl Into<Style>, text: &str, cols: u16) -> bool {
        self.set_row(y, text_row(style, text, cols))
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
