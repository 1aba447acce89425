// SPDX-License-Identifier: MIT
//
// Escape sequences the engine writes to the terminal.
//
// The constants are a compatibility contract: byte-for-byte what gets
// sent, so tests elsewhere can match on them. The helpers write
// parameterized sequences to any `impl Write`.
//
// Positions are 0-indexed in our API and converted to the terminal's
// 1-indexed coordinates here.

use std::io::{self, Write};

pub const ESC: &str = "\x1b";

/// Cursor to the top-left corner.
pub const CURSOR_HOME: &str = "\x1b[H";
/// Cursor to column 0 of the current row.
pub const CURSOR_HOME_COL: &str = "\r";

/// Enter the alternate screen buffer (DEC 1049).
pub const SWITCH_TO_ALTERNATE_BUFFER: &str = "\x1b[?1049h";
/// Leave the alternate screen buffer, restoring the original content.
pub const RESTORE_NORMAL_BUFFER: &str = "\x1b[?1049l";

/// X10 clicks plus button-event (drag) tracking.
pub const MOUSE_TRACKING_ON: &str = "\x1b[?1000h\x1b[?1002h";
pub const MOUSE_TRACKING_OFF: &str = "\x1b[?1002l\x1b[?1000l";

pub const HIDE_CURSOR: &str = "\x1b[?25l";
pub const SHOW_CURSOR: &str = "\x1b[?25h";

/// Load DEC special graphics into G1, reached with [`SO`].
pub const DESIGNATE_G1_SPECIAL: &str = "\x1b)0";
/// Shift out: draw from G1.
pub const SO: &str = "\x0e";
/// Shift in: back to G0.
pub const SI: &str = "\x0f";

/// Insert mode on (IRM).
pub const INSERT_ON: &str = "\x1b[4h";
/// Insert mode off.
pub const INSERT_OFF: &str = "\x1b[4l";

/// Ask the terminal for a status report (`ESC [ 0 n` when fine).
pub const REPORT_STATUS: &str = "\x1b[5n";
/// Ask the terminal where the cursor is (`ESC [ y ; x R`).
pub const REPORT_CURSOR_POSITION: &str = "\x1b[6n";

// ─── Cursor Movement ────────────────────────────────────────────────────────

/// Absolute position (CUP).
#[inline]
pub fn set_cursor_position(w: &mut impl Write, x: u16, y: u16) -> io::Result<()> {
    write!(w, "\x1b[{};{}H", u32::from(y) + 1, u32::from(x) + 1)
}

/// Up `n` rows (CUU). Nothing is written for `n == 0`.
#[inline]
pub fn move_cursor_up(w: &mut impl Write, n: u16) -> io::Result<()> {
    if n == 0 {
        return Ok(());
    }
    write!(w, "\x1b[{n}A")
}

/// Down `n` rows (CUD). Nothing is written for `n == 0`.
#[inline]
pub fn move_cursor_down(w: &mut impl Write, n: u16) -> io::Result<()> {
    if n == 0 {
        return Ok(());
    }
    write!(w, "\x1b[{n}B")
}

/// Right `n` columns (CUF). Nothing is written for `n == 0`.
#[inline]
pub fn move_cursor_right(w: &mut impl Write, n: u16) -> io::Result<()> {
    if n == 0 {
        return Ok(());
    }
    write!(w, "\x1b[{n}C")
}

/// Left `n` columns (CUB). Nothing is written for `n == 0`.
#[inline]
pub fn move_cursor_left(w: &mut impl Write, n: u16) -> io::Result<()> {
    if n == 0 {
        return Ok(());
    }
    write!(w, "\x1b[{n}D")
}

/// Show the cursor at `(x, y)`, or hide it.
pub fn place_cursor(w: &mut impl Write, cursor: Option<(u16, u16)>) -> io::Result<()> {
    match cursor {
        Some((x, y)) => {
            set_cursor_position(w, x, y)?;
            w.write_all(SHOW_CURSOR.as_bytes())
        }
        None => w.write_all(HIDE_CURSOR.as_bytes()),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    /// Helper: run an escape writer and return its output as a string.
    fn emit<F>(f: F) -> String
    where
        F: FnOnce(&mut Vec<u8>) -> io::Result<()>,
    {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn contract_constants() {
        assert_eq!(CURSOR_HOME, "\x1b[H");
        assert_eq!(SWITCH_TO_ALTERNATE_BUFFER, "\x1b[?1049h");
        assert_eq!(MOUSE_TRACKING_ON, "\x1b[?1000h\x1b[?1002h");
        assert_eq!(HIDE_CURSOR, "\x1b[?25l");
        assert_eq!(SHOW_CURSOR, "\x1b[?25h");
        assert_eq!(DESIGNATE_G1_SPECIAL, "\x1b)0");
        assert_eq!(SO.as_bytes(), [0x0e]);
        assert_eq!(SI.as_bytes(), [0x0f]);
    }

    #[test]
    fn cursor_position_is_one_based() {
        assert_eq!(emit(|w| set_cursor_position(w, 0, 0)), "\x1b[1;1H");
        assert_eq!(emit(|w| set_cursor_position(w, 10, 20)), "\x1b[21;11H");
    }

    #[test]
    fn cursor_position_no_overflow() {
        assert_eq!(
            emit(|w| set_cursor_position(w, u16::MAX, u16::MAX)),
            "\x1b[65536;65536H"
        );
    }

    #[test]
    fn relative_moves() {
        assert_eq!(emit(|w| move_cursor_up(w, 3)), "\x1b[3A");
        assert_eq!(emit(|w| move_cursor_down(w, 1)), "\x1b[1B");
        assert_eq!(emit(|w| move_cursor_right(w, 12)), "\x1b[12C");
        assert_eq!(emit(|w| move_cursor_left(w, 2)), "\x1b[2D");
    }

    #[test]
    fn zero_moves_write_nothing() {
        assert_eq!(emit(|w| move_cursor_up(w, 0)), "");
        assert_eq!(emit(|w| move_cursor_down(w, 0)), "");
        assert_eq!(emit(|w| move_cursor_right(w, 0)), "");
        assert_eq!(emit(|w| move_cursor_left(w, 0)), "");
    }

    #[test]
    fn place_or_hide_cursor() {
        assert_eq!(emit(|w| place_cursor(w, Some((4, 2)))), "\x1b[3;5H\x1b[?25h");
        assert_eq!(emit(|w| place_cursor(w, None)), "\x1b[?25l");
    }
}
