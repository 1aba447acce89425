// SPDX-License-Identifier: MIT
//
// Terminal control — raw mode, geometry and panic-safe restore.
//
// Safety: termios (tcgetattr, tcsetattr), ioctl (TIOCGWINSZ), isatty and
// the raw fd write in the panic hook have no safe std equivalent.
#![allow(unsafe_code)]
//
// This module owns the tty's line discipline and nothing else. Display
// sequences (alternate buffer, mouse tracking, cursor visibility) are
// written by the screen in `screen.rs`, so a screen can be driven over
// any writer while the termios work stays here.
//
// The panic hook bypasses the stdout lock and writes a fixed restore
// sequence straight to fd 1, then restores termios from a global backup.
// A panic mid-frame, with the lock held, still leaves a usable shell.

use std::io;
#[cfg(not(unix))]
use std::io::Write;
use std::sync::Once;
#[cfg(unix)]
use std::sync::Mutex;

use tracing::debug;

// ─── Size ───────────────────────────────────────────────────────────────────

/// Terminal dimensions in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    pub cols: u16,
    pub rows: u16,
}

impl Default for Size {
    fn default() -> Self {
        Self { cols: 80, rows: 24 }
    }
}

// ─── Terminal Queries ───────────────────────────────────────────────────────

/// Query the terminal size via `ioctl(TIOCGWINSZ)` on stdout.
///
/// `None` if stdout is not a terminal or reports a zero dimension.
#[cfg(unix)]
#[must_use]
pub fn get_size() -> Option<Size> {
    let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
    let result = unsafe { libc::ioctl(libc::STDOUT_FILENO, libc::TIOCGWINSZ, &raw mut ws) };

    if result == 0 && ws.ws_col > 0 && ws.ws_row > 0 {
        Some(Size {
            cols: ws.ws_col,
            rows: ws.ws_row,
        })
    } else {
        None
    }
}

#[cfg(not(unix))]
#[must_use]
pub fn get_size() -> Option<Size> {
    None
}

/// Whether stdin is a tty.
#[cfg(unix)]
#[must_use]
pub fn is_tty() -> bool {
    unsafe { libc::isatty(libc::STDIN_FILENO) != 0 }
}

#[cfg(not(unix))]
#[must_use]
pub fn is_tty() -> bool {
    false
}

// ─── Panic-Safe Restore ─────────────────────────────────────────────────────

/// Original termios for the panic hook, which cannot reach the [`Terminal`].
#[cfg(unix)]
static TERMIOS_BACKUP: Mutex<Option<libc::termios>> = Mutex::new(None);

#[cfg(unix)]
fn restore_termios_from_backup() {
    if let Ok(guard) = TERMIOS_BACKUP.lock() {
        if let Some(ref original) = *guard {
            unsafe {
                let _ = libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, original);
            }
        }
    }
}

/// Everything a started screen may have changed, undone.
///
/// Plain attributes, G0 charset, mouse off, cursor visible, then the normal
/// buffer last so the shell's content comes back clean.
#[rustfmt::skip]
const EMERGENCY_RESTORE: &[u8] = b"\
    \x1b[0;39;49m\
    \x0f\
    \x1b[?1002l\x1b[?1000l\
    \x1b[?25h\
    \x1b[?1049l";

static PANIC_HOOK_INSTALLED: Once = Once::new();

/// Chain a hook that restores the terminal before the panic message prints.
fn install_panic_hook() {
    PANIC_HOOK_INSTALLED.call_once(|| {
        let original = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            emergency_restore();

            #[cfg(unix)]
            restore_termios_from_backup();

            original(info);
        }));
    });
}

/// Write [`EMERGENCY_RESTORE`] to fd 1 without taking the stdout lock.
fn emergency_restore() {
    #[cfg(unix)]
    unsafe {
        let _ = libc::write(
            libc::STDOUT_FILENO,
            EMERGENCY_RESTORE.as_ptr().cast::<libc::c_void>(),
            EMERGENCY_RESTORE.len(),
        );
    }

    #[cfg(not(unix))]
    {
        let _ = io::stdout().write_all(EMERGENCY_RESTORE);
        let _ = io::stdout().flush();
    }
}

// ─── Terminal ───────────────────────────────────────────────────────────────

/// Raw-mode handle for the controlling tty, restored on drop.
///
/// # Example
///
/// ```no_run
/// use vt_engine::terminal::Terminal;
///
/// let mut term = Terminal::new()?;
/// term.enter()?;
/// // ... start a screen, decode input, render frames ...
/// // Cooked mode comes back on drop.
/// # Ok::<(), std::io::Error>(())
/// ```
pub struct Terminal {
    #[cfg(unix)]
    original_termios: Option<libc::termios>,

    /// Cached; refresh with [`refresh_size`](Self::refresh_size).
    size: Size,

    active: bool,
}

impl Terminal {
    /// Create a handle and query the current size.
    ///
    /// Falls back to 80×24 when the size cannot be determined (tests,
    /// pipes).
    ///
    /// # Errors
    ///
    /// Currently infallible.
    pub fn new() -> io::Result<Self> {
        let size = get_size().unwrap_or_default();

        Ok(Self {
            #[cfg(unix)]
            original_termios: None,
            size,
            active: false,
        })
    }

    #[inline]
    #[must_use]
    pub const fn size(&self) -> Size {
        self.size
    }

    /// Re-query the size after a resize. Keeps the cached value if the
    /// query fails.
    pub fn refresh_size(&mut self) -> Size {
        if let Some(s) = get_size() {
            self.size = s;
        }
        self.size
    }

    #[inline]
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Enter raw mode and install the panic hook.
    ///
    /// Idempotent. A no-op on termios when stdin is not a tty.
    ///
    /// # Errors
    ///
    /// `tcgetattr`/`tcsetattr` failures.
    pub fn enter(&mut self) -> io::Result<()> {
        if self.active {
            return Ok(());
        }

        install_panic_hook();
        self.enable_raw_mode()?;

        self.active = true;
        debug!(cols = self.size.cols, rows = self.size.rows, "terminal raw mode on");
        Ok(())
    }

    /// Restore the original termios. Idempotent.
    ///
    /// # Errors
    ///
    /// `tcsetattr` failures.
    pub fn leave(&mut self) -> io::Result<()> {
        if !self.active {
            return Ok(());
        }

        self.disable_raw_mode()?;
        self.active = false;
        debug!("terminal raw mode off");
        Ok(())
    }

    // ── Raw Mode (termios) ──────────────────────────────────────────

    #[cfg(unix)]
    fn enable_raw_mode(&mut self) -> io::Result<()> {
        if !is_tty() {
            return Ok(());
        }

        let fd = libc::STDIN_FILENO;

        unsafe {
            let mut termios: libc::termios = std::mem::zeroed();
            if libc::tcgetattr(fd, &raw mut termios) != 0 {
                return Err(io::Error::last_os_error());
            }

            self.original_termios = Some(termios);
            if let Ok(mut guard) = TERMIOS_BACKUP.lock() {
                *guard = Some(termios);
            }

            // cfmakeraw, keeping 8-bit input intact for the decoder.
            termios.c_iflag &= !(libc::IGNBRK
                | libc::BRKINT
                | libc::PARMRK
                | libc::ISTRIP
                | libc::INLCR
                | libc::IGNCR
                | libc::ICRNL
                | libc::IXON);
            termios.c_oflag &= !libc::OPOST;
            termios.c_lflag &=
                !(libc::ECHO | libc::ECHONL | libc::ICANON | libc::ISIG | libc::IEXTEN);
            termios.c_cflag &= !(libc::CSIZE | libc::PARENB);
            termios.c_cflag |= libc::CS8;

            termios.c_cc[libc::VMIN] = 1;
            termios.c_cc[libc::VTIME] = 0;

            if libc::tcsetattr(fd, libc::TCSAFLUSH, &raw const termios) != 0 {
                return Err(io::Error::last_os_error());
            }
        }

        Ok(())
    }

    #[cfg(not(unix))]
    fn enable_raw_mode(&mut self) -> io::Result<()> {
        Ok(())
    }

    #[cfg(unix)]
    fn disable_raw_mode(&mut self) -> io::Result<()> {
        if let Some(ref original) = self.original_termios {
            unsafe {
                if libc::tcsetattr(libc::STDIN_FILENO, libc::TCSAFLUSH, original) != 0 {
                    return Err(io::Error::last_os_error());
                }
            }

            if let Ok(mut guard) = TERMIOS_BACKUP.lock() {
                *guard = None;
            }
            self.original_termios = None;
        }

        Ok(())
    }

    #[cfg(not(unix))]
    fn disable_raw_mode(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        if self.active {
            let _ = self.leave();
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::escape;
    use pretty_assertions::assert_eq;

    fn restore_str() -> &'static str {
        std::str::from_utf8(EMERGENCY_RESTORE).unwrap()
    }

    #[test]
    fn size_default_is_vt100() {
        assert_eq!(Size::default(), Size { cols: 80, rows: 24 });
    }

    #[test]
    fn get_size_does_not_panic() {
        let _ = get_size();
        let _ = is_tty();
    }

    #[test]
    fn emergency_restore_leaves_alternate_buffer_last() {
        assert!(restore_str().ends_with(escape::RESTORE_NORMAL_BUFFER));
    }

    #[test]
    fn emergency_restore_undoes_screen_state() {
        let s = restore_str();
        assert!(s.contains(escape::SI));
        assert!(s.contains(escape::MOUSE_TRACKING_OFF));
        assert!(s.contains(escape::SHOW_CURSOR));
        assert!(s.starts_with("\x1b[0;39;49m"));
    }

    #[test]
    fn new_is_inactive_with_nonzero_size() {
        let term = Terminal::new().unwrap();
        assert!(!term.is_active());
        assert!(term.size().cols > 0);
        assert!(term.size().rows > 0);
    }

    // Under a harness without a tty these only cover the bookkeeping.
    #[test]
    fn enter_leave_cycles() {
        let mut term = Terminal::new().unwrap();
        for _ in 0..3 {
            term.enter().unwrap();
            term.enter().unwrap();
            assert!(term.is_active());
            term.leave().unwrap();
            term.leave().unwrap();
            assert!(!term.is_active());
        }
    }

    #[test]
    fn drop_after_enter() {
        let mut term = Terminal::new().unwrap();
        term.enter().unwrap();
        drop(term);
    }

    #[test]
    fn refresh_size_updates_cache() {
        let mut term = Terminal::new().unwrap();
        let s = term.refresh_size();
        assert_eq!(s, term.size());
    }
}
