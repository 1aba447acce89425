// SPDX-License-Identifier: MIT
#![allow(unsafe_code)]
//
// Resize notification — SIGWINCH over a self-pipe.
//
// The signal handler does two things and nothing else: it sets an atomic
// flag and writes one byte to a non-blocking pipe. Both are
// async-signal-safe. The byte wakes whoever is blocked in `poll()` on the
// pipe's read end; the flag lets code that is not polling (the renderer,
// mid-frame) notice that its geometry is stale.
//
// Everything else (draining the pipe, re-querying the size, throwing the
// previous frame away) happens on the normal path, after `take()`.

use std::sync::atomic::{AtomicBool, Ordering};
#[cfg(unix)]
use std::sync::atomic::AtomicI32;

#[cfg(unix)]
use std::io;

#[cfg(unix)]
use crate::poll::set_nonblocking_cloexec;

// ─── ResizeWatch ─────────────────────────────────────────────────────────────

/// Something the renderer can ask "has the terminal resized?" mid-frame.
///
/// Implementations must only peek: the resize is consumed later by the
/// event loop.
pub trait ResizeWatch {
    fn resize_pending(&self) -> bool;
}

impl<F: Fn() -> bool> ResizeWatch for F {
    #[inline]
    fn resize_pending(&self) -> bool {
        self()
    }
}

/// A watch that never fires. For renderers without a terminal behind them.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoResize;

impl ResizeWatch for NoResize {
    #[inline]
    fn resize_pending(&self) -> bool {
        false
    }
}

// ─── Signal State ────────────────────────────────────────────────────────────

/// Set by the handler, cleared by [`ResizeNotifier::take`].
static RESIZED: AtomicBool = AtomicBool::new(false);

/// Write end of the self-pipe, -1 when no notifier is installed.
#[cfg(unix)]
static WRITE_FD: AtomicI32 = AtomicI32::new(-1);

/// Only one notifier may own the handler at a time.
static INSTALLED: AtomicBool = AtomicBool::new(false);

#[cfg(unix)]
extern "C" fn sigwinch_handler(_sig: libc::c_int) {
    RESIZED.store(true, Ordering::Relaxed);
    let fd = WRITE_FD.load(Ordering::Relaxed);
    if fd >= 0 {
        let byte = 1u8;
        // A full pipe already holds a wakeup; dropping this one is fine.
        unsafe {
            let _ = libc::write(fd, (&raw const byte).cast::<libc::c_void>(), 1);
        }
    }
}

// ─── ResizeNotifier ──────────────────────────────────────────────────────────

/// Owner of the SIGWINCH handler and its self-pipe.
///
/// The previous handler is restored and the pipe closed on drop.
#[cfg(unix)]
pub struct ResizeNotifier {
    read_fd: libc::c_int,
    write_fd: libc::c_int,
    previous: libc::sigaction,
}

#[cfg(unix)]
impl ResizeNotifier {
    /// Create the pipe and install the handler.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` if another notifier is live, or the OS error from
    /// `pipe`, `fcntl` or `sigaction`.
    pub fn install() -> io::Result<Self> {
        if INSTALLED
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "resize notifier already installed",
            ));
        }

        Self::install_inner().inspect_err(|_| INSTALLED.store(false, Ordering::Release))
    }

    fn install_inner() -> io::Result<Self> {
        let mut fds = [0 as libc::c_int; 2];
        if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
            return Err(io::Error::last_os_error());
        }
        let [read_fd, write_fd] = fds;
        let close_both = || unsafe {
            libc::close(read_fd);
            libc::close(write_fd);
        };

        if let Err(e) = set_nonblocking_cloexec(read_fd).and_then(|()| set_nonblocking_cloexec(write_fd)) {
            close_both();
            return Err(e);
        }

        RESIZED.store(false, Ordering::Relaxed);
        WRITE_FD.store(write_fd, Ordering::Relaxed);

        let mut previous: libc::sigaction = unsafe { std::mem::zeroed() };
        let installed = unsafe {
            let mut sa: libc::sigaction = std::mem::zeroed();
            sa.sa_sigaction = sigwinch_handler as *const () as usize;
            sa.sa_flags = libc::SA_RESTART;
            libc::sigemptyset(&raw mut sa.sa_mask);
            libc::sigaction(libc::SIGWINCH, &raw const sa, &raw mut previous)
        };
        if installed != 0 {
            let err = io::Error::last_os_error();
            WRITE_FD.store(-1, Ordering::Relaxed);
            close_both();
            return Err(err);
        }

        Ok(Self {
            read_fd,
            write_fd,
            previous,
        })
    }

    /// The descriptor to `poll()` for readability.
    #[inline]
    #[must_use]
    pub const fn fd(&self) -> libc::c_int {
        self.read_fd
    }

    /// Whether a resize arrived since the last [`take`](Self::take).
    #[inline]
    #[must_use]
    pub fn pending(&self) -> bool {
        RESIZED.load(Ordering::Relaxed)
    }

    /// Drain the pipe and consume the flag.
    ///
    /// Returns `true` if at least one resize arrived. Several signals
    /// between calls collapse into one.
    pub fn take(&self) -> bool {
        let mut buf = [0u8; 64];
        loop {
            let n = unsafe { libc::read(self.read_fd, buf.as_mut_ptr().cast(), buf.len()) };
            if n > 0 {
                continue;
            }
            if n < 0 && io::Error::last_os_error().kind() == io::ErrorKind::Interrupted {
                continue;
            }
            // EOF or EAGAIN: drained.
            break;
        }
        RESIZED.swap(false, Ordering::Relaxed)
    }

    /// Mark a resize as if the signal had arrived. Used by tests and by
    /// callers that learn about geometry changes some other way.
    pub fn notify(&self) {
        RESIZED.store(true, Ordering::Relaxed);
        let byte = 1u8;
        unsafe {
            let _ = libc::write(self.write_fd, (&raw const byte).cast::<libc::c_void>(), 1);
        }
    }
}

#[cfg(unix)]
impl ResizeWatch for ResizeNotifier {
    #[inline]
    fn resize_pending(&self) -> bool {
        self.pending()
    }
}

#[cfg(unix)]
impl Drop for ResizeNotifier {
    fn drop(&mut self) {
        unsafe {
            libc::sigaction(libc::SIGWINCH, &raw const self.previous, std::ptr::null_mut());
        }
        WRITE_FD.store(-1, Ordering::Relaxed);
        unsafe {
            libc::close(self.read_fd);
            libc::close(self.write_fd);
        }
        RESIZED.store(false, Ordering::Relaxed);
        INSTALLED.store(false, Ordering::Release);
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// The notifier is process-global; tests take turns.
    static SERIAL: Mutex<()> = Mutex::new(());

    fn readable(fd: libc::c_int) -> bool {
        let mut pfd = libc::pollfd {
            fd,
            events: libc::POLLIN,
            revents: 0,
        };
        unsafe { libc::poll(&raw mut pfd, 1, 0) > 0 }
    }

    #[test]
    fn closure_and_unit_watches() {
        assert!((|| true).resize_pending());
        assert!(!NoResize.resize_pending());
    }

    #[test]
    fn notify_then_take() {
        let _guard = SERIAL.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let notifier = ResizeNotifier::install().unwrap();
        assert!(!notifier.pending());

        notifier.notify();
        assert!(notifier.pending());
        assert!(notifier.resize_pending());
        assert!(readable(notifier.fd()));

        assert!(notifier.take());
        assert!(!notifier.pending());
        assert!(!readable(notifier.fd()));
        assert!(!notifier.take());
    }

    #[test]
    fn signal_wakes_pipe() {
        let _guard = SERIAL.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let notifier = ResizeNotifier::install().unwrap();
        unsafe {
            libc::raise(libc::SIGWINCH);
        }
        assert!(notifier.pending());
        assert!(readable(notifier.fd()));
        assert!(notifier.take());
    }

    #[test]
    fn repeated_signals_collapse() {
        let _guard = SERIAL.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let notifier = ResizeNotifier::install().unwrap();
        for _ in 0..5 {
            notifier.notify();
        }
        assert!(notifier.take());
        assert!(!notifier.take());
    }

    #[test]
    fn second_install_is_rejected() {
        let _guard = SERIAL.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let first = ResizeNotifier::install().unwrap();
        let err = ResizeNotifier::install().err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        drop(first);
        assert!(ResizeNotifier::install().is_ok());
    }
}
