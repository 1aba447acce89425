// SPDX-License-Identifier: MIT
#![allow(unsafe_code)]
//
// Descriptor readiness and reads.
//
// The event loop waits on up to three descriptors at once: terminal
// input, the resize self-pipe and the GPM helper's output. This module is
// the thin libc layer under that wait. A signal interrupting `poll` or
// `read` is not an error here: `poll` reports "nothing ready" so the
// caller re-checks its flags, and `read` simply retries.

#[cfg(unix)]
use std::io;
#[cfg(unix)]
use std::os::unix::io::RawFd;
#[cfg(unix)]
use std::time::Duration;

/// Bytes read from a descriptor per call.
pub const READ_BUF_SIZE: usize = 4096;

/// Wait until any of `fds` is readable.
///
/// Returns one flag per descriptor, in order. `None` waits forever.
/// Hang-up and error conditions count as readable so the following read
/// sees EOF or the error.
///
/// # Errors
///
/// OS errors from `poll` other than `EINTR`.
#[cfg(unix)]
pub fn wait_readable(fds: &[RawFd], timeout: Option<Duration>) -> io::Result<Vec<bool>> {
    let mut pfds: Vec<libc::pollfd> = fds
        .iter()
        .map(|&fd| libc::pollfd {
            fd,
            events: libc::POLLIN,
            revents: 0,
        })
        .collect();

    let timeout_ms = timeout.map_or(-1, |t| i32::try_from(t.as_millis()).unwrap_or(i32::MAX));
    let n = unsafe { libc::poll(pfds.as_mut_ptr(), pfds.len() as libc::nfds_t, timeout_ms) };
    if n < 0 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            return Ok(vec![false; fds.len()]);
        }
        return Err(err);
    }

    Ok(pfds
        .iter()
        .map(|p| p.revents & (libc::POLLIN | libc::POLLHUP | libc::POLLERR) != 0)
        .collect())
}

/// Whether `fd` has input right now.
///
/// # Errors
///
/// OS errors from `poll`.
#[cfg(unix)]
pub fn has_input(fd: RawFd) -> io::Result<bool> {
    Ok(wait_readable(&[fd], Some(Duration::ZERO))?
        .first()
        .copied()
        .unwrap_or(false))
}

/// One `read()` into `buf`, retrying on `EINTR`.
///
/// Returns 0 at EOF, and also when a non-blocking descriptor has nothing.
///
/// # Errors
///
/// OS errors other than `EINTR` and `EAGAIN`.
#[cfg(unix)]
pub fn read_fd(fd: RawFd, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        let n = unsafe { libc::read(fd, buf.as_mut_ptr().cast(), buf.len()) };
        if n >= 0 {
            #[allow(clippy::cast_sign_loss)] // n >= 0 checked above.
            return Ok(n as usize);
        }
        let err = io::Error::last_os_error();
        match err.kind() {
            io::ErrorKind::Interrupted => {}
            io::ErrorKind::WouldBlock => return Ok(0),
            _ => return Err(err),
        }
    }
}

/// Put `fd` in non-blocking, close-on-exec mode.
///
/// # Errors
///
/// OS errors from `fcntl`.
#[cfg(unix)]
pub fn set_nonblocking_cloexec(fd: RawFd) -> io::Result<()> {
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL);
        if flags < 0 || libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) < 0 {
            return Err(io::Error::last_os_error());
        }
        let fd_flags = libc::fcntl(fd, libc::F_GETFD);
        if fd_flags < 0 || libc::fcntl(fd, libc::F_SETFD, fd_flags | libc::FD_CLOEXEC) < 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

// ─── Tests ───────────────────────────────────────────────────────────────────
