// SPDX-License-Identifier: MIT
//
// Frame staging and chunked flushing.
//
// The renderer composes a whole frame into an OutputBuffer first. Nothing
// reaches the terminal until the frame is known to be good (no resize in
// the middle, every row the right width), so an abandoned frame costs a
// `clear()` and no bytes on the wire.
//
// Flushing writes the staged bytes in FLUSH_THRESHOLD-sized chunks,
// flushing the writer after each one. Slow terminals then see a steady
// stream instead of one large burst, and a signal landing mid-write
// (EINTR) just retries the chunk.

use std::io::{self, ErrorKind, Write};

/// Largest slice handed to the writer before it is flushed.
pub const FLUSH_THRESHOLD: usize = 1024;

const DEFAULT_CAPACITY: usize = 16_384;

// ─── OutputBuffer ────────────────────────────────────────────────────────────

/// Bytes for one frame, held until the frame is committed.
#[derive(Debug, Clone)]
pub struct OutputBuffer {
    buf: Vec<u8>,
}

impl OutputBuffer {
    /// Create an empty buffer with default capacity (16 KB).
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(DEFAULT_CAPACITY),
        }
    }

    /// Number of bytes accumulated.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// The accumulated bytes.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Append a string.
    #[inline]
    pub fn push_str(&mut self, s: &str) {
        self.buf.extend_from_slice(s.as_bytes());
    }

    /// Append one character as UTF-8.
    #[inline]
    pub fn push_char(&mut self, ch: char) {
        let mut enc = [0u8; 4];
        self.buf.extend_from_slice(ch.encode_utf8(&mut enc).as_bytes());
    }

    /// Drop everything staged (keeps allocated capacity).
    #[inline]
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Write the staged bytes to `w` in chunks and clear the buffer.
    ///
    /// # Errors
    ///
    /// Any write or flush error other than `Interrupted`. The buffer is
    /// left intact on error.
    pub fn flush_to(&mut self, w: &mut impl Write) -> io::Result<()> {
        write_chunked(w, &self.buf, FLUSH_THRESHOLD)?;
        self.buf.clear();
        Ok(())
    }
}

impl Write for OutputBuffer {
    #[inline]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        // Staging only. Real output goes through flush_to().
        Ok(())
    }
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Chunked Writes ──────────────────────────────────────────────────────────

/// Write `bytes` to `w`, flushing after every `chunk` bytes.
///
/// `Interrupted` from either `write` or `flush` is retried.
///
/// # Errors
///
/// The first other error, or `WriteZero` if the writer stops accepting.
pub fn write_chunked(w: &mut impl Write, bytes: &[u8], chunk: usize) -> io::Result<()> {
    for piece in bytes.chunks(chunk.max(1)) {
        let mut rest = piece;
        while !rest.is_empty() {
            match w.write(rest) {
                Ok(0) => return Err(io::Error::from(ErrorKind::WriteZero)),
                Ok(n) => rest = &rest[n..],
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        loop {
            match w.flush() {
                Ok(()) => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
    }
    Ok(())
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Writer that records each flush boundary and fails on a schedule.
    #[derive(Default)]
    struct Recorder {
        data: Vec<u8>,
        flushes: Vec<usize>,
        interrupt_writes: usize,
        interrupt_flushes: usize,
        max_write: Option<usize>,
    }

    impl Write for Recorder {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.interrupt_writes > 0 {
                self.interrupt_writes -= 1;
                return Err(ErrorKind::Interrupted.into());
            }
            let n = self.max_write.map_or(buf.len(), |m| m.min(buf.len()));
            self.data.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            if self.interrupt_flushes > 0 {
                self.interrupt_flushes -= 1;
                return Err(ErrorKind::Interrupted.into());
            }
            self.flushes.push(self.data.len());
            Ok(())
        }
    }

    #[test]
    fn new_is_empty() {
        let buf = OutputBuffer::new();
        assert!(buf.is_empty());
        assert_eq!(buf.len(), 0);
    }

    #[test]
    fn write_trait_and_push() {
        let mut buf = OutputBuffer::new();
        write!(buf, "\x1b[{}A", 2).unwrap();
        buf.push_str("ab");
        buf.push_char('中');
        assert_eq!(buf.as_bytes(), "\x1b[2Aab中".as_bytes());
    }

    #[test]
    fn clear_keeps_capacity() {
        let mut buf = OutputBuffer::new();
        buf.push_str("hello");
        let cap = buf.buf.capacity();
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.buf.capacity(), cap);
    }

    #[test]
    fn flush_to_writes_and_clears() {
        let mut buf = OutputBuffer::new();
        buf.push_str("frame");
        let mut out = Vec::new();
        buf.flush_to(&mut out).unwrap();
        assert_eq!(out, b"frame");
        assert!(buf.is_empty());
    }

    #[test]
    fn empty_flush_writes_nothing() {
        let mut rec = Recorder::default();
        OutputBuffer::new().flush_to(&mut rec).unwrap();
        assert!(rec.data.is_empty());
        assert!(rec.flushes.is_empty());
    }

    #[test]
    fn chunks_flush_at_threshold() {
        let mut rec = Recorder::default();
        write_chunked(&mut rec, &[b'x'; 25], 10).unwrap();
        assert_eq!(rec.flushes, vec![10, 20, 25]);
    }

    #[test]
    fn interrupted_is_retried() {
        let mut rec = Recorder {
            interrupt_writes: 2,
            interrupt_flushes: 1,
            ..Recorder::default()
        };
        write_chunked(&mut rec, b"abc", 100).unwrap();
        assert_eq!(rec.data, b"abc");
        assert_eq!(rec.flushes, vec![3]);
    }

    #[test]
    fn short_writes_are_completed() {
        let mut rec = Recorder {
            max_write: Some(2),
            ..Recorder::default()
        };
        write_chunked(&mut rec, b"abcdefg", 4).unwrap();
        assert_eq!(rec.data, b"abcdefg");
        assert_eq!(rec.flushes, vec![4, 7]);
    }

    #[test]
    fn other_errors_propagate() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(ErrorKind::BrokenPipe.into())
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }
        let mut buf = OutputBuffer::new();
        buf.push_str("x");
        let err = buf.flush_to(&mut Broken).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BrokenPipe);
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn zero_write_is_an_error() {
        struct Full;
        impl Write for Full {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Ok(0)
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }
        let err = write_chunked(&mut Full, b"x", 10).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WriteZero);
    }
}
