//! Bounded copies into a caller-supplied buffer.

use axerrno::{LinuxError, LinuxResult};

/// A writer over the caller's read buffer.
///
/// Stands in for the user-space destination of a `read` call. Every copy is
/// checked against the remaining capacity, so a device can never write past
/// the length the caller asked for.
pub struct UserSliceWriter<'a> {
    buf: &'a mut [u8],
    written: usize,
}

impl<'a> UserSliceWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        UserSliceWriter { buf, written: 0 }
    }

    /// Number of bytes that can still be written.
    pub fn len(&self) -> usize {
        self.buf.len() - self.written
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of bytes written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Copies all of `data`, failing with `EFAULT` if it does not fit.
    pub fn write_slice(&mut self, data: &[u8]) -> LinuxResult<()> {
        if data.len() > self.len() {
            return Err(LinuxError::EFAULT);
        }
        let end = self.written + data.len();
        self.buf[self.written..end].copy_from_slice(data);
        self.written = end;
        Ok(())
    }

    /// Copies as much of `data` as fits and returns the amount copied.
    pub fn write_clamped(&mut self, data: &[u8]) -> usize {
        let n = data.len().min(self.len());
        let end = self.written + n;
        self.buf[self.written..end].copy_from_slice(&data[..n]);
        self.written = end;
        n
    }
}
