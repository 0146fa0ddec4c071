//! File operations for character devices.
//!
//! A device implements [`Operations`]. The host only ever sees the
//! type-erased [`FileOpener`] and [`FileHandle`] seams, so it can keep devices
//! of different types in one table.

use alloc::{boxed::Box, sync::Arc};

use axerrno::{LinuxError, LinuxResult};

use crate::user::UserSliceWriter;

/// Corresponds to the subset of `struct file_operations` a character device
/// provides.
pub trait Operations: Send + Sync + Sized + 'static {
    /// Per-open state returned by [`Operations::open`] and handed back to the
    /// other methods for the lifetime of the session.
    type Data: Send;

    /// Starts a new session.
    fn open(&self) -> LinuxResult<Self::Data>;

    /// Ends a session. The session data is moved in and dropped afterwards.
    fn release(&self, _data: Self::Data) {}

    /// Reads data from this file to the caller's buffer.
    fn read(&self, _data: &mut Self::Data, _writer: &mut UserSliceWriter<'_>) -> LinuxResult<usize> {
        Err(LinuxError::EINVAL)
    }

    /// Writes data from the caller's buffer to this file.
    fn write(&self, _data: &mut Self::Data, _reader: &[u8]) -> LinuxResult<usize> {
        Err(LinuxError::EINVAL)
    }
}

/// An open file as the host sees it.
pub trait FileHandle: Send {
    fn read(&mut self, buf: &mut [u8]) -> LinuxResult<usize>;
    fn write(&mut self, buf: &[u8]) -> LinuxResult<usize>;
}

/// Something the host can open by device number.
pub trait FileOpener: Send + Sync {
    fn open(&self) -> LinuxResult<Box<dyn FileHandle>>;
}

/// One session on a device.
///
/// Holds its own reference to the device, so the device outlives the session
/// even if the registration goes away first. Dropping the handle releases the
/// session.
pub struct OpenFile<T: Operations> {
    device: Arc<T>,
    data: Option<T::Data>,
}

impl<T: Operations> OpenFile<T> {
    pub fn open(device: Arc<T>) -> LinuxResult<Self> {
        let data = device.open()?;
        Ok(OpenFile {
            device,
            data: Some(data),
        })
    }

    pub fn device(&self) -> &T {
        &self.device
    }

    pub fn read(&mut self, buf: &mut [u8]) -> LinuxResult<usize> {
        let data = self.data.as_mut().ok_or(LinuxError::EBADF)?;
        let mut writer = UserSliceWriter::new(buf);
        self.device.read(data, &mut writer)
    }

    pub fn write(&mut self, buf: &[u8]) -> LinuxResult<usize> {
        let data = self.data.as_mut().ok_or(LinuxError::EBADF)?;
        self.device.write(data, buf)
    }

    /// Releases the session now instead of at drop.
    pub fn release(self) {}
}

impl<T: Operations> Drop for OpenFile<T> {
    fn drop(&mut self) {
        if let Some(data) = self.data.take() {
            self.device.release(data);
        }
    }
}

impl<T: Operations> FileHandle for OpenFile<T> {
    fn read(&mut self, buf: &mut [u8]) -> LinuxResult<usize> {
        OpenFile::read(self, buf)
    }

    fn write(&mut self, buf: &[u8]) -> LinuxResult<usize> {
        OpenFile::write(self, buf)
    }
}

/// Adapts a shared device to [`FileOpener`].
pub struct Opener<T: Operations>(Arc<T>);

impl<T: Operations> Opener<T> {
    pub fn new(device: Arc<T>) -> Self {
        Opener(device)
    }
}

impl<T: Operations> FileOpener for Opener<T> {
    fn open(&self) -> LinuxResult<Box<dyn FileHandle>> {
        let file = OpenFile::open(self.0.clone())?;
        Ok(Box::new(file))
    }
}
