//! Character device registration.
//!
//! The embedding kernel provides a [`ChrdevHost`] and installs it once with
//! [`set_host`]. Modules then call [`Registration::register`] from their init
//! function and keep the returned handle until exit; dropping it gives the
//! device number back.
//!
//! [`HostedChrdevTable`] is a complete in-process host: it hands out major
//! numbers the way Linux does and dispatches opens by major.

use alloc::{boxed::Box, sync::Arc, vec::Vec};

use axerrno::{LinuxError, LinuxResult};
use spin::{Mutex, Once};

use crate::file::{FileHandle, FileOpener, Opener, Operations};

/// Number of major numbers the host tracks.
pub const CHRDEV_MAJOR_MAX: u32 = 512;
/// First major handed out when a dynamic major is requested.
pub const CHRDEV_MAJOR_DYN_START: u32 = 254;
/// Lowest major handed out when a dynamic major is requested.
pub const CHRDEV_MAJOR_DYN_END: u32 = 234;

/// Host-side device number service.
pub trait ChrdevHost: Send + Sync {
    /// Associates `opener` with a major number.
    ///
    /// A `major` of 0 asks the host to pick one. Returns the major actually
    /// assigned.
    fn register_chrdev(
        &self,
        major: u32,
        name: &'static str,
        opener: Arc<dyn FileOpener>,
    ) -> LinuxResult<u32>;

    /// Gives a major number back. Unknown majors are ignored.
    fn unregister_chrdev(&self, major: u32, name: &str);
}

static HOST: Once<&'static dyn ChrdevHost> = Once::new();

/// Installs the process-wide host. Only the first call succeeds; later calls
/// fail with `EEXIST`.
pub fn set_host(host: &'static dyn ChrdevHost) -> LinuxResult<()> {
    let mut installed = false;
    HOST.call_once(|| {
        installed = true;
        host
    });
    if installed {
        Ok(())
    } else {
        Err(LinuxError::EEXIST)
    }
}

/// Returns the installed host, or `ENODEV` if there is none.
pub fn host() -> LinuxResult<&'static dyn ChrdevHost> {
    HOST.get().copied().ok_or(LinuxError::ENODEV)
}

/// A registered character device.
///
/// Owns the device state; the host and every open session only hold shared
/// references to it.
pub struct Registration<T: Operations> {
    major: u32,
    name: &'static str,
    device: Arc<T>,
    host: &'static dyn ChrdevHost,
}

impl<T: Operations> Registration<T> {
    /// Registers `device` under `name` with the installed host.
    pub fn new(name: &'static str, major: u32, device: T) -> LinuxResult<Self> {
        Self::register(host()?, name, major, device)
    }

    /// Registers `device` under `name` with an explicit host.
    pub fn register(
        host: &'static dyn ChrdevHost,
        name: &'static str,
        major: u32,
        device: T,
    ) -> LinuxResult<Self> {
        let device = Arc::new(device);
        let opener: Arc<dyn FileOpener> = Arc::new(Opener::new(device.clone()));
        let major = host.register_chrdev(major, name, opener)?;
        Ok(Registration {
            major,
            name,
            device,
            host,
        })
    }

    pub fn major(&self) -> u32 {
        self.major
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn device(&self) -> &T {
        &self.device
    }
}

impl<T: Operations> Drop for Registration<T> {
    fn drop(&mut self) {
        self.host.unregister_chrdev(self.major, self.name);
    }
}

struct ChrdevEntry {
    major: u32,
    name: &'static str,
    opener: Arc<dyn FileOpener>,
}

/// In-process device number table.
pub struct HostedChrdevTable {
    entries: Mutex<Vec<ChrdevEntry>>,
}

impl Default for HostedChrdevTable {
    fn default() -> Self {
        Self::new()
    }
}

impl HostedChrdevTable {
    pub const fn new() -> Self {
        HostedChrdevTable {
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Opens the device registered under `major`, like opening a device node
    /// created with `mknod`.
    pub fn open(&self, major: u32) -> LinuxResult<Box<dyn FileHandle>> {
        let opener = self
            .entries
            .lock()
            .iter()
            .find(|e| e.major == major)
            .map(|e| e.opener.clone())
            .ok_or(LinuxError::ENXIO)?;
        opener.open()
    }

    pub fn is_registered(&self, major: u32) -> bool {
        self.entries.lock().iter().any(|e| e.major == major)
    }

    pub fn name_of(&self, major: u32) -> Option<&'static str> {
        self.entries
            .lock()
            .iter()
            .find(|e| e.major == major)
            .map(|e| e.name)
    }

    fn find_dynamic_major(entries: &[ChrdevEntry]) -> LinuxResult<u32> {
        (CHRDEV_MAJOR_DYN_END..=CHRDEV_MAJOR_DYN_START)
            .rev()
            .find(|major| entries.iter().all(|e| e.major != *major))
            .ok_or_else(|| {
                log::warn!("out of dynamic char device majors");
                LinuxError::EBUSY
            })
    }
}

impl ChrdevHost for HostedChrdevTable {
    fn register_chrdev(
        &self,
        major: u32,
        name: &'static str,
        opener: Arc<dyn FileOpener>,
    ) -> LinuxResult<u32> {
        let mut entries = self.entries.lock();
        let major = if major == 0 {
            Self::find_dynamic_major(&entries)?
        } else if major >= CHRDEV_MAJOR_MAX {
            log::error!(
                "char device '{}': major {} exceeds maximum {}",
                name,
                major,
                CHRDEV_MAJOR_MAX - 1
            );
            return Err(LinuxError::EINVAL);
        } else if entries.iter().any(|e| e.major == major) {
            return Err(LinuxError::EBUSY);
        } else {
            major
        };
        entries.push(ChrdevEntry {
            major,
            name,
            opener,
        });
        log::debug!("registered char device '{}' with major {}", name, major);
        Ok(major)
    }

    fn unregister_chrdev(&self, major: u32, name: &str) {
        self.entries
            .lock()
            .retain(|e| !(e.major == major && e.name == name));
        log::debug!("unregistered char device '{}' (major {})", name, major);
    }
}
