//! A read-only char device that says how many times it has been opened.
//!
//! After loading, create a node with `mknod /dev/chardev c <major> 0` and
//! `cat` it. Each open produces a fresh message; writes are refused.
#![cfg_attr(not(test), no_std)]
extern crate alloc;

mod device;
#[cfg(test)]
mod testlog;

use kmod::{LinuxResult, chrdev::Registration, exit_fn, init_fn, module};
use spin::Mutex;

pub use device::{BUF_LEN, CounterDevice, Session};

/// Name as it appears in the host's device table.
pub const DEVICE_NAME: &str = "chardev";

static DEVICE: Mutex<Option<Registration<CounterDevice>>> = Mutex::new(None);

/// Major number assigned at load, or `None` when not loaded.
pub fn major() -> Option<u32> {
    DEVICE.lock().as_ref().map(Registration::major)
}

/// Opens served since load, or `None` when not loaded.
pub fn open_count() -> Option<u64> {
    DEVICE.lock().as_ref().map(|reg| reg.device().open_count())
}

fn register() -> LinuxResult<u32> {
    let reg = Registration::new(DEVICE_NAME, 0, CounterDevice::new())?;
    let major = reg.major();
    *DEVICE.lock() = Some(reg);
    Ok(major)
}

#[init_fn]
pub fn chardev_init() -> i32 {
    match register() {
        Ok(major) => {
            log::info!("I was assigned major number {}. To talk to", major);
            log::info!("the driver, create a dev file with");
            log::info!("'mknod /dev/{} c {} 0'.", DEVICE_NAME, major);
            log::info!("Try various minor numbers. Try to cat and echo to");
            log::info!("the device file.");
            log::info!("Remove the device file and module when done.");
            0
        }
        Err(e) => {
            let status = -(e as i32);
            log::error!("Registering char device failed with {}", status);
            status
        }
    }
}

#[exit_fn]
fn chardev_exit() {
    let reg = DEVICE.lock().take();
    if let Some(reg) = reg {
        let (name, major) = (reg.name(), reg.major());
        drop(reg);
        log::info!("Unregistered {} (major {})", name, major);
    }
}

module!(
    name: "chardev",
    license: "GPL",
    author: "Egor Bronnikov",
    description: "Creates a read-only char device that says how many times you've read from the dev file",
    version: "0.1.0",
);
