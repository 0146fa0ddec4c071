//! Runtime support shared by loadable kernel modules.
//!
//! A module crate pulls in the [`init_fn`], [`exit_fn`] and [`module!`]
//! macros from here, and character-device modules register their file
//! operations through [`chrdev::Registration`].
#![cfg_attr(not(test), no_std)]
extern crate alloc;

pub mod chrdev;
pub mod file;
mod module;
pub mod user;

pub use axerrno::{LinuxError, LinuxResult};
pub use kmacro::{exit_fn, init_fn, module};
pub use module::{ExitFn, InitFn, Module, ModuleInfo};
