//! Demonstrates module documentation.
#![cfg_attr(not(test), no_std)]

use kmod::{exit_fn, init_fn, module};

#[init_fn]
pub fn hello_init() -> i32 {
    log::info!("Hello, world 3");
    0
}

#[exit_fn]
fn hello_exit() {
    log::info!("Goodbye, world 3");
}

module!(
    name: "hello",
    license: "GPL",
    author: "Egor Bronnikov <egor@ebronnikov.xyz>",
    description: "A sample driver",
    version: "0.1.0",
);
